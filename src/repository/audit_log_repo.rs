// ==========================================
// 产线排产核心 - 审计日志仓储
// ==========================================
// 与业务写入处于同一事务，回滚时一并丢弃
// ==========================================

use crate::domain::audit::AuditEntry;
use crate::domain::types::AuditAction;
use crate::repository::error::RepositoryResult;
use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use serde::Serialize;
use uuid::Uuid;

pub struct AuditLogRepository<'c> {
    conn: &'c Connection,
}

impl<'c> AuditLogRepository<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// 序列化增量记录并写入
    pub fn record<T: Serialize>(
        &self,
        action: AuditAction,
        entity_ref: Option<&str>,
        payload: &T,
        now: NaiveDateTime,
    ) -> RepositoryResult<String> {
        let entry = AuditEntry {
            audit_id: Uuid::new_v4().to_string(),
            action,
            entity_ref: entity_ref.map(str::to_string),
            payload_json: serde_json::to_string(payload)?,
            created_at: now,
        };
        self.insert(&entry)?;
        Ok(entry.audit_id)
    }

    pub fn insert(&self, entry: &AuditEntry) -> RepositoryResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO audit_log (audit_id, action, entity_ref, payload_json, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                entry.audit_id,
                entry.action,
                entry.entity_ref,
                entry.payload_json,
                entry.created_at
            ],
        )?;
        Ok(())
    }

    /// 按动作类型查询（最新在前）
    pub fn list_by_action(&self, action: AuditAction, limit: usize) -> RepositoryResult<Vec<AuditEntry>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT audit_id, action, entity_ref, payload_json, created_at
            FROM audit_log WHERE action = ?1
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?2
            "#,
        )?;
        let rows = stmt
            .query_map(params![action, limit as i64], |row| {
                Ok(AuditEntry {
                    audit_id: row.get(0)?,
                    action: row.get(1)?,
                    entity_ref: row.get(2)?,
                    payload_json: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}
