// ==========================================
// 产线排产核心 - 审计日志
// ==========================================
// 每个触发事件在同一事务内写入一条增量记录
// ==========================================

use crate::domain::types::AuditAction;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub audit_id: String,
    pub action: AuditAction,
    pub entity_ref: Option<String>, // 受影响实体（订单ID/物料ID/运行ID）
    pub payload_json: String,       // 增量记录 JSON
    pub created_at: NaiveDateTime,
}
