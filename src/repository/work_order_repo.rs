// ==========================================
// 产线排产核心 - 工单仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================

use crate::domain::types::WorkOrderStatus;
use crate::domain::work_order::{WasteRecord, WorkOrder};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row};

const WORK_ORDER_COLUMNS: &str = "work_order_id, production_order_id, line_id, batch_ref, quantity, \
     scheduled_start, scheduled_end, actual_start, actual_end, status, gross_output, \
     produced_qty, created_at";

/// 工单仓储
pub struct WorkOrderRepository<'c> {
    conn: &'c Connection,
}

impl<'c> WorkOrderRepository<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<WorkOrder> {
        Ok(WorkOrder {
            work_order_id: row.get(0)?,
            production_order_id: row.get(1)?,
            line_id: row.get(2)?,
            batch_ref: row.get(3)?,
            quantity: row.get(4)?,
            scheduled_start: row.get(5)?,
            scheduled_end: row.get(6)?,
            actual_start: row.get(7)?,
            actual_end: row.get(8)?,
            status: row.get(9)?,
            gross_output: row.get(10)?,
            produced_qty: row.get(11)?,
            created_at: row.get(12)?,
        })
    }

    pub fn insert(&self, wo: &WorkOrder) -> RepositoryResult<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO work_order ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                WORK_ORDER_COLUMNS
            ),
            params![
                wo.work_order_id,
                wo.production_order_id,
                wo.line_id,
                wo.batch_ref,
                wo.quantity,
                wo.scheduled_start,
                wo.scheduled_end,
                wo.actual_start,
                wo.actual_end,
                wo.status,
                wo.gross_output,
                wo.produced_qty,
                wo.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn find_by_id(&self, work_order_id: &str) -> RepositoryResult<Option<WorkOrder>> {
        let wo = self
            .conn
            .query_row(
                &format!("SELECT {} FROM work_order WHERE work_order_id = ?1", WORK_ORDER_COLUMNS),
                params![work_order_id],
                Self::map_row,
            )
            .optional()?;
        Ok(wo)
    }

    pub fn get(&self, work_order_id: &str) -> RepositoryResult<WorkOrder> {
        self.find_by_id(work_order_id)?
            .ok_or_else(|| RepositoryError::not_found("WorkOrder", work_order_id))
    }

    pub fn list_by_order(&self, production_order_id: &str) -> RepositoryResult<Vec<WorkOrder>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM work_order WHERE production_order_id = ?1 ORDER BY scheduled_start, work_order_id",
            WORK_ORDER_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![production_order_id], Self::map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// 某产线的非取消工单（按计划开工排序）
    pub fn list_by_line(&self, line_id: &str) -> RepositoryResult<Vec<WorkOrder>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM work_order WHERE line_id = ?1 AND status != ?2 ORDER BY scheduled_start, work_order_id",
            WORK_ORDER_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![line_id, WorkOrderStatus::Cancelled], Self::map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// 订单下指定状态工单的数量合计
    pub fn sum_quantity(
        &self,
        production_order_id: &str,
        statuses: &[WorkOrderStatus],
    ) -> RepositoryResult<i64> {
        let mut total = 0i64;
        for status in statuses {
            let qty: i64 = self.conn.query_row(
                r#"
                SELECT COALESCE(SUM(quantity), 0) FROM work_order
                WHERE production_order_id = ?1 AND status = ?2
                "#,
                params![production_order_id, status],
                |row| row.get(0),
            )?;
            total += qty;
        }
        Ok(total)
    }

    pub fn update_status(
        &self,
        work_order_id: &str,
        status: WorkOrderStatus,
    ) -> RepositoryResult<()> {
        let affected = self.conn.execute(
            "UPDATE work_order SET status = ?1 WHERE work_order_id = ?2",
            params![status, work_order_id],
        )?;
        if affected == 0 {
            return Err(RepositoryError::not_found("WorkOrder", work_order_id));
        }
        Ok(())
    }

    pub fn mark_started(&self, work_order_id: &str, at: NaiveDateTime) -> RepositoryResult<()> {
        self.conn.execute(
            "UPDATE work_order SET status = ?1, actual_start = ?2 WHERE work_order_id = ?3",
            params![WorkOrderStatus::InProgress, at, work_order_id],
        )?;
        Ok(())
    }

    pub fn mark_completed(&self, work_order_id: &str, at: NaiveDateTime) -> RepositoryResult<()> {
        self.conn.execute(
            "UPDATE work_order SET status = ?1, actual_end = ?2 WHERE work_order_id = ?3",
            params![WorkOrderStatus::Completed, at, work_order_id],
        )?;
        Ok(())
    }

    pub fn update_output(
        &self,
        work_order_id: &str,
        gross_output: i64,
        produced_qty: i64,
    ) -> RepositoryResult<()> {
        self.conn.execute(
            "UPDATE work_order SET gross_output = ?1, produced_qty = ?2 WHERE work_order_id = ?3",
            params![gross_output, produced_qty, work_order_id],
        )?;
        Ok(())
    }

    /// 取消订单下所有待开工工单
    pub fn cancel_pending_for_order(&self, production_order_id: &str) -> RepositoryResult<usize> {
        Ok(self.conn.execute(
            "UPDATE work_order SET status = ?1 WHERE production_order_id = ?2 AND status = ?3",
            params![
                WorkOrderStatus::Cancelled,
                production_order_id,
                WorkOrderStatus::Pending
            ],
        )?)
    }

    // ===== 废品 =====

    pub fn insert_waste(&self, waste: &WasteRecord) -> RepositoryResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO waste_record (waste_id, work_order_id, quantity, reason, recorded_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                waste.waste_id,
                waste.work_order_id,
                waste.quantity,
                waste.reason,
                waste.recorded_at
            ],
        )?;
        Ok(())
    }

    pub fn sum_waste(&self, work_order_id: &str) -> RepositoryResult<i64> {
        let total: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(quantity), 0) FROM waste_record WHERE work_order_id = ?1",
            params![work_order_id],
            |row| row.get(0),
        )?;
        Ok(total)
    }
}
