// ==========================================
// 产线排产核心 - 采购申请仓储
// ==========================================

use crate::domain::material::{PurchaseRequest, PurchaseRequestLine};
use crate::domain::types::PurchaseRequestStatus;
use crate::repository::error::RepositoryResult;
use rusqlite::{params, Connection};

/// 采购申请仓储（头 + 行）
pub struct PurchaseRequestRepository<'c> {
    conn: &'c Connection,
}

impl<'c> PurchaseRequestRepository<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// 插入采购申请及其行
    pub fn insert(&self, request: &PurchaseRequest) -> RepositoryResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO purchase_request (request_id, supplier_id, production_order_id, status, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                request.request_id,
                request.supplier_id,
                request.production_order_id,
                request.status,
                request.created_at,
            ],
        )?;

        let mut stmt = self.conn.prepare(
            r#"
            INSERT INTO purchase_request_line (request_id, raw_material_id, shortfall_qty, quantity)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )?;
        for line in &request.lines {
            stmt.execute(params![
                request.request_id,
                line.raw_material_id,
                line.shortfall_qty,
                line.quantity
            ])?;
        }
        Ok(())
    }

    /// 作废订单下所有待处理申请
    pub fn cancel_open_for_order(&self, production_order_id: &str) -> RepositoryResult<usize> {
        Ok(self.conn.execute(
            "UPDATE purchase_request SET status = ?1 WHERE production_order_id = ?2 AND status = ?3",
            params![
                PurchaseRequestStatus::Cancelled,
                production_order_id,
                PurchaseRequestStatus::Open
            ],
        )?)
    }

    /// 查询订单下指定状态的申请（含行）
    pub fn list_by_order(
        &self,
        production_order_id: &str,
        status: PurchaseRequestStatus,
    ) -> RepositoryResult<Vec<PurchaseRequest>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT request_id, supplier_id, production_order_id, status, created_at
            FROM purchase_request
            WHERE production_order_id = ?1 AND status = ?2
            ORDER BY supplier_id, created_at
            "#,
        )?;
        let mut requests = stmt
            .query_map(params![production_order_id, status], |row| {
                Ok(PurchaseRequest {
                    request_id: row.get(0)?,
                    supplier_id: row.get(1)?,
                    production_order_id: row.get(2)?,
                    status: row.get(3)?,
                    created_at: row.get(4)?,
                    lines: Vec::new(),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut line_stmt = self.conn.prepare(
            r#"
            SELECT raw_material_id, shortfall_qty, quantity
            FROM purchase_request_line WHERE request_id = ?1 ORDER BY raw_material_id
            "#,
        )?;
        for request in &mut requests {
            request.lines = line_stmt
                .query_map(params![request.request_id], |row| {
                    Ok(PurchaseRequestLine {
                        raw_material_id: row.get(0)?,
                        shortfall_qty: row.get(1)?,
                        quantity: row.get(2)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
        }
        Ok(requests)
    }
}
