// ==========================================
// 产线排产核心 - 生产订单仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 说明: 仓储借用连接（可为事务），便于多个仓储共享同一事务
// ==========================================

use crate::domain::order::ProductionOrder;
use crate::domain::types::ProductionOrderStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension, Row};

const ORDER_COLUMNS: &str = "order_id, product_id, quantity, status, planned_date, planned_start, \
     planned_finish, finished_at, created_at, updated_at";

/// 生产订单仓储
/// 职责: 管理production_order表的CRUD操作
pub struct ProductionOrderRepository<'c> {
    conn: &'c Connection,
}

impl<'c> ProductionOrderRepository<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// 映射数据库行到ProductionOrder对象
    fn map_row(row: &Row<'_>) -> rusqlite::Result<ProductionOrder> {
        Ok(ProductionOrder {
            order_id: row.get(0)?,
            product_id: row.get(1)?,
            quantity: row.get(2)?,
            status: row.get(3)?,
            planned_date: row.get(4)?,
            planned_start: row.get(5)?,
            planned_finish: row.get(6)?,
            finished_at: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    /// 插入订单
    pub fn insert(&self, order: &ProductionOrder) -> RepositoryResult<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO production_order ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                ORDER_COLUMNS
            ),
            params![
                order.order_id,
                order.product_id,
                order.quantity,
                order.status,
                order.planned_date,
                order.planned_start,
                order.planned_finish,
                order.finished_at,
                order.created_at,
                order.updated_at,
            ],
        )?;
        Ok(())
    }

    /// 按ID查询
    pub fn find_by_id(&self, order_id: &str) -> RepositoryResult<Option<ProductionOrder>> {
        let order = self
            .conn
            .query_row(
                &format!("SELECT {} FROM production_order WHERE order_id = ?1", ORDER_COLUMNS),
                params![order_id],
                Self::map_row,
            )
            .optional()?;
        Ok(order)
    }

    /// 按ID查询（不存在即报错）
    pub fn get(&self, order_id: &str) -> RepositoryResult<ProductionOrder> {
        self.find_by_id(order_id)?
            .ok_or_else(|| RepositoryError::not_found("ProductionOrder", order_id))
    }

    /// 按状态查询，创建时间升序（先到先得）
    pub fn list_by_status(
        &self,
        status: ProductionOrderStatus,
    ) -> RepositoryResult<Vec<ProductionOrder>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM production_order WHERE status = ?1 ORDER BY created_at, order_id",
            ORDER_COLUMNS
        ))?;
        let orders = stmt
            .query_map(params![status], Self::map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(orders)
    }

    /// 查询所有非终态订单
    pub fn list_active(&self) -> RepositoryResult<Vec<ProductionOrder>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM production_order WHERE status NOT IN (?1, ?2) ORDER BY created_at, order_id",
            ORDER_COLUMNS
        ))?;
        let orders = stmt
            .query_map(
                params![ProductionOrderStatus::Finished, ProductionOrderStatus::Cancelled],
                Self::map_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(orders)
    }

    /// 查询配方引用某原料的待料订单（最早创建优先）
    pub fn list_waiting_for_material(
        &self,
        raw_material_id: &str,
    ) -> RepositoryResult<Vec<ProductionOrder>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT o.order_id, o.product_id, o.quantity, o.status, o.planned_date, o.planned_start,
                   o.planned_finish, o.finished_at, o.created_at, o.updated_at
            FROM production_order o
            WHERE o.status = ?1
              AND EXISTS (
                  SELECT 1 FROM recipe_requirement r
                  WHERE r.product_id = o.product_id AND r.raw_material_id = ?2
              )
            ORDER BY o.created_at, o.order_id
            "#,
        )?;
        let orders = stmt
            .query_map(
                params![ProductionOrderStatus::WaitingMaterials, raw_material_id],
                Self::map_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(orders)
    }

    /// 更新状态
    pub fn update_status(
        &self,
        order_id: &str,
        status: ProductionOrderStatus,
        now: NaiveDateTime,
    ) -> RepositoryResult<()> {
        let affected = self.conn.execute(
            "UPDATE production_order SET status = ?1, updated_at = ?2 WHERE order_id = ?3",
            params![status, now, order_id],
        )?;
        if affected == 0 {
            return Err(RepositoryError::not_found("ProductionOrder", order_id));
        }
        Ok(())
    }

    /// 更新计划窗口（开工/完工日期）
    pub fn update_window(
        &self,
        order_id: &str,
        planned_start: Option<NaiveDate>,
        planned_finish: Option<NaiveDate>,
        now: NaiveDateTime,
    ) -> RepositoryResult<()> {
        let affected = self.conn.execute(
            r#"
            UPDATE production_order
            SET planned_start = ?1, planned_finish = ?2, updated_at = ?3
            WHERE order_id = ?4
            "#,
            params![planned_start, planned_finish, now, order_id],
        )?;
        if affected == 0 {
            return Err(RepositoryError::not_found("ProductionOrder", order_id));
        }
        Ok(())
    }

    /// 标记完工
    pub fn mark_finished(&self, order_id: &str, finished_at: NaiveDateTime) -> RepositoryResult<()> {
        let affected = self.conn.execute(
            r#"
            UPDATE production_order
            SET status = ?1, finished_at = ?2, updated_at = ?2
            WHERE order_id = ?3
            "#,
            params![ProductionOrderStatus::Finished, finished_at, order_id],
        )?;
        if affected == 0 {
            return Err(RepositoryError::not_found("ProductionOrder", order_id));
        }
        Ok(())
    }

    /// 删除订单（工单/日历预留/物料预留级联删除）
    pub fn delete(&self, order_id: &str) -> RepositoryResult<usize> {
        Ok(self
            .conn
            .execute("DELETE FROM production_order WHERE order_id = ?1", params![order_id])?)
    }
}
