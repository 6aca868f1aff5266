// ==========================================
// 产线排产核心 - 销售订单仓储（挂钩查询）
// ==========================================

use crate::domain::sales::{SalesOrder, SalesOrderLine};
use crate::domain::types::SalesOrderStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};

/// 销售订单仓储
pub struct SalesOrderRepository<'c> {
    conn: &'c Connection,
}

impl<'c> SalesOrderRepository<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    fn map_order(row: &Row<'_>) -> rusqlite::Result<SalesOrder> {
        Ok(SalesOrder {
            sales_order_id: row.get(0)?,
            customer_ref: row.get(1)?,
            delivery_date: row.get(2)?,
            status: row.get(3)?,
        })
    }

    pub fn insert_order(&self, order: &SalesOrder) -> RepositoryResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO sales_order (sales_order_id, customer_ref, delivery_date, status)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                order.sales_order_id,
                order.customer_ref,
                order.delivery_date,
                order.status
            ],
        )?;
        Ok(())
    }

    pub fn insert_line(&self, line: &SalesOrderLine) -> RepositoryResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO sales_order_line (line_id, sales_order_id, product_id, quantity, production_order_id)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                line.line_id,
                line.sales_order_id,
                line.product_id,
                line.quantity,
                line.production_order_id
            ],
        )?;
        Ok(())
    }

    pub fn find_by_id(&self, sales_order_id: &str) -> RepositoryResult<Option<SalesOrder>> {
        let order = self
            .conn
            .query_row(
                r#"
                SELECT sales_order_id, customer_ref, delivery_date, status
                FROM sales_order WHERE sales_order_id = ?1
                "#,
                params![sales_order_id],
                Self::map_order,
            )
            .optional()?;
        Ok(order)
    }

    /// 挂钩：将销售订单行关联到生产订单
    pub fn peg_line(&self, line_id: &str, production_order_id: &str) -> RepositoryResult<()> {
        let affected = self.conn.execute(
            "UPDATE sales_order_line SET production_order_id = ?1 WHERE line_id = ?2",
            params![production_order_id, line_id],
        )?;
        if affected == 0 {
            return Err(RepositoryError::not_found("SalesOrderLine", line_id));
        }
        Ok(())
    }

    /// 查询挂钩到某生产订单的销售订单（去重）
    pub fn list_pegged_orders(&self, production_order_id: &str) -> RepositoryResult<Vec<SalesOrder>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT DISTINCT s.sales_order_id, s.customer_ref, s.delivery_date, s.status
            FROM sales_order s
            JOIN sales_order_line l ON l.sales_order_id = s.sales_order_id
            WHERE l.production_order_id = ?1
              AND s.status NOT IN (?2, ?3)
            ORDER BY s.sales_order_id
            "#,
        )?;
        let orders = stmt
            .query_map(
                params![
                    production_order_id,
                    SalesOrderStatus::Delivered,
                    SalesOrderStatus::Cancelled
                ],
                Self::map_order,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(orders)
    }

    pub fn update_delivery(
        &self,
        sales_order_id: &str,
        delivery_date: NaiveDate,
        status: SalesOrderStatus,
    ) -> RepositoryResult<()> {
        let affected = self.conn.execute(
            "UPDATE sales_order SET delivery_date = ?1, status = ?2 WHERE sales_order_id = ?3",
            params![delivery_date, status, sales_order_id],
        )?;
        if affected == 0 {
            return Err(RepositoryError::not_found("SalesOrder", sales_order_id));
        }
        Ok(())
    }
}
