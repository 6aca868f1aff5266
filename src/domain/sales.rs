// ==========================================
// 产线排产核心 - 销售订单（下游承诺）
// ==========================================
// 挂钩(pegging): sales_order_line.production_order_id
// ==========================================

use crate::domain::types::SalesOrderStatus;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesOrder {
    pub sales_order_id: String,
    pub customer_ref: Option<String>,
    pub delivery_date: NaiveDate, // 承诺交期
    pub status: SalesOrderStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesOrderLine {
    pub line_id: String,
    pub sales_order_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub production_order_id: Option<String>,
}
