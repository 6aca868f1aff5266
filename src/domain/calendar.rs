// ==========================================
// 产线排产核心 - 产能日历预留
// ==========================================
// 软性、按天粒度的产能占用；只由重排器创建/删除
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarReservation {
    pub reservation_id: String,
    pub production_order_id: String,
    pub line_id: String,
    pub work_date: NaiveDate,
    pub hours_reserved: f64, // 当日占用工时
    pub quantity: f64,       // 当日计划产量
    pub created_at: NaiveDateTime,
}
