// ==========================================
// 产线排产核心 - 生产订单领域模型
// ==========================================
// 生产订单独占其工单与产能日历预留（级联删除）
// ==========================================

use crate::domain::types::ProductionOrderStatus;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// ProductionOrder - 生产订单
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionOrder {
    pub order_id: String,                    // 订单ID
    pub product_id: String,                  // 产品
    pub quantity: i64,                       // 需求数量（件）
    pub status: ProductionOrderStatus,       // 订单状态

    // ===== 日期 =====
    pub planned_date: Option<NaiveDate>,     // 原始计划日期（重排不改写）
    pub planned_start: Option<NaiveDate>,    // 计划开工窗口起
    pub planned_finish: Option<NaiveDate>,   // 计划完工窗口止
    pub finished_at: Option<NaiveDateTime>,  // 实际完工时间

    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl ProductionOrder {
    /// 新建待料订单
    pub fn new(
        order_id: String,
        product_id: String,
        quantity: i64,
        planned_date: Option<NaiveDate>,
        now: NaiveDateTime,
    ) -> Self {
        Self {
            order_id,
            product_id,
            quantity,
            status: ProductionOrderStatus::WaitingMaterials,
            planned_date,
            planned_start: None,
            planned_finish: None,
            finished_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// 排序/起排用的计划日期：无原始计划日期时退回创建日期
    pub fn anchor_date(&self) -> NaiveDate {
        self.planned_date.unwrap_or_else(|| self.created_at.date())
    }
}
