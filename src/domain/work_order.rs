// ==========================================
// 产线排产核心 - 工单领域模型
// ==========================================
// 工单只由排产器/重排器创建，由车间执行事件推进
// ==========================================

use crate::domain::types::WorkOrderStatus;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// WorkOrder - 工单（生产订单在某产线上的执行切片）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkOrder {
    pub work_order_id: String,
    pub production_order_id: String,
    pub line_id: String,
    pub batch_ref: Option<String>, // 批次序列号（排产簿记用）
    pub quantity: i64,

    // ===== 计划时间 =====
    pub scheduled_start: NaiveDateTime,
    pub scheduled_end: NaiveDateTime,

    // ===== 实际执行 =====
    pub actual_start: Option<NaiveDateTime>,
    pub actual_end: Option<NaiveDateTime>,
    pub status: WorkOrderStatus,
    pub gross_output: i64,  // 毛产出
    pub produced_qty: i64,  // 净产出 = 毛产出 - Σ废品

    pub created_at: NaiveDateTime,
}

impl WorkOrder {
    /// 与另一工单在时间上是否重叠（半开区间）
    pub fn overlaps(&self, other: &WorkOrder) -> bool {
        self.scheduled_start < other.scheduled_end && other.scheduled_start < self.scheduled_end
    }
}

/// 废品记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WasteRecord {
    pub waste_id: String,
    pub work_order_id: String,
    pub quantity: i64,
    pub reason: Option<String>,
    pub recorded_at: NaiveDateTime,
}
