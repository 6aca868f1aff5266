// ==========================================
// 产线排产核心 - 原料批次 / 物料预留 / 采购申请
// ==========================================
// 不变量: 批次 on_hand_qty >= Σ(ACTIVE 预留数量)
// 预留引用批次但不拥有批次
// ==========================================

use crate::domain::types::{LotStatus, PurchaseRequestStatus, ReservationStatus};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// MaterialLot - 原料批次
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialLot {
    pub lot_id: String,
    pub raw_material_id: String,
    pub on_hand_qty: f64,                 // 在库数量
    pub expiry_date: Option<NaiveDate>,   // 失效日期（FIFO 依据）
    pub received_at: NaiveDateTime,       // 入库时间
    pub status: LotStatus,
}

// ==========================================
// MaterialReservation - 物料预留（软占用）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialReservation {
    pub reservation_id: String,
    pub production_order_id: String,
    pub lot_id: String,
    pub raw_material_id: String,
    pub quantity: f64,
    pub status: ReservationStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

// ==========================================
// PurchaseRequest - 采购申请（按供应商一单）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseRequest {
    pub request_id: String,
    pub supplier_id: String,
    pub production_order_id: String, // 关联来源生产订单
    pub status: PurchaseRequestStatus,
    pub created_at: NaiveDateTime,
    pub lines: Vec<PurchaseRequestLine>,
}

/// 采购申请行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseRequestLine {
    pub raw_material_id: String,
    pub shortfall_qty: f64, // 缺口
    pub quantity: f64,      // 申请数量 = max(缺口, 最小起订量)
}
