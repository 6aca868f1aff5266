// ==========================================
// 产线排产核心 - 领域模型层
// ==========================================
// 职责: 定义领域实体、状态枚举
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod audit;
pub mod calendar;
pub mod material;
pub mod order;
pub mod recipe;
pub mod sales;
pub mod types;
pub mod work_order;

// 重导出核心类型
pub use audit::AuditEntry;
pub use calendar::CalendarReservation;
pub use material::{MaterialLot, MaterialReservation, PurchaseRequest, PurchaseRequestLine};
pub use order::ProductionOrder;
pub use recipe::{LineCapacity, ProductionLine, RawMaterial, RecipeRequirement, Supplier};
pub use sales::{SalesOrder, SalesOrderLine};
pub use types::{
    AuditAction, LotStatus, ProductionOrderStatus, PurchaseRequestStatus, ReservationStatus,
    SalesOrderStatus, WorkOrderStatus,
};
pub use work_order::{WasteRecord, WorkOrder};
