// ==========================================
// 产线排产核心 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// 说明: 仓储借用 &Connection，事务(Transaction)可直接传入，
//       同一触发事件内的多个仓储写入共享一个事务
// ==========================================

pub mod audit_log_repo;
pub mod calendar_repo;
pub mod error;
pub mod material_repo;
pub mod order_repo;
pub mod purchase_request_repo;
pub mod reference_repo;
pub mod sales_order_repo;
pub mod work_order_repo;

// 重导出核心仓储
pub use audit_log_repo::AuditLogRepository;
pub use calendar_repo::CalendarReservationRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use material_repo::{MaterialLotRepository, MaterialReservationRepository};
pub use order_repo::ProductionOrderRepository;
pub use purchase_request_repo::PurchaseRequestRepository;
pub use reference_repo::ReferenceDataRepository;
pub use sales_order_repo::SalesOrderRepository;
pub use work_order_repo::WorkOrderRepository;
