// ==========================================
// 产线排产核心 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 组成: 物料预留 / 批次拆分 / 约束排产 / 产能日历重排
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 导入层 - 外部参考数据
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    LotStatus, ProductionOrderStatus, PurchaseRequestStatus, ReservationStatus,
    SalesOrderStatus, WorkOrderStatus,
};

// 引擎
pub use engine::{
    BatchDecomposer, CapacityCalendarReplanner, ConstraintScheduler, MaterialReservationEngine,
    OrderLifecycle, WorkOrderExecution,
};

// API
pub use api::{ApiError, ApiResult, PlanningApi};

// 基础设施
pub use config::{ConfigManager, PlanningConfig};
pub use db::Database;

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "产线排产核心";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
