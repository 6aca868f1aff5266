// ==========================================
// 产线排产核心 - 引擎层
// ==========================================
// 职责: 实现业务规则引擎,不拼 SQL
// 红线: 每个触发事件一个事务；可恢复问题汇总在结果中返回
// ==========================================

pub mod batch;
pub mod calendar;
pub mod error;
pub mod events;
pub mod execution;
pub mod lifecycle;
pub mod lookup;
pub mod replanner;
pub mod reservation;
pub mod scheduler;
pub mod solver;

// 重导出核心引擎
pub use batch::{BatchDecomposer, SubBatch};
pub use calendar::WorkCalendar;
pub use error::{EngineError, EngineResult};
pub use events::{
    LowStockSignal, NoOpStockAlertPublisher, RecordingStockAlertPublisher, StockAlertPublisher,
};
pub use execution::{WorkOrderEventKind, WorkOrderEventResult, WorkOrderExecution};
pub use lifecycle::{NewProductionOrder, OrderCancellationResult, OrderCreationResult, OrderLifecycle};
pub use lookup::{CapacityTable, RecipeBook, ReferenceData};
pub use replanner::{CapacityCalendarReplanner, OrderReplanOutcome, ReplanResult, SalesOrderImpact};
pub use reservation::{
    ArrivalReevaluation, FinalizationResult, LotConsumption, LotQuarantineResult, LotReceipt,
    MaterialReservationEngine, MaterialShortfall, OrderFailure, ReservationDelta,
    ReservationOutcome,
};
pub use scheduler::{ConstraintScheduler, ScheduleRunResult, ScheduleRunStatus, UnplannableBatch};
pub use solver::{ConstraintSolver, CpModel, PumpkinSolver, SolveOutcome, SolveStatus};
