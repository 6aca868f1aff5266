// ==========================================
// 产线排产核心 - 排产 API
// ==========================================
// 职责: 对调用方（定时任务/手工触发）暴露全部触发入口
// - 输入校验在任何变更前完成
// - 每次调用加载一次配置快照
// - 引擎错误统一转换为 ApiError
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::{ConfigManager, PlanningConfig, PlanningConfigReader};
use crate::db::Database;
use crate::engine::{
    ArrivalReevaluation, CapacityCalendarReplanner, ConstraintScheduler, ConstraintSolver,
    FinalizationResult, LotQuarantineResult, LotReceipt, MaterialReservationEngine,
    NewProductionOrder, NoOpStockAlertPublisher, OrderCancellationResult,
    OrderCreationResult, OrderLifecycle, PumpkinSolver, ReplanResult, ReservationOutcome,
    ScheduleRunResult, StockAlertPublisher, WorkOrderEventResult,
    WorkOrderExecution,
};
use chrono::{NaiveDate, NaiveDateTime};
use std::sync::Arc;
use tracing::debug;

/// 时钟（测试中可固定）
pub type Clock = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

fn system_clock() -> Clock {
    Arc::new(|| chrono::Local::now().naive_local())
}

// ==========================================
// PlanningApi - 排产 API
// ==========================================
pub struct PlanningApi {
    config: Arc<dyn PlanningConfigReader>,
    reservation: MaterialReservationEngine,
    scheduler: ConstraintScheduler,
    replanner: CapacityCalendarReplanner,
    execution: WorkOrderExecution,
    lifecycle: OrderLifecycle,
    clock: Clock,
}

impl PlanningApi {
    /// 使用默认协作者创建（pumpkin 约束求解器 + 空操作低库存发布者）
    pub fn new(db: Database) -> ApiResult<Self> {
        let config = ConfigManager::from_connection(db.shared_connection())?;
        Ok(Self::with_collaborators(
            db,
            Arc::new(config),
            Arc::new(PumpkinSolver::new()),
            Arc::new(NoOpStockAlertPublisher),
        ))
    }

    /// 注入外部协作者
    pub fn with_collaborators(
        db: Database,
        config: Arc<dyn PlanningConfigReader>,
        solver: Arc<dyn ConstraintSolver>,
        publisher: Arc<dyn StockAlertPublisher>,
    ) -> Self {
        Self {
            config,
            reservation: MaterialReservationEngine::with_publisher(db.clone(), publisher),
            scheduler: ConstraintScheduler::new(db.clone(), solver),
            replanner: CapacityCalendarReplanner::new(db.clone()),
            execution: WorkOrderExecution::new(db.clone()),
            lifecycle: OrderLifecycle::new(db),
            clock: system_clock(),
        }
    }

    /// 替换时钟
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// 固定时钟
    pub fn with_fixed_clock(self, now: NaiveDateTime) -> Self {
        self.with_clock(Arc::new(move || now))
    }

    fn now(&self) -> NaiveDateTime {
        (self.clock)()
    }

    /// 加载并校验配置快照
    pub async fn load_config(&self) -> ApiResult<PlanningConfig> {
        let config = self.config.load_planning_config().await?;
        debug!(config = ?config, "配置快照已加载");
        Ok(config)
    }

    // ==========================================
    // 生产订单
    // ==========================================

    pub fn create_production_order(&self, request: NewProductionOrder) -> ApiResult<OrderCreationResult> {
        if let Some(id) = &request.order_id {
            require_id("order_id", id)?;
        }
        if let Some(line) = &request.sales_order_line_id {
            require_id("sales_order_line_id", line)?;
        }
        Ok(self.lifecycle.create_production_order(request, self.now())?)
    }

    pub fn finish_production_order(&self, order_id: &str) -> ApiResult<FinalizationResult> {
        require_id("order_id", order_id)?;
        Ok(self.reservation.finalize_order(order_id, self.now())?)
    }

    pub fn cancel_production_order(&self, order_id: &str) -> ApiResult<OrderCancellationResult> {
        require_id("order_id", order_id)?;
        Ok(self.lifecycle.cancel_production_order(order_id, self.now())?)
    }

    // ==========================================
    // 物料
    // ==========================================

    pub fn reserve_materials_for_order(&self, order_id: &str) -> ApiResult<ReservationOutcome> {
        require_id("order_id", order_id)?;
        Ok(self.reservation.reserve_materials_for_order(order_id, self.now())?)
    }

    pub fn reevaluate_on_material_arrival(&self, raw_material_id: &str) -> ApiResult<ArrivalReevaluation> {
        require_id("raw_material_id", raw_material_id)?;
        Ok(self
            .reservation
            .reevaluate_on_material_arrival(raw_material_id, self.now())?)
    }

    pub fn receive_lot(
        &self,
        lot_id: Option<String>,
        raw_material_id: &str,
        quantity: f64,
        expiry_date: Option<NaiveDate>,
    ) -> ApiResult<LotReceipt> {
        require_id("raw_material_id", raw_material_id)?;
        if let Some(id) = &lot_id {
            require_id("lot_id", id)?;
        }
        Ok(self
            .reservation
            .receive_lot(lot_id, raw_material_id, quantity, expiry_date, self.now())?)
    }

    pub fn quarantine_lot(&self, lot_id: &str) -> ApiResult<LotQuarantineResult> {
        require_id("lot_id", lot_id)?;
        Ok(self.reservation.quarantine_lot(lot_id, self.now())?)
    }

    // ==========================================
    // 排产 / 重排
    // ==========================================

    pub async fn schedule_pending_orders(&self) -> ApiResult<ScheduleRunResult> {
        let config = self.load_config().await?;
        Ok(self.scheduler.schedule_pending_orders(&config, self.now())?)
    }

    pub async fn replan_active_orders(
        &self,
        simulated_date: NaiveDate,
        lookahead_days: i64,
    ) -> ApiResult<ReplanResult> {
        if lookahead_days < 0 {
            return Err(ApiError::InvalidInput(format!(
                "lookahead_days 不能为负: {}",
                lookahead_days
            )));
        }
        let config = self.load_config().await?;
        Ok(self
            .replanner
            .replan_active_orders(&config, simulated_date, lookahead_days, self.now())?)
    }

    // ==========================================
    // 工单执行
    // ==========================================

    pub fn start_work_order(&self, work_order_id: &str) -> ApiResult<WorkOrderEventResult> {
        require_id("work_order_id", work_order_id)?;
        Ok(self.execution.start_work_order(work_order_id, self.now())?)
    }

    pub fn record_gross_output(&self, work_order_id: &str, gross_output: i64) -> ApiResult<WorkOrderEventResult> {
        require_id("work_order_id", work_order_id)?;
        Ok(self
            .execution
            .record_gross_output(work_order_id, gross_output, self.now())?)
    }

    pub fn record_waste(
        &self,
        work_order_id: &str,
        quantity: i64,
        reason: Option<String>,
    ) -> ApiResult<WorkOrderEventResult> {
        require_id("work_order_id", work_order_id)?;
        Ok(self
            .execution
            .record_waste(work_order_id, quantity, reason, self.now())?)
    }

    pub fn complete_work_order(&self, work_order_id: &str) -> ApiResult<WorkOrderEventResult> {
        require_id("work_order_id", work_order_id)?;
        Ok(self.execution.complete_work_order(work_order_id, self.now())?)
    }

    pub fn cancel_work_order(&self, work_order_id: &str) -> ApiResult<WorkOrderEventResult> {
        require_id("work_order_id", work_order_id)?;
        Ok(self.execution.cancel_work_order(work_order_id, self.now())?)
    }
}

fn require_id(field: &str, value: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::InvalidInput(format!("{} 不能为空", field)));
    }
    Ok(())
}
