// ==========================================
// 产线排产核心 - 生产订单生命周期
// ==========================================
// 创建: 校验 → 插入(WAITING_MATERIALS) → 可选挂钩销售订单行 → 物料预留
// 取消: 作废预留/采购申请，删除日历预留，取消待开工工单 → CANCELLED
// 完工结算见 reservation::MaterialReservationEngine::finalize_order
// ==========================================

use crate::db::Database;
use crate::domain::order::ProductionOrder;
use crate::domain::types::{AuditAction, ProductionOrderStatus};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::lookup::ReferenceData;
use crate::engine::reservation::{evaluate_order, ReservationOutcome};
use crate::repository::{
    AuditLogRepository, CalendarReservationRepository, MaterialReservationRepository,
    ProductionOrderRepository, PurchaseRequestRepository, SalesOrderRepository,
    WorkOrderRepository,
};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

/// 新建生产订单请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProductionOrder {
    /// 为空时自动生成
    pub order_id: Option<String>,
    pub product_id: String,
    pub quantity: i64,
    pub planned_date: Option<NaiveDate>,
    /// 需要挂钩的销售订单行
    pub sales_order_line_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCreationResult {
    pub order: ProductionOrder,
    pub pegged_sales_order_line: Option<String>,
    pub reservation: ReservationOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCancellationResult {
    pub order_id: String,
    pub previous_status: ProductionOrderStatus,
    pub cancelled_reservations: usize,
    pub cancelled_purchase_requests: usize,
    pub deleted_calendar_reservations: usize,
    pub cancelled_work_orders: usize,
}

// ==========================================
// OrderLifecycle - 订单生命周期服务
// ==========================================
pub struct OrderLifecycle {
    db: Database,
}

impl OrderLifecycle {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// 创建生产订单并执行首次物料预留（单事务）
    #[instrument(skip(self, request), fields(product_id = %request.product_id, quantity = request.quantity))]
    pub fn create_production_order(
        &self,
        request: NewProductionOrder,
        now: NaiveDateTime,
    ) -> EngineResult<OrderCreationResult> {
        if request.quantity <= 0 {
            return Err(EngineError::InvalidInput(format!(
                "订单数量须为正数: {}",
                request.quantity
            )));
        }
        if request.product_id.trim().is_empty() {
            return Err(EngineError::InvalidInput("产品编号不能为空".to_string()));
        }

        let result = self.db.with_transaction(|tx| -> EngineResult<OrderCreationResult> {
            let refs = ReferenceData::load(tx)?;
            if !refs.recipes.has_recipe(&request.product_id)
                && !refs.capacities.can_produce(&request.product_id)
            {
                return Err(EngineError::InvalidInput(format!(
                    "未知产品: {}（无配方且无产线产能）",
                    request.product_id
                )));
            }

            let order_repo = ProductionOrderRepository::new(tx);
            let order_id = request
                .order_id
                .clone()
                .unwrap_or_else(|| Uuid::new_v4().to_string());
            if order_repo.find_by_id(&order_id)?.is_some() {
                return Err(EngineError::InvalidInput(format!("订单已存在: {}", order_id)));
            }
            let order = ProductionOrder::new(
                order_id,
                request.product_id.clone(),
                request.quantity,
                request.planned_date,
                now,
            );
            order_repo.insert(&order)?;

            if let Some(line_id) = &request.sales_order_line_id {
                SalesOrderRepository::new(tx).peg_line(line_id, &order.order_id)?;
            }

            let reservation = evaluate_order(tx, &refs, &order, now)?;
            let order = order_repo.get(&order.order_id)?;
            let result = OrderCreationResult {
                order,
                pegged_sales_order_line: request.sales_order_line_id.clone(),
                reservation,
            };
            AuditLogRepository::new(tx).record(
                AuditAction::OrderCreated,
                Some(result.order.order_id.as_str()),
                &result,
                now,
            )?;
            Ok(result)
        })?;

        tracing::info!(
            order_id = %result.order.order_id,
            status = %result.order.status,
            "生产订单已创建"
        );
        Ok(result)
    }

    /// 取消生产订单（单事务）
    #[instrument(skip(self))]
    pub fn cancel_production_order(
        &self,
        order_id: &str,
        now: NaiveDateTime,
    ) -> EngineResult<OrderCancellationResult> {
        let result = self.db.with_transaction(|tx| -> EngineResult<OrderCancellationResult> {
            let order_repo = ProductionOrderRepository::new(tx);
            let order = order_repo.get(order_id)?;
            if order.status.is_terminal() {
                return Err(EngineError::invalid_transition(
                    "ProductionOrder",
                    order.status,
                    ProductionOrderStatus::Cancelled,
                ));
            }

            let result = OrderCancellationResult {
                order_id: order_id.to_string(),
                previous_status: order.status,
                cancelled_reservations: MaterialReservationRepository::new(tx)
                    .cancel_active_for_order(order_id, now)?,
                cancelled_purchase_requests: PurchaseRequestRepository::new(tx)
                    .cancel_open_for_order(order_id)?,
                deleted_calendar_reservations: CalendarReservationRepository::new(tx)
                    .delete_for_order(order_id)?,
                cancelled_work_orders: WorkOrderRepository::new(tx)
                    .cancel_pending_for_order(order_id)?,
            };
            order_repo.update_status(order_id, ProductionOrderStatus::Cancelled, now)?;
            AuditLogRepository::new(tx).record(AuditAction::OrderCancelled, Some(order_id), &result, now)?;
            Ok(result)
        })?;

        tracing::info!(
            order_id = %order_id,
            reservations = result.cancelled_reservations,
            work_orders = result.cancelled_work_orders,
            "生产订单已取消"
        );
        Ok(result)
    }
}
