// ==========================================
// 产线排产核心 - 物料预留引擎
// ==========================================
// 规则:
// 1) 需求量 = 配方数量 × 订单数量
// 2) 批次按失效日期升序（无失效日期最后，再按入库时间）逐个预留
// 3) 批次可预留量 = 在库 − Σ其他订单有效预留
// 4) 全部覆盖 → READY；有缺口 → WAITING_MATERIALS + 按供应商生成采购申请
// 5) 重新评估前先作废本订单全部有效预留与待处理采购申请
// 6) 完工结算: 预留 → CONSUMED，批次扣减，归零 → DEPLETED，低库存信号
// 红线: 任意时刻 批次在库 >= Σ有效预留
// ==========================================

use crate::db::Database;
use crate::domain::material::{MaterialLot, MaterialReservation, PurchaseRequest, PurchaseRequestLine};
use crate::domain::order::ProductionOrder;
use crate::domain::types::{
    AuditAction, LotStatus, ProductionOrderStatus, PurchaseRequestStatus, ReservationStatus,
};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::events::{publish_all, LowStockSignal, NoOpStockAlertPublisher, StockAlertPublisher};
use crate::engine::lookup::ReferenceData;
use crate::repository::{
    AuditLogRepository, MaterialLotRepository, MaterialReservationRepository,
    ProductionOrderRepository, PurchaseRequestRepository, ReferenceDataRepository,
    WorkOrderRepository,
};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// 数量比较容差
pub const QTY_EPSILON: f64 = 1e-9;

// ==========================================
// 增量记录
// ==========================================

/// 新建预留
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationDelta {
    pub reservation_id: String,
    pub lot_id: String,
    pub raw_material_id: String,
    pub quantity: f64,
}

/// 单原料缺口
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialShortfall {
    pub raw_material_id: String,
    pub required_qty: f64,
    pub reserved_qty: f64,
    pub shortfall_qty: f64,
}

/// 单订单预留评估结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationOutcome {
    pub order_id: String,
    pub previous_status: ProductionOrderStatus,
    pub new_status: ProductionOrderStatus,
    pub cancelled_reservations: usize,
    pub cancelled_purchase_requests: usize,
    pub reservations: Vec<ReservationDelta>,
    pub shortfalls: Vec<MaterialShortfall>,
    pub purchase_requests: Vec<PurchaseRequest>,
    /// 配置类问题（无配方、原料无供应商等），不影响其余部分
    pub issues: Vec<String>,
}

impl ReservationOutcome {
    pub fn is_ready(&self) -> bool {
        self.new_status == ProductionOrderStatus::Ready
    }
}

/// 单订单失败（事务已回滚）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderFailure {
    pub order_id: String,
    pub error: String,
}

/// 到料重评结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrivalReevaluation {
    pub raw_material_id: String,
    pub evaluated: Vec<ReservationOutcome>,
    pub became_ready: Vec<String>,
    pub failures: Vec<OrderFailure>,
}

/// 入库结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotReceipt {
    pub lot: MaterialLot,
    pub reevaluation: ArrivalReevaluation,
}

/// 隔离结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotQuarantineResult {
    pub lot_id: String,
    pub cancelled_reservations: Vec<String>,
    pub reevaluated: Vec<ReservationOutcome>,
    pub issues: Vec<String>,
}

/// 批次扣减记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotConsumption {
    pub lot_id: String,
    pub raw_material_id: String,
    pub consumed_qty: f64,
    pub remaining_qty: f64,
    pub depleted: bool,
}

/// 完工结算结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalizationResult {
    pub order_id: String,
    pub consumed_reservations: Vec<String>,
    pub lot_consumptions: Vec<LotConsumption>,
    pub cancelled_work_orders: usize,
    pub low_stock_signals: Vec<LowStockSignal>,
}

// ==========================================
// MaterialReservationEngine - 物料预留引擎
// ==========================================
pub struct MaterialReservationEngine {
    db: Database,
    publisher: Arc<dyn StockAlertPublisher>,
}

impl MaterialReservationEngine {
    pub fn new(db: Database) -> Self {
        Self::with_publisher(db, Arc::new(NoOpStockAlertPublisher))
    }

    pub fn with_publisher(db: Database, publisher: Arc<dyn StockAlertPublisher>) -> Self {
        Self { db, publisher }
    }

    // ==========================================
    // 触发入口
    // ==========================================

    /// 为订单执行（重新）预留，单事务
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub fn reserve_materials_for_order(
        &self,
        order_id: &str,
        now: NaiveDateTime,
    ) -> EngineResult<ReservationOutcome> {
        let outcome = self.db.with_transaction(|tx| -> EngineResult<ReservationOutcome> {
            let refs = ReferenceData::load(tx)?;
            let order = ProductionOrderRepository::new(tx).get(order_id)?;
            let outcome = evaluate_order(tx, &refs, &order, now)?;
            AuditLogRepository::new(tx).record(
                AuditAction::MaterialReservation,
                Some(order_id),
                &outcome,
                now,
            )?;
            Ok(outcome)
        })?;

        tracing::info!(
            order_id = %outcome.order_id,
            status = %outcome.new_status,
            reservations = outcome.reservations.len(),
            shortfalls = outcome.shortfalls.len(),
            purchase_requests = outcome.purchase_requests.len(),
            "物料预留完成"
        );
        Ok(outcome)
    }

    /// 到料后重评：仅待料且配方引用该原料的订单，最早订单优先，每单一事务
    #[instrument(skip(self), fields(raw_material_id = %raw_material_id))]
    pub fn reevaluate_on_material_arrival(
        &self,
        raw_material_id: &str,
        now: NaiveDateTime,
    ) -> EngineResult<ArrivalReevaluation> {
        let candidates: Vec<String> = {
            let conn = self.db.get_conn()?;
            ProductionOrderRepository::new(&conn)
                .list_waiting_for_material(raw_material_id)?
                .into_iter()
                .map(|o| o.order_id)
                .collect()
        };

        let mut result = ArrivalReevaluation {
            raw_material_id: raw_material_id.to_string(),
            evaluated: Vec::new(),
            became_ready: Vec::new(),
            failures: Vec::new(),
        };

        for order_id in candidates {
            let attempt = self.db.with_transaction(|tx| -> EngineResult<Option<ReservationOutcome>> {
                let order = ProductionOrderRepository::new(tx).get(&order_id)?;
                // 前序订单的事务可能已改变其状态
                if order.status != ProductionOrderStatus::WaitingMaterials {
                    return Ok(None);
                }
                let refs = ReferenceData::load(tx)?;
                let outcome = evaluate_order(tx, &refs, &order, now)?;
                AuditLogRepository::new(tx).record(
                    AuditAction::MaterialArrival,
                    Some(order_id.as_str()),
                    &outcome,
                    now,
                )?;
                Ok(Some(outcome))
            });

            match attempt {
                Ok(Some(outcome)) => {
                    if outcome.is_ready() {
                        result.became_ready.push(outcome.order_id.clone());
                    }
                    result.evaluated.push(outcome);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(order_id = %order_id, error = %e, "到料重评失败，订单保持原状态");
                    result.failures.push(OrderFailure {
                        order_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            raw_material_id = %raw_material_id,
            evaluated = result.evaluated.len(),
            became_ready = result.became_ready.len(),
            failures = result.failures.len(),
            "到料重评完成"
        );
        Ok(result)
    }

    /// 原料入库：新建可用批次，随后触发到料重评
    #[instrument(skip(self), fields(raw_material_id = %raw_material_id, quantity = %quantity))]
    pub fn receive_lot(
        &self,
        lot_id: Option<String>,
        raw_material_id: &str,
        quantity: f64,
        expiry_date: Option<NaiveDate>,
        now: NaiveDateTime,
    ) -> EngineResult<LotReceipt> {
        if !(quantity > 0.0 && quantity.is_finite()) {
            return Err(EngineError::InvalidInput(format!(
                "入库数量须为正数: {}",
                quantity
            )));
        }

        let lot = self.db.with_transaction(|tx| -> EngineResult<MaterialLot> {
            if ReferenceDataRepository::new(tx)
                .find_raw_material(raw_material_id)?
                .is_none()
            {
                return Err(EngineError::NotFound {
                    entity: "RawMaterial".to_string(),
                    id: raw_material_id.to_string(),
                });
            }
            let lot = MaterialLot {
                lot_id: lot_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
                raw_material_id: raw_material_id.to_string(),
                on_hand_qty: quantity,
                expiry_date,
                received_at: now,
                status: LotStatus::Available,
            };
            MaterialLotRepository::new(tx).insert(&lot)?;
            AuditLogRepository::new(tx).record(
                AuditAction::MaterialArrival,
                Some(lot.lot_id.as_str()),
                &lot,
                now,
            )?;
            Ok(lot)
        })?;

        tracing::info!(lot_id = %lot.lot_id, "原料批次已入库");
        let reevaluation = self.reevaluate_on_material_arrival(raw_material_id, now)?;
        Ok(LotReceipt { lot, reevaluation })
    }

    /// 批次质量隔离：作废引用该批次的有效预留，受影响订单重评（单事务）
    #[instrument(skip(self), fields(lot_id = %lot_id))]
    pub fn quarantine_lot(&self, lot_id: &str, now: NaiveDateTime) -> EngineResult<LotQuarantineResult> {
        let result = self.db.with_transaction(|tx| -> EngineResult<LotQuarantineResult> {
            let lot_repo = MaterialLotRepository::new(tx);
            let reservation_repo = MaterialReservationRepository::new(tx);
            let order_repo = ProductionOrderRepository::new(tx);

            let lot = lot_repo.get(lot_id)?;
            if lot.status != LotStatus::Available {
                return Err(EngineError::invalid_transition(
                    "MaterialLot",
                    lot.status,
                    LotStatus::Quarantine,
                ));
            }
            lot_repo.update_status(lot_id, LotStatus::Quarantine)?;

            let mut cancelled = Vec::new();
            let mut affected_orders = BTreeSet::new();
            for reservation in reservation_repo.list_active_by_lot(lot_id)? {
                reservation_repo.update_status(
                    &reservation.reservation_id,
                    ReservationStatus::Cancelled,
                    now,
                )?;
                affected_orders.insert(reservation.production_order_id);
                cancelled.push(reservation.reservation_id);
            }

            let refs = ReferenceData::load(tx)?;
            let mut reevaluated = Vec::new();
            let mut issues = Vec::new();
            for order_id in affected_orders {
                let order = order_repo.get(&order_id)?;
                if order.status.accepts_material_reservation() {
                    reevaluated.push(evaluate_order(tx, &refs, &order, now)?);
                } else {
                    issues.push(format!(
                        "订单 {} 状态为 {}，隔离批次上的预留已作废，需人工处理",
                        order_id, order.status
                    ));
                }
            }

            let result = LotQuarantineResult {
                lot_id: lot_id.to_string(),
                cancelled_reservations: cancelled,
                reevaluated,
                issues,
            };
            AuditLogRepository::new(tx).record(AuditAction::LotQuarantine, Some(lot_id), &result, now)?;
            Ok(result)
        })?;

        for issue in &result.issues {
            tracing::warn!(lot_id = %lot_id, "{}", issue);
        }
        tracing::info!(
            lot_id = %lot_id,
            cancelled = result.cancelled_reservations.len(),
            reevaluated = result.reevaluated.len(),
            "批次已隔离"
        );
        Ok(result)
    }

    /// 完工结算：消耗预留、扣减批次、低库存检查（单事务，信号在提交后发布）
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub fn finalize_order(&self, order_id: &str, now: NaiveDateTime) -> EngineResult<FinalizationResult> {
        let result = self.db.with_transaction(|tx| -> EngineResult<FinalizationResult> {
            let order = ProductionOrderRepository::new(tx).get(order_id)?;
            if !order.status.can_finish() {
                return Err(EngineError::invalid_transition(
                    "ProductionOrder",
                    order.status,
                    ProductionOrderStatus::Finished,
                ));
            }
            let result = finalize_in_tx(tx, &order, now)?;
            AuditLogRepository::new(tx).record(
                AuditAction::OrderFinalization,
                Some(order_id),
                &result,
                now,
            )?;
            Ok(result)
        })?;

        tracing::info!(
            order_id = %order_id,
            consumed = result.consumed_reservations.len(),
            low_stock = result.low_stock_signals.len(),
            "订单完工结算完成"
        );
        publish_all(self.publisher.as_ref(), &result.low_stock_signals);
        Ok(result)
    }
}

// ==========================================
// 事务内步骤（供其他引擎复用）
// ==========================================

/// 在给定事务内对订单执行（重新）预留评估
pub(crate) fn evaluate_order(
    conn: &Connection,
    refs: &ReferenceData,
    order: &ProductionOrder,
    now: NaiveDateTime,
) -> EngineResult<ReservationOutcome> {
    if !order.status.accepts_material_reservation() {
        return Err(EngineError::invalid_transition(
            "ProductionOrder",
            order.status,
            ProductionOrderStatus::Ready,
        ));
    }

    let mut outcome = ReservationOutcome {
        order_id: order.order_id.clone(),
        previous_status: order.status,
        new_status: order.status,
        cancelled_reservations: 0,
        cancelled_purchase_requests: 0,
        reservations: Vec::new(),
        shortfalls: Vec::new(),
        purchase_requests: Vec::new(),
        issues: Vec::new(),
    };

    let requirements = refs.recipes.required_quantities(&order.product_id, order.quantity);
    if requirements.is_empty() {
        let issue = format!("产品 {} 无配方，订单保持原状态", order.product_id);
        tracing::warn!(order_id = %order.order_id, "{}", issue);
        outcome.issues.push(issue);
        return Ok(outcome);
    }

    let lot_repo = MaterialLotRepository::new(conn);
    let reservation_repo = MaterialReservationRepository::new(conn);
    let pr_repo = PurchaseRequestRepository::new(conn);
    let reference_repo = ReferenceDataRepository::new(conn);

    outcome.cancelled_reservations = reservation_repo.cancel_active_for_order(&order.order_id, now)?;
    outcome.cancelled_purchase_requests = pr_repo.cancel_open_for_order(&order.order_id)?;

    // ===== FIFO 预留 =====
    for (raw_material_id, required) in requirements {
        let mut remaining = required;
        for lot in lot_repo.list_available_fifo(&raw_material_id)? {
            if remaining <= QTY_EPSILON {
                break;
            }
            let free = lot.on_hand_qty - reservation_repo.active_sum_by_lot(&lot.lot_id)?;
            if free <= QTY_EPSILON {
                continue;
            }
            let take = free.min(remaining);
            let reservation = MaterialReservation {
                reservation_id: Uuid::new_v4().to_string(),
                production_order_id: order.order_id.clone(),
                lot_id: lot.lot_id.clone(),
                raw_material_id: raw_material_id.clone(),
                quantity: take,
                status: ReservationStatus::Active,
                created_at: now,
                updated_at: now,
            };
            reservation_repo.insert(&reservation)?;
            tracing::debug!(
                order_id = %order.order_id,
                lot_id = %lot.lot_id,
                quantity = take,
                "新建物料预留"
            );
            outcome.reservations.push(ReservationDelta {
                reservation_id: reservation.reservation_id,
                lot_id: lot.lot_id,
                raw_material_id: raw_material_id.clone(),
                quantity: take,
            });
            remaining -= take;
        }

        if remaining > QTY_EPSILON {
            outcome.shortfalls.push(MaterialShortfall {
                raw_material_id: raw_material_id.clone(),
                required_qty: required,
                reserved_qty: required - remaining,
                shortfall_qty: remaining,
            });
        }
    }

    // ===== 缺口按供应商归集 =====
    let mut by_supplier: BTreeMap<String, Vec<PurchaseRequestLine>> = BTreeMap::new();
    for shortfall in &outcome.shortfalls {
        let supplier_id = reference_repo
            .find_raw_material(&shortfall.raw_material_id)?
            .and_then(|m| m.supplier_id);
        let Some(supplier_id) = supplier_id else {
            outcome.issues.push(format!(
                "原料 {} 未配置供应商，无法生成采购申请",
                shortfall.raw_material_id
            ));
            continue;
        };
        let Some(supplier) = reference_repo.find_supplier(&supplier_id)? else {
            outcome.issues.push(format!(
                "原料 {} 的供应商 {} 不存在",
                shortfall.raw_material_id, supplier_id
            ));
            continue;
        };
        by_supplier.entry(supplier_id).or_default().push(PurchaseRequestLine {
            raw_material_id: shortfall.raw_material_id.clone(),
            shortfall_qty: shortfall.shortfall_qty,
            quantity: shortfall.shortfall_qty.max(supplier.min_order_qty),
        });
    }

    for (supplier_id, lines) in by_supplier {
        let request = PurchaseRequest {
            request_id: Uuid::new_v4().to_string(),
            supplier_id,
            production_order_id: order.order_id.clone(),
            status: PurchaseRequestStatus::Open,
            created_at: now,
            lines,
        };
        pr_repo.insert(&request)?;
        tracing::debug!(
            order_id = %order.order_id,
            supplier_id = %request.supplier_id,
            lines = request.lines.len(),
            "生成采购申请"
        );
        outcome.purchase_requests.push(request);
    }

    for issue in &outcome.issues {
        tracing::warn!(order_id = %order.order_id, "{}", issue);
    }

    // ===== 订单状态 =====
    outcome.new_status = if outcome.shortfalls.is_empty() {
        ProductionOrderStatus::Ready
    } else {
        ProductionOrderStatus::WaitingMaterials
    };
    if outcome.new_status != order.status {
        ProductionOrderRepository::new(conn).update_status(&order.order_id, outcome.new_status, now)?;
    }

    Ok(outcome)
}

/// 在给定事务内完成订单结算
pub(crate) fn finalize_in_tx(
    conn: &Connection,
    order: &ProductionOrder,
    now: NaiveDateTime,
) -> EngineResult<FinalizationResult> {
    let lot_repo = MaterialLotRepository::new(conn);
    let reservation_repo = MaterialReservationRepository::new(conn);
    let reference_repo = ReferenceDataRepository::new(conn);

    let reservations = reservation_repo.list_by_order(&order.order_id, ReservationStatus::Active)?;

    let mut per_lot: BTreeMap<String, (String, f64)> = BTreeMap::new();
    for reservation in &reservations {
        let entry = per_lot
            .entry(reservation.lot_id.clone())
            .or_insert_with(|| (reservation.raw_material_id.clone(), 0.0));
        entry.1 += reservation.quantity;
    }

    let mut lot_consumptions = Vec::new();
    let mut affected_materials = BTreeSet::new();
    for (lot_id, (raw_material_id, consumed)) in per_lot {
        let lot = lot_repo.get(&lot_id)?;
        if lot.on_hand_qty + QTY_EPSILON < consumed {
            return Err(EngineError::ConsistencyViolation(format!(
                "批次 {} 在库 {:.3} 不足以扣减预留 {:.3}",
                lot_id, lot.on_hand_qty, consumed
            )));
        }
        let mut remaining = lot.on_hand_qty - consumed;
        let depleted = remaining <= QTY_EPSILON;
        let status = if depleted {
            remaining = 0.0;
            LotStatus::Depleted
        } else {
            lot.status
        };
        lot_repo.update_quantity_and_status(&lot_id, remaining, status)?;
        tracing::debug!(lot_id = %lot_id, consumed, remaining, depleted, "批次扣减");

        affected_materials.insert(raw_material_id.clone());
        lot_consumptions.push(LotConsumption {
            lot_id,
            raw_material_id,
            consumed_qty: consumed,
            remaining_qty: remaining,
            depleted,
        });
    }

    let mut consumed_reservations = Vec::with_capacity(reservations.len());
    for reservation in reservations {
        reservation_repo.update_status(&reservation.reservation_id, ReservationStatus::Consumed, now)?;
        consumed_reservations.push(reservation.reservation_id);
    }

    PurchaseRequestRepository::new(conn).cancel_open_for_order(&order.order_id)?;
    let cancelled_work_orders = WorkOrderRepository::new(conn).cancel_pending_for_order(&order.order_id)?;
    ProductionOrderRepository::new(conn).mark_finished(&order.order_id, now)?;

    // ===== 低库存检查 =====
    let mut low_stock_signals = Vec::new();
    for raw_material_id in affected_materials {
        let Some(material) = reference_repo.find_raw_material(&raw_material_id)? else {
            continue;
        };
        let available = lot_repo.sum_available_on_hand(&raw_material_id)?
            - reservation_repo.active_sum_by_material(&raw_material_id)?;
        if available < material.min_stock_threshold {
            tracing::warn!(
                raw_material_id = %raw_material_id,
                available,
                threshold = material.min_stock_threshold,
                "原料可用量低于阈值"
            );
            low_stock_signals.push(LowStockSignal {
                raw_material_id,
                available_qty: available,
                threshold: material.min_stock_threshold,
                source_order_id: Some(order.order_id.clone()),
                raised_at: now,
            });
        }
    }

    Ok(FinalizationResult {
        order_id: order.order_id.clone(),
        consumed_reservations,
        lot_consumptions,
        cancelled_work_orders,
        low_stock_signals,
    })
}
