// ==========================================
// 产线排产核心 - 产能日历重排引擎
// ==========================================
// 不调用求解器，按天贪心占用产能:
// 1) 待排 = 订单数量 − Σ已投产工单数量（IN_PROGRESS/COMPLETED）
// 2) cutoff = 模拟日 + 最小提前期；cutoff 之前的日历预留不可动，并从待排中扣除
// 3) 起始日 = max(计划日期, cutoff)，顺延至工作日
// 4) 每日: 瓶颈工时 = floor(min 兼容产线空闲工时)；按产能比例拆分到各产线
// 5) 完工日 + 缓冲天数 → 挂钩销售订单的建议交期
// 红线: 每个订单的写入一个事务；失败不影响该订单原状态
// 确定性: 重排开始时释放全部待重排订单 cutoff 之后的预留，
//         计划日期不被改写，因此无变化时重复执行为空操作
// ==========================================

use crate::config::PlanningConfig;
use crate::db::Database;
use crate::domain::calendar::CalendarReservation;
use crate::domain::order::ProductionOrder;
use crate::domain::types::{AuditAction, SalesOrderStatus, WorkOrderStatus};
use crate::engine::calendar::WorkCalendar;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::lookup::ReferenceData;
use crate::engine::reservation::{OrderFailure, QTY_EPSILON};
use crate::repository::{
    AuditLogRepository, CalendarReservationRepository, ProductionOrderRepository,
    SalesOrderRepository, WorkOrderRepository,
};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::instrument;
use uuid::Uuid;

/// 单订单重排结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderReplanOutcome {
    pub order_id: String,
    pub pending_qty: f64,
    pub previous_start: Option<NaiveDate>,
    pub previous_finish: Option<NaiveDate>,
    pub new_start: Option<NaiveDate>,
    pub new_finish: Option<NaiveDate>,
    pub reserved_hours: f64,
    pub reserved_qty: f64,
    /// 前瞻期内未能全部排入
    pub partially_placed: bool,
    /// 与现有预留完全一致，未写库
    pub unchanged: bool,
    pub reservations_created: usize,
    pub reservations_deleted: usize,
}

/// 销售订单交期影响
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesOrderImpact {
    pub sales_order_id: String,
    pub production_order_id: String,
    pub previous_delivery: NaiveDate,
    pub new_delivery: NaiveDate,
    pub previous_status: SalesOrderStatus,
    pub new_status: SalesOrderStatus,
}

/// 重排结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplanResult {
    pub simulated_date: NaiveDate,
    pub cutoff: NaiveDate,
    pub lookahead_limit: NaiveDate,
    pub orders_evaluated: usize,
    pub orders: Vec<OrderReplanOutcome>,
    pub sales_order_impacts: Vec<SalesOrderImpact>,
    pub reservations_created: usize,
    pub reservations_deleted: usize,
    pub issues: Vec<String>,
    pub failures: Vec<OrderFailure>,
}

/// 待重排订单
struct EligibleOrder {
    order: ProductionOrder,
    pending: f64,
}

/// 已占用工时表 (产线, 日期) -> 工时
#[derive(Debug, Default)]
struct CommittedHours {
    hours: HashMap<(String, NaiveDate), f64>,
}

impl CommittedHours {
    fn get(&self, line_id: &str, date: NaiveDate) -> f64 {
        self.hours
            .get(&(line_id.to_string(), date))
            .copied()
            .unwrap_or(0.0)
    }

    fn add(&mut self, reservation: &CalendarReservation) {
        *self
            .hours
            .entry((reservation.line_id.clone(), reservation.work_date))
            .or_insert(0.0) += reservation.hours_reserved;
    }

    fn remove(&mut self, reservation: &CalendarReservation) {
        if let Some(h) = self
            .hours
            .get_mut(&(reservation.line_id.clone(), reservation.work_date))
        {
            *h -= reservation.hours_reserved;
        }
    }
}

// ==========================================
// CapacityCalendarReplanner - 产能日历重排引擎
// ==========================================
pub struct CapacityCalendarReplanner {
    db: Database,
}

impl CapacityCalendarReplanner {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// 重排全部活动订单
    ///
    /// # 参数
    /// - `simulated_date`: 模拟"今天"
    /// - `lookahead_days`: 从 cutoff 起最多向后查找的天数
    #[instrument(skip(self, config), fields(simulated_date = %simulated_date, lookahead_days = lookahead_days))]
    pub fn replan_active_orders(
        &self,
        config: &PlanningConfig,
        simulated_date: NaiveDate,
        lookahead_days: i64,
        now: NaiveDateTime,
    ) -> EngineResult<ReplanResult> {
        if lookahead_days < 0 {
            return Err(EngineError::InvalidInput(format!(
                "前瞻天数不能为负: {}",
                lookahead_days
            )));
        }

        let calendar = WorkCalendar::new(&config.weekdays());
        let cutoff = simulated_date + Duration::days(config.replan_min_lead_days);
        let lookahead_limit = cutoff + Duration::days(lookahead_days);

        let mut result = ReplanResult {
            simulated_date,
            cutoff,
            lookahead_limit,
            orders_evaluated: 0,
            orders: Vec::new(),
            sales_order_impacts: Vec::new(),
            reservations_created: 0,
            reservations_deleted: 0,
            issues: Vec::new(),
            failures: Vec::new(),
        };

        // ===== 1. 加载工作集 =====
        let (refs, mut eligible, all_reservations) = {
            let conn = self.db.get_conn()?;
            let refs = ReferenceData::load(&conn)?;
            let eligible = self.load_eligible(&conn, &refs, &mut result.issues)?;
            let reservations = CalendarReservationRepository::new(&conn).list_all()?;
            (refs, eligible, reservations)
        };

        // ===== 2. 释放待重排订单 cutoff 之后的预留 =====
        let mut by_order: HashMap<String, Vec<CalendarReservation>> = HashMap::new();
        for r in all_reservations {
            by_order.entry(r.production_order_id.clone()).or_default().push(r);
        }
        let mut committed = CommittedHours::default();
        for (order_id, reservations) in &by_order {
            let is_eligible = eligible.iter().any(|e| &e.order.order_id == order_id);
            for r in reservations {
                if !(is_eligible && r.work_date >= cutoff) {
                    committed.add(r);
                }
            }
        }

        // ===== 3. 计划日期最早优先 =====
        eligible.sort_by(|a, b| {
            a.order
                .anchor_date()
                .cmp(&b.order.anchor_date())
                .then(a.order.created_at.cmp(&b.order.created_at))
                .then(a.order.order_id.cmp(&b.order.order_id))
        });
        result.orders_evaluated = eligible.len();

        for item in eligible {
            let order_id = item.order.order_id.clone();
            let existing = by_order.remove(&order_id).unwrap_or_default();
            let (kept, released): (Vec<_>, Vec<_>) =
                existing.into_iter().partition(|r| r.work_date < cutoff);

            let placement = place_order(
                &item,
                &kept,
                &refs,
                &calendar,
                config.working_hours_per_day,
                cutoff,
                lookahead_limit,
                &committed,
                now,
            );
            for r in &placement.reservations {
                committed.add(r);
            }

            let unchanged = same_footprint(&released, &placement.reservations)
                && placement.window == (item.order.planned_start, item.order.planned_finish);

            let mut outcome = OrderReplanOutcome {
                order_id: order_id.clone(),
                pending_qty: item.pending,
                previous_start: item.order.planned_start,
                previous_finish: item.order.planned_finish,
                new_start: placement.window.0,
                new_finish: placement.window.1,
                reserved_hours: placement.reservations.iter().map(|r| r.hours_reserved).sum(),
                reserved_qty: placement.reservations.iter().map(|r| r.quantity).sum(),
                partially_placed: placement.remaining > QTY_EPSILON,
                unchanged,
                reservations_created: 0,
                reservations_deleted: 0,
            };
            if outcome.partially_placed {
                result.issues.push(format!(
                    "订单 {} 在 {} 前仅部分排入，剩余 {:.3}",
                    order_id, lookahead_limit, placement.remaining
                ));
            }

            let attempt = self.db.with_transaction(|tx| -> EngineResult<Vec<SalesOrderImpact>> {
                if !unchanged {
                    let cal_repo = CalendarReservationRepository::new(tx);
                    outcome.reservations_deleted = cal_repo.delete_from_date(&order_id, cutoff)?;
                    for r in &placement.reservations {
                        cal_repo.insert(r)?;
                    }
                    outcome.reservations_created = placement.reservations.len();
                    if placement.window != (item.order.planned_start, item.order.planned_finish) {
                        ProductionOrderRepository::new(tx).update_window(
                            &order_id,
                            placement.window.0,
                            placement.window.1,
                            now,
                        )?;
                    }
                }

                let impacts = match placement.window.1 {
                    Some(finish) => propagate_delivery(
                        tx,
                        &order_id,
                        calendar.add_buffer(finish, config.delivery_buffer_days),
                    )?,
                    None => Vec::new(),
                };

                if !unchanged || !impacts.is_empty() {
                    AuditLogRepository::new(tx).record(
                        AuditAction::Replan,
                        Some(order_id.as_str()),
                        &(&outcome, &impacts),
                        now,
                    )?;
                }
                Ok(impacts)
            });

            match attempt {
                Ok(impacts) => {
                    tracing::debug!(
                        order_id = %order_id,
                        unchanged = outcome.unchanged,
                        start = ?outcome.new_start,
                        finish = ?outcome.new_finish,
                        "订单重排完成"
                    );
                    result.reservations_created += outcome.reservations_created;
                    result.reservations_deleted += outcome.reservations_deleted;
                    result.sales_order_impacts.extend(impacts);
                    result.orders.push(outcome);
                }
                Err(e) => {
                    // 事务已回滚：内存占用表恢复为该订单原预留
                    for r in &placement.reservations {
                        committed.remove(r);
                    }
                    for r in &released {
                        committed.add(r);
                    }
                    tracing::warn!(order_id = %order_id, error = %e, "订单重排失败，保持原状态");
                    result.failures.push(OrderFailure {
                        order_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        for impact in &result.sales_order_impacts {
            if impact.new_status == SalesOrderStatus::AtRisk {
                tracing::warn!(
                    sales_order_id = %impact.sales_order_id,
                    previous = %impact.previous_delivery,
                    new = %impact.new_delivery,
                    "销售订单交期延后"
                );
            }
        }
        tracing::info!(
            cutoff = %cutoff,
            orders = result.orders_evaluated,
            created = result.reservations_created,
            deleted = result.reservations_deleted,
            sales_impacts = result.sales_order_impacts.len(),
            failures = result.failures.len(),
            "产能日历重排完成"
        );
        Ok(result)
    }

    /// 待重排订单：非终态、待排 > 0、产品有可运行产线
    fn load_eligible(
        &self,
        conn: &Connection,
        refs: &ReferenceData,
        issues: &mut Vec<String>,
    ) -> EngineResult<Vec<EligibleOrder>> {
        let wo_repo = WorkOrderRepository::new(conn);
        let committed_statuses: Vec<WorkOrderStatus> = WorkOrderStatus::all()
            .iter()
            .copied()
            .filter(WorkOrderStatus::is_committed)
            .collect();

        let mut eligible = Vec::new();
        for order in ProductionOrderRepository::new(conn).list_active()? {
            let started = wo_repo.sum_quantity(&order.order_id, &committed_statuses)?;
            let pending = (order.quantity - started) as f64;
            if pending <= QTY_EPSILON {
                continue;
            }
            if !refs.capacities.can_produce(&order.product_id) {
                issues.push(format!(
                    "订单 {} 的产品 {} 无可运行产线，跳过重排",
                    order.order_id, order.product_id
                ));
                continue;
            }
            eligible.push(EligibleOrder { order, pending });
        }
        Ok(eligible)
    }
}

/// 单订单的日历占用方案（尚未落库）
struct Placement {
    reservations: Vec<CalendarReservation>,
    window: (Option<NaiveDate>, Option<NaiveDate>),
    remaining: f64,
}

#[allow(clippy::too_many_arguments)]
fn place_order(
    item: &EligibleOrder,
    kept: &[CalendarReservation],
    refs: &ReferenceData,
    calendar: &WorkCalendar,
    hours_per_day: f64,
    cutoff: NaiveDate,
    lookahead_limit: NaiveDate,
    committed: &CommittedHours,
    now: NaiveDateTime,
) -> Placement {
    let order = &item.order;
    let lines = refs.capacities.compatible_lines(&order.product_id);
    let aggregate = refs.capacities.aggregate_rate(&order.product_id);

    // cutoff 之前的预留不可动，从待排中扣除
    let immovable: f64 = kept.iter().map(|r| r.quantity).sum();
    let mut pending = item.pending - immovable;
    let mut reservations = Vec::new();

    let hours_for = |qty: f64| -> f64 {
        if qty <= QTY_EPSILON {
            0.0
        } else {
            (qty / aggregate - 1e-9).ceil()
        }
    };
    let mut hours_needed = hours_for(pending);

    let mut day = calendar.roll_forward(order.anchor_date().max(cutoff));
    while pending > QTY_EPSILON && hours_needed > 0.0 && day <= lookahead_limit {
        let bottleneck = lines
            .iter()
            .map(|(line_id, _)| hours_per_day - committed.get(line_id, day))
            .fold(f64::INFINITY, f64::min)
            .floor();

        if bottleneck >= 1.0 {
            let hours = hours_needed.min(bottleneck);
            let day_qty = (hours * aggregate).min(pending);
            for (line_id, rate) in &lines {
                reservations.push(CalendarReservation {
                    reservation_id: Uuid::new_v4().to_string(),
                    production_order_id: order.order_id.clone(),
                    line_id: line_id.clone(),
                    work_date: day,
                    hours_reserved: hours,
                    quantity: day_qty * rate / aggregate,
                    created_at: now,
                });
            }
            pending -= day_qty;
            hours_needed = hours_for(pending);
        }
        day = calendar.next_working_day(day);
    }

    let dates = kept
        .iter()
        .chain(reservations.iter())
        .map(|r| r.work_date);
    let window = match (dates.clone().min(), dates.max()) {
        (Some(start), Some(finish)) => (Some(start), Some(finish)),
        _ => (order.planned_start, order.planned_finish),
    };

    Placement {
        reservations,
        window,
        remaining: pending.max(0.0),
    }
}

/// 两组预留在 (产线, 日期, 工时, 数量) 上是否一致
fn same_footprint(existing: &[CalendarReservation], planned: &[CalendarReservation]) -> bool {
    if existing.len() != planned.len() {
        return false;
    }
    let key = |r: &CalendarReservation| (r.work_date, r.line_id.clone());
    let mut a: Vec<&CalendarReservation> = existing.iter().collect();
    let mut b: Vec<&CalendarReservation> = planned.iter().collect();
    a.sort_by_key(|r| key(r));
    b.sort_by_key(|r| key(r));
    a.iter().zip(b.iter()).all(|(x, y)| {
        x.line_id == y.line_id
            && x.work_date == y.work_date
            && (x.hours_reserved - y.hours_reserved).abs() <= QTY_EPSILON
            && (x.quantity - y.quantity).abs() <= 1e-6
    })
}

/// 挂钩销售订单的交期传播
fn propagate_delivery(
    conn: &Connection,
    production_order_id: &str,
    suggested: NaiveDate,
) -> EngineResult<Vec<SalesOrderImpact>> {
    let repo = SalesOrderRepository::new(conn);
    let mut impacts = Vec::new();
    for so in repo.list_pegged_orders(production_order_id)? {
        if suggested == so.delivery_date {
            continue;
        }
        let new_status = if suggested > so.delivery_date {
            SalesOrderStatus::AtRisk
        } else {
            so.status
        };
        repo.update_delivery(&so.sales_order_id, suggested, new_status)?;
        impacts.push(SalesOrderImpact {
            sales_order_id: so.sales_order_id,
            production_order_id: production_order_id.to_string(),
            previous_delivery: so.delivery_date,
            new_delivery: suggested,
            previous_status: so.status,
            new_status,
        });
    }
    Ok(impacts)
}
