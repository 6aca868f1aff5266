// ==========================================
// 产线排产核心 - 约束排产引擎
// ==========================================
// 输入: 全部 READY 订单的待排数量 + 可运行产线产能
// 建模:
// - 每个子批次 × 每条兼容产线: 一个布尔变量 + 一个可选区间
//   时长 = ceil(批量 / 产能 × 60) 分钟，超出时间窗的产线不作候选
// - 每个子批次 exactly_one
// - 每条产线 no_overlap（含该产线上尚未结束的已有工单）
// - 目标: 最小化 makespan
// 输出: 每个子批次一张 PENDING 工单，涉及订单 → PLANNED
// 红线: 全部写入在一个事务内；无解不落任何工单
// ==========================================

use crate::config::PlanningConfig;
use crate::db::Database;
use crate::domain::types::{AuditAction, ProductionOrderStatus, WorkOrderStatus};
use crate::domain::work_order::WorkOrder;
use crate::engine::batch::{BatchDecomposer, SubBatch};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::lookup::ReferenceData;
use crate::engine::solver::{BoolVar, CpModel, ConstraintSolver, IntervalVar, SolveStatus};
use crate::repository::{AuditLogRepository, ProductionOrderRepository, WorkOrderRepository};
use chrono::{Duration, NaiveDateTime};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// 排产运行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduleRunStatus {
    /// 已生成工单
    Scheduled,
    /// 无可排批次
    NothingToSchedule,
    /// 求解无解，未生成任何工单
    Infeasible,
}

/// 不可排批次
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnplannableBatch {
    pub batch_ref: String,
    pub order_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub reason: String,
}

/// 排产结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRunResult {
    pub status: ScheduleRunStatus,
    pub solve_status: Option<SolveStatus>,
    pub anchor: NaiveDateTime,
    pub batches_considered: usize,
    pub work_orders: Vec<WorkOrder>,
    pub planned_order_ids: Vec<String>,
    pub unplannable: Vec<UnplannableBatch>,
    pub makespan_minutes: Option<i64>,
    pub issues: Vec<String>,
}

/// 子批次的一个候选（产线 + 时长 + 模型变量）
struct Candidate {
    line_id: String,
    presence: BoolVar,
    interval: IntervalVar,
}

struct PlannedBatch {
    batch: SubBatch,
    candidates: Vec<Candidate>,
}

/// 批量在产线上的加工时长（分钟，向上取整）
pub fn batch_duration_minutes(quantity: i64, units_per_hour: f64) -> i64 {
    let minutes = quantity as f64 * 60.0 / units_per_hour;
    // 消除浮点误差导致的多进一
    (minutes - 1e-9).ceil().max(1.0) as i64
}

// ==========================================
// ConstraintScheduler - 约束排产引擎
// ==========================================
pub struct ConstraintScheduler {
    db: Database,
    solver: Arc<dyn ConstraintSolver>,
}

impl ConstraintScheduler {
    pub fn new(db: Database, solver: Arc<dyn ConstraintSolver>) -> Self {
        Self { db, solver }
    }

    /// 为全部 READY 订单排产（单事务）
    ///
    /// # 参数
    /// - `config`: 已校验的配置快照（批次上下限、时间窗、求解时限）
    /// - `now`: 运行时刻，作为工单时间锚点
    #[instrument(skip(self, config), fields(horizon = config.schedule_horizon_minutes))]
    pub fn schedule_pending_orders(
        &self,
        config: &PlanningConfig,
        now: NaiveDateTime,
    ) -> EngineResult<ScheduleRunResult> {
        let result = self.db.with_transaction(|tx| -> EngineResult<ScheduleRunResult> {
            let result = self.schedule_in_tx(tx, config, now)?;
            AuditLogRepository::new(tx).record(AuditAction::Schedule, None, &result, now)?;
            Ok(result)
        })?;

        for item in &result.unplannable {
            tracing::warn!(
                batch_ref = %item.batch_ref,
                order_id = %item.order_id,
                reason = %item.reason,
                "批次不可排"
            );
        }
        tracing::info!(
            status = ?result.status,
            batches = result.batches_considered,
            work_orders = result.work_orders.len(),
            planned_orders = result.planned_order_ids.len(),
            unplannable = result.unplannable.len(),
            makespan = ?result.makespan_minutes,
            "约束排产完成"
        );
        Ok(result)
    }

    fn schedule_in_tx(
        &self,
        conn: &Connection,
        config: &PlanningConfig,
        anchor: NaiveDateTime,
    ) -> EngineResult<ScheduleRunResult> {
        let refs = ReferenceData::load(conn)?;
        let order_repo = ProductionOrderRepository::new(conn);
        let wo_repo = WorkOrderRepository::new(conn);
        let decomposer = BatchDecomposer::new(config.min_batch_size, config.max_batch_size);
        let horizon = config.schedule_horizon_minutes;

        let mut result = ScheduleRunResult {
            status: ScheduleRunStatus::NothingToSchedule,
            solve_status: None,
            anchor,
            batches_considered: 0,
            work_orders: Vec::new(),
            planned_order_ids: Vec::new(),
            unplannable: Vec::new(),
            makespan_minutes: None,
            issues: Vec::new(),
        };

        // ===== 1. 待排数量与子批次 =====
        let mut batches: Vec<SubBatch> = Vec::new();
        for order in order_repo.list_by_status(ProductionOrderStatus::Ready)? {
            let scheduled = wo_repo.sum_quantity(
                &order.order_id,
                &[
                    WorkOrderStatus::Pending,
                    WorkOrderStatus::InProgress,
                    WorkOrderStatus::Completed,
                ],
            )?;
            let pending = order.quantity - scheduled;
            if pending <= 0 {
                result
                    .issues
                    .push(format!("订单 {} 已被现有工单覆盖，跳过", order.order_id));
                continue;
            }
            batches.extend(decomposer.decompose(&order.order_id, &order.product_id, pending));
        }
        result.batches_considered = batches.len();

        // ===== 2. 建模 =====
        let mut model = CpModel::new(horizon);
        let mut line_intervals: BTreeMap<String, Vec<IntervalVar>> = BTreeMap::new();
        let mut planned: Vec<PlannedBatch> = Vec::new();

        for batch in batches {
            let mut candidates = Vec::new();
            let mut too_long = false;
            for (line_id, rate) in refs.capacities.compatible_lines(&batch.product_id) {
                let duration = batch_duration_minutes(batch.quantity, rate);
                if duration > horizon {
                    too_long = true;
                    continue;
                }
                let presence = model.new_bool_var(format!("{}@{}", batch.batch_ref, line_id));
                let interval =
                    model.new_optional_interval(format!("{}@{}", batch.batch_ref, line_id), duration, presence);
                line_intervals.entry(line_id.clone()).or_default().push(interval);
                candidates.push(Candidate {
                    line_id,
                    presence,
                    interval,
                });
            }

            if candidates.is_empty() {
                let reason = if too_long {
                    format!("所有兼容产线加工时长均超出时间窗 {} 分钟", horizon)
                } else {
                    format!("产品 {} 无可运行的兼容产线", batch.product_id)
                };
                result.unplannable.push(UnplannableBatch {
                    batch_ref: batch.batch_ref.clone(),
                    order_id: batch.order_id.clone(),
                    product_id: batch.product_id.clone(),
                    quantity: batch.quantity,
                    reason,
                });
                continue;
            }

            model.add_exactly_one(candidates.iter().map(|c| c.presence).collect());
            planned.push(PlannedBatch { batch, candidates });
        }

        if planned.is_empty() {
            return Ok(result);
        }

        // 产线上尚未结束的已有工单作为固定占用
        for (line_id, intervals) in line_intervals.iter_mut() {
            for wo in wo_repo.list_by_line(line_id)? {
                if wo.status == WorkOrderStatus::Completed || wo.scheduled_end <= anchor {
                    continue;
                }
                let start = (wo.scheduled_start - anchor).num_minutes();
                let duration = (wo.scheduled_end - wo.scheduled_start).num_minutes();
                intervals.push(model.new_fixed_interval(
                    format!("existing:{}", wo.work_order_id),
                    start,
                    duration,
                ));
            }
        }
        for intervals in line_intervals.into_values() {
            model.add_no_overlap(intervals);
        }
        model.minimize_makespan();

        // ===== 3. 求解 =====
        let outcome = self.solver.solve(&model, config.solver_time_limit())?;
        result.solve_status = Some(outcome.status);
        tracing::debug!(
            status = ?outcome.status,
            elapsed_ms = outcome.elapsed_ms,
            "求解器返回"
        );

        let solution = match outcome.solution {
            Some(solution) if outcome.status.has_solution() => solution,
            _ => {
                result.status = ScheduleRunStatus::Infeasible;
                result.issues.push(format!(
                    "时间窗 {} 分钟内无可行排产方案，未生成工单",
                    horizon
                ));
                return Ok(result);
            }
        };
        result.makespan_minutes = Some(solution.makespan);

        // ===== 4. 落工单 =====
        let mut windows: BTreeMap<String, (NaiveDateTime, NaiveDateTime)> = BTreeMap::new();
        for PlannedBatch { batch, candidates } in planned {
            let chosen = candidates
                .iter()
                .find(|c| solution.value(c.presence))
                .ok_or_else(|| {
                    EngineError::Solver(format!("解中批次 {} 未分配产线", batch.batch_ref))
                })?;
            let (Some(start), Some(end)) = (solution.start(chosen.interval), solution.end(chosen.interval)) else {
                return Err(EngineError::Solver(format!(
                    "解中批次 {} 缺少区间取值",
                    batch.batch_ref
                )));
            };

            let wo = WorkOrder {
                work_order_id: Uuid::new_v4().to_string(),
                production_order_id: batch.order_id.clone(),
                line_id: chosen.line_id.clone(),
                batch_ref: Some(batch.batch_ref.clone()),
                quantity: batch.quantity,
                scheduled_start: anchor + Duration::minutes(start),
                scheduled_end: anchor + Duration::minutes(end),
                actual_start: None,
                actual_end: None,
                status: WorkOrderStatus::Pending,
                gross_output: 0,
                produced_qty: 0,
                created_at: anchor,
            };
            wo_repo.insert(&wo)?;
            tracing::debug!(
                work_order_id = %wo.work_order_id,
                batch_ref = %batch.batch_ref,
                line_id = %wo.line_id,
                start = %wo.scheduled_start,
                end = %wo.scheduled_end,
                "生成工单"
            );

            windows
                .entry(batch.order_id.clone())
                .and_modify(|(s, e)| {
                    *s = (*s).min(wo.scheduled_start);
                    *e = (*e).max(wo.scheduled_end);
                })
                .or_insert((wo.scheduled_start, wo.scheduled_end));
            result.work_orders.push(wo);
        }

        // ===== 5. 订单 → PLANNED =====
        for (order_id, (start, end)) in windows {
            order_repo.update_window(&order_id, Some(start.date()), Some(end.date()), anchor)?;
            order_repo.update_status(&order_id, ProductionOrderStatus::Planned, anchor)?;
            if result.unplannable.iter().any(|u| u.order_id == order_id) {
                result
                    .issues
                    .push(format!("订单 {} 部分批次不可排，仅已排批次生成工单", order_id));
            }
            result.planned_order_ids.push(order_id);
        }

        result.status = ScheduleRunStatus::Scheduled;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_rounds_up_without_float_noise() {
        assert_eq!(batch_duration_minutes(20, 10.0), 120);
        assert_eq!(batch_duration_minutes(10, 3.0), 200);
        assert_eq!(batch_duration_minutes(1, 7.0), 9);
        assert_eq!(batch_duration_minutes(1, 1000.0), 1);
    }
}
