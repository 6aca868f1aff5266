// ==========================================
// 产线排产核心 - 工单执行（车间事件）
// ==========================================
// 流转: PENDING → IN_PROGRESS → COMPLETED
//       PENDING → CANCELLED
// 净产出 = max(毛产出 − Σ废品, 0)，毛产出或废品变化时重算
// 首张工单开工时，订单 PLANNED → IN_PROGRESS
// ==========================================

use crate::db::Database;
use crate::domain::types::{AuditAction, ProductionOrderStatus, WorkOrderStatus};
use crate::domain::work_order::{WasteRecord, WorkOrder};
use crate::engine::error::{EngineError, EngineResult};
use crate::repository::{AuditLogRepository, ProductionOrderRepository, WorkOrderRepository};
use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

/// 工单事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkOrderEventKind {
    Started,
    GrossOutputRecorded,
    WasteRecorded,
    Completed,
    Cancelled,
}

/// 工单事件结果（增量记录）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkOrderEventResult {
    pub kind: WorkOrderEventKind,
    pub work_order: WorkOrder,
    pub order_status_change: Option<(ProductionOrderStatus, ProductionOrderStatus)>,
    pub waste_id: Option<String>,
}

// ==========================================
// WorkOrderExecution - 工单执行服务
// ==========================================
pub struct WorkOrderExecution {
    db: Database,
}

impl WorkOrderExecution {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// 开工
    #[instrument(skip(self))]
    pub fn start_work_order(&self, work_order_id: &str, at: NaiveDateTime) -> EngineResult<WorkOrderEventResult> {
        self.run(work_order_id, at, WorkOrderEventKind::Started, |conn, wo| {
            expect_status(wo, &[WorkOrderStatus::Pending], WorkOrderStatus::InProgress)?;

            let order_repo = ProductionOrderRepository::new(conn);
            let order = order_repo.get(&wo.production_order_id)?;
            let change = match order.status {
                ProductionOrderStatus::Planned => {
                    order_repo.update_status(&order.order_id, ProductionOrderStatus::InProgress, at)?;
                    Some((ProductionOrderStatus::Planned, ProductionOrderStatus::InProgress))
                }
                ProductionOrderStatus::InProgress => None,
                other => {
                    return Err(EngineError::invalid_transition(
                        "ProductionOrder",
                        other,
                        ProductionOrderStatus::InProgress,
                    ))
                }
            };

            WorkOrderRepository::new(conn).mark_started(&wo.work_order_id, at)?;
            Ok((change, None))
        })
    }

    /// 记录毛产出（覆盖）
    #[instrument(skip(self))]
    pub fn record_gross_output(
        &self,
        work_order_id: &str,
        gross_output: i64,
        at: NaiveDateTime,
    ) -> EngineResult<WorkOrderEventResult> {
        if gross_output < 0 {
            return Err(EngineError::InvalidInput(format!("毛产出不能为负: {}", gross_output)));
        }
        self.run(work_order_id, at, WorkOrderEventKind::GrossOutputRecorded, |conn, wo| {
            expect_status(
                wo,
                &[WorkOrderStatus::InProgress, WorkOrderStatus::Completed],
                WorkOrderStatus::InProgress,
            )?;
            recompute_produced(conn, &wo.work_order_id, gross_output)?;
            Ok((None, None))
        })
    }

    /// 记录废品
    #[instrument(skip(self, reason))]
    pub fn record_waste(
        &self,
        work_order_id: &str,
        quantity: i64,
        reason: Option<String>,
        at: NaiveDateTime,
    ) -> EngineResult<WorkOrderEventResult> {
        if quantity <= 0 {
            return Err(EngineError::InvalidInput(format!("废品数量须为正数: {}", quantity)));
        }
        self.run(work_order_id, at, WorkOrderEventKind::WasteRecorded, |conn, wo| {
            expect_status(
                wo,
                &[WorkOrderStatus::InProgress, WorkOrderStatus::Completed],
                WorkOrderStatus::InProgress,
            )?;
            let waste = WasteRecord {
                waste_id: Uuid::new_v4().to_string(),
                work_order_id: wo.work_order_id.clone(),
                quantity,
                reason,
                recorded_at: at,
            };
            WorkOrderRepository::new(conn).insert_waste(&waste)?;
            recompute_produced(conn, &wo.work_order_id, wo.gross_output)?;
            Ok((None, Some(waste.waste_id)))
        })
    }

    /// 完工
    #[instrument(skip(self))]
    pub fn complete_work_order(&self, work_order_id: &str, at: NaiveDateTime) -> EngineResult<WorkOrderEventResult> {
        self.run(work_order_id, at, WorkOrderEventKind::Completed, |conn, wo| {
            expect_status(wo, &[WorkOrderStatus::InProgress], WorkOrderStatus::Completed)?;
            WorkOrderRepository::new(conn).mark_completed(&wo.work_order_id, at)?;
            Ok((None, None))
        })
    }

    /// 取消待开工工单
    #[instrument(skip(self))]
    pub fn cancel_work_order(&self, work_order_id: &str, at: NaiveDateTime) -> EngineResult<WorkOrderEventResult> {
        self.run(work_order_id, at, WorkOrderEventKind::Cancelled, |conn, wo| {
            expect_status(wo, &[WorkOrderStatus::Pending], WorkOrderStatus::Cancelled)?;
            WorkOrderRepository::new(conn).update_status(&wo.work_order_id, WorkOrderStatus::Cancelled)?;
            Ok((None, None))
        })
    }

    /// 单事务执行一个工单事件并写审计
    fn run<F>(
        &self,
        work_order_id: &str,
        at: NaiveDateTime,
        kind: WorkOrderEventKind,
        step: F,
    ) -> EngineResult<WorkOrderEventResult>
    where
        F: FnOnce(
            &Connection,
            &WorkOrder,
        ) -> EngineResult<(Option<(ProductionOrderStatus, ProductionOrderStatus)>, Option<String>)>,
    {
        let result = self.db.with_transaction(|tx| -> EngineResult<WorkOrderEventResult> {
            let conn: &Connection = tx;
            let wo_repo = WorkOrderRepository::new(conn);
            let before = wo_repo.get(work_order_id)?;
            let (order_status_change, waste_id) = step(conn, &before)?;
            let result = WorkOrderEventResult {
                kind,
                work_order: wo_repo.get(work_order_id)?,
                order_status_change,
                waste_id,
            };
            AuditLogRepository::new(conn).record(
                AuditAction::WorkOrderEvent,
                Some(work_order_id),
                &result,
                at,
            )?;
            Ok(result)
        })?;

        tracing::info!(
            work_order_id = %work_order_id,
            kind = ?kind,
            status = %result.work_order.status,
            produced = result.work_order.produced_qty,
            "工单事件已记录"
        );
        Ok(result)
    }
}

fn expect_status(wo: &WorkOrder, allowed: &[WorkOrderStatus], to: WorkOrderStatus) -> EngineResult<()> {
    if allowed.contains(&wo.status) {
        Ok(())
    } else {
        Err(EngineError::invalid_transition("WorkOrder", wo.status, to))
    }
}

/// 重算净产出
fn recompute_produced(conn: &Connection, work_order_id: &str, gross_output: i64) -> EngineResult<i64> {
    let repo = WorkOrderRepository::new(conn);
    let waste = repo.sum_waste(work_order_id)?;
    let produced = (gross_output - waste).max(0);
    repo.update_output(work_order_id, gross_output, produced)?;
    tracing::debug!(work_order_id, gross_output, waste, produced, "净产出已重算");
    Ok(produced)
}
