// ==========================================
// 约束排产引擎集成测试
// ==========================================
// 场景: 批次拆分 → 建模 → 求解 → 工单落库 / 不可排 / 无解
// ==========================================

mod test_helpers;

use chrono::Duration;
use production_aps::config::PlanningConfig;
use production_aps::db::Database;
use production_aps::domain::types::{ProductionOrderStatus, WorkOrderStatus};
use production_aps::domain::work_order::WorkOrder;
use production_aps::engine::{
    ConstraintScheduler, PumpkinSolver, ScheduleRunStatus, SolveStatus,
};
use production_aps::repository::WorkOrderRepository;
use std::sync::Arc;
use test_helpers::*;

fn scheduler(db: &Database) -> ConstraintScheduler {
    ConstraintScheduler::new(db.clone(), Arc::new(PumpkinSolver::new()))
}

fn work_orders_on(db: &Database, line_id: &str) -> Vec<WorkOrder> {
    let conn = db.get_conn().unwrap();
    WorkOrderRepository::new(&conn)
        .list_by_line(line_id)
        .unwrap()
        .into_iter()
        .filter(|wo| wo.status != WorkOrderStatus::Cancelled)
        .collect()
}

fn assert_no_overlap(work_orders: &[WorkOrder]) {
    for (i, a) in work_orders.iter().enumerate() {
        for b in &work_orders[i + 1..] {
            assert!(!a.overlaps(b), "工单重叠: {} / {}", a.work_order_id, b.work_order_id);
        }
    }
}

#[test]
fn test_ready_order_is_split_and_spread_over_lines() {
    let (_tmp, db) = create_test_db();
    seed_line(&db, "L1", true);
    seed_line(&db, "L2", true);
    seed_capacity(&db, "P", "L1", 10.0);
    seed_capacity(&db, "P", "L2", 10.0);
    seed_order(&db, "PO1", "P", 47, ProductionOrderStatus::Ready, None, base_now());

    let result = scheduler(&db).schedule_pending_orders(&test_config(), base_now()).unwrap();

    assert_eq!(result.status, ScheduleRunStatus::Scheduled);
    assert_eq!(result.solve_status, Some(SolveStatus::Optimal));
    assert_eq!(result.batches_considered, 2);
    assert_eq!(result.work_orders.len(), 2);

    let mut quantities: Vec<i64> = result.work_orders.iter().map(|wo| wo.quantity).collect();
    quantities.sort();
    assert_eq!(quantities, vec![20, 27]);

    // 20 件 = 120 分钟，27 件 = 162 分钟，两条线并行
    assert_eq!(result.makespan_minutes, Some(162));
    let lines: std::collections::BTreeSet<&str> =
        result.work_orders.iter().map(|wo| wo.line_id.as_str()).collect();
    assert_eq!(lines.len(), 2);
    assert!(result
        .work_orders
        .iter()
        .all(|wo| wo.status == WorkOrderStatus::Pending && wo.scheduled_start == base_now()));

    let order = get_order(&db, "PO1");
    assert_eq!(order.status, ProductionOrderStatus::Planned);
    assert_eq!(order.planned_start, Some(base_now().date()));
    assert_eq!(result.planned_order_ids, vec!["PO1".to_string()]);
}

#[test]
fn test_new_batches_queue_behind_existing_work_orders() {
    let (_tmp, db) = create_test_db();
    seed_line(&db, "L1", true);
    seed_capacity(&db, "P", "L1", 10.0);
    seed_order(&db, "PO1", "P", 20, ProductionOrderStatus::Ready, None, base_now());

    let first = scheduler(&db).schedule_pending_orders(&test_config(), base_now()).unwrap();
    assert_eq!(first.work_orders.len(), 1);

    seed_order(&db, "PO2", "P", 10, ProductionOrderStatus::Ready, None, base_now());
    let second = scheduler(&db).schedule_pending_orders(&test_config(), base_now()).unwrap();

    assert_eq!(second.status, ScheduleRunStatus::Scheduled);
    assert_eq!(second.work_orders.len(), 1);
    let wo = &second.work_orders[0];
    assert!(wo.scheduled_start >= first.work_orders[0].scheduled_end);
    assert_no_overlap(&work_orders_on(&db, "L1"));
}

#[test]
fn test_new_batch_fills_gap_before_existing_work_order() {
    let (_tmp, db) = create_test_db();
    seed_line(&db, "L1", true);
    seed_capacity(&db, "P", "L1", 10.0);
    seed_order(&db, "PO-BUSY", "P", 20, ProductionOrderStatus::Planned, None, base_now());
    {
        let conn = db.get_conn().unwrap();
        WorkOrderRepository::new(&conn)
            .insert(&WorkOrder {
                work_order_id: "WO-BUSY".to_string(),
                production_order_id: "PO-BUSY".to_string(),
                line_id: "L1".to_string(),
                batch_ref: None,
                quantity: 20,
                scheduled_start: base_now() + Duration::minutes(120),
                scheduled_end: base_now() + Duration::minutes(240),
                actual_start: None,
                actual_end: None,
                status: WorkOrderStatus::Pending,
                gross_output: 0,
                produced_qty: 0,
                created_at: base_now(),
            })
            .unwrap();
    }
    // 15 件 = 90 分钟；[240, 300) 放不下，只能进 [0, 120) 的空档
    seed_order(&db, "PO1", "P", 15, ProductionOrderStatus::Ready, None, base_now());

    let config = PlanningConfig {
        schedule_horizon_minutes: 300,
        ..test_config()
    };
    let result = scheduler(&db).schedule_pending_orders(&config, base_now()).unwrap();

    assert_eq!(result.status, ScheduleRunStatus::Scheduled);
    assert_eq!(result.work_orders.len(), 1);
    let wo = &result.work_orders[0];
    assert_eq!(wo.scheduled_start, base_now());
    assert_eq!(wo.scheduled_end, base_now() + Duration::minutes(90));
    assert_no_overlap(&work_orders_on(&db, "L1"));
    assert_eq!(get_order(&db, "PO1").status, ProductionOrderStatus::Planned);
}

#[test]
fn test_batches_without_runnable_line_are_reported() {
    let (_tmp, db) = create_test_db();
    seed_line(&db, "L1", true);
    seed_line(&db, "L-OFF", false);
    seed_capacity(&db, "P", "L1", 10.0);
    seed_capacity(&db, "X", "L-OFF", 10.0);
    seed_order(&db, "PO1", "P", 10, ProductionOrderStatus::Ready, None, base_now());
    seed_order(&db, "PO-X", "X", 15, ProductionOrderStatus::Ready, None, base_now());

    let result = scheduler(&db).schedule_pending_orders(&test_config(), base_now()).unwrap();

    assert_eq!(result.status, ScheduleRunStatus::Scheduled);
    assert_eq!(result.unplannable.len(), 1);
    assert_eq!(result.unplannable[0].order_id, "PO-X");
    assert_eq!(result.unplannable[0].quantity, 15);
    assert_eq!(get_order(&db, "PO-X").status, ProductionOrderStatus::Ready);
    assert_eq!(get_order(&db, "PO1").status, ProductionOrderStatus::Planned);
}

#[test]
fn test_batch_longer_than_horizon_is_unplannable() {
    let (_tmp, db) = create_test_db();
    seed_line(&db, "L1", true);
    seed_capacity(&db, "P", "L1", 10.0);
    seed_order(&db, "PO1", "P", 20, ProductionOrderStatus::Ready, None, base_now());

    let config = PlanningConfig {
        schedule_horizon_minutes: 100,
        ..test_config()
    };
    let result = scheduler(&db).schedule_pending_orders(&config, base_now()).unwrap();

    assert_eq!(result.status, ScheduleRunStatus::NothingToSchedule);
    assert_eq!(result.unplannable.len(), 1);
    assert!(work_orders_on(&db, "L1").is_empty());
}

#[test]
fn test_infeasible_horizon_writes_nothing() {
    let (_tmp, db) = create_test_db();
    seed_line(&db, "L1", true);
    seed_capacity(&db, "P", "L1", 10.0);
    // 20 + 27 件 = 120 + 162 分钟 > 200 分钟时间窗
    seed_order(&db, "PO1", "P", 47, ProductionOrderStatus::Ready, None, base_now());

    let config = PlanningConfig {
        schedule_horizon_minutes: 200,
        ..test_config()
    };
    let result = scheduler(&db).schedule_pending_orders(&config, base_now()).unwrap();

    assert_eq!(result.status, ScheduleRunStatus::Infeasible);
    assert_eq!(result.solve_status, Some(SolveStatus::Infeasible));
    assert!(result.work_orders.is_empty());
    assert!(!result.issues.is_empty());
    assert!(work_orders_on(&db, "L1").is_empty());
    assert_eq!(get_order(&db, "PO1").status, ProductionOrderStatus::Ready);
}

#[test]
fn test_only_ready_orders_are_considered() {
    let (_tmp, db) = create_test_db();
    seed_line(&db, "L1", true);
    seed_capacity(&db, "P", "L1", 10.0);
    seed_order(&db, "PO-W", "P", 10, ProductionOrderStatus::WaitingMaterials, None, base_now());

    let result = scheduler(&db).schedule_pending_orders(&test_config(), base_now()).unwrap();

    assert_eq!(result.status, ScheduleRunStatus::NothingToSchedule);
    assert_eq!(result.batches_considered, 0);
    assert_eq!(get_order(&db, "PO-W").status, ProductionOrderStatus::WaitingMaterials);
}
