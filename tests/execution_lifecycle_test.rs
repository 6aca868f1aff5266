// ==========================================
// 订单生命周期与工单执行集成测试
// ==========================================
// 场景: 创建 → 预留 → 排产 → 开工 → 产出/废品 → 完工 → 结算 / 取消
// ==========================================

mod test_helpers;

use production_aps::db::Database;
use production_aps::domain::types::{
    AuditAction, ProductionOrderStatus, ReservationStatus, WorkOrderStatus,
};
use production_aps::engine::{
    ConstraintScheduler, EngineError, MaterialReservationEngine, NewProductionOrder,
    OrderLifecycle, PumpkinSolver, WorkOrderEventKind, WorkOrderExecution,
};
use production_aps::repository::{
    AuditLogRepository, CalendarReservationRepository, MaterialReservationRepository,
    SalesOrderRepository, WorkOrderRepository,
};
use std::sync::Arc;
use test_helpers::*;

fn new_order(order_id: &str, quantity: i64) -> NewProductionOrder {
    NewProductionOrder {
        order_id: Some(order_id.to_string()),
        product_id: "P".to_string(),
        quantity,
        planned_date: None,
        sales_order_line_id: None,
    }
}

/// 创建并排产一个 20 件订单（单工单）
fn planned_order(db: &Database) -> String {
    seed_material_scenario(db);
    seed_lot(db, "LOT-100", "R", 100.0, None);
    OrderLifecycle::new(db.clone())
        .create_production_order(new_order("PO1", 20), base_now())
        .unwrap();
    let result = ConstraintScheduler::new(db.clone(), Arc::new(PumpkinSolver::new()))
        .schedule_pending_orders(&test_config(), base_now())
        .unwrap();
    assert_eq!(result.work_orders.len(), 1);
    result.work_orders[0].work_order_id.clone()
}

#[test]
fn test_create_order_reserves_and_pegs_sales_line() {
    let (_tmp, db) = create_test_db();
    seed_material_scenario(&db);
    seed_lot(&db, "LOT-30", "R", 30.0, None);
    seed_order(&db, "PO-DUMMY", "P", 1, ProductionOrderStatus::Cancelled, None, base_now());
    seed_pegged_sales_order(&db, "SO1", "PO-DUMMY", "P", date(2024, 3, 20));

    let request = NewProductionOrder {
        sales_order_line_id: Some("SO1-1".to_string()),
        ..new_order("PO1", 25)
    };
    let result = OrderLifecycle::new(db.clone())
        .create_production_order(request, base_now())
        .unwrap();

    assert_eq!(result.order.status, ProductionOrderStatus::WaitingMaterials);
    assert_eq!(result.reservation.purchase_requests.len(), 1);
    assert_eq!(result.pegged_sales_order_line.as_deref(), Some("SO1-1"));

    let conn = db.get_conn().unwrap();
    let pegged = SalesOrderRepository::new(&conn).list_pegged_orders("PO1").unwrap();
    assert_eq!(pegged.len(), 1);
    let audit = AuditLogRepository::new(&conn)
        .list_by_action(AuditAction::OrderCreated, 10)
        .unwrap();
    assert_eq!(audit.len(), 1);
}

#[test]
fn test_create_order_validates_input() {
    let (_tmp, db) = create_test_db();
    seed_material_scenario(&db);
    let lifecycle = OrderLifecycle::new(db.clone());

    assert!(matches!(
        lifecycle.create_production_order(new_order("PO1", 0), base_now()),
        Err(EngineError::InvalidInput(_))
    ));
    let unknown = NewProductionOrder {
        product_id: "UNKNOWN".to_string(),
        ..new_order("PO1", 5)
    };
    assert!(matches!(
        lifecycle.create_production_order(unknown, base_now()),
        Err(EngineError::InvalidInput(_))
    ));

    lifecycle.create_production_order(new_order("PO1", 5), base_now()).unwrap();
    assert!(matches!(
        lifecycle.create_production_order(new_order("PO1", 5), base_now()),
        Err(EngineError::InvalidInput(_))
    ));
}

#[test]
fn test_work_order_flow_updates_order_and_net_output() {
    let (_tmp, db) = create_test_db();
    let wo_id = planned_order(&db);
    let execution = WorkOrderExecution::new(db.clone());

    let started = execution.start_work_order(&wo_id, ts(2024, 3, 4, 9, 0)).unwrap();
    assert_eq!(started.kind, WorkOrderEventKind::Started);
    assert_eq!(started.work_order.status, WorkOrderStatus::InProgress);
    assert_eq!(
        started.order_status_change,
        Some((ProductionOrderStatus::Planned, ProductionOrderStatus::InProgress))
    );
    assert_eq!(get_order(&db, "PO1").status, ProductionOrderStatus::InProgress);

    let output = execution.record_gross_output(&wo_id, 21, ts(2024, 3, 4, 10, 0)).unwrap();
    assert_eq!(output.work_order.produced_qty, 21);

    let waste = execution
        .record_waste(&wo_id, 3, Some("边损".to_string()), ts(2024, 3, 4, 10, 30))
        .unwrap();
    assert!(waste.waste_id.is_some());
    assert_eq!(waste.work_order.gross_output, 21);
    assert_eq!(waste.work_order.produced_qty, 18);

    // 废品超过毛产出时净产出不为负
    execution.record_waste(&wo_id, 30, None, ts(2024, 3, 4, 10, 45)).unwrap();
    let wo = {
        let conn = db.get_conn().unwrap();
        WorkOrderRepository::new(&conn).get(&wo_id).unwrap()
    };
    assert_eq!(wo.produced_qty, 0);

    let completed = execution.complete_work_order(&wo_id, ts(2024, 3, 4, 11, 0)).unwrap();
    assert_eq!(completed.work_order.status, WorkOrderStatus::Completed);
    assert!(completed.work_order.actual_end.is_some());
}

#[test]
fn test_work_order_transitions_are_enforced() {
    let (_tmp, db) = create_test_db();
    let wo_id = planned_order(&db);
    let execution = WorkOrderExecution::new(db.clone());

    assert!(matches!(
        execution.complete_work_order(&wo_id, base_now()),
        Err(EngineError::InvalidStateTransition { .. })
    ));
    assert!(matches!(
        execution.record_gross_output(&wo_id, 5, base_now()),
        Err(EngineError::InvalidStateTransition { .. })
    ));
    assert!(matches!(
        execution.record_waste(&wo_id, 0, None, base_now()),
        Err(EngineError::InvalidInput(_))
    ));

    let cancelled = execution.cancel_work_order(&wo_id, base_now()).unwrap();
    assert_eq!(cancelled.work_order.status, WorkOrderStatus::Cancelled);
    assert!(matches!(
        execution.start_work_order(&wo_id, base_now()),
        Err(EngineError::InvalidStateTransition { .. })
    ));
}

#[test]
fn test_finish_after_execution_consumes_materials() {
    let (_tmp, db) = create_test_db();
    let wo_id = planned_order(&db);
    let execution = WorkOrderExecution::new(db.clone());
    execution.start_work_order(&wo_id, base_now()).unwrap();
    execution.record_gross_output(&wo_id, 20, base_now()).unwrap();
    execution.complete_work_order(&wo_id, base_now()).unwrap();

    let result = MaterialReservationEngine::new(db.clone())
        .finalize_order("PO1", base_now())
        .unwrap();

    assert_eq!(result.cancelled_work_orders, 0);
    assert_eq!(result.lot_consumptions.len(), 1);
    assert!((result.lot_consumptions[0].remaining_qty - 60.0).abs() < 1e-9);
    assert_eq!(get_lot(&db, "LOT-100").on_hand_qty, 60.0);
    assert_eq!(get_order(&db, "PO1").status, ProductionOrderStatus::Finished);
}

#[test]
fn test_cancel_releases_everything_owned_by_the_order() {
    let (_tmp, db) = create_test_db();
    let _wo_id = planned_order(&db);
    let lifecycle = OrderLifecycle::new(db.clone());

    let result = lifecycle.cancel_production_order("PO1", base_now()).unwrap();

    assert_eq!(result.previous_status, ProductionOrderStatus::Planned);
    assert_eq!(result.cancelled_reservations, 1);
    assert_eq!(result.cancelled_work_orders, 1);
    assert_eq!(get_order(&db, "PO1").status, ProductionOrderStatus::Cancelled);

    {
        let conn = db.get_conn().unwrap();
        let active = MaterialReservationRepository::new(&conn)
            .list_by_order("PO1", ReservationStatus::Active)
            .unwrap();
        assert!(active.is_empty());
        assert!(CalendarReservationRepository::new(&conn)
            .list_by_order("PO1")
            .unwrap()
            .is_empty());
    }

    assert!(matches!(
        lifecycle.cancel_production_order("PO1", base_now()),
        Err(EngineError::InvalidStateTransition { .. })
    ));
}
