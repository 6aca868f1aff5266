// ==========================================
// 产能日历重排集成测试
// ==========================================
// 模拟日: 2024-03-04 (周一)，最小提前期 2 天 → cutoff 2024-03-06
// 产线 L1: 产品 P 10 件/小时，每日 8 小时
// ==========================================

mod test_helpers;

use production_aps::db::Database;
use production_aps::domain::calendar::CalendarReservation;
use production_aps::domain::types::{ProductionOrderStatus, SalesOrderStatus, WorkOrderStatus};
use production_aps::domain::work_order::WorkOrder;
use production_aps::engine::{CapacityCalendarReplanner, EngineError};
use production_aps::repository::{
    CalendarReservationRepository, SalesOrderRepository, WorkOrderRepository,
};
use std::collections::HashMap;
use test_helpers::*;

fn setup() -> (tempfile::NamedTempFile, Database) {
    let (tmp, db) = create_test_db();
    seed_line(&db, "L1", true);
    seed_capacity(&db, "P", "L1", 10.0);
    (tmp, db)
}

fn reservations(db: &Database, order_id: &str) -> Vec<CalendarReservation> {
    let conn = db.get_conn().unwrap();
    CalendarReservationRepository::new(&conn)
        .list_by_order(order_id)
        .unwrap()
}

fn hours_by_day(db: &Database) -> HashMap<(String, chrono::NaiveDate), f64> {
    let conn = db.get_conn().unwrap();
    let mut map = HashMap::new();
    for r in CalendarReservationRepository::new(&conn).list_all().unwrap() {
        *map.entry((r.line_id.clone(), r.work_date)).or_insert(0.0) += r.hours_reserved;
    }
    map
}

#[test]
fn test_order_is_spread_over_days_and_delay_propagates_to_sales_order() {
    let (_tmp, db) = setup();
    seed_order(&db, "PO1", "P", 100, ProductionOrderStatus::Ready, None, ts(2024, 3, 1, 8, 0));
    seed_pegged_sales_order(&db, "SO1", "PO1", "P", date(2024, 3, 8));

    let replanner = CapacityCalendarReplanner::new(db.clone());
    let result = replanner
        .replan_active_orders(&test_config(), date(2024, 3, 4), 14, base_now())
        .unwrap();

    assert_eq!(result.cutoff, date(2024, 3, 6));
    assert_eq!(result.orders.len(), 1);
    let outcome = &result.orders[0];
    assert_eq!(outcome.new_start, Some(date(2024, 3, 6)));
    assert_eq!(outcome.new_finish, Some(date(2024, 3, 7)));
    assert!((outcome.reserved_hours - 10.0).abs() < 1e-9);
    assert!((outcome.reserved_qty - 100.0).abs() < 1e-6);
    assert!(!outcome.partially_placed);
    assert!(!outcome.unchanged);

    let mut days: Vec<(chrono::NaiveDate, f64)> = reservations(&db, "PO1")
        .iter()
        .map(|r| (r.work_date, r.hours_reserved))
        .collect();
    days.sort_by_key(|(d, _)| *d);
    assert_eq!(days, vec![(date(2024, 3, 6), 8.0), (date(2024, 3, 7), 2.0)]);

    let order = get_order(&db, "PO1");
    assert_eq!(order.planned_start, Some(date(2024, 3, 6)));
    assert_eq!(order.planned_finish, Some(date(2024, 3, 7)));

    // 完工 03-07 + 2 天 = 周六 → 顺延至周一 03-11，晚于承诺 03-08
    assert_eq!(result.sales_order_impacts.len(), 1);
    let impact = &result.sales_order_impacts[0];
    assert_eq!(impact.new_delivery, date(2024, 3, 11));
    assert_eq!(impact.new_status, SalesOrderStatus::AtRisk);

    let conn = db.get_conn().unwrap();
    let so = SalesOrderRepository::new(&conn).find_by_id("SO1").unwrap().unwrap();
    assert_eq!(so.delivery_date, date(2024, 3, 11));
    assert_eq!(so.status, SalesOrderStatus::AtRisk);
}

#[test]
fn test_second_pass_without_changes_is_a_no_op() {
    let (_tmp, db) = setup();
    seed_order(&db, "PO1", "P", 100, ProductionOrderStatus::Ready, None, ts(2024, 3, 1, 8, 0));
    seed_order(&db, "PO2", "P", 40, ProductionOrderStatus::Planned, Some(date(2024, 3, 2)), ts(2024, 3, 1, 9, 0));
    seed_pegged_sales_order(&db, "SO1", "PO1", "P", date(2024, 3, 8));

    let replanner = CapacityCalendarReplanner::new(db.clone());
    let first = replanner
        .replan_active_orders(&test_config(), date(2024, 3, 4), 14, base_now())
        .unwrap();
    assert!(first.reservations_created > 0);
    let snapshot = hours_by_day(&db);

    let second = replanner
        .replan_active_orders(&test_config(), date(2024, 3, 4), 14, base_now())
        .unwrap();

    assert_eq!(second.reservations_created, 0);
    assert_eq!(second.reservations_deleted, 0);
    assert!(second.orders.iter().all(|o| o.unchanged));
    assert!(second.sales_order_impacts.is_empty());
    assert_eq!(hours_by_day(&db), snapshot);
}

#[test]
fn test_daily_hours_never_exceed_line_limit() {
    let (_tmp, db) = setup();
    seed_order(&db, "PO1", "P", 60, ProductionOrderStatus::Ready, None, ts(2024, 3, 1, 8, 0));
    seed_order(&db, "PO2", "P", 40, ProductionOrderStatus::Ready, None, ts(2024, 3, 2, 8, 0));

    let replanner = CapacityCalendarReplanner::new(db.clone());
    let result = replanner
        .replan_active_orders(&test_config(), date(2024, 3, 4), 14, base_now())
        .unwrap();

    // 计划日期最早的订单优先占用
    assert_eq!(result.orders[0].order_id, "PO1");
    for hours in hours_by_day(&db).values() {
        assert!(*hours <= 8.0 + 1e-9, "日工时超限: {}", hours);
    }
    let po2 = result.orders.iter().find(|o| o.order_id == "PO2").unwrap();
    assert_eq!(po2.new_start, Some(date(2024, 3, 6)));
    assert_eq!(po2.new_finish, Some(date(2024, 3, 7)));
}

#[test]
fn test_reservations_before_cutoff_are_frozen() {
    let (_tmp, db) = setup();
    seed_order(&db, "PO1", "P", 100, ProductionOrderStatus::Ready, None, ts(2024, 3, 1, 8, 0));

    let replanner = CapacityCalendarReplanner::new(db.clone());
    replanner
        .replan_active_orders(&test_config(), date(2024, 3, 4), 14, base_now())
        .unwrap();

    // 次日重排: cutoff 03-07，03-06 的 80 件不可动
    let result = replanner
        .replan_active_orders(&test_config(), date(2024, 3, 5), 14, base_now())
        .unwrap();

    let outcome = &result.orders[0];
    assert!(outcome.unchanged);
    assert_eq!(outcome.new_start, Some(date(2024, 3, 6)));
    assert_eq!(outcome.new_finish, Some(date(2024, 3, 7)));
    assert_eq!(reservations(&db, "PO1").len(), 2);
}

#[test]
fn test_earlier_finish_moves_delivery_forward_without_risk_flag() {
    let (_tmp, db) = setup();
    seed_order(&db, "PO1", "P", 20, ProductionOrderStatus::Ready, None, ts(2024, 3, 1, 8, 0));
    seed_pegged_sales_order(&db, "SO1", "PO1", "P", date(2024, 3, 29));

    let replanner = CapacityCalendarReplanner::new(db.clone());
    let result = replanner
        .replan_active_orders(&test_config(), date(2024, 3, 4), 14, base_now())
        .unwrap();

    let impact = &result.sales_order_impacts[0];
    assert_eq!(impact.new_delivery, date(2024, 3, 8));
    assert_eq!(impact.new_status, SalesOrderStatus::Open);
}

#[test]
fn test_lookahead_limit_reports_partial_placement() {
    let (_tmp, db) = setup();
    seed_order(&db, "PO1", "P", 1000, ProductionOrderStatus::Ready, None, ts(2024, 3, 1, 8, 0));

    let replanner = CapacityCalendarReplanner::new(db.clone());
    let result = replanner
        .replan_active_orders(&test_config(), date(2024, 3, 4), 2, base_now())
        .unwrap();

    let outcome = &result.orders[0];
    assert!(outcome.partially_placed);
    // 03-06 / 03-07 / 03-08 三个工作日
    assert!((outcome.reserved_hours - 24.0).abs() < 1e-9);
    assert!(!result.issues.is_empty());
}

#[test]
fn test_started_quantity_is_netted_out() {
    let (_tmp, db) = setup();
    seed_order(&db, "PO1", "P", 100, ProductionOrderStatus::InProgress, None, ts(2024, 3, 1, 8, 0));
    {
        let conn = db.get_conn().unwrap();
        WorkOrderRepository::new(&conn)
            .insert(&WorkOrder {
                work_order_id: "WO1".to_string(),
                production_order_id: "PO1".to_string(),
                line_id: "L1".to_string(),
                batch_ref: None,
                quantity: 70,
                scheduled_start: ts(2024, 3, 4, 8, 0),
                scheduled_end: ts(2024, 3, 4, 15, 0),
                actual_start: Some(ts(2024, 3, 4, 8, 0)),
                actual_end: None,
                status: WorkOrderStatus::InProgress,
                gross_output: 0,
                produced_qty: 0,
                created_at: ts(2024, 3, 1, 8, 0),
            })
            .unwrap();
    }

    let replanner = CapacityCalendarReplanner::new(db.clone());
    let result = replanner
        .replan_active_orders(&test_config(), date(2024, 3, 4), 14, base_now())
        .unwrap();

    let outcome = &result.orders[0];
    assert!((outcome.pending_qty - 30.0).abs() < 1e-9);
    assert!((outcome.reserved_hours - 3.0).abs() < 1e-9);
    assert_eq!(outcome.new_finish, Some(date(2024, 3, 6)));
}

#[test]
fn test_orders_without_capacity_are_skipped_and_reported() {
    let (_tmp, db) = setup();
    seed_order(&db, "PO-X", "X", 10, ProductionOrderStatus::Ready, None, ts(2024, 3, 1, 8, 0));

    let replanner = CapacityCalendarReplanner::new(db.clone());
    let result = replanner
        .replan_active_orders(&test_config(), date(2024, 3, 4), 14, base_now())
        .unwrap();

    assert_eq!(result.orders_evaluated, 0);
    assert_eq!(result.issues.len(), 1);
    assert!(reservations(&db, "PO-X").is_empty());
}

#[test]
fn test_negative_lookahead_is_rejected() {
    let (_tmp, db) = setup();
    let replanner = CapacityCalendarReplanner::new(db);
    assert!(matches!(
        replanner.replan_active_orders(&test_config(), date(2024, 3, 4), -1, base_now()),
        Err(EngineError::InvalidInput(_))
    ));
}
