// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的数据库初始化、参考数据与订单种子
// ==========================================
#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use production_aps::config::PlanningConfig;
use production_aps::db::Database;
use production_aps::domain::material::MaterialLot;
use production_aps::domain::order::ProductionOrder;
use production_aps::domain::recipe::{
    LineCapacity, ProductionLine, RawMaterial, RecipeRequirement, Supplier,
};
use production_aps::domain::sales::{SalesOrder, SalesOrderLine};
use production_aps::domain::types::{LotStatus, ProductionOrderStatus, SalesOrderStatus};
use production_aps::repository::{
    MaterialLotRepository, MaterialReservationRepository, ProductionOrderRepository,
    ReferenceDataRepository, SalesOrderRepository,
};
use tempfile::NamedTempFile;

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - Database: 已建表的数据库句柄
pub fn create_test_db() -> (NamedTempFile, Database) {
    production_aps::logging::init_test();
    let temp_file = NamedTempFile::new().unwrap();
    let db_path = temp_file.path().to_str().unwrap().to_string();
    let db = Database::open(&db_path).unwrap();
    (temp_file, db)
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn ts(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
    date(y, m, d).and_hms_opt(h, min, 0).unwrap()
}

/// 测试基准时刻: 2024-03-04 (周一) 08:00
pub fn base_now() -> NaiveDateTime {
    ts(2024, 3, 4, 8, 0)
}

/// 测试配置: 批次 [10, 20]，时间窗 1 天
pub fn test_config() -> PlanningConfig {
    PlanningConfig {
        working_hours_per_day: 8.0,
        min_batch_size: 10,
        max_batch_size: 20,
        schedule_horizon_minutes: 1440,
        replan_min_lead_days: 2,
        delivery_buffer_days: 2,
        solver_time_limit_ms: 2_000,
        working_weekdays: vec![1, 2, 3, 4, 5],
    }
}

// ==========================================
// 参考数据种子
// ==========================================

pub fn seed_line(db: &Database, line_id: &str, active: bool) {
    let conn = db.get_conn().unwrap();
    ReferenceDataRepository::new(&conn)
        .upsert_line(&ProductionLine {
            line_id: line_id.to_string(),
            name: format!("产线{}", line_id),
            active,
        })
        .unwrap();
}

pub fn seed_capacity(db: &Database, product_id: &str, line_id: &str, units_per_hour: f64) {
    let conn = db.get_conn().unwrap();
    ReferenceDataRepository::new(&conn)
        .upsert_capacity(&LineCapacity {
            product_id: product_id.to_string(),
            line_id: line_id.to_string(),
            units_per_hour,
        })
        .unwrap();
}

pub fn seed_supplier(db: &Database, supplier_id: &str, min_order_qty: f64) {
    let conn = db.get_conn().unwrap();
    ReferenceDataRepository::new(&conn)
        .upsert_supplier(&Supplier {
            supplier_id: supplier_id.to_string(),
            name: format!("供应商{}", supplier_id),
            min_order_qty,
        })
        .unwrap();
}

pub fn seed_raw_material(db: &Database, raw_material_id: &str, supplier_id: Option<&str>, threshold: f64) {
    let conn = db.get_conn().unwrap();
    ReferenceDataRepository::new(&conn)
        .upsert_raw_material(&RawMaterial {
            raw_material_id: raw_material_id.to_string(),
            name: format!("原料{}", raw_material_id),
            supplier_id: supplier_id.map(str::to_string),
            min_stock_threshold: threshold,
        })
        .unwrap();
}

pub fn seed_recipe(db: &Database, product_id: &str, raw_material_id: &str, quantity_per_unit: f64) {
    let conn = db.get_conn().unwrap();
    ReferenceDataRepository::new(&conn)
        .upsert_recipe(&RecipeRequirement {
            product_id: product_id.to_string(),
            raw_material_id: raw_material_id.to_string(),
            quantity_per_unit,
        })
        .unwrap();
}

pub fn seed_lot(db: &Database, lot_id: &str, raw_material_id: &str, qty: f64, expiry: Option<NaiveDate>) {
    let conn = db.get_conn().unwrap();
    MaterialLotRepository::new(&conn)
        .insert(&MaterialLot {
            lot_id: lot_id.to_string(),
            raw_material_id: raw_material_id.to_string(),
            on_hand_qty: qty,
            expiry_date: expiry,
            received_at: base_now(),
            status: LotStatus::Available,
        })
        .unwrap();
}

/// 直接插入指定状态的订单（绕过预留流程）
pub fn seed_order(
    db: &Database,
    order_id: &str,
    product_id: &str,
    quantity: i64,
    status: ProductionOrderStatus,
    planned_date: Option<NaiveDate>,
    created_at: NaiveDateTime,
) {
    let conn = db.get_conn().unwrap();
    let mut order = ProductionOrder::new(
        order_id.to_string(),
        product_id.to_string(),
        quantity,
        planned_date,
        created_at,
    );
    order.status = status;
    ProductionOrderRepository::new(&conn).insert(&order).unwrap();
}

/// 销售订单 + 单行，并挂钩到生产订单
pub fn seed_pegged_sales_order(
    db: &Database,
    sales_order_id: &str,
    production_order_id: &str,
    product_id: &str,
    delivery_date: NaiveDate,
) {
    let conn = db.get_conn().unwrap();
    let repo = SalesOrderRepository::new(&conn);
    repo.insert_order(&SalesOrder {
        sales_order_id: sales_order_id.to_string(),
        customer_ref: None,
        delivery_date,
        status: SalesOrderStatus::Open,
    })
    .unwrap();
    repo.insert_line(&SalesOrderLine {
        line_id: format!("{}-1", sales_order_id),
        sales_order_id: sales_order_id.to_string(),
        product_id: product_id.to_string(),
        quantity: 1,
        production_order_id: Some(production_order_id.to_string()),
    })
    .unwrap();
}

/// 标准物料场景: 产品 P 每件需 2 单位原料 R，R 由 S1 供应（MOQ 40，低库存阈值 10）
pub fn seed_material_scenario(db: &Database) {
    seed_supplier(db, "S1", 40.0);
    seed_raw_material(db, "R", Some("S1"), 10.0);
    seed_recipe(db, "P", "R", 2.0);
    seed_line(db, "L1", true);
    seed_capacity(db, "P", "L1", 10.0);
}

pub fn get_order(db: &Database, order_id: &str) -> ProductionOrder {
    let conn = db.get_conn().unwrap();
    ProductionOrderRepository::new(&conn).get(order_id).unwrap()
}

pub fn get_lot(db: &Database, lot_id: &str) -> MaterialLot {
    let conn = db.get_conn().unwrap();
    MaterialLotRepository::new(&conn).get(lot_id).unwrap()
}

/// 批次守恒: on_hand >= Σ(ACTIVE 预留)
pub fn assert_lot_conserved(db: &Database, lot_id: &str) {
    let conn = db.get_conn().unwrap();
    let lot = MaterialLotRepository::new(&conn).get(lot_id).unwrap();
    let active = MaterialReservationRepository::new(&conn)
        .active_sum_by_lot(lot_id)
        .unwrap();
    assert!(
        lot.on_hand_qty + 1e-9 >= active,
        "批次 {} 在库 {} < 有效预留 {}",
        lot_id,
        lot.on_hand_qty,
        active
    );
}
