// ==========================================
// 产线排产核心 - SQLite 连接初始化与 Schema
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 每个触发事件一个事务（单写者: 进程内互斥 + IMMEDIATE 写锁）
// ==========================================

use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启（级联删除依赖它）
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 建表（幂等）
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id TEXT NOT NULL DEFAULT 'global',
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
);

-- ===== 参考数据 =====
CREATE TABLE IF NOT EXISTS supplier (
    supplier_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    min_order_qty REAL NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS raw_material (
    raw_material_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    supplier_id TEXT REFERENCES supplier(supplier_id),
    min_stock_threshold REAL NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS production_line (
    line_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    active INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS line_capacity (
    product_id TEXT NOT NULL,
    line_id TEXT NOT NULL REFERENCES production_line(line_id),
    units_per_hour REAL NOT NULL,
    PRIMARY KEY (product_id, line_id)
);

CREATE TABLE IF NOT EXISTS recipe_requirement (
    product_id TEXT NOT NULL,
    raw_material_id TEXT NOT NULL REFERENCES raw_material(raw_material_id),
    quantity_per_unit REAL NOT NULL,
    PRIMARY KEY (product_id, raw_material_id)
);

-- ===== 生产订单 =====
CREATE TABLE IF NOT EXISTS production_order (
    order_id TEXT PRIMARY KEY,
    product_id TEXT NOT NULL,
    quantity INTEGER NOT NULL CHECK (quantity > 0),
    status TEXT NOT NULL,
    planned_date TEXT,
    planned_start TEXT,
    planned_finish TEXT,
    finished_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_production_order_status ON production_order(status);

CREATE TABLE IF NOT EXISTS work_order (
    work_order_id TEXT PRIMARY KEY,
    production_order_id TEXT NOT NULL REFERENCES production_order(order_id) ON DELETE CASCADE,
    line_id TEXT NOT NULL REFERENCES production_line(line_id),
    batch_ref TEXT,
    quantity INTEGER NOT NULL,
    scheduled_start TEXT NOT NULL,
    scheduled_end TEXT NOT NULL,
    actual_start TEXT,
    actual_end TEXT,
    status TEXT NOT NULL,
    gross_output INTEGER NOT NULL DEFAULT 0,
    produced_qty INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_work_order_order ON work_order(production_order_id);
CREATE INDEX IF NOT EXISTS idx_work_order_line ON work_order(line_id, scheduled_start);

CREATE TABLE IF NOT EXISTS waste_record (
    waste_id TEXT PRIMARY KEY,
    work_order_id TEXT NOT NULL REFERENCES work_order(work_order_id) ON DELETE CASCADE,
    quantity INTEGER NOT NULL CHECK (quantity >= 0),
    reason TEXT,
    recorded_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS calendar_reservation (
    reservation_id TEXT PRIMARY KEY,
    production_order_id TEXT NOT NULL REFERENCES production_order(order_id) ON DELETE CASCADE,
    line_id TEXT NOT NULL REFERENCES production_line(line_id),
    work_date TEXT NOT NULL,
    hours_reserved REAL NOT NULL,
    quantity REAL NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_calendar_reservation_order ON calendar_reservation(production_order_id, work_date);
CREATE INDEX IF NOT EXISTS idx_calendar_reservation_line ON calendar_reservation(line_id, work_date);

-- ===== 物料 =====
CREATE TABLE IF NOT EXISTS material_lot (
    lot_id TEXT PRIMARY KEY,
    raw_material_id TEXT NOT NULL REFERENCES raw_material(raw_material_id),
    on_hand_qty REAL NOT NULL CHECK (on_hand_qty >= 0),
    expiry_date TEXT,
    received_at TEXT NOT NULL,
    status TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_material_lot_material ON material_lot(raw_material_id, status);

CREATE TABLE IF NOT EXISTS material_reservation (
    reservation_id TEXT PRIMARY KEY,
    production_order_id TEXT NOT NULL REFERENCES production_order(order_id) ON DELETE CASCADE,
    lot_id TEXT NOT NULL REFERENCES material_lot(lot_id),
    raw_material_id TEXT NOT NULL,
    quantity REAL NOT NULL CHECK (quantity > 0),
    status TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_material_reservation_order ON material_reservation(production_order_id, status);
CREATE INDEX IF NOT EXISTS idx_material_reservation_lot ON material_reservation(lot_id, status);

CREATE TABLE IF NOT EXISTS purchase_request (
    request_id TEXT PRIMARY KEY,
    supplier_id TEXT NOT NULL REFERENCES supplier(supplier_id),
    production_order_id TEXT NOT NULL REFERENCES production_order(order_id) ON DELETE CASCADE,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS purchase_request_line (
    request_id TEXT NOT NULL REFERENCES purchase_request(request_id) ON DELETE CASCADE,
    raw_material_id TEXT NOT NULL,
    shortfall_qty REAL NOT NULL,
    quantity REAL NOT NULL,
    PRIMARY KEY (request_id, raw_material_id)
);

-- ===== 销售订单 / 挂钩 =====
CREATE TABLE IF NOT EXISTS sales_order (
    sales_order_id TEXT PRIMARY KEY,
    customer_ref TEXT,
    delivery_date TEXT NOT NULL,
    status TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS sales_order_line (
    line_id TEXT PRIMARY KEY,
    sales_order_id TEXT NOT NULL REFERENCES sales_order(sales_order_id) ON DELETE CASCADE,
    product_id TEXT NOT NULL,
    quantity INTEGER NOT NULL,
    production_order_id TEXT REFERENCES production_order(order_id) ON DELETE SET NULL
);
CREATE INDEX IF NOT EXISTS idx_sales_order_line_peg ON sales_order_line(production_order_id);

-- ===== 审计 =====
CREATE TABLE IF NOT EXISTS audit_log (
    audit_id TEXT PRIMARY KEY,
    action TEXT NOT NULL,
    entity_ref TEXT,
    payload_json TEXT NOT NULL,
    created_at TEXT NOT NULL
);
"#;

// ==========================================
// Database - 共享连接句柄
// ==========================================
// 所有核心服务共享同一连接；触发事件在整个事务期间持有互斥锁
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// 打开数据库文件并建表
    pub fn open(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        init_schema(&conn)?;
        Ok(Self::from_connection(Arc::new(Mutex::new(conn))))
    }

    /// 内存数据库（测试/演算用）
    pub fn open_in_memory() -> RepositoryResult<Self> {
        let conn = Connection::open_in_memory()?;
        configure_sqlite_connection(&conn)?;
        init_schema(&conn)?;
        Ok(Self::from_connection(Arc::new(Mutex::new(conn))))
    }

    /// 从已有连接创建
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 共享连接（供 ConfigManager 等复用）
    pub fn shared_connection(&self) -> Arc<Mutex<Connection>> {
        self.conn.clone()
    }

    /// 获取数据库连接
    pub fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 在单个 IMMEDIATE 事务中执行闭包
    ///
    /// - 闭包返回 Ok: 提交
    /// - 闭包返回 Err: 事务随 drop 回滚，调用方看到原错误
    pub fn with_transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, E>,
        E: From<RepositoryError>,
    {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        let value = f(&tx)?;
        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(value)
    }
}
