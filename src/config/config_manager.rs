// ==========================================
// 产线排产核心 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::planning_config_trait::PlanningConfigReader;
use crate::config::ConfigError;
use crate::db::open_sqlite_connection;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, ConfigError> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, ConfigError> {
        {
            let conn_guard = conn
                .lock()
                .map_err(|e| ConfigError::Lock(e.to_string()))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> Result<Option<String>, ConfigError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| ConfigError::Lock(e.to_string()))?;

        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, ConfigError> {
        self.get_config_value(key)
    }

    /// 读取并解析配置，不存在时取默认值；格式错误报错
    fn get_parsed_or_default<T: FromStr>(&self, key: &str, default: T) -> Result<T, ConfigError> {
        match self.get_config_value(key)? {
            Some(raw) => raw.trim().parse::<T>().map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("无法解析: {}", raw),
            }),
            None => Ok(default),
        }
    }

    /// 写入（覆盖）global 配置
    pub fn set_value(&self, key: &str, value: &str) -> Result<(), ConfigError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| ConfigError::Lock(e.to_string()))?;
        conn.execute(
            r#"
            INSERT INTO config_kv (scope_id, key, value, updated_at)
            VALUES ('global', ?1, ?2, datetime('now'))
            ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')
            "#,
            params![key, value],
        )?;
        tracing::info!(config_key = key, value = value, "配置已更新");
        Ok(())
    }

    /// 获取所有配置的快照（JSON格式）
    ///
    /// # 用途
    /// - 排产/重排结果中记录配置快照，便于追溯
    pub fn get_config_snapshot(&self) -> Result<String, ConfigError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| ConfigError::Lock(e.to_string()))?;

        let mut stmt = conn
            .prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }
}

// ==========================================
// PlanningConfigReader Trait 实现
// ==========================================
#[async_trait]
impl PlanningConfigReader for ConfigManager {
    async fn get_working_hours_per_day(&self) -> Result<f64, ConfigError> {
        self.get_parsed_or_default(config_keys::WORKING_HOURS_PER_DAY, 8.0)
    }

    async fn get_batch_bounds(&self) -> Result<(i64, i64), ConfigError> {
        let min = self.get_parsed_or_default(config_keys::MIN_BATCH_SIZE, 10)?;
        let max = self.get_parsed_or_default(config_keys::MAX_BATCH_SIZE, 100)?;
        Ok((min, max))
    }

    async fn get_schedule_horizon_minutes(&self) -> Result<i64, ConfigError> {
        self.get_parsed_or_default(config_keys::SCHEDULE_HORIZON_MINUTES, 1440)
    }

    async fn get_replan_min_lead_days(&self) -> Result<i64, ConfigError> {
        self.get_parsed_or_default(config_keys::REPLAN_MIN_LEAD_DAYS, 2)
    }

    async fn get_delivery_buffer_days(&self) -> Result<i64, ConfigError> {
        self.get_parsed_or_default(config_keys::DELIVERY_BUFFER_DAYS, 2)
    }

    async fn get_solver_time_limit_ms(&self) -> Result<u64, ConfigError> {
        self.get_parsed_or_default(config_keys::SOLVER_TIME_LIMIT_MS, 5_000)
    }

    async fn get_working_weekdays(&self) -> Result<Vec<u32>, ConfigError> {
        let Some(raw) = self.get_config_value(config_keys::WORKING_WEEKDAYS)? else {
            return Ok(vec![1, 2, 3, 4, 5]);
        };

        let mut days = Vec::new();
        for token in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let day = token.parse::<u32>().map_err(|_| ConfigError::InvalidValue {
                key: config_keys::WORKING_WEEKDAYS.to_string(),
                message: format!("无法解析: {}", token),
            })?;
            if !days.contains(&day) {
                days.push(day);
            }
        }
        days.sort_unstable();
        Ok(days)
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 产能
    pub const WORKING_HOURS_PER_DAY: &str = "working_hours_per_day";
    pub const WORKING_WEEKDAYS: &str = "working_weekdays";

    // 批次拆分
    pub const MIN_BATCH_SIZE: &str = "min_batch_size";
    pub const MAX_BATCH_SIZE: &str = "max_batch_size";

    // 约束排产
    pub const SCHEDULE_HORIZON_MINUTES: &str = "schedule_horizon_minutes";
    pub const SOLVER_TIME_LIMIT_MS: &str = "solver_time_limit_ms";

    // 日历重排
    pub const REPLAN_MIN_LEAD_DAYS: &str = "replan_min_lead_days";
    pub const DELIVERY_BUFFER_DAYS: &str = "delivery_buffer_days";
}
