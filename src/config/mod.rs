// ==========================================
// 产线排产核心 - 配置层
// ==========================================
// 职责: 系统配置管理
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod planning_config;
pub mod planning_config_trait;

use thiserror::Error;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
pub use planning_config::PlanningConfig;
pub use planning_config_trait::PlanningConfigReader;

/// 配置层错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置值非法 (key={key}): {message}")]
    InvalidValue { key: String, message: String },

    #[error("配置读取失败: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("配置锁获取失败: {0}")]
    Lock(String),

    #[error("配置序列化失败: {0}")]
    Serialization(#[from] serde_json::Error),
}
