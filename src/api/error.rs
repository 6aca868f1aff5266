// ==========================================
// 产线排产核心 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，转换引擎/仓储错误为调用方可读的错误消息
// ==========================================

use crate::config::ConfigError;
use crate::engine::error::EngineError;
use crate::importer::ImportError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    #[error("无效的状态转换: {entity} from={from} to={to}")]
    InvalidStateTransition {
        entity: String,
        from: String,
        to: String,
    },

    /// 一致性违反（当前事务已回滚）
    #[error("一致性违反: {0}")]
    ConsistencyViolation(String),

    // ==========================================
    // 配置错误
    // ==========================================
    #[error("配置错误: {0}")]
    ConfigError(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    // ==========================================
    // 导入错误
    // ==========================================
    #[error("文件导入失败: {0}")]
    ImportError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("外键约束违反: {}", msg))
            }
            RepositoryError::CheckConstraintViolation(msg) => {
                ApiError::InvalidInput(format!("检查约束违反: {}", msg))
            }
            RepositoryError::BusinessRuleViolation(msg) => ApiError::BusinessRuleViolation(msg),
            RepositoryError::SerializationError(msg) => ApiError::InternalError(msg),
        }
    }
}

// ==========================================
// 从 EngineError 转换
// ==========================================
impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Repository(e) => e.into(),
            EngineError::Config(e) => e.into(),
            EngineError::ConsistencyViolation(msg) => ApiError::ConsistencyViolation(msg),
            EngineError::InvalidInput(msg) => ApiError::InvalidInput(msg),
            EngineError::InvalidStateTransition { entity, from, to } => {
                ApiError::InvalidStateTransition { entity, from, to }
            }
            EngineError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            EngineError::Configuration(msg) => ApiError::ConfigError(msg),
            EngineError::Solver(msg) => ApiError::InternalError(format!("求解器错误: {}", msg)),
        }
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}

impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::Repository(e) => e.into(),
            other => ApiError::ImportError(other.to_string()),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_through_engine_error() {
        let err: ApiError = EngineError::from(RepositoryError::not_found("ProductionOrder", "PO1")).into();
        match err {
            ApiError::NotFound(msg) => assert!(msg.contains("PO1")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_state_transition_keeps_entity() {
        let err: ApiError = EngineError::invalid_transition("WorkOrder", "PENDING", "COMPLETED").into();
        assert!(err.to_string().contains("WorkOrder"));
    }
}
