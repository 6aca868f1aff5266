// ==========================================
// 产线排产核心 - 引擎层错误类型
// ==========================================
// 可恢复问题（配置缺失/不可排/无解）聚合在结果中返回，不走错误
// 只有不变量违反与输入校验失败以错误返回（并回滚当前事务）
// ==========================================

use crate::config::ConfigError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// 一致性违反（如结算时在库不足以扣减预留），当前事务回滚
    #[error("一致性违反: {0}")]
    ConsistencyViolation(String),

    /// 输入校验失败，发生在任何变更之前
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("无效的状态转换: entity={entity}, from={from} to={to}")]
    InvalidStateTransition {
        entity: String,
        from: String,
        to: String,
    },

    #[error("资源未找到: {entity} with id={id}")]
    NotFound { entity: String, id: String },

    #[error("配置缺失: {0}")]
    Configuration(String),

    #[error("求解器错误: {0}")]
    Solver(String),
}

impl EngineError {
    pub fn invalid_transition(entity: &str, from: impl ToString, to: impl ToString) -> Self {
        EngineError::InvalidStateTransition {
            entity: entity.to_string(),
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
