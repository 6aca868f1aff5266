// ==========================================
// 产线排产核心 - 排产配置读取 Trait
// ==========================================
// 职责: 定义引擎所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::config::{ConfigError, PlanningConfig};
use async_trait::async_trait;

// ==========================================
// PlanningConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait PlanningConfigReader: Send + Sync {
    /// 每日工时上限
    ///
    /// # 默认值
    /// - 8
    async fn get_working_hours_per_day(&self) -> Result<f64, ConfigError>;

    /// 批次上下限 (m, M)
    ///
    /// # 默认值
    /// - (10, 100)
    async fn get_batch_bounds(&self) -> Result<(i64, i64), ConfigError>;

    /// 排产时间窗（分钟）
    ///
    /// # 默认值
    /// - 1440
    async fn get_schedule_horizon_minutes(&self) -> Result<i64, ConfigError>;

    /// 重排最小提前期（天）
    ///
    /// # 默认值
    /// - 2（后天）
    async fn get_replan_min_lead_days(&self) -> Result<i64, ConfigError>;

    /// 交期缓冲（天）
    ///
    /// # 默认值
    /// - 2
    async fn get_delivery_buffer_days(&self) -> Result<i64, ConfigError>;

    /// 求解时限（毫秒）
    ///
    /// # 默认值
    /// - 5000
    async fn get_solver_time_limit_ms(&self) -> Result<u64, ConfigError>;

    /// 每周工作日（ISO 编号）
    ///
    /// # 默认值
    /// - [1, 2, 3, 4, 5]
    async fn get_working_weekdays(&self) -> Result<Vec<u32>, ConfigError>;

    /// 加载并校验完整配置快照
    async fn load_planning_config(&self) -> Result<PlanningConfig, ConfigError> {
        let (min_batch_size, max_batch_size) = self.get_batch_bounds().await?;
        let config = PlanningConfig {
            working_hours_per_day: self.get_working_hours_per_day().await?,
            min_batch_size,
            max_batch_size,
            schedule_horizon_minutes: self.get_schedule_horizon_minutes().await?,
            replan_min_lead_days: self.get_replan_min_lead_days().await?,
            delivery_buffer_days: self.get_delivery_buffer_days().await?,
            solver_time_limit_ms: self.get_solver_time_limit_ms().await?,
            working_weekdays: self.get_working_weekdays().await?,
        };
        config.validate()?;
        Ok(config)
    }
}
