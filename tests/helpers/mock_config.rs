// ==========================================
// Mock 配置实现 - 用于集成测试
// ==========================================

use async_trait::async_trait;
use production_aps::config::{ConfigError, PlanningConfig, PlanningConfigReader};

/// 固定配置读取器
#[derive(Debug, Clone)]
pub struct MockPlanningConfig {
    pub config: PlanningConfig,
}

impl MockPlanningConfig {
    pub fn new(config: PlanningConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl PlanningConfigReader for MockPlanningConfig {
    async fn get_working_hours_per_day(&self) -> Result<f64, ConfigError> {
        Ok(self.config.working_hours_per_day)
    }

    async fn get_batch_bounds(&self) -> Result<(i64, i64), ConfigError> {
        Ok((self.config.min_batch_size, self.config.max_batch_size))
    }

    async fn get_schedule_horizon_minutes(&self) -> Result<i64, ConfigError> {
        Ok(self.config.schedule_horizon_minutes)
    }

    async fn get_replan_min_lead_days(&self) -> Result<i64, ConfigError> {
        Ok(self.config.replan_min_lead_days)
    }

    async fn get_delivery_buffer_days(&self) -> Result<i64, ConfigError> {
        Ok(self.config.delivery_buffer_days)
    }

    async fn get_solver_time_limit_ms(&self) -> Result<u64, ConfigError> {
        Ok(self.config.solver_time_limit_ms)
    }

    async fn get_working_weekdays(&self) -> Result<Vec<u32>, ConfigError> {
        Ok(self.config.working_weekdays.clone())
    }
}
