// ==========================================
// 产线排产核心 - 排产配置快照
// ==========================================
// 每次调用加载一次，显式传入各引擎
// ==========================================

use crate::config::ConfigError;
use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 排产配置快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanningConfig {
    /// 每条产线每日可用工时上限
    pub working_hours_per_day: f64,
    /// 批次下限 m
    pub min_batch_size: i64,
    /// 批次上限 M
    pub max_batch_size: i64,
    /// 排产时间窗（分钟）
    pub schedule_horizon_minutes: i64,
    /// 重排最小提前期（天），cutoff = 模拟日 + 该值
    pub replan_min_lead_days: i64,
    /// 交期缓冲（天）
    pub delivery_buffer_days: i64,
    /// 求解时限（毫秒）
    pub solver_time_limit_ms: u64,
    /// 每周工作日（ISO: 1=周一 … 7=周日）
    pub working_weekdays: Vec<u32>,
}

impl Default for PlanningConfig {
    fn default() -> Self {
        Self {
            working_hours_per_day: 8.0,
            min_batch_size: 10,
            max_batch_size: 100,
            schedule_horizon_minutes: 1440,
            replan_min_lead_days: 2,
            delivery_buffer_days: 2,
            solver_time_limit_ms: 5_000,
            working_weekdays: vec![1, 2, 3, 4, 5],
        }
    }
}

impl PlanningConfig {
    /// 配置合法性校验（任何变更前执行）
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.working_hours_per_day > 0.0 && self.working_hours_per_day <= 24.0) {
            return Err(ConfigError::InvalidValue {
                key: "working_hours_per_day".to_string(),
                message: format!("须在 (0, 24] 内, 实际 {}", self.working_hours_per_day),
            });
        }
        if self.min_batch_size < 1 {
            return Err(ConfigError::InvalidValue {
                key: "min_batch_size".to_string(),
                message: format!("须 >= 1, 实际 {}", self.min_batch_size),
            });
        }
        if self.min_batch_size >= self.max_batch_size {
            return Err(ConfigError::InvalidValue {
                key: "max_batch_size".to_string(),
                message: format!(
                    "批次下限 {} 须小于上限 {}",
                    self.min_batch_size, self.max_batch_size
                ),
            });
        }
        if self.schedule_horizon_minutes <= 0 {
            return Err(ConfigError::InvalidValue {
                key: "schedule_horizon_minutes".to_string(),
                message: format!("须 > 0, 实际 {}", self.schedule_horizon_minutes),
            });
        }
        if self.replan_min_lead_days < 0 || self.delivery_buffer_days < 0 {
            return Err(ConfigError::InvalidValue {
                key: "replan_min_lead_days/delivery_buffer_days".to_string(),
                message: "天数不能为负".to_string(),
            });
        }
        if self.working_weekdays.is_empty()
            || self.working_weekdays.iter().any(|d| !(1..=7).contains(d))
        {
            return Err(ConfigError::InvalidValue {
                key: "working_weekdays".to_string(),
                message: format!("须为 1..=7 的非空列表, 实际 {:?}", self.working_weekdays),
            });
        }
        Ok(())
    }

    /// 工作日集合
    pub fn weekdays(&self) -> Vec<Weekday> {
        self.working_weekdays
            .iter()
            .filter_map(|d| match d {
                1 => Some(Weekday::Mon),
                2 => Some(Weekday::Tue),
                3 => Some(Weekday::Wed),
                4 => Some(Weekday::Thu),
                5 => Some(Weekday::Fri),
                6 => Some(Weekday::Sat),
                7 => Some(Weekday::Sun),
                _ => None,
            })
            .collect()
    }

    pub fn solver_time_limit(&self) -> Duration {
        Duration::from_millis(self.solver_time_limit_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(PlanningConfig::default().validate().is_ok());
    }

    #[test]
    fn test_batch_bounds_must_be_ordered() {
        let config = PlanningConfig {
            min_batch_size: 20,
            max_batch_size: 20,
            ..PlanningConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref key, .. }) if key == "max_batch_size"
        ));
    }

    #[test]
    fn test_weekdays_mapping() {
        let config = PlanningConfig {
            working_weekdays: vec![1, 6],
            ..PlanningConfig::default()
        };
        assert_eq!(config.weekdays(), vec![Weekday::Mon, Weekday::Sat]);
    }
}
