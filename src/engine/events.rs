// ==========================================
// 产线排产核心 - 引擎层事件发布
// ==========================================
// 职责: 定义低库存信号发布 trait，实现依赖倒置
// 说明: Engine 层定义 trait，通知投递（邮件/群消息）由外部实现
// 时机: 事务提交后发布；发布失败只记录告警，不回滚
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::{Arc, Mutex};

/// 低库存信号
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LowStockSignal {
    pub raw_material_id: String,
    /// 可用量 = Σ可用批次在库 − Σ有效预留
    pub available_qty: f64,
    pub threshold: f64,
    /// 触发来源（订单ID）
    pub source_order_id: Option<String>,
    pub raised_at: NaiveDateTime,
}

// ==========================================
// 事件发布 Trait
// ==========================================

/// 低库存信号发布者 Trait
///
/// # 返回
/// - `Ok(id)`: 外部投递 ID（如果支持）或空字符串
/// - `Err`: 发布失败（调用方记录告警）
pub trait StockAlertPublisher: Send + Sync {
    fn publish(&self, signal: LowStockSignal) -> Result<String, Box<dyn Error + Send + Sync>>;
}

/// 空操作发布者（默认）
#[derive(Debug, Clone, Default)]
pub struct NoOpStockAlertPublisher;

impl StockAlertPublisher for NoOpStockAlertPublisher {
    fn publish(&self, signal: LowStockSignal) -> Result<String, Box<dyn Error + Send + Sync>> {
        tracing::debug!(
            "NoOpStockAlertPublisher: 跳过低库存信号 - raw_material_id={}, available={:.3}, threshold={:.3}",
            signal.raw_material_id,
            signal.available_qty,
            signal.threshold
        );
        Ok(String::new())
    }
}

/// 记录型发布者：保存收到的信号（测试与演算用）
#[derive(Debug, Clone, Default)]
pub struct RecordingStockAlertPublisher {
    signals: Arc<Mutex<Vec<LowStockSignal>>>,
}

impl RecordingStockAlertPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signals(&self) -> Vec<LowStockSignal> {
        self.signals
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl StockAlertPublisher for RecordingStockAlertPublisher {
    fn publish(&self, signal: LowStockSignal) -> Result<String, Box<dyn Error + Send + Sync>> {
        let mut guard = self
            .signals
            .lock()
            .map_err(|e| format!("信号记录锁获取失败: {}", e))?;
        guard.push(signal);
        Ok(guard.len().to_string())
    }
}

/// 逐个发布信号，失败只告警
pub fn publish_all(publisher: &dyn StockAlertPublisher, signals: &[LowStockSignal]) {
    for signal in signals {
        if let Err(e) = publisher.publish(signal.clone()) {
            tracing::warn!(
                raw_material_id = %signal.raw_material_id,
                error = %e,
                "低库存信号发布失败"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn signal(material: &str) -> LowStockSignal {
        LowStockSignal {
            raw_material_id: material.to_string(),
            available_qty: 3.0,
            threshold: 10.0,
            source_order_id: Some("PO1".to_string()),
            raised_at: NaiveDate::from_ymd_opt(2026, 3, 2)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn test_noop_publisher() {
        let result = NoOpStockAlertPublisher.publish(signal("R1"));
        assert!(result.unwrap().is_empty());
    }

    #[test]
    fn test_recording_publisher_keeps_signals() {
        let publisher = RecordingStockAlertPublisher::new();
        publish_all(&publisher, &[signal("R1"), signal("R2")]);

        let received = publisher.signals();
        assert_eq!(received.len(), 2);
        assert_eq!(received[1].raw_material_id, "R2");
    }
}
