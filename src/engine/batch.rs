// ==========================================
// 产线排产核心 - 批次拆分
// ==========================================
// 规则:
// 1) 依次按上限 M 切分
// 2) 末批 < 下限 m 时并入前一批（不单独成批）
// 3) 总量 < m 时整体为一批
// ==========================================

use serde::{Deserialize, Serialize};

/// 子批次
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubBatch {
    pub batch_ref: String, // 稳定序列号: <订单ID>-B<nnn>
    pub order_id: String,
    pub product_id: String,
    pub sequence: usize, // 订单内序号（从 1 开始）
    pub quantity: i64,
}

/// 批次拆分器
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchDecomposer {
    min_batch: i64,
    max_batch: i64,
}

impl BatchDecomposer {
    /// 调用方须保证 1 <= min_batch < max_batch（由 PlanningConfig::validate 校验）
    pub fn new(min_batch: i64, max_batch: i64) -> Self {
        Self {
            min_batch,
            max_batch,
        }
    }

    /// 拆分数量，返回各批大小
    pub fn split(&self, pending: i64) -> Vec<i64> {
        if pending <= 0 {
            return Vec::new();
        }
        if pending < self.min_batch {
            return vec![pending];
        }

        let mut sizes = Vec::new();
        let mut remaining = pending;
        while remaining > 0 {
            let take = remaining.min(self.max_batch);
            sizes.push(take);
            remaining -= take;
        }

        if sizes.len() > 1 {
            if let Some(&last) = sizes.last() {
                if last < self.min_batch {
                    sizes.pop();
                    if let Some(prev) = sizes.last_mut() {
                        *prev += last;
                    }
                }
            }
        }
        sizes
    }

    /// 拆分一个订单的待排数量
    pub fn decompose(&self, order_id: &str, product_id: &str, pending: i64) -> Vec<SubBatch> {
        self.split(pending)
            .into_iter()
            .enumerate()
            .map(|(idx, quantity)| SubBatch {
                batch_ref: format!("{}-B{:03}", order_id, idx + 1),
                order_id: order_id.to_string(),
                product_id: product_id.to_string(),
                sequence: idx + 1,
                quantity,
            })
            .collect()
    }
}
