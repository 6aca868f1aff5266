// ==========================================
// 产线排产核心 - 配方与产能查找表
// ==========================================
// 只读查找表：每次调用加载一次，显式传入各引擎
// 不含状态变更
// ==========================================

use crate::domain::recipe::{LineCapacity, ProductionLine, RecipeRequirement};
use crate::repository::error::RepositoryResult;
use crate::repository::ReferenceDataRepository;
use rusqlite::Connection;
use std::collections::{BTreeMap, BTreeSet, HashMap};

// ==========================================
// RecipeBook - 配方表
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct RecipeBook {
    by_product: HashMap<String, Vec<RecipeRequirement>>,
}

impl RecipeBook {
    pub fn new(requirements: Vec<RecipeRequirement>) -> Self {
        let mut by_product: HashMap<String, Vec<RecipeRequirement>> = HashMap::new();
        for req in requirements {
            by_product.entry(req.product_id.clone()).or_default().push(req);
        }
        for reqs in by_product.values_mut() {
            reqs.sort_by(|a, b| a.raw_material_id.cmp(&b.raw_material_id));
        }
        Self { by_product }
    }

    /// 产品的配方行
    pub fn requirements(&self, product_id: &str) -> &[RecipeRequirement] {
        self.by_product
            .get(product_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn has_recipe(&self, product_id: &str) -> bool {
        !self.requirements(product_id).is_empty()
    }

    /// 配方引用某原料的产品集合
    pub fn products_using(&self, raw_material_id: &str) -> BTreeSet<String> {
        self.by_product
            .iter()
            .filter(|(_, reqs)| reqs.iter().any(|r| r.raw_material_id == raw_material_id))
            .map(|(product, _)| product.clone())
            .collect()
    }

    /// 订单需求量：配方数量 × 订单数量
    pub fn required_quantities(&self, product_id: &str, quantity: i64) -> Vec<(String, f64)> {
        self.requirements(product_id)
            .iter()
            .map(|r| (r.raw_material_id.clone(), r.quantity_per_unit * quantity as f64))
            .collect()
    }
}

// ==========================================
// CapacityTable - 产线产能表
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct CapacityTable {
    // product -> (line -> 件/小时)，仅包含可运行产线且产能 > 0
    rates: HashMap<String, BTreeMap<String, f64>>,
}

impl CapacityTable {
    /// 构建产能表：停用产线、产能缺失或 <= 0 的组合被剔除
    pub fn new(lines: &[ProductionLine], capacities: Vec<LineCapacity>) -> Self {
        let operable: BTreeSet<&str> = lines
            .iter()
            .filter(|l| l.active)
            .map(|l| l.line_id.as_str())
            .collect();

        let mut rates: HashMap<String, BTreeMap<String, f64>> = HashMap::new();
        for cap in capacities {
            if cap.units_per_hour <= 0.0 || !cap.units_per_hour.is_finite() {
                continue;
            }
            if !operable.contains(cap.line_id.as_str()) {
                continue;
            }
            rates
                .entry(cap.product_id)
                .or_default()
                .insert(cap.line_id, cap.units_per_hour);
        }
        Self { rates }
    }

    /// 产线对产品的产能；不可生产时返回 None
    pub fn rate(&self, product_id: &str, line_id: &str) -> Option<f64> {
        self.rates
            .get(product_id)
            .and_then(|lines| lines.get(line_id))
            .copied()
    }

    /// 可生产该产品的产线（按产线ID排序）
    pub fn compatible_lines(&self, product_id: &str) -> Vec<(String, f64)> {
        self.rates
            .get(product_id)
            .map(|lines| lines.iter().map(|(l, r)| (l.clone(), *r)).collect())
            .unwrap_or_default()
    }

    /// 所有兼容产线并行时的合计产能
    pub fn aggregate_rate(&self, product_id: &str) -> f64 {
        self.rates
            .get(product_id)
            .map(|lines| lines.values().sum())
            .unwrap_or(0.0)
    }

    pub fn can_produce(&self, product_id: &str) -> bool {
        self.aggregate_rate(product_id) > 0.0
    }
}

// ==========================================
// ReferenceData - 一次加载的参考数据
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct ReferenceData {
    pub recipes: RecipeBook,
    pub capacities: CapacityTable,
    pub lines: Vec<ProductionLine>,
}

impl ReferenceData {
    pub fn load(conn: &Connection) -> RepositoryResult<Self> {
        let repo = ReferenceDataRepository::new(conn);
        let lines = repo.list_lines()?;
        let capacities = CapacityTable::new(&lines, repo.list_capacities()?);
        let recipes = RecipeBook::new(repo.list_recipes()?);
        Ok(Self {
            recipes,
            capacities,
            lines,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(id: &str, active: bool) -> ProductionLine {
        ProductionLine {
            line_id: id.to_string(),
            name: id.to_string(),
            active,
        }
    }

    fn cap(product: &str, line: &str, rate: f64) -> LineCapacity {
        LineCapacity {
            product_id: product.to_string(),
            line_id: line.to_string(),
            units_per_hour: rate,
        }
    }

    #[test]
    fn test_capacity_table_excludes_zero_and_inactive_lines() {
        let lines = vec![line("L1", true), line("L2", true), line("L3", false)];
        let table = CapacityTable::new(
            &lines,
            vec![cap("P", "L1", 10.0), cap("P", "L2", 0.0), cap("P", "L3", 50.0)],
        );

        assert_eq!(table.rate("P", "L1"), Some(10.0));
        assert_eq!(table.rate("P", "L2"), None);
        assert_eq!(table.rate("P", "L3"), None);
        assert_eq!(table.compatible_lines("P"), vec![("L1".to_string(), 10.0)]);
        assert!(!table.can_produce("Q"));
    }

    #[test]
    fn test_recipe_required_quantities() {
        let book = RecipeBook::new(vec![
            RecipeRequirement {
                product_id: "P".into(),
                raw_material_id: "R".into(),
                quantity_per_unit: 2.0,
            },
            RecipeRequirement {
                product_id: "Q".into(),
                raw_material_id: "R".into(),
                quantity_per_unit: 0.5,
            },
        ]);

        assert_eq!(book.required_quantities("P", 25), vec![("R".to_string(), 50.0)]);
        assert_eq!(book.products_using("R").len(), 2);
        assert!(book.required_quantities("Z", 10).is_empty());
    }
}
