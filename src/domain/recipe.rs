// ==========================================
// 产线排产核心 - 配方与产能参考数据
// ==========================================
// 静态参考数据，每次调用加载为只读查找表
// ==========================================

use serde::{Deserialize, Serialize};

/// 配方行（BOM）：单位产品所需原料数量
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeRequirement {
    pub product_id: String,
    pub raw_material_id: String,
    pub quantity_per_unit: f64,
}

/// 产线对某产品的产能（件/小时）
///
/// 缺失或 <= 0 表示该产线不能生产该产品
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineCapacity {
    pub product_id: String,
    pub line_id: String,
    pub units_per_hour: f64,
}

/// 产线
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionLine {
    pub line_id: String,
    pub name: String,
    pub active: bool, // 停用产线不参与排产
}

/// 原料主数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMaterial {
    pub raw_material_id: String,
    pub name: String,
    pub supplier_id: Option<String>, // 指定供应商（缺料采购分组依据）
    pub min_stock_threshold: f64,    // 低库存预警阈值
}

/// 供应商
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Supplier {
    pub supplier_id: String,
    pub name: String,
    pub min_order_qty: f64, // 最小起订量
}
