// ==========================================
// 产线排产核心 - 参考数据导入器
// ==========================================
// 流程: CSV 解析 → 逐行字段校验 → 有效行单事务写入
// - 校验失败的行跳过并计入违规明细，不阻断其他行
// - 数据库写入失败则整批回滚
// ==========================================

use crate::db::Database;
use crate::domain::material::MaterialLot;
use crate::domain::recipe::{LineCapacity, ProductionLine, RawMaterial, RecipeRequirement, Supplier};
use crate::domain::sales::{SalesOrder, SalesOrderLine};
use crate::domain::types::{LotStatus, SalesOrderStatus};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::{CsvParser, RawRow};
use crate::repository::{MaterialLotRepository, ReferenceDataRepository, SalesOrderRepository};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{info, instrument, warn};

// ==========================================
// ImportKind - 导入数据类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportKind {
    Lines,
    Capacities,
    Suppliers,
    RawMaterials,
    Recipes,
    Lots,
    SalesOrders,
}

impl ImportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportKind::Lines => "lines",
            ImportKind::Capacities => "capacities",
            ImportKind::Suppliers => "suppliers",
            ImportKind::RawMaterials => "raw_materials",
            ImportKind::Recipes => "recipes",
            ImportKind::Lots => "lots",
            ImportKind::SalesOrders => "sales_orders",
        }
    }

    /// 必需列
    pub fn required_columns(&self) -> &'static [&'static str] {
        match self {
            ImportKind::Lines => &["line_id"],
            ImportKind::Capacities => &["product_id", "line_id", "units_per_hour"],
            ImportKind::Suppliers => &["supplier_id", "min_order_qty"],
            ImportKind::RawMaterials => &["raw_material_id"],
            ImportKind::Recipes => &["product_id", "raw_material_id", "quantity_per_unit"],
            ImportKind::Lots => &["lot_id", "raw_material_id", "on_hand_qty"],
            ImportKind::SalesOrders => &[
                "sales_order_id",
                "delivery_date",
                "line_id",
                "product_id",
                "quantity",
            ],
        }
    }
}

impl fmt::Display for ImportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImportKind {
    type Err = ImportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "lines" => Ok(ImportKind::Lines),
            "capacities" => Ok(ImportKind::Capacities),
            "suppliers" => Ok(ImportKind::Suppliers),
            "raw_materials" | "materials" => Ok(ImportKind::RawMaterials),
            "recipes" => Ok(ImportKind::Recipes),
            "lots" => Ok(ImportKind::Lots),
            "sales_orders" => Ok(ImportKind::SalesOrders),
            other => Err(ImportError::UnknownKind(other.to_string())),
        }
    }
}

/// 行级违规
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowViolation {
    pub row_number: usize,
    pub field: String,
    pub message: String,
}

/// 导入汇总
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub kind: ImportKind,
    pub total_rows: usize,
    pub imported: usize,
    pub skipped: usize,
    pub violations: Vec<RowViolation>,
}

/// 校验通过的行
enum ParsedRow {
    Line(ProductionLine),
    Capacity(LineCapacity),
    Supplier(Supplier),
    RawMaterial(RawMaterial),
    Recipe(RecipeRequirement),
    Lot(MaterialLot),
    SalesOrder(SalesOrder, SalesOrderLine),
}

// ==========================================
// ReferenceImporter
// ==========================================
pub struct ReferenceImporter {
    db: Database,
}

impl ReferenceImporter {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// 导入 CSV 文件
    #[instrument(skip(self, path), fields(kind = %kind, path = %path.as_ref().display()))]
    pub fn import_file<P: AsRef<Path>>(
        &self,
        kind: ImportKind,
        path: P,
        now: NaiveDateTime,
    ) -> ImportResult<ImportSummary> {
        let rows = CsvParser::parse_file(path.as_ref())?;
        self.import_rows(kind, &rows, now)
    }

    /// 导入已解析的行
    pub fn import_rows(
        &self,
        kind: ImportKind,
        rows: &[RawRow],
        now: NaiveDateTime,
    ) -> ImportResult<ImportSummary> {
        if let Some(first) = rows.first() {
            for column in kind.required_columns() {
                if !first.cells.contains_key(*column) {
                    return Err(ImportError::MissingColumn(column.to_string()));
                }
            }
        }

        let mut violations = Vec::new();
        let mut parsed = Vec::with_capacity(rows.len());
        let mut seen_keys = HashSet::new();
        for row in rows {
            match parse_row(kind, row, now) {
                Ok(item) => {
                    let key = row_key(&item);
                    if seen_keys.insert(key.clone()) {
                        parsed.push(item);
                    } else {
                        violations.push(RowViolation {
                            row_number: row.row_number,
                            field: "key".to_string(),
                            message: format!("同一文件内主键重复: {}", key),
                        });
                    }
                }
                Err(v) => violations.push(v),
            }
        }

        let imported = self
            .db
            .with_transaction(|tx| -> ImportResult<usize> { write_rows(tx, &parsed) })?;

        for v in &violations {
            warn!(row = v.row_number, field = %v.field, message = %v.message, "导入行已跳过");
        }
        let summary = ImportSummary {
            kind,
            total_rows: rows.len(),
            imported,
            skipped: violations.len(),
            violations,
        };
        info!(
            kind = %kind,
            total = summary.total_rows,
            imported = summary.imported,
            skipped = summary.skipped,
            "参考数据导入完成"
        );
        Ok(summary)
    }
}

fn row_key(item: &ParsedRow) -> String {
    match item {
        ParsedRow::Line(l) => l.line_id.clone(),
        ParsedRow::Capacity(c) => format!("{}|{}", c.product_id, c.line_id),
        ParsedRow::Supplier(s) => s.supplier_id.clone(),
        ParsedRow::RawMaterial(m) => m.raw_material_id.clone(),
        ParsedRow::Recipe(r) => format!("{}|{}", r.product_id, r.raw_material_id),
        ParsedRow::Lot(l) => l.lot_id.clone(),
        ParsedRow::SalesOrder(_, line) => line.line_id.clone(),
    }
}

fn write_rows(conn: &Connection, rows: &[ParsedRow]) -> ImportResult<usize> {
    let refs = ReferenceDataRepository::new(conn);
    let lots = MaterialLotRepository::new(conn);
    let sales = SalesOrderRepository::new(conn);
    let mut written = 0;
    for row in rows {
        match row {
            ParsedRow::Line(l) => refs.upsert_line(l)?,
            ParsedRow::Capacity(c) => refs.upsert_capacity(c)?,
            ParsedRow::Supplier(s) => refs.upsert_supplier(s)?,
            ParsedRow::RawMaterial(m) => refs.upsert_raw_material(m)?,
            ParsedRow::Recipe(r) => refs.upsert_recipe(r)?,
            ParsedRow::Lot(l) => {
                if lots.find_by_id(&l.lot_id)?.is_some() {
                    warn!(lot_id = %l.lot_id, "批次已存在，跳过");
                    continue;
                }
                lots.insert(l)?;
            }
            ParsedRow::SalesOrder(order, line) => {
                if sales.find_by_id(&order.sales_order_id)?.is_none() {
                    sales.insert_order(order)?;
                }
                sales.insert_line(line)?;
            }
        }
        written += 1;
    }
    Ok(written)
}

// ==========================================
// 行解析
// ==========================================

fn parse_row(kind: ImportKind, row: &RawRow, now: NaiveDateTime) -> Result<ParsedRow, RowViolation> {
    let parsed = match kind {
        ImportKind::Lines => {
            let line_id = required(row, "line_id")?;
            ParsedRow::Line(ProductionLine {
                name: optional(row, "name").unwrap_or_else(|| line_id.clone()),
                line_id,
                active: match row.get("active") {
                    None => true,
                    Some(v) => parse_bool(row, "active", v)?,
                },
            })
        }
        ImportKind::Capacities => ParsedRow::Capacity(LineCapacity {
            product_id: required(row, "product_id")?,
            line_id: required(row, "line_id")?,
            units_per_hour: non_negative(row, "units_per_hour")?,
        }),
        ImportKind::Suppliers => ParsedRow::Supplier(Supplier {
            supplier_id: required(row, "supplier_id")?,
            name: optional(row, "name").unwrap_or_default(),
            min_order_qty: non_negative(row, "min_order_qty")?,
        }),
        ImportKind::RawMaterials => ParsedRow::RawMaterial(RawMaterial {
            raw_material_id: required(row, "raw_material_id")?,
            name: optional(row, "name").unwrap_or_default(),
            supplier_id: optional(row, "supplier_id"),
            min_stock_threshold: match row.get("min_stock_threshold") {
                None => 0.0,
                Some(_) => non_negative(row, "min_stock_threshold")?,
            },
        }),
        ImportKind::Recipes => {
            let qty = non_negative(row, "quantity_per_unit")?;
            if qty <= 0.0 {
                return Err(violation(row, "quantity_per_unit", "配方用量须为正数"));
            }
            ParsedRow::Recipe(RecipeRequirement {
                product_id: required(row, "product_id")?,
                raw_material_id: required(row, "raw_material_id")?,
                quantity_per_unit: qty,
            })
        }
        ImportKind::Lots => ParsedRow::Lot(MaterialLot {
            lot_id: required(row, "lot_id")?,
            raw_material_id: required(row, "raw_material_id")?,
            on_hand_qty: non_negative(row, "on_hand_qty")?,
            expiry_date: match row.get("expiry_date") {
                None => None,
                Some(v) => Some(parse_date(row, "expiry_date", v)?),
            },
            received_at: now,
            status: LotStatus::Available,
        }),
        ImportKind::SalesOrders => {
            let sales_order_id = required(row, "sales_order_id")?;
            let delivery_raw = required(row, "delivery_date")?;
            let quantity = parse_number::<i64>(row, "quantity")?;
            if quantity <= 0 {
                return Err(violation(row, "quantity", "数量须为正数"));
            }
            ParsedRow::SalesOrder(
                SalesOrder {
                    sales_order_id: sales_order_id.clone(),
                    customer_ref: optional(row, "customer_ref"),
                    delivery_date: parse_date(row, "delivery_date", &delivery_raw)?,
                    status: SalesOrderStatus::Open,
                },
                SalesOrderLine {
                    line_id: required(row, "line_id")?,
                    sales_order_id,
                    product_id: required(row, "product_id")?,
                    quantity,
                    production_order_id: None,
                },
            )
        }
    };
    Ok(parsed)
}

fn violation(row: &RawRow, field: &str, message: impl Into<String>) -> RowViolation {
    RowViolation {
        row_number: row.row_number,
        field: field.to_string(),
        message: message.into(),
    }
}

fn required(row: &RawRow, field: &str) -> Result<String, RowViolation> {
    row.get(field)
        .map(str::to_string)
        .ok_or_else(|| violation(row, field, "必填字段为空"))
}

fn optional(row: &RawRow, field: &str) -> Option<String> {
    row.get(field).map(str::to_string)
}

fn parse_number<T: FromStr>(row: &RawRow, field: &str) -> Result<T, RowViolation> {
    let raw = required(row, field)?;
    raw.parse::<T>()
        .map_err(|_| violation(row, field, format!("数值格式错误: {}", raw)))
}

fn non_negative(row: &RawRow, field: &str) -> Result<f64, RowViolation> {
    let value = parse_number::<f64>(row, field)?;
    if !value.is_finite() || value < 0.0 {
        return Err(violation(row, field, format!("数值不能为负: {}", value)));
    }
    Ok(value)
}

fn parse_bool(row: &RawRow, field: &str, raw: &str) -> Result<bool, RowViolation> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "y" | "yes" => Ok(true),
        "0" | "false" | "n" | "no" => Ok(false),
        _ => Err(violation(row, field, format!("布尔值格式错误: {}", raw))),
    }
}

/// 日期: YYYY-MM-DD 或 YYYYMMDD
fn parse_date(row: &RawRow, field: &str, raw: &str) -> Result<NaiveDate, RowViolation> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y%m%d"))
        .map_err(|_| violation(row, field, format!("日期格式错误: {}", raw)))
}
