// ==========================================
// 产线排产核心 - 参考数据仓储
// ==========================================
// 产线 / 产能 / 配方 / 原料 / 供应商
// 静态数据: 只在导入时写入
// ==========================================

use crate::domain::recipe::{LineCapacity, ProductionLine, RawMaterial, RecipeRequirement, Supplier};
use crate::repository::error::RepositoryResult;
use rusqlite::{params, Connection, OptionalExtension};

/// 参考数据仓储
pub struct ReferenceDataRepository<'c> {
    conn: &'c Connection,
}

impl<'c> ReferenceDataRepository<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    // ===== 产线 =====

    pub fn upsert_line(&self, line: &ProductionLine) -> RepositoryResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO production_line (line_id, name, active) VALUES (?1, ?2, ?3)
            ON CONFLICT(line_id) DO UPDATE SET name = excluded.name, active = excluded.active
            "#,
            params![line.line_id, line.name, line.active],
        )?;
        Ok(())
    }

    pub fn list_lines(&self) -> RepositoryResult<Vec<ProductionLine>> {
        let mut stmt = self
            .conn
            .prepare("SELECT line_id, name, active FROM production_line ORDER BY line_id")?;
        let lines = stmt
            .query_map([], |row| {
                Ok(ProductionLine {
                    line_id: row.get(0)?,
                    name: row.get(1)?,
                    active: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(lines)
    }

    // ===== 产能 =====

    pub fn upsert_capacity(&self, capacity: &LineCapacity) -> RepositoryResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO line_capacity (product_id, line_id, units_per_hour) VALUES (?1, ?2, ?3)
            ON CONFLICT(product_id, line_id) DO UPDATE SET units_per_hour = excluded.units_per_hour
            "#,
            params![capacity.product_id, capacity.line_id, capacity.units_per_hour],
        )?;
        Ok(())
    }

    pub fn list_capacities(&self) -> RepositoryResult<Vec<LineCapacity>> {
        let mut stmt = self.conn.prepare(
            "SELECT product_id, line_id, units_per_hour FROM line_capacity ORDER BY product_id, line_id",
        )?;
        let capacities = stmt
            .query_map([], |row| {
                Ok(LineCapacity {
                    product_id: row.get(0)?,
                    line_id: row.get(1)?,
                    units_per_hour: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(capacities)
    }

    // ===== 配方 =====

    pub fn upsert_recipe(&self, requirement: &RecipeRequirement) -> RepositoryResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO recipe_requirement (product_id, raw_material_id, quantity_per_unit)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(product_id, raw_material_id)
            DO UPDATE SET quantity_per_unit = excluded.quantity_per_unit
            "#,
            params![
                requirement.product_id,
                requirement.raw_material_id,
                requirement.quantity_per_unit
            ],
        )?;
        Ok(())
    }

    pub fn list_recipes(&self) -> RepositoryResult<Vec<RecipeRequirement>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT product_id, raw_material_id, quantity_per_unit
            FROM recipe_requirement
            ORDER BY product_id, raw_material_id
            "#,
        )?;
        let recipes = stmt
            .query_map([], |row| {
                Ok(RecipeRequirement {
                    product_id: row.get(0)?,
                    raw_material_id: row.get(1)?,
                    quantity_per_unit: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(recipes)
    }

    // ===== 原料 =====

    pub fn upsert_raw_material(&self, material: &RawMaterial) -> RepositoryResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO raw_material (raw_material_id, name, supplier_id, min_stock_threshold)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(raw_material_id) DO UPDATE SET
                name = excluded.name,
                supplier_id = excluded.supplier_id,
                min_stock_threshold = excluded.min_stock_threshold
            "#,
            params![
                material.raw_material_id,
                material.name,
                material.supplier_id,
                material.min_stock_threshold
            ],
        )?;
        Ok(())
    }

    pub fn find_raw_material(&self, raw_material_id: &str) -> RepositoryResult<Option<RawMaterial>> {
        let material = self
            .conn
            .query_row(
                r#"
                SELECT raw_material_id, name, supplier_id, min_stock_threshold
                FROM raw_material WHERE raw_material_id = ?1
                "#,
                params![raw_material_id],
                |row| {
                    Ok(RawMaterial {
                        raw_material_id: row.get(0)?,
                        name: row.get(1)?,
                        supplier_id: row.get(2)?,
                        min_stock_threshold: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(material)
    }

    // ===== 供应商 =====

    pub fn upsert_supplier(&self, supplier: &Supplier) -> RepositoryResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO supplier (supplier_id, name, min_order_qty) VALUES (?1, ?2, ?3)
            ON CONFLICT(supplier_id) DO UPDATE SET
                name = excluded.name,
                min_order_qty = excluded.min_order_qty
            "#,
            params![supplier.supplier_id, supplier.name, supplier.min_order_qty],
        )?;
        Ok(())
    }

    pub fn find_supplier(&self, supplier_id: &str) -> RepositoryResult<Option<Supplier>> {
        let supplier = self
            .conn
            .query_row(
                "SELECT supplier_id, name, min_order_qty FROM supplier WHERE supplier_id = ?1",
                params![supplier_id],
                |row| {
                    Ok(Supplier {
                        supplier_id: row.get(0)?,
                        name: row.get(1)?,
                        min_order_qty: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(supplier)
    }
}
