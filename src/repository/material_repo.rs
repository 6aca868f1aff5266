// ==========================================
// 产线排产核心 - 原料批次 / 物料预留仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 说明: 可用量 = on_hand - Σ(ACTIVE 预留)，由引擎在同一事务内计算
// ==========================================

use crate::domain::material::{MaterialLot, MaterialReservation};
use crate::domain::types::{LotStatus, ReservationStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row};

const LOT_COLUMNS: &str = "lot_id, raw_material_id, on_hand_qty, expiry_date, received_at, status";

const RESERVATION_COLUMNS: &str = "reservation_id, production_order_id, lot_id, raw_material_id, \
     quantity, status, created_at, updated_at";

// ==========================================
// MaterialLotRepository - 原料批次仓储
// ==========================================
pub struct MaterialLotRepository<'c> {
    conn: &'c Connection,
}

impl<'c> MaterialLotRepository<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<MaterialLot> {
        Ok(MaterialLot {
            lot_id: row.get(0)?,
            raw_material_id: row.get(1)?,
            on_hand_qty: row.get(2)?,
            expiry_date: row.get(3)?,
            received_at: row.get(4)?,
            status: row.get(5)?,
        })
    }

    pub fn insert(&self, lot: &MaterialLot) -> RepositoryResult<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO material_lot ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                LOT_COLUMNS
            ),
            params![
                lot.lot_id,
                lot.raw_material_id,
                lot.on_hand_qty,
                lot.expiry_date,
                lot.received_at,
                lot.status,
            ],
        )?;
        Ok(())
    }

    pub fn find_by_id(&self, lot_id: &str) -> RepositoryResult<Option<MaterialLot>> {
        let lot = self
            .conn
            .query_row(
                &format!("SELECT {} FROM material_lot WHERE lot_id = ?1", LOT_COLUMNS),
                params![lot_id],
                Self::map_row,
            )
            .optional()?;
        Ok(lot)
    }

    pub fn get(&self, lot_id: &str) -> RepositoryResult<MaterialLot> {
        self.find_by_id(lot_id)?
            .ok_or_else(|| RepositoryError::not_found("MaterialLot", lot_id))
    }

    /// 某原料的可用批次，按失效日期升序（FIFO-by-expiry）
    ///
    /// 无失效日期的批次排在最后，其次按入库时间
    pub fn list_available_fifo(&self, raw_material_id: &str) -> RepositoryResult<Vec<MaterialLot>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {} FROM material_lot
            WHERE raw_material_id = ?1 AND status = ?2
            ORDER BY expiry_date IS NULL, expiry_date, received_at, lot_id
            "#,
            LOT_COLUMNS
        ))?;
        let lots = stmt
            .query_map(params![raw_material_id, LotStatus::Available], Self::map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(lots)
    }

    /// 某原料可用批次在库合计
    pub fn sum_available_on_hand(&self, raw_material_id: &str) -> RepositoryResult<f64> {
        let total: f64 = self.conn.query_row(
            r#"
            SELECT COALESCE(SUM(on_hand_qty), 0.0) FROM material_lot
            WHERE raw_material_id = ?1 AND status = ?2
            "#,
            params![raw_material_id, LotStatus::Available],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    pub fn update_quantity_and_status(
        &self,
        lot_id: &str,
        on_hand_qty: f64,
        status: LotStatus,
    ) -> RepositoryResult<()> {
        let affected = self.conn.execute(
            "UPDATE material_lot SET on_hand_qty = ?1, status = ?2 WHERE lot_id = ?3",
            params![on_hand_qty, status, lot_id],
        )?;
        if affected == 0 {
            return Err(RepositoryError::not_found("MaterialLot", lot_id));
        }
        Ok(())
    }

    pub fn update_status(&self, lot_id: &str, status: LotStatus) -> RepositoryResult<()> {
        let affected = self.conn.execute(
            "UPDATE material_lot SET status = ?1 WHERE lot_id = ?2",
            params![status, lot_id],
        )?;
        if affected == 0 {
            return Err(RepositoryError::not_found("MaterialLot", lot_id));
        }
        Ok(())
    }
}

// ==========================================
// MaterialReservationRepository - 物料预留仓储
// ==========================================
pub struct MaterialReservationRepository<'c> {
    conn: &'c Connection,
}

impl<'c> MaterialReservationRepository<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<MaterialReservation> {
        Ok(MaterialReservation {
            reservation_id: row.get(0)?,
            production_order_id: row.get(1)?,
            lot_id: row.get(2)?,
            raw_material_id: row.get(3)?,
            quantity: row.get(4)?,
            status: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    pub fn insert(&self, reservation: &MaterialReservation) -> RepositoryResult<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO material_reservation ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                RESERVATION_COLUMNS
            ),
            params![
                reservation.reservation_id,
                reservation.production_order_id,
                reservation.lot_id,
                reservation.raw_material_id,
                reservation.quantity,
                reservation.status,
                reservation.created_at,
                reservation.updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn list_by_order(
        &self,
        production_order_id: &str,
        status: ReservationStatus,
    ) -> RepositoryResult<Vec<MaterialReservation>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {} FROM material_reservation
            WHERE production_order_id = ?1 AND status = ?2
            ORDER BY raw_material_id, created_at, reservation_id
            "#,
            RESERVATION_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![production_order_id, status], Self::map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn list_active_by_lot(&self, lot_id: &str) -> RepositoryResult<Vec<MaterialReservation>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM material_reservation WHERE lot_id = ?1 AND status = ?2 ORDER BY created_at",
            RESERVATION_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![lot_id, ReservationStatus::Active], Self::map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// 批次上 ACTIVE 预留合计
    pub fn active_sum_by_lot(&self, lot_id: &str) -> RepositoryResult<f64> {
        let total: f64 = self.conn.query_row(
            r#"
            SELECT COALESCE(SUM(quantity), 0.0) FROM material_reservation
            WHERE lot_id = ?1 AND status = ?2
            "#,
            params![lot_id, ReservationStatus::Active],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    /// 某原料 ACTIVE 预留合计（仅统计可用批次上的预留）
    pub fn active_sum_by_material(&self, raw_material_id: &str) -> RepositoryResult<f64> {
        let total: f64 = self.conn.query_row(
            r#"
            SELECT COALESCE(SUM(r.quantity), 0.0)
            FROM material_reservation r
            JOIN material_lot l ON l.lot_id = r.lot_id
            WHERE r.raw_material_id = ?1 AND r.status = ?2 AND l.status = 'AVAILABLE'
            "#,
            params![raw_material_id, ReservationStatus::Active],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    /// 作废订单所有 ACTIVE 预留，返回作废条数
    pub fn cancel_active_for_order(
        &self,
        production_order_id: &str,
        now: NaiveDateTime,
    ) -> RepositoryResult<usize> {
        Ok(self.conn.execute(
            r#"
            UPDATE material_reservation SET status = ?1, updated_at = ?2
            WHERE production_order_id = ?3 AND status = ?4
            "#,
            params![
                ReservationStatus::Cancelled,
                now,
                production_order_id,
                ReservationStatus::Active
            ],
        )?)
    }

    pub fn update_status(
        &self,
        reservation_id: &str,
        status: ReservationStatus,
        now: NaiveDateTime,
    ) -> RepositoryResult<()> {
        let affected = self.conn.execute(
            "UPDATE material_reservation SET status = ?1, updated_at = ?2 WHERE reservation_id = ?3",
            params![status, now, reservation_id],
        )?;
        if affected == 0 {
            return Err(RepositoryError::not_found("MaterialReservation", reservation_id));
        }
        Ok(())
    }
}
