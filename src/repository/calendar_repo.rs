// ==========================================
// 产线排产核心 - 产能日历预留仓储
// ==========================================

use crate::domain::calendar::CalendarReservation;
use crate::repository::error::RepositoryResult;
use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};

const CALENDAR_COLUMNS: &str =
    "reservation_id, production_order_id, line_id, work_date, hours_reserved, quantity, created_at";

/// 产能日历预留仓储
pub struct CalendarReservationRepository<'c> {
    conn: &'c Connection,
}

impl<'c> CalendarReservationRepository<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<CalendarReservation> {
        Ok(CalendarReservation {
            reservation_id: row.get(0)?,
            production_order_id: row.get(1)?,
            line_id: row.get(2)?,
            work_date: row.get(3)?,
            hours_reserved: row.get(4)?,
            quantity: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    pub fn insert(&self, reservation: &CalendarReservation) -> RepositoryResult<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO calendar_reservation ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                CALENDAR_COLUMNS
            ),
            params![
                reservation.reservation_id,
                reservation.production_order_id,
                reservation.line_id,
                reservation.work_date,
                reservation.hours_reserved,
                reservation.quantity,
                reservation.created_at,
            ],
        )?;
        Ok(())
    }

    /// 全部预留（重排工作集一次性加载）
    pub fn list_all(&self) -> RepositoryResult<Vec<CalendarReservation>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM calendar_reservation ORDER BY work_date, line_id, production_order_id",
            CALENDAR_COLUMNS
        ))?;
        let rows = stmt
            .query_map([], Self::map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn list_by_order(&self, production_order_id: &str) -> RepositoryResult<Vec<CalendarReservation>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM calendar_reservation WHERE production_order_id = ?1 ORDER BY work_date, line_id",
            CALENDAR_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![production_order_id], Self::map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// 删除订单在某日期及之后的预留
    pub fn delete_from_date(
        &self,
        production_order_id: &str,
        from_date: NaiveDate,
    ) -> RepositoryResult<usize> {
        Ok(self.conn.execute(
            "DELETE FROM calendar_reservation WHERE production_order_id = ?1 AND work_date >= ?2",
            params![production_order_id, from_date],
        )?)
    }

    pub fn delete_for_order(&self, production_order_id: &str) -> RepositoryResult<usize> {
        Ok(self.conn.execute(
            "DELETE FROM calendar_reservation WHERE production_order_id = ?1",
            params![production_order_id],
        )?)
    }
}
