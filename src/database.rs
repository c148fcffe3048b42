use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, FromRow, Pool, Postgres, Transaction};
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::LedgerError;
use crate::models::{Reservation, ReservationId, ReservationStatus, Seance, SeanceId, SeanceRow, SeatRef};
use crate::services::ledger::ReservationLedger;

const ACTIVE_SEAT_INDEX: &str = "uq_reservation_seats_active";

#[derive(Clone)]
pub struct Database {
    pub pool: Pool<Postgres>,
}

impl Database {
    pub async fn new(database_url: &str, pool_size: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;

        Ok(Database { pool })
    }

    pub fn from_pool(pool: Pool<Postgres>) -> Self {
        Database { pool }
    }

    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("./src/migrations")
            .run(&self.pool)
            .await?;
        info!("Migrations completed");
        Ok(())
    }

    pub async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    /// All seances with their seat layouts.
    pub async fn load_seances(&self) -> Result<Vec<Seance>, LedgerError> {
        let rows: Vec<SeanceRow> = sqlx::query_as(
            "SELECT id, film_id, show_date, show_time, price_key FROM seances ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        let seat_rows: Vec<(i64, String, i32)> = sqlx::query_as(
            "SELECT seance_id, seat_row, seat_number FROM seance_seats
             ORDER BY seance_id, seat_row, seat_number",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut layouts: HashMap<i64, Vec<SeatRef>> = HashMap::new();
        for (seance_id, row, number) in seat_rows {
            layouts
                .entry(seance_id)
                .or_default()
                .push(seat_from_columns(&row, number)?);
        }

        let seances = rows
            .into_iter()
            .map(|row| Seance {
                seats: layouts.remove(&row.id).unwrap_or_default(),
                id: row.id,
                film_id: row.film_id,
                date: row.show_date,
                time: row.show_time,
                price_key: row.price_key,
            })
            .collect::<Vec<_>>();
        debug!("Loaded {} seances", seances.len());
        Ok(seances)
    }

    async fn attach_seats(&self, rows: Vec<ReservationRow>) -> Result<Vec<Reservation>, LedgerError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let seat_rows: Vec<SeatRow> = sqlx::query_as(
            "SELECT reservation_id, seat_row, seat_number FROM reservation_seats
             WHERE reservation_id = ANY($1)",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut seats: HashMap<Uuid, BTreeSet<SeatRef>> = HashMap::new();
        for seat in seat_rows {
            seats
                .entry(seat.reservation_id)
                .or_default()
                .insert(seat_from_columns(&seat.seat_row, seat.seat_number)?);
        }

        rows.into_iter()
            .map(|row| {
                let seat_set = seats.remove(&row.id).unwrap_or_default();
                row.into_reservation(seat_set)
            })
            .collect()
    }
}

#[derive(Debug, FromRow)]
struct ReservationRow {
    id: Uuid,
    seance_id: i64,
    user_id: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ReservationRow {
    fn into_reservation(self, seats: BTreeSet<SeatRef>) -> Result<Reservation, LedgerError> {
        let status = ReservationStatus::parse(&self.status).ok_or_else(|| {
            LedgerError::Corrupt(format!("reservation {} has status {:?}", self.id, self.status))
        })?;
        Ok(Reservation {
            id: self.id,
            seance_id: self.seance_id,
            user_id: self.user_id,
            seats,
            status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct SeatRow {
    reservation_id: Uuid,
    seat_row: String,
    seat_number: i32,
}

fn seat_from_columns(row: &str, number: i32) -> Result<SeatRef, LedgerError> {
    let mut chars = row.chars();
    let letter = match (chars.next(), chars.next()) {
        (Some(c), None) => c,
        _ => return Err(LedgerError::Corrupt(format!("seat row {:?}", row))),
    };
    let number = u32::try_from(number)
        .map_err(|_| LedgerError::Corrupt(format!("seat number {}", number)))?;
    SeatRef::new(letter, number).map_err(|e| LedgerError::Corrupt(e.to_string()))
}

fn seat_columns(seats: &BTreeSet<SeatRef>) -> (Vec<String>, Vec<i32>) {
    seats
        .iter()
        .map(|s| (s.row.to_string(), s.number as i32))
        .unzip()
}

/// Unique violations on the active-seat index mean another active
/// reservation already holds one of the seats.
fn map_db_error(e: sqlx::Error) -> LedgerError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.code().as_deref() == Some("23505") && db_err.constraint() == Some(ACTIVE_SEAT_INDEX) {
            return LedgerError::SeatConflict;
        }
    }
    LedgerError::Database(e)
}

async fn insert_seats(
    tx: &mut Transaction<'_, Postgres>,
    reservation_id: ReservationId,
    seance_id: SeanceId,
    seats: &BTreeSet<SeatRef>,
) -> Result<(), LedgerError> {
    let (rows, numbers) = seat_columns(seats);
    sqlx::query(
        "INSERT INTO reservation_seats (reservation_id, seance_id, seat_row, seat_number)
         SELECT $1, $2, r, n FROM UNNEST($3::text[], $4::int4[]) AS t(r, n)",
    )
    .bind(reservation_id)
    .bind(seance_id)
    .bind(&rows)
    .bind(&numbers)
    .execute(&mut **tx)
    .await
    .map_err(map_db_error)?;
    Ok(())
}

#[async_trait]
impl ReservationLedger for Database {
    async fn insert(&self, reservation: &Reservation) -> Result<ReservationId, LedgerError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO reservations (id, seance_id, user_id, status, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(reservation.id)
        .bind(reservation.seance_id)
        .bind(&reservation.user_id)
        .bind(reservation.status.as_str())
        .bind(reservation.created_at)
        .bind(reservation.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(map_db_error)?;

        insert_seats(&mut tx, reservation.id, reservation.seance_id, &reservation.seats).await?;

        tx.commit().await?;
        Ok(reservation.id)
    }

    async fn get(&self, id: ReservationId) -> Result<Option<Reservation>, LedgerError> {
        let row: Option<ReservationRow> = sqlx::query_as(
            "SELECT id, seance_id, user_id, status, created_at, updated_at
             FROM reservations WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(self.attach_seats(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Reservation>, LedgerError> {
        let rows: Vec<ReservationRow> = sqlx::query_as(
            "SELECT id, seance_id, user_id, status, created_at, updated_at
             FROM reservations
             WHERE user_id = $1 AND status = 'active'
             ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        self.attach_seats(rows).await
    }

    async fn list_active_by_seance(&self, seance_id: SeanceId) -> Result<Vec<Reservation>, LedgerError> {
        let rows: Vec<ReservationRow> = sqlx::query_as(
            "SELECT id, seance_id, user_id, status, created_at, updated_at
             FROM reservations
             WHERE seance_id = $1 AND status = 'active'
             ORDER BY created_at",
        )
        .bind(seance_id)
        .fetch_all(&self.pool)
        .await?;
        self.attach_seats(rows).await
    }

    async fn update_seats(&self, id: ReservationId, seats: &BTreeSet<SeatRef>) -> Result<(), LedgerError> {
        let mut tx = self.pool.begin().await?;

        let seance_id: Option<i64> = sqlx::query_scalar(
            "SELECT seance_id FROM reservations
             WHERE id = $1 AND status = 'active'
             FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        let seance_id = seance_id.ok_or(LedgerError::NotFound(id))?;

        sqlx::query("DELETE FROM reservation_seats WHERE reservation_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        insert_seats(&mut tx, id, seance_id, seats).await?;

        sqlx::query("UPDATE reservations SET updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn mark_cancelled(&self, id: ReservationId) -> Result<(), LedgerError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE reservations SET status = 'cancelled', updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(LedgerError::NotFound(id));
        }

        sqlx::query("UPDATE reservation_seats SET active = FALSE WHERE reservation_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
