use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeSet, HashMap};
use tokio::sync::RwLock;

use crate::error::LedgerError;
use crate::models::{Reservation, ReservationId, ReservationStatus, SeanceId, SeatRef};

/// Durable store of reservation records.
///
/// Each method is one transaction: after it returns `Ok`, the change is
/// visible to every later read.
#[async_trait]
pub trait ReservationLedger: Send + Sync {
    async fn insert(&self, reservation: &Reservation) -> Result<ReservationId, LedgerError>;

    async fn get(&self, id: ReservationId) -> Result<Option<Reservation>, LedgerError>;

    /// Active reservations of a user, newest first.
    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Reservation>, LedgerError>;

    async fn list_active_by_seance(&self, seance_id: SeanceId) -> Result<Vec<Reservation>, LedgerError>;

    /// Replaces the seat set of an active reservation.
    async fn update_seats(&self, id: ReservationId, seats: &BTreeSet<SeatRef>) -> Result<(), LedgerError>;

    async fn mark_cancelled(&self, id: ReservationId) -> Result<(), LedgerError>;
}

/// Ledger kept in process memory. Used when no database is configured and
/// in tests.
#[derive(Default)]
pub struct InMemoryLedger {
    records: RwLock<HashMap<ReservationId, Reservation>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReservationLedger for InMemoryLedger {
    async fn insert(&self, reservation: &Reservation) -> Result<ReservationId, LedgerError> {
        let mut records = self.records.write().await;
        let clash = records.values().any(|r| {
            r.is_active()
                && r.seance_id == reservation.seance_id
                && !r.seats.is_disjoint(&reservation.seats)
        });
        if clash {
            return Err(LedgerError::SeatConflict);
        }
        records.insert(reservation.id, reservation.clone());
        Ok(reservation.id)
    }

    async fn get(&self, id: ReservationId) -> Result<Option<Reservation>, LedgerError> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Reservation>, LedgerError> {
        let records = self.records.read().await;
        let mut list: Vec<Reservation> = records
            .values()
            .filter(|r| r.is_active() && r.user_id == user_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(list)
    }

    async fn list_active_by_seance(&self, seance_id: SeanceId) -> Result<Vec<Reservation>, LedgerError> {
        let records = self.records.read().await;
        let mut list: Vec<Reservation> = records
            .values()
            .filter(|r| r.is_active() && r.seance_id == seance_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(list)
    }

    async fn update_seats(&self, id: ReservationId, seats: &BTreeSet<SeatRef>) -> Result<(), LedgerError> {
        let mut records = self.records.write().await;
        let seance_id = match records.get(&id) {
            Some(r) if r.is_active() => r.seance_id,
            _ => return Err(LedgerError::NotFound(id)),
        };
        let clash = records.values().any(|r| {
            r.id != id && r.is_active() && r.seance_id == seance_id && !r.seats.is_disjoint(seats)
        });
        if clash {
            return Err(LedgerError::SeatConflict);
        }
        if let Some(record) = records.get_mut(&id) {
            record.seats = seats.clone();
            record.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn mark_cancelled(&self, id: ReservationId) -> Result<(), LedgerError> {
        let mut records = self.records.write().await;
        let record = records.get_mut(&id).ok_or(LedgerError::NotFound(id))?;
        record.status = ReservationStatus::Cancelled;
        record.updated_at = Utc::now();
        Ok(())
    }
}
