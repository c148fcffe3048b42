//! Concurrency control for seat reservations.
//!
//! Every seance owns one `tokio::sync::Mutex<SeatMap>`. All seat-state
//! transitions of a seance happen while that mutex is held, together with
//! the ledger write that records them, so the seat map and the ledger move
//! in lockstep. Different seances never share a lock.
//!
//! Write operations run their locked section in a spawned task and await
//! its handle: if the HTTP request is dropped mid-flight the task still
//! commits or rolls back.

use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};

use crate::config::ReservationConfig;
use crate::error::{LedgerError, ReservationError};
use crate::models::{Reservation, ReservationId, ReservationStatus, Seance, SeanceId, SeatRef, UserId};
use crate::services::ledger::ReservationLedger;
use crate::services::pricing::PricingPolicy;
use crate::services::seat_map::{SeatMap, SeatView};

#[derive(Debug, Clone, Copy)]
pub struct ReservationRules {
    pub max_seats: usize,
}

impl Default for ReservationRules {
    fn default() -> Self {
        Self { max_seats: 8 }
    }
}

impl From<&ReservationConfig> for ReservationRules {
    fn from(config: &ReservationConfig) -> Self {
        Self {
            max_seats: config.max_seats,
        }
    }
}

impl ReservationRules {
    /// Shape checks that need no seance state.
    fn validate(&self, seats: &[SeatRef]) -> Result<BTreeSet<SeatRef>, ReservationError> {
        if seats.is_empty() {
            return Err(ReservationError::Validation(
                "at least one seat must be selected".to_string(),
            ));
        }
        if seats.len() > self.max_seats {
            return Err(ReservationError::Validation(format!(
                "at most {} seats per reservation, got {}",
                self.max_seats,
                seats.len()
            )));
        }
        let set: BTreeSet<SeatRef> = seats.iter().copied().collect();
        if set.len() != seats.len() {
            return Err(ReservationError::Validation(
                "the same seat is listed more than once".to_string(),
            ));
        }
        Ok(set)
    }
}

struct SeanceSlot {
    seance: Seance,
    /// Immutable copy of the layout, checked without taking the lock.
    layout: BTreeSet<SeatRef>,
    seats: Mutex<SeatMap>,
}

impl SeanceSlot {
    fn check_layout(&self, seats: &BTreeSet<SeatRef>) -> Result<(), ReservationError> {
        let unknown: Vec<String> = seats
            .difference(&self.layout)
            .map(ToString::to_string)
            .collect();
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(ReservationError::Validation(format!(
                "seance {} has no seats {}",
                self.seance.id,
                unknown.join(", ")
            )))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedReservation {
    pub reservation_id: ReservationId,
    pub seance_id: SeanceId,
    pub seats: BTreeSet<SeatRef>,
    pub total: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifiedReservation {
    pub reservation_id: ReservationId,
    pub seats: BTreeSet<SeatRef>,
    pub released: BTreeSet<SeatRef>,
    pub claimed: BTreeSet<SeatRef>,
    pub total: i64,
}

/// Point-in-time copy of a seance and its seat grid.
#[derive(Debug, Clone)]
pub struct SeanceSnapshot {
    pub seance: Seance,
    pub seats: Vec<SeatView>,
}

/// Result of comparing a seat map with the ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatAudit {
    pub seance_id: SeanceId,
    /// Unavailable on the map but held by no active reservation.
    pub orphaned_seats: BTreeSet<SeatRef>,
    /// Held by an active reservation but available on the map.
    pub unheld_seats: BTreeSet<SeatRef>,
    /// Held by more than one active reservation.
    pub double_booked_seats: BTreeSet<SeatRef>,
    pub active_reservations: usize,
}

impl SeatAudit {
    pub fn is_consistent(&self) -> bool {
        self.orphaned_seats.is_empty()
            && self.unheld_seats.is_empty()
            && self.double_booked_seats.is_empty()
    }
}

pub struct ReservationCoordinator {
    seances: RwLock<HashMap<SeanceId, Arc<SeanceSlot>>>,
    ledger: Arc<dyn ReservationLedger>,
    pricing: PricingPolicy,
    rules: ReservationRules,
}

impl ReservationCoordinator {
    pub fn new(ledger: Arc<dyn ReservationLedger>, pricing: PricingPolicy, rules: ReservationRules) -> Self {
        Self {
            seances: RwLock::new(HashMap::new()),
            ledger,
            pricing,
            rules,
        }
    }

    pub fn pricing(&self) -> &PricingPolicy {
        &self.pricing
    }

    pub fn ledger(&self) -> &Arc<dyn ReservationLedger> {
        &self.ledger
    }

    /// Registers a seance and re-applies its persisted active reservations.
    ///
    /// Returns the number of reservations applied. Persisted reservations
    /// that overlap an earlier one, or name seats the layout lacks, are
    /// skipped and logged; `audit` reports them afterwards.
    pub async fn register_seance(
        &self,
        seance: Seance,
        active: Vec<Reservation>,
    ) -> Result<usize, ReservationError> {
        let mut map = SeatMap::new(seance.id, seance.seats.iter().copied())?;

        let mut applied = 0;
        for reservation in active.iter().filter(|r| r.seance_id == seance.id && r.is_active()) {
            match map.try_claim(&reservation.seats) {
                Ok(token) => {
                    token.commit();
                    applied += 1;
                }
                Err(e) => {
                    error!(
                        seance_id = seance.id,
                        reservation_id = %reservation.id,
                        error = %e,
                        "Persisted reservation could not be applied to seat map"
                    );
                }
            }
        }

        let mut seances = self.seances.write().await;
        if seances.contains_key(&seance.id) {
            return Err(ReservationError::InvalidState(format!(
                "seance {} is already registered",
                seance.id
            )));
        }
        let layout = seance.seats.iter().copied().collect();
        let seance_id = seance.id;
        seances.insert(
            seance_id,
            Arc::new(SeanceSlot {
                seance,
                layout,
                seats: Mutex::new(map),
            }),
        );
        info!("Seance {} registered with {} active reservations", seance_id, applied);
        Ok(applied)
    }

    /// Loads the seance's active reservations from the ledger and registers it.
    pub async fn restore_seance(&self, seance: Seance) -> Result<usize, ReservationError> {
        let active = self.ledger.list_active_by_seance(seance.id).await?;
        self.register_seance(seance, active).await
    }

    pub async fn seance(&self, seance_id: SeanceId) -> Option<Seance> {
        self.seances
            .read()
            .await
            .get(&seance_id)
            .map(|slot| slot.seance.clone())
    }

    pub async fn snapshot(&self, seance_id: SeanceId) -> Result<SeanceSnapshot, ReservationError> {
        let slot = self.slot(seance_id).await?;
        let seats = {
            let map = slot.seats.lock().await;
            map.snapshot(&self.pricing, &slot.seance.price_key)
        };
        Ok(SeanceSnapshot {
            seance: slot.seance.clone(),
            seats,
        })
    }

    pub async fn create(
        self: &Arc<Self>,
        seance_id: SeanceId,
        user_id: UserId,
        seats: Vec<SeatRef>,
    ) -> Result<CreatedReservation, ReservationError> {
        let seats = self.rules.validate(&seats)?;
        let slot = self.slot(seance_id).await?;
        slot.check_layout(&seats)?;

        let this = Arc::clone(self);
        run_to_completion(async move { this.create_locked(slot, user_id, seats).await }).await
    }

    async fn create_locked(
        &self,
        slot: Arc<SeanceSlot>,
        user_id: UserId,
        seats: BTreeSet<SeatRef>,
    ) -> Result<CreatedReservation, ReservationError> {
        let mut map = slot.seats.lock().await;

        let token = map.try_claim(&seats).inspect_err(|e| {
            warn!(seance_id = slot.seance.id, user_id = %user_id, "Create rejected: {}", e);
        })?;

        let reservation = Reservation::new(slot.seance.id, user_id, seats);
        if let Err(e) = self.ledger.insert(&reservation).await {
            let landed = self
                .write_landed(&e, reservation.id, |stored| stored.is_active() && stored.seats == reservation.seats)
                .await;
            if !landed {
                map.revert(token);
                return Err(ledger_failure("create", e, &reservation.seats));
            }
        }
        token.commit();
        drop(map);

        info!(
            seance_id = reservation.seance_id,
            reservation_id = %reservation.id,
            user_id = %reservation.user_id,
            seats = reservation.seats.len(),
            "Reservation created"
        );
        Ok(CreatedReservation {
            reservation_id: reservation.id,
            seance_id: reservation.seance_id,
            total: self.pricing.total_of(&slot.seance.price_key, &reservation.seats),
            seats: reservation.seats,
        })
    }

    pub async fn modify(
        self: &Arc<Self>,
        reservation_id: ReservationId,
        user_id: UserId,
        new_seats: Vec<SeatRef>,
    ) -> Result<ModifiedReservation, ReservationError> {
        let new_seats = self.rules.validate(&new_seats)?;
        let existing = self.load_owned(reservation_id, &user_id).await?;
        let slot = self.slot(existing.seance_id).await?;
        slot.check_layout(&new_seats)?;

        let this = Arc::clone(self);
        run_to_completion(async move {
            this.modify_locked(slot, reservation_id, user_id, new_seats).await
        })
        .await
    }

    async fn modify_locked(
        &self,
        slot: Arc<SeanceSlot>,
        reservation_id: ReservationId,
        user_id: UserId,
        new_seats: BTreeSet<SeatRef>,
    ) -> Result<ModifiedReservation, ReservationError> {
        let mut map = slot.seats.lock().await;
        // Re-read under the lock: a concurrent modify or cancel may have won.
        let current = self.load_owned(reservation_id, &user_id).await?;
        let total = self.pricing.total_of(&slot.seance.price_key, &new_seats);

        if current.seats == new_seats {
            return Ok(ModifiedReservation {
                reservation_id,
                seats: new_seats,
                released: BTreeSet::new(),
                claimed: BTreeSet::new(),
                total,
            });
        }

        let to_release: BTreeSet<SeatRef> = current.seats.difference(&new_seats).copied().collect();
        let to_claim: BTreeSet<SeatRef> = new_seats.difference(&current.seats).copied().collect();

        map.release(&to_release);
        let token = match map.try_claim(&to_claim) {
            Ok(token) => token,
            Err(e) => {
                restore_held(&mut map, &to_release);
                warn!(reservation_id = %reservation_id, "Modify rejected: {}", e);
                return Err(e);
            }
        };

        if let Err(e) = self.ledger.update_seats(reservation_id, &new_seats).await {
            let landed = self
                .write_landed(&e, reservation_id, |stored| stored.is_active() && stored.seats == new_seats)
                .await;
            if !landed {
                map.revert(token);
                restore_held(&mut map, &to_release);
                return Err(ledger_failure("modify", e, &to_claim));
            }
        }
        token.commit();
        drop(map);

        info!(
            reservation_id = %reservation_id,
            released = to_release.len(),
            claimed = to_claim.len(),
            "Reservation modified"
        );
        Ok(ModifiedReservation {
            reservation_id,
            seats: new_seats,
            released: to_release,
            claimed: to_claim,
            total,
        })
    }

    pub async fn cancel(
        self: &Arc<Self>,
        reservation_id: ReservationId,
        user_id: UserId,
    ) -> Result<Reservation, ReservationError> {
        let existing = self.load_owned(reservation_id, &user_id).await?;
        let slot = self.slot(existing.seance_id).await?;

        let this = Arc::clone(self);
        run_to_completion(async move { this.cancel_locked(slot, reservation_id, user_id).await }).await
    }

    async fn cancel_locked(
        &self,
        slot: Arc<SeanceSlot>,
        reservation_id: ReservationId,
        user_id: UserId,
    ) -> Result<Reservation, ReservationError> {
        let mut map = slot.seats.lock().await;
        let mut current = self.load_owned(reservation_id, &user_id).await?;

        // Ledger first: if it fails the seats stay held by a still-active
        // reservation, never unavailable without an owner.
        if let Err(e) = self.ledger.mark_cancelled(reservation_id).await {
            let landed = self
                .write_landed(&e, reservation_id, |stored| !stored.is_active())
                .await;
            if !landed {
                return Err(ledger_failure("cancel", e, &current.seats));
            }
        }
        map.release(&current.seats);
        drop(map);

        current.status = ReservationStatus::Cancelled;
        info!(
            reservation_id = %reservation_id,
            seats = current.seats.len(),
            "Reservation cancelled"
        );
        Ok(current)
    }

    /// Compares the seat map with the ledger's active reservations.
    pub async fn audit(&self, seance_id: SeanceId) -> Result<SeatAudit, ReservationError> {
        let slot = self.slot(seance_id).await?;
        let map = slot.seats.lock().await;
        let active = self.ledger.list_active_by_seance(seance_id).await?;

        let mut held = BTreeSet::new();
        let mut double_booked = BTreeSet::new();
        for reservation in &active {
            for seat in &reservation.seats {
                if !held.insert(*seat) {
                    double_booked.insert(*seat);
                }
            }
        }
        let unavailable = map.unavailable();
        drop(map);

        Ok(SeatAudit {
            seance_id,
            orphaned_seats: unavailable.difference(&held).copied().collect(),
            unheld_seats: held.difference(&unavailable).copied().collect(),
            double_booked_seats: double_booked,
            active_reservations: active.len(),
        })
    }

    async fn slot(&self, seance_id: SeanceId) -> Result<Arc<SeanceSlot>, ReservationError> {
        self.seances
            .read()
            .await
            .get(&seance_id)
            .cloned()
            .ok_or(ReservationError::SeanceNotFound(seance_id))
    }

    /// After a failed ledger write, checks whether the write was applied
    /// anyway (commit reached the server but the acknowledgement was lost).
    /// Conflicts are never applied and are not re-read.
    async fn write_landed(
        &self,
        failure: &LedgerError,
        reservation_id: ReservationId,
        applied: impl Fn(&Reservation) -> bool,
    ) -> bool {
        if matches!(failure, LedgerError::SeatConflict) {
            return false;
        }
        match self.ledger.get(reservation_id).await {
            Ok(Some(stored)) if applied(&stored) => {
                warn!(
                    reservation_id = %reservation_id,
                    error = %failure,
                    "Ledger reported a failure but the write is stored, keeping it"
                );
                true
            }
            Ok(_) => false,
            Err(e) => {
                error!(
                    reservation_id = %reservation_id,
                    error = %e,
                    "Could not re-read ledger after failed write"
                );
                false
            }
        }
    }

    async fn load_owned(
        &self,
        reservation_id: ReservationId,
        user_id: &str,
    ) -> Result<Reservation, ReservationError> {
        let reservation = self
            .ledger
            .get(reservation_id)
            .await?
            .ok_or(ReservationError::NotFound(reservation_id))?;
        if reservation.user_id != user_id {
            return Err(ReservationError::Forbidden(reservation_id));
        }
        if !reservation.is_active() {
            return Err(ReservationError::InvalidState(format!(
                "reservation {} is already cancelled",
                reservation_id
            )));
        }
        Ok(reservation)
    }
}

async fn run_to_completion<T, F>(operation: F) -> Result<T, ReservationError>
where
    F: Future<Output = Result<T, ReservationError>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(operation)
        .await
        .map_err(|e| ReservationError::Internal(format!("reservation task failed: {}", e)))?
}

/// Puts back seats released earlier in the same locked section.
fn restore_held(map: &mut SeatMap, seats: &BTreeSet<SeatRef>) {
    match map.try_claim(seats) {
        Ok(token) => token.commit(),
        Err(e) => error!(seance_id = map.seance_id(), error = %e, "Failed to restore released seats"),
    }
}

fn ledger_failure(operation: &str, e: LedgerError, seats: &BTreeSet<SeatRef>) -> ReservationError {
    match e {
        LedgerError::SeatConflict => {
            error!("{}: ledger reports seats already held: {:?}", operation, seats);
            ReservationError::seat_unavailable(seats.iter().copied())
        }
        other => {
            error!("{} failed in ledger, rolled back: {:?}", operation, other);
            ReservationError::Storage(other)
        }
    }
}
