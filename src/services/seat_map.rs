use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::error::ReservationError;
use crate::models::{SeanceId, SeatRef, SeatTier};
use crate::services::pricing::PricingPolicy;

/// Seat availability for one seance.
///
/// Availability is the only state kept here; counts are computed from it
/// on demand. Callers reach a `SeatMap` only through the seance mutex in
/// the coordinator, so every `&mut self` method runs serialized per seance.
#[derive(Debug, Clone)]
pub struct SeatMap {
    seance_id: SeanceId,
    seats: BTreeMap<SeatRef, bool>,
}

/// Proof of a successful claim, used to undo it if the ledger write fails.
#[derive(Debug)]
#[must_use = "a claim must be committed or reverted"]
pub struct ClaimToken {
    seance_id: SeanceId,
    seats: BTreeSet<SeatRef>,
}

impl ClaimToken {
    pub fn seats(&self) -> &BTreeSet<SeatRef> {
        &self.seats
    }

    /// Keeps the claim. The seats stay unavailable.
    pub fn commit(self) {}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeatView {
    pub row: char,
    pub number: u32,
    pub tier: SeatTier,
    pub price: i64,
    pub available: bool,
}

impl SeatMap {
    pub fn new(
        seance_id: SeanceId,
        seats: impl IntoIterator<Item = SeatRef>,
    ) -> Result<Self, ReservationError> {
        let mut map = BTreeMap::new();
        for seat in seats {
            if map.insert(seat, true).is_some() {
                return Err(ReservationError::Validation(format!(
                    "seat {} appears twice in seance {}",
                    seat, seance_id
                )));
            }
        }
        Ok(Self { seance_id, seats: map })
    }

    pub fn seance_id(&self) -> SeanceId {
        self.seance_id
    }

    pub fn contains(&self, seat: &SeatRef) -> bool {
        self.seats.contains_key(seat)
    }

    pub fn is_available(&self, seat: &SeatRef) -> bool {
        self.seats.get(seat).copied().unwrap_or(false)
    }

    /// Claims all of `seats` or none of them.
    ///
    /// On conflict the error names exactly the requested seats that were
    /// already taken; nothing is flipped.
    pub fn try_claim(&mut self, seats: &BTreeSet<SeatRef>) -> Result<ClaimToken, ReservationError> {
        let unknown: Vec<String> = seats
            .iter()
            .filter(|seat| !self.contains(seat))
            .map(ToString::to_string)
            .collect();
        if !unknown.is_empty() {
            return Err(ReservationError::Validation(format!(
                "unknown seats for seance {}: {}",
                self.seance_id,
                unknown.join(", ")
            )));
        }

        let taken: BTreeSet<SeatRef> = seats
            .iter()
            .filter(|seat| !self.is_available(seat))
            .copied()
            .collect();
        if !taken.is_empty() {
            return Err(ReservationError::SeatUnavailable { seats: taken });
        }

        for seat in seats {
            self.seats.insert(*seat, false);
        }
        Ok(ClaimToken {
            seance_id: self.seance_id,
            seats: seats.clone(),
        })
    }

    /// Flips seats back to available. Already-available and unknown seats
    /// are left untouched.
    pub fn release(&mut self, seats: &BTreeSet<SeatRef>) {
        for seat in seats {
            if let Some(available) = self.seats.get_mut(seat) {
                *available = true;
            }
        }
    }

    /// Undoes a claim made on this map.
    pub fn revert(&mut self, token: ClaimToken) {
        debug_assert_eq!(token.seance_id, self.seance_id);
        self.release(&token.seats);
    }

    pub fn capacity(&self) -> usize {
        self.seats.len()
    }

    pub fn available_count(&self) -> usize {
        self.seats.values().filter(|available| **available).count()
    }

    pub fn unavailable(&self) -> BTreeSet<SeatRef> {
        self.seats
            .iter()
            .filter(|(_, available)| !**available)
            .map(|(seat, _)| *seat)
            .collect()
    }

    pub fn snapshot(&self, pricing: &PricingPolicy, price_key: &str) -> Vec<SeatView> {
        self.seats
            .iter()
            .map(|(seat, available)| SeatView {
                row: seat.row,
                number: seat.number,
                tier: pricing.tier_of(seat),
                price: pricing.price_of(price_key, seat),
                available: *available,
            })
            .collect()
    }
}
