use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

use crate::error::ReservationError;
use crate::models::{ReservationId, SeanceId, SeatTier};
use crate::services::catalog::FilmDirectory;
use crate::services::coordinator::ReservationCoordinator;
use crate::services::seat_map::SeatView;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeanceView {
    pub id: SeanceId,
    pub film_id: i64,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub capacity: usize,
    pub available: usize,
    pub seats: Vec<SeatView>,
}

/// One reserved seat as shown in "my reservations".
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationSummary {
    pub reservation_id: ReservationId,
    pub seance_id: SeanceId,
    pub film: String,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub row: char,
    pub seat: u32,
    pub tier: SeatTier,
    pub price: i64,
    pub reservation_date: DateTime<Utc>,
}

/// Read side. Never mutates the seat maps or the ledger.
#[derive(Clone)]
pub struct QueryFacade {
    coordinator: Arc<ReservationCoordinator>,
    films: Arc<dyn FilmDirectory>,
}

impl QueryFacade {
    pub fn new(coordinator: Arc<ReservationCoordinator>, films: Arc<dyn FilmDirectory>) -> Self {
        Self { coordinator, films }
    }

    pub async fn seance_view(&self, seance_id: SeanceId) -> Result<SeanceView, ReservationError> {
        let snapshot = self.coordinator.snapshot(seance_id).await?;
        let available = snapshot.seats.iter().filter(|s| s.available).count();
        Ok(SeanceView {
            id: snapshot.seance.id,
            film_id: snapshot.seance.film_id,
            date: snapshot.seance.date,
            time: snapshot.seance.time,
            capacity: snapshot.seats.len(),
            available,
            seats: snapshot.seats,
        })
    }

    pub async fn user_reservations(&self, user_id: &str) -> Result<Vec<ReservationSummary>, ReservationError> {
        let reservations = self.coordinator.ledger().list_by_user(user_id).await?;
        let pricing = self.coordinator.pricing();

        let mut titles: HashMap<i64, String> = HashMap::new();
        let mut summaries = Vec::new();

        for reservation in reservations {
            let seance = self.coordinator.seance(reservation.seance_id).await;
            if seance.is_none() {
                warn!(
                    "Reservation {} points at unknown seance {}",
                    reservation.id, reservation.seance_id
                );
            }

            let film = match &seance {
                Some(s) => self.film_title(&mut titles, s.film_id).await,
                None => String::new(),
            };
            let price_key = seance.as_ref().map(|s| s.price_key.as_str()).unwrap_or("default");

            for seat in &reservation.seats {
                summaries.push(ReservationSummary {
                    reservation_id: reservation.id,
                    seance_id: reservation.seance_id,
                    film: film.clone(),
                    date: seance.as_ref().map(|s| s.date),
                    time: seance.as_ref().map(|s| s.time),
                    row: seat.row,
                    seat: seat.number,
                    tier: pricing.tier_of(seat),
                    price: pricing.price_of(price_key, seat),
                    reservation_date: reservation.created_at,
                });
            }
        }
        Ok(summaries)
    }

    /// Catalog failures degrade to the film id instead of failing the listing.
    async fn film_title(&self, titles: &mut HashMap<i64, String>, film_id: i64) -> String {
        if let Some(title) = titles.get(&film_id) {
            return title.clone();
        }
        let title = match self.films.film(film_id).await {
            Ok(Some(film)) => film.title,
            Ok(None) => {
                warn!("Film {} not found in catalog", film_id);
                format!("film #{}", film_id)
            }
            Err(e) => {
                warn!("Film {} lookup failed: {}", film_id, e);
                format!("film #{}", film_id)
            }
        };
        titles.insert(film_id, title.clone());
        title
    }
}
