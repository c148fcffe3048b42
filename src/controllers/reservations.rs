use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{post, put},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::controllers::extract::{AppJson, AppPath};
use crate::controllers::seances::with_current_seats;
use crate::error::{ApiError, ReservationError};
use crate::middleware::AuthUser;
use crate::models::{ReservationId, SeanceId, SeatInput, SeatRef};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/seances/reserve", post(create_reservation))
        .route("/seances/reserve/{id}", put(modify_reservation))
}

fn parse_seats(seats: &[SeatInput]) -> Result<Vec<SeatRef>, ReservationError> {
    seats.iter().map(SeatRef::try_from).collect()
}

// POST /api/seances/reserve
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateReservationRequest {
    seance_id: SeanceId,
    seats: Vec<SeatInput>,
}

async fn create_reservation(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppJson(req): AppJson<CreateReservationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let seats = parse_seats(&req.seats)?;

    match state.coordinator.create(req.seance_id, user.user_id, seats).await {
        Ok(created) => Ok((StatusCode::CREATED, Json(created))),
        Err(e) => Err(with_current_seats(&state, req.seance_id, e).await),
    }
}

// PUT /api/seances/reserve/{id}
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModifyReservationRequest {
    new_seats: Vec<SeatInput>,
}

async fn modify_reservation(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppPath(reservation_id): AppPath<ReservationId>,
    AppJson(req): AppJson<ModifyReservationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let seats = parse_seats(&req.new_seats)?;

    match state.coordinator.modify(reservation_id, user.user_id, seats).await {
        Ok(modified) => Ok((StatusCode::OK, Json(modified))),
        Err(e @ ReservationError::SeatUnavailable { .. }) => {
            let seance_id = state
                .coordinator
                .ledger()
                .get(reservation_id)
                .await
                .ok()
                .flatten()
                .map(|r| r.seance_id);
            match seance_id {
                Some(seance_id) => Err(with_current_seats(&state, seance_id, e).await),
                None => Err(e.into()),
            }
        }
        Err(e) => Err(e.into()),
    }
}
