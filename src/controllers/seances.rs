use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use std::sync::Arc;

use crate::controllers::extract::AppPath;
use crate::error::{ApiError, ReservationError};
use crate::models::SeanceId;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/seances/{id}", get(get_seance))
        .route("/admin/seances/{id}/audit", get(audit_seance))
}

// GET /api/seances/{id}
async fn get_seance(
    State(state): State<Arc<AppState>>,
    AppPath(seance_id): AppPath<SeanceId>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state.query.seance_view(seance_id).await?;
    Ok((StatusCode::OK, Json(view)))
}

// GET /api/admin/seances/{id}/audit
async fn audit_seance(
    State(state): State<Arc<AppState>>,
    AppPath(seance_id): AppPath<SeanceId>,
) -> Result<impl IntoResponse, ApiError> {
    let audit = state.coordinator.audit(seance_id).await?;
    if !audit.is_consistent() {
        tracing::error!("Seat map and ledger diverged for seance {}: {:?}", seance_id, audit);
    }
    Ok((StatusCode::OK, Json(audit)))
}

/// Attaches the current seat grid to a seat conflict so the client can
/// re-render and let the user pick again.
pub(crate) async fn with_current_seats(
    state: &AppState,
    seance_id: SeanceId,
    error: ReservationError,
) -> ApiError {
    if !matches!(error, ReservationError::SeatUnavailable { .. }) {
        return error.into();
    }
    match state.query.seance_view(seance_id).await {
        Ok(view) => ApiError::with_seat_map(error, view.seats),
        Err(e) => {
            tracing::warn!("Could not load seat map for conflict response: {}", e);
            error.into()
        }
    }
}
