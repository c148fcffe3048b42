use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
    Json, Router,
};
use std::sync::Arc;

use crate::controllers::extract::AppPath;
use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::models::ReservationId;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/user/cancel/{id}", delete(cancel_reservation))
        .route("/user/my-reservations", get(my_reservations))
}

// DELETE /api/user/cancel/{id}
async fn cancel_reservation(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppPath(reservation_id): AppPath<ReservationId>,
) -> Result<impl IntoResponse, ApiError> {
    let cancelled = state.coordinator.cancel(reservation_id, user.user_id).await?;
    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "message": "Reservation cancelled",
            "reservationId": cancelled.id,
            "releasedSeats": cancelled.seats,
        })),
    ))
}

// GET /api/user/my-reservations
async fn my_reservations(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let summaries = state.query.user_reservations(&user.user_id).await?;
    Ok((StatusCode::OK, Json(summaries)))
}
