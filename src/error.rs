use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::collections::BTreeSet;

use crate::models::{ReservationId, SeanceId, SeatRef};
use crate::services::seat_map::SeatView;

/// Errors produced by the reservation core.
///
/// Everything except `Storage` and `Internal` is client-correctable: the
/// user picks again, the core never retries on its own.
#[derive(Debug, thiserror::Error)]
pub enum ReservationError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("seance {0} not found")]
    SeanceNotFound(SeanceId),

    #[error("seats unavailable: {}", join_seats(.seats))]
    SeatUnavailable { seats: BTreeSet<SeatRef> },

    #[error("reservation {0} not found")]
    NotFound(ReservationId),

    #[error("reservation {0} belongs to another user")]
    Forbidden(ReservationId),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error(transparent)]
    Storage(#[from] LedgerError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ReservationError {
    pub fn seat_unavailable(seats: impl IntoIterator<Item = SeatRef>) -> Self {
        ReservationError::SeatUnavailable {
            seats: seats.into_iter().collect(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ReservationError::Validation(_) => StatusCode::BAD_REQUEST,
            ReservationError::SeanceNotFound(_) | ReservationError::NotFound(_) => {
                StatusCode::NOT_FOUND
            }
            ReservationError::SeatUnavailable { .. } | ReservationError::InvalidState(_) => {
                StatusCode::CONFLICT
            }
            ReservationError::Forbidden(_) => StatusCode::FORBIDDEN,
            ReservationError::Storage(_) | ReservationError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ReservationError::Validation(_) => "VALIDATION_ERROR",
            ReservationError::SeanceNotFound(_) => "SEANCE_NOT_FOUND",
            ReservationError::SeatUnavailable { .. } => "SEAT_UNAVAILABLE",
            ReservationError::NotFound(_) => "NOT_FOUND",
            ReservationError::Forbidden(_) => "FORBIDDEN",
            ReservationError::InvalidState(_) => "INVALID_STATE",
            ReservationError::Storage(_) => "STORAGE_FAILURE",
            ReservationError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

fn join_seats(seats: &BTreeSet<SeatRef>) -> String {
    seats
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Failures of the durable reservation store.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("reservation {0} not found in ledger")]
    NotFound(ReservationId),

    /// The store itself rejected a seat that is already held by an active
    /// reservation (unique index on active seats).
    #[error("seat already held by another active reservation")]
    SeatConflict,

    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    #[error("corrupt ledger record: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// HTTP-facing error: a core error plus, for seat conflicts, the current
/// seat grid so the client can re-render without reloading.
#[derive(Debug)]
pub struct ApiError {
    pub error: ReservationError,
    pub seat_map: Option<Vec<SeatView>>,
}

impl ApiError {
    pub fn with_seat_map(error: ReservationError, seat_map: Vec<SeatView>) -> Self {
        Self {
            error,
            seat_map: Some(seat_map),
        }
    }
}

impl From<ReservationError> for ApiError {
    fn from(error: ReservationError) -> Self {
        Self {
            error,
            seat_map: None,
        }
    }
}

// Malformed bodies and path parameters are client input errors.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ReservationError::Validation(rejection.body_text()).into()
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ReservationError::Validation(rejection.body_text()).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.error.status_code();
        let code = self.error.code();

        let message = match &self.error {
            ReservationError::Storage(e) => {
                tracing::error!(error = %e, "Storage failure");
                "Reservation storage is temporarily unavailable".to_string()
            }
            ReservationError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };

        let mut body = json!({
            "error": message,
            "code": code,
        });

        if let ReservationError::SeatUnavailable { seats } = &self.error {
            body["seats"] = json!(seats);
        }
        if let Some(seat_map) = self.seat_map {
            body["seatMap"] = json!(seat_map);
        }

        (status, Json(body)).into_response()
    }
}
