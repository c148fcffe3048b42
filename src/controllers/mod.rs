mod extract;
pub mod reservations;
pub mod seances;
pub mod user;

use axum::Router;
use std::sync::Arc;

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(seances::routes())
        .merge(reservations::routes())
        .merge(user::routes())
}
