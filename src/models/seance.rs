use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::SeatRef;

pub type SeanceId = i64;

/// A screening of a film. The seat layout is fixed when the seance is
/// registered and never renumbered afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Seance {
    pub id: SeanceId,
    pub film_id: i64,
    pub date: NaiveDate,
    pub time: NaiveTime,
    /// Key into the pricing tier table.
    pub price_key: String,
    pub seats: Vec<SeatRef>,
}

impl Seance {
    /// Builds a rectangular hall: every row in `rows` gets seats `1..=seats_per_row`.
    pub fn with_grid(
        id: SeanceId,
        film_id: i64,
        date: NaiveDate,
        time: NaiveTime,
        rows: impl IntoIterator<Item = char>,
        seats_per_row: u32,
    ) -> Self {
        let seats = rows
            .into_iter()
            .flat_map(|row| (1..=seats_per_row).map(move |number| SeatRef { row, number }))
            .collect();
        Self {
            id,
            film_id,
            date,
            time,
            price_key: "default".to_string(),
            seats,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct SeanceRow {
    pub id: i64,
    pub film_id: i64,
    pub show_date: NaiveDate,
    pub show_time: NaiveTime,
    pub price_key: String,
}
