use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ReservationError;

/// Identity of a seat inside one seance: row letter plus seat number.
///
/// Ordering is row first, then number, which is also the order of the
/// seat grid returned to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeatRef {
    pub row: char,
    pub number: u32,
}

impl SeatRef {
    pub fn new(row: char, number: u32) -> Result<Self, ReservationError> {
        if !row.is_ascii_uppercase() {
            return Err(ReservationError::Validation(format!(
                "row must be a letter A-Z, got {:?}",
                row
            )));
        }
        if number == 0 {
            return Err(ReservationError::Validation(format!(
                "seat number must be >= 1 (row {})",
                row
            )));
        }
        Ok(Self { row, number })
    }
}

impl fmt::Display for SeatRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.row, self.number)
    }
}

/// Seat reference as it arrives over the wire: `{"row": "A", "number": 1}`.
///
/// Kept loose on purpose so malformed input becomes a validation error
/// with a readable message instead of a JSON rejection.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SeatInput {
    pub row: String,
    pub number: i64,
}

impl TryFrom<&SeatInput> for SeatRef {
    type Error = ReservationError;

    fn try_from(input: &SeatInput) -> Result<Self, Self::Error> {
        let mut chars = input.row.trim().chars();
        let row = match (chars.next(), chars.next()) {
            (Some(c), None) => c.to_ascii_uppercase(),
            _ => {
                return Err(ReservationError::Validation(format!(
                    "row must be a single letter, got {:?}",
                    input.row
                )))
            }
        };
        let number = u32::try_from(input.number).map_err(|_| {
            ReservationError::Validation(format!("invalid seat number {}", input.number))
        })?;
        SeatRef::new(row, number)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeatTier {
    Standard,
    Vip,
}
