pub mod film;
pub mod reservation;
pub mod seance;
pub mod seat;

pub use film::Film;
pub use reservation::{Reservation, ReservationId, ReservationStatus, UserId};
pub use seance::{Seance, SeanceId, SeanceRow};
pub use seat::{SeatInput, SeatRef, SeatTier};
