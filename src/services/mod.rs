pub mod events;
pub mod reservations;
pub mod users;

pub use events::EventService;
pub use reservations::ReservationEngine;
pub use users::UserService;
