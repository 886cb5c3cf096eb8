pub mod event;
pub mod reservation;
pub mod user;

pub use event::{Event, EventPatch, EventWithCreator, EventWithReservations, NewEvent};
pub use reservation::{PaginatedReservations, Reservation};
pub use user::{NewUser, PublicUser, User};
