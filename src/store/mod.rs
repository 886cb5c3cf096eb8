//! Storage interfaces the services depend on.
//!
//! Each entity gets its own narrow trait so a service only sees the
//! capabilities it needs. `db::PgStore` implements them against PostgreSQL,
//! [`memory::MemoryStore`] keeps everything in process.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{Event, EventPatch, NewEvent, NewUser, Reservation, User};
use crate::utils::error::AppError;

pub mod memory;

pub use memory::MemoryStore;

/// Result of an atomic admission attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    /// The counter was incremented and the reservation inserted. `event`
    /// reflects the counter after the increment.
    Admitted {
        event: Event,
        reservation: Reservation,
    },
    EventNotFound,
    CapacityReached,
}

/// Result of a conditional owner update.
#[derive(Debug, Clone, PartialEq)]
pub enum EventUpdate {
    Updated(Event),
    /// Missing event or a caller who does not own it.
    NotFound,
    /// The new `max_reservations` is below the current count.
    BelowCurrentAmount,
}

#[async_trait]
pub trait EventStore: Send + Sync {
    async fn find_event(&self, id: Uuid) -> Result<Option<Event>, AppError>;

    async fn insert_event(&self, event: NewEvent) -> Result<Event, AppError>;

    /// Applies `patch` only when `owner_id` owns the event and the new
    /// capacity, if any, still covers `amount_reservations`.
    async fn update_event(
        &self,
        id: Uuid,
        owner_id: Uuid,
        patch: EventPatch,
    ) -> Result<EventUpdate, AppError>;

    /// Deletes the event and all of its reservations. Returns `false` when
    /// nothing owned by `owner_id` matched.
    async fn delete_event(&self, id: Uuid, owner_id: Uuid) -> Result<bool, AppError>;

    async fn events_by_creator(&self, creator_id: Uuid) -> Result<Vec<Event>, AppError>;
}

#[async_trait]
pub trait ReservationStore: Send + Sync {
    /// Checks capacity, increments `amount_reservations` and inserts the
    /// reservation as one serialized step per event.
    async fn admit(&self, event_id: Uuid, email: &str, name: &str) -> Result<Admission, AppError>;

    async fn reservations_for_event(&self, event_id: Uuid) -> Result<Vec<Reservation>, AppError>;

    /// Reservations on events created by `owner_id`, `created_at` descending,
    /// strictly older than `cursor` when given, at most `fetch` rows.
    async fn reservations_by_owner(
        &self,
        owner_id: Uuid,
        cursor: Option<DateTime<Utc>>,
        fetch: i64,
    ) -> Result<Vec<Reservation>, AppError>;
}

/// Outcome of inserting a user whose username or email may already exist.
#[derive(Debug, Clone, PartialEq)]
pub enum UserInsert {
    Created(User),
    UsernameTaken,
    EmailTaken,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, AppError>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    async fn insert_user(&self, user: NewUser) -> Result<UserInsert, AppError>;

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), AppError>;
}
