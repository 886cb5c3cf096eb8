use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::reservation::Reservation;
use crate::models::user::PublicUser;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: Uuid,
    pub creator_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    /// `None` means unlimited.
    pub max_reservations: Option<i32>,
    pub amount_reservations: i32,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn is_full(&self) -> bool {
        matches!(self.max_reservations, Some(max) if self.amount_reservations >= max)
    }
}

/// Fields for a new event, already validated.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub creator_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub max_reservations: Option<i32>,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
}

/// Changes applied by the owner. `None` leaves a column untouched;
/// `Some(None)` clears a nullable column.
#[derive(Debug, Clone, Default)]
pub struct EventPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub max_reservations: Option<Option<i32>>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<Option<DateTime<Utc>>>,
}

impl EventPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.max_reservations.is_none()
            && self.start_date.is_none()
            && self.end_date.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventWithReservations {
    #[serde(flatten)]
    pub event: Event,
    pub reservations: Vec<Reservation>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventWithCreator {
    #[serde(flatten)]
    pub event: Event,
    pub creator: Option<PublicUser>,
}
