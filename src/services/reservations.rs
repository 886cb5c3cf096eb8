//! Reservation admission and the owner's paginated reservation list.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::auth::AuthContext;
use crate::mail::{MailDispatcher, MailTemplate};
use crate::models::{PaginatedReservations, Reservation};
use crate::store::{Admission, EventStore, ReservationStore};
use crate::utils::error::AppError;
use crate::utils::validation::{is_blank, is_valid_email, FieldError};

pub const MAX_PAGE_SIZE: i64 = 50;

pub const EVENT_NOT_FOUND: &str = "event does not exist";
pub const CAPACITY_REACHED: &str = "maximum reservations reached";

#[derive(Debug, Clone, PartialEq)]
pub enum ReserveOutcome {
    Reserved(Reservation),
    FieldError(FieldError),
    /// General, non-field failure such as a missing or full event.
    Error(String),
}

impl ReserveOutcome {
    pub fn is_reserved(&self) -> bool {
        matches!(self, ReserveOutcome::Reserved(_))
    }
}

/// Wire shape of an admission: `{success, error?, fieldError?}`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_error: Option<FieldError>,
}

impl From<ReserveOutcome> for ReserveResponse {
    fn from(outcome: ReserveOutcome) -> Self {
        match outcome {
            ReserveOutcome::Reserved(_) => Self {
                success: true,
                error: None,
                field_error: None,
            },
            ReserveOutcome::FieldError(field_error) => Self {
                success: false,
                error: None,
                field_error: Some(field_error),
            },
            ReserveOutcome::Error(error) => Self {
                success: false,
                error: Some(error),
                field_error: None,
            },
        }
    }
}

#[derive(Clone)]
pub struct ReservationEngine {
    events: Arc<dyn EventStore>,
    reservations: Arc<dyn ReservationStore>,
    mail: MailDispatcher,
    frontend_url: String,
}

impl ReservationEngine {
    pub fn new(
        events: Arc<dyn EventStore>,
        reservations: Arc<dyn ReservationStore>,
        mail: MailDispatcher,
        frontend_url: impl Into<String>,
    ) -> Self {
        Self {
            events,
            reservations,
            mail,
            frontend_url: frontend_url.into(),
        }
    }

    pub async fn reserve(
        &self,
        event_id: Uuid,
        email: &str,
        name: &str,
    ) -> Result<ReserveOutcome, AppError> {
        let (outcome, _confirmation) = self.reserve_tracked(event_id, email, name).await?;
        Ok(outcome)
    }

    /// Same as [`reserve`](Self::reserve), also handing back the confirmation
    /// mail task when one was spawned.
    #[tracing::instrument(skip(self, email, name))]
    pub async fn reserve_tracked(
        &self,
        event_id: Uuid,
        email: &str,
        name: &str,
    ) -> Result<(ReserveOutcome, Option<JoinHandle<()>>), AppError> {
        let email = email.trim();
        let name = name.trim();

        if is_blank(name) {
            return Ok((field_error("name", "please provide your name"), None));
        }
        if is_blank(email) {
            return Ok((field_error("email", "please provide your email"), None));
        }

        let Some(event) = self.events.find_event(event_id).await? else {
            return Ok((ReserveOutcome::Error(EVENT_NOT_FOUND.to_string()), None));
        };
        if event.is_full() {
            return Ok((ReserveOutcome::Error(CAPACITY_REACHED.to_string()), None));
        }

        if !is_valid_email(email) {
            return Ok((field_error("email", "please enter a valid email"), None));
        }

        // The read above is only a fast path; the store re-checks capacity
        // atomically with the increment.
        let (event, reservation) = match self.reservations.admit(event_id, email, name).await? {
            Admission::Admitted { event, reservation } => (event, reservation),
            Admission::EventNotFound => {
                return Ok((ReserveOutcome::Error(EVENT_NOT_FOUND.to_string()), None));
            }
            Admission::CapacityReached => {
                tracing::debug!("Lost the race for the last seat");
                return Ok((ReserveOutcome::Error(CAPACITY_REACHED.to_string()), None));
            }
        };

        tracing::info!(
            reservation_id = %reservation.id,
            amount_reservations = event.amount_reservations,
            max_reservations = ?event.max_reservations,
            "Reservation admitted"
        );

        let confirmation = self.mail.dispatch(
            reservation.email.clone(),
            "Reserved event".to_string(),
            MailTemplate::ReserveEvent {
                event: event.title.clone(),
                event_link: format!("{}/events/{}", self.frontend_url, event.id),
            },
        );

        Ok((ReserveOutcome::Reserved(reservation), Some(confirmation)))
    }

    /// Reservations on the caller's events, newest first. `limit` is clamped
    /// to `0..=MAX_PAGE_SIZE`; `cursor` excludes rows at or after it.
    pub async fn paginated_reservations(
        &self,
        auth: &AuthContext,
        limit: i64,
        cursor: Option<DateTime<Utc>>,
    ) -> Result<PaginatedReservations, AppError> {
        let owner_id = auth.require_user()?;
        let limit = limit.clamp(0, MAX_PAGE_SIZE);
        let fetch = limit + 1;

        let mut reservations = self
            .reservations
            .reservations_by_owner(owner_id, cursor, fetch)
            .await?;

        let has_more = reservations.len() as i64 == fetch;
        reservations.truncate(limit as usize);

        Ok(PaginatedReservations {
            reservations,
            has_more,
        })
    }
}

fn field_error(field: &str, message: &str) -> ReserveOutcome {
    ReserveOutcome::FieldError(FieldError::new(field, message))
}
