use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::AuthContext;
use crate::models::{
    Event, EventPatch, EventWithCreator, EventWithReservations, NewEvent, PublicUser,
};
use crate::store::{EventStore, EventUpdate, ReservationStore, UserStore};
use crate::utils::error::AppError;
use crate::utils::validation::FieldError;

const MIN_TITLE_LEN: usize = 5;
const INVALID_DATE: &str = "please enter a valid date";
const BELOW_CURRENT_AMOUNT: &str = "cannot be lower than the current amount of reservations";

/// Dates arrive as epoch milliseconds, the way the web client sends them.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventInput {
    pub title: String,
    pub description: Option<String>,
    pub max_reservations: Option<i32>,
    pub start_date: f64,
    pub end_date: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEventInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub max_reservations: Option<i32>,
    /// `true` removes the cap and wins over `max_reservations`.
    pub clear_max_reservations: Option<bool>,
    pub start_date: Option<f64>,
    /// `true` sets `end_date`, `false` clears it, absent leaves it alone.
    pub use_end_date: Option<bool>,
    pub end_date: Option<f64>,
}

/// `{error}` or `{event}`, never both.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FieldError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<Event>,
}

impl EventResponse {
    fn field_error(field: &str, message: &str) -> Self {
        Self {
            error: Some(FieldError::new(field, message)),
            event: None,
        }
    }

    fn event(event: Event) -> Self {
        Self {
            error: None,
            event: Some(event),
        }
    }
}

#[derive(Clone)]
pub struct EventService {
    events: Arc<dyn EventStore>,
    reservations: Arc<dyn ReservationStore>,
    users: Arc<dyn UserStore>,
}

impl EventService {
    pub fn new(
        events: Arc<dyn EventStore>,
        reservations: Arc<dyn ReservationStore>,
        users: Arc<dyn UserStore>,
    ) -> Self {
        Self {
            events,
            reservations,
            users,
        }
    }

    pub async fn create_event(
        &self,
        auth: &AuthContext,
        input: CreateEventInput,
    ) -> Result<EventResponse, AppError> {
        let creator_id = auth.require_user()?;

        let Some(start_date) = millis_to_datetime(input.start_date) else {
            return Ok(EventResponse::field_error("startDate", INVALID_DATE));
        };
        let end_date = match input.end_date {
            Some(ms) => match millis_to_datetime(ms) {
                Some(date) => Some(date),
                None => return Ok(EventResponse::field_error("endDate", INVALID_DATE)),
            },
            None => None,
        };

        if start_date < Utc::now() {
            return Ok(EventResponse::field_error(
                "startDate",
                "choose another date that has not passed yet",
            ));
        }
        if let Some(error) = check_date_order(start_date, end_date) {
            return Ok(EventResponse { error: Some(error), event: None });
        }
        if let Some(error) = check_title(&input.title) {
            return Ok(EventResponse { error: Some(error), event: None });
        }
        if matches!(input.max_reservations, Some(max) if max < 1) {
            return Ok(EventResponse::field_error("maxReservations", "must be at least 1"));
        }

        let event = self
            .events
            .insert_event(NewEvent {
                creator_id,
                title: input.title.trim().to_string(),
                description: input.description,
                max_reservations: input.max_reservations,
                start_date,
                end_date,
            })
            .await?;

        tracing::info!(event_id = %event.id, creator_id = %creator_id, "Event created");
        Ok(EventResponse::event(event))
    }

    /// The caller's events with their reservations, newest event first.
    pub async fn events(&self, auth: &AuthContext) -> Result<Vec<EventWithReservations>, AppError> {
        let creator_id = auth.require_user()?;

        let events = self.events.events_by_creator(creator_id).await?;
        let mut result = Vec::with_capacity(events.len());
        for event in events {
            let reservations = self.reservations.reservations_for_event(event.id).await?;
            result.push(EventWithReservations {
                event,
                reservations,
            });
        }
        Ok(result)
    }

    pub async fn event_by_id(
        &self,
        auth: &AuthContext,
        id: Uuid,
    ) -> Result<Option<EventWithCreator>, AppError> {
        let Some(event) = self.events.find_event(id).await? else {
            return Ok(None);
        };

        let creator = self
            .users
            .find_user_by_id(event.creator_id)
            .await?
            .map(|user| PublicUser::for_viewer(&user, auth.user_id));

        Ok(Some(EventWithCreator { event, creator }))
    }

    /// `Ok(None)` when the event is missing, not the caller's, or the patch
    /// is empty.
    pub async fn update_event(
        &self,
        auth: &AuthContext,
        id: Uuid,
        input: UpdateEventInput,
    ) -> Result<Option<EventResponse>, AppError> {
        let owner_id = auth.require_user()?;

        let Some(current) = self.events.find_event(id).await? else {
            return Ok(None);
        };
        if current.creator_id != owner_id {
            return Ok(None);
        }

        let mut patch = EventPatch::default();

        if let Some(title) = input.title {
            if let Some(error) = check_title(&title) {
                return Ok(Some(EventResponse { error: Some(error), event: None }));
            }
            patch.title = Some(title.trim().to_string());
        }
        patch.description = input.description;

        if input.clear_max_reservations == Some(true) {
            patch.max_reservations = Some(None);
        } else if let Some(max) = input.max_reservations {
            if max < 1 {
                return Ok(Some(EventResponse::field_error(
                    "maxReservations",
                    BELOW_CURRENT_AMOUNT,
                )));
            }
            patch.max_reservations = Some(Some(max));
        }

        if let Some(ms) = input.start_date {
            let Some(start_date) = millis_to_datetime(ms) else {
                return Ok(Some(EventResponse::field_error("startDate", INVALID_DATE)));
            };
            patch.start_date = Some(start_date);
        }

        match (input.use_end_date, input.end_date) {
            (Some(true), Some(ms)) => {
                let Some(end_date) = millis_to_datetime(ms) else {
                    return Ok(Some(EventResponse::field_error("endDate", INVALID_DATE)));
                };
                patch.end_date = Some(Some(end_date));
            }
            (Some(false), _) => patch.end_date = Some(None),
            _ => {}
        }

        if patch.is_empty() {
            return Ok(None);
        }

        let start_date = patch.start_date.unwrap_or(current.start_date);
        let end_date = patch.end_date.unwrap_or(current.end_date);
        if let Some(error) = check_date_order(start_date, end_date) {
            return Ok(Some(EventResponse { error: Some(error), event: None }));
        }

        match self.events.update_event(id, owner_id, patch).await? {
            EventUpdate::Updated(event) => {
                tracing::info!(event_id = %event.id, "Event updated");
                Ok(Some(EventResponse::event(event)))
            }
            EventUpdate::BelowCurrentAmount => Ok(Some(EventResponse::field_error(
                "maxReservations",
                BELOW_CURRENT_AMOUNT,
            ))),
            EventUpdate::NotFound => Ok(None),
        }
    }

    /// Deletes the event and its reservations. `false` when the caller does
    /// not own an event with that id.
    pub async fn delete_event(&self, auth: &AuthContext, id: Uuid) -> Result<bool, AppError> {
        let owner_id = auth.require_user()?;
        self.events.delete_event(id, owner_id).await
    }
}

fn millis_to_datetime(ms: f64) -> Option<DateTime<Utc>> {
    if !ms.is_finite() || ms.abs() > i64::MAX as f64 {
        return None;
    }
    DateTime::from_timestamp_millis(ms as i64)
}

fn check_title(title: &str) -> Option<FieldError> {
    (title.trim().chars().count() < MIN_TITLE_LEN).then(|| {
        FieldError::new(
            "title",
            format!("title should have a minimum length of {MIN_TITLE_LEN}"),
        )
    })
}

fn check_date_order(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Option<FieldError> {
    match end {
        Some(end) if start >= end => Some(FieldError::new(
            "endDate",
            "end date should be later than the start date",
        )),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewUser;
    use crate::store::{Admission, MemoryStore, UserInsert};
    use chrono::Duration;

    fn service() -> (Arc<MemoryStore>, EventService) {
        let store = Arc::new(MemoryStore::new());
        let service = EventService::new(store.clone(), store.clone(), store.clone());
        (store, service)
    }

    fn millis(date: DateTime<Utc>) -> f64 {
        date.timestamp_millis() as f64
    }

    fn input(title: &str) -> CreateEventInput {
        CreateEventInput {
            title: title.into(),
            description: Some("Talks and pizza".into()),
            max_reservations: Some(2),
            start_date: millis(Utc::now() + Duration::days(3)),
            end_date: Some(millis(Utc::now() + Duration::days(3) + Duration::hours(2))),
        }
    }

    async fn create(service: &EventService, owner: Uuid) -> Event {
        service
            .create_event(&AuthContext::user(owner), input("Rust meetup"))
            .await
            .unwrap()
            .event
            .unwrap()
    }

    #[tokio::test]
    async fn creates_event_owned_by_caller() {
        let (_, service) = service();
        let owner = Uuid::new_v4();
        let event = create(&service, owner).await;
        assert_eq!(event.creator_id, owner);
        assert_eq!(event.amount_reservations, 0);
        assert_eq!(event.max_reservations, Some(2));
    }

    #[tokio::test]
    async fn create_validation_order() {
        let (_, service) = service();
        let auth = AuthContext::user(Uuid::new_v4());

        let mut past = input("Rust meetup");
        past.start_date = millis(Utc::now() - Duration::days(1));
        let res = service.create_event(&auth, past).await.unwrap();
        assert_eq!(res.error.unwrap().field, "startDate");

        let mut backwards = input("Rust meetup");
        backwards.end_date = Some(backwards.start_date - 1000.0);
        let res = service.create_event(&auth, backwards).await.unwrap();
        assert_eq!(res.error.unwrap().field, "endDate");

        let res = service.create_event(&auth, input("Rust")).await.unwrap();
        assert_eq!(
            res.error.unwrap().message,
            "title should have a minimum length of 5"
        );

        let mut zero = input("Rust meetup");
        zero.max_reservations = Some(0);
        let res = service.create_event(&auth, zero).await.unwrap();
        assert_eq!(res.error.unwrap().field, "maxReservations");

        let mut nonsense = input("Rust meetup");
        nonsense.start_date = f64::INFINITY;
        let res = service.create_event(&auth, nonsense).await.unwrap();
        assert_eq!(res.error.unwrap(), FieldError::new("startDate", INVALID_DATE));
    }

    #[tokio::test]
    async fn create_requires_session() {
        let (_, service) = service();
        let err = service
            .create_event(&AuthContext::anonymous(), input("Rust meetup"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AuthError(_)));
    }

    #[tokio::test]
    async fn update_is_owner_only_and_keeps_untouched_fields() {
        let (_, service) = service();
        let owner = Uuid::new_v4();
        let event = create(&service, owner).await;

        let stranger = service
            .update_event(
                &AuthContext::user(Uuid::new_v4()),
                event.id,
                UpdateEventInput {
                    title: Some("Hijacked event".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(stranger.is_none());

        let updated = service
            .update_event(
                &AuthContext::user(owner),
                event.id,
                UpdateEventInput {
                    title: Some("Rust meetup #2".into()),
                    use_end_date: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap()
            .event
            .unwrap();
        assert_eq!(updated.title, "Rust meetup #2");
        assert_eq!(updated.max_reservations, Some(2));
        assert_eq!(updated.description.as_deref(), Some("Talks and pizza"));
        assert!(updated.end_date.is_none());
    }

    #[tokio::test]
    async fn empty_update_returns_nothing() {
        let (_, service) = service();
        let owner = Uuid::new_v4();
        let event = create(&service, owner).await;
        let res = service
            .update_event(&AuthContext::user(owner), event.id, UpdateEventInput::default())
            .await
            .unwrap();
        assert!(res.is_none());
    }

    #[tokio::test]
    async fn capacity_cannot_drop_below_admitted_count() {
        let (store, service) = service();
        let owner = Uuid::new_v4();
        let event = create(&service, owner).await;
        store.admit(event.id, "a@example.com", "A").await.unwrap();
        store.admit(event.id, "b@example.com", "B").await.unwrap();

        let res = service
            .update_event(
                &AuthContext::user(owner),
                event.id,
                UpdateEventInput {
                    max_reservations: Some(1),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            res.error.unwrap(),
            FieldError::new("maxReservations", BELOW_CURRENT_AMOUNT)
        );
    }

    #[tokio::test]
    async fn cap_can_be_removed_again() {
        let (store, service) = service();
        let owner = Uuid::new_v4();
        let event = create(&service, owner).await;
        store.admit(event.id, "a@example.com", "A").await.unwrap();
        store.admit(event.id, "b@example.com", "B").await.unwrap();

        let updated = service
            .update_event(
                &AuthContext::user(owner),
                event.id,
                UpdateEventInput {
                    clear_max_reservations: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap()
            .event
            .unwrap();
        assert_eq!(updated.max_reservations, None);

        let third = store.admit(event.id, "c@example.com", "C").await.unwrap();
        assert!(matches!(third, Admission::Admitted { .. }));
    }

    #[tokio::test]
    async fn delete_leaves_no_orphans() {
        let (store, service) = service();
        let owner = Uuid::new_v4();
        let event = create(&service, owner).await;
        store.admit(event.id, "a@example.com", "A").await.unwrap();

        assert!(!service
            .delete_event(&AuthContext::user(Uuid::new_v4()), event.id)
            .await
            .unwrap());
        assert!(service
            .delete_event(&AuthContext::user(owner), event.id)
            .await
            .unwrap());
        assert_eq!(store.reservation_count().await, 0);
        assert!(service
            .event_by_id(&AuthContext::anonymous(), event.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn event_by_id_hides_creator_email_from_others() {
        let (store, service) = service();
        let UserInsert::Created(user) = store
            .insert_user(NewUser {
                username: "janedoe".into(),
                email: "jane@example.com".into(),
                password_hash: "hash".into(),
            })
            .await
            .unwrap()
        else {
            panic!("user was not created");
        };
        let event = create(&service, user.id).await;

        let public = service
            .event_by_id(&AuthContext::anonymous(), event.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(public.creator.unwrap().email, "");

        let own = service
            .event_by_id(&AuthContext::user(user.id), event.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(own.creator.unwrap().email, "jane@example.com");
    }

    #[tokio::test]
    async fn events_lists_own_events_with_reservations() {
        let (store, service) = service();
        let owner = Uuid::new_v4();
        let event = create(&service, owner).await;
        create(&service, Uuid::new_v4()).await;
        store.admit(event.id, "a@example.com", "A").await.unwrap();

        let mine = service.events(&AuthContext::user(owner)).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].reservations.len(), 1);
    }
}
