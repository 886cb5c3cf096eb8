//! In-process implementation of every storage trait.
//!
//! All tables live behind one lock, which is what serializes admissions.
//! Timestamps handed out are strictly increasing so cursor pages are exact.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{Admission, EventStore, EventUpdate, ReservationStore, UserInsert, UserStore};
use crate::models::{Event, EventPatch, NewEvent, NewUser, Reservation, User};
use crate::utils::error::AppError;

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    events: HashMap<Uuid, Event>,
    reservations: Vec<Reservation>,
    last_timestamp: Option<DateTime<Utc>>,
}

impl Tables {
    fn now(&mut self) -> DateTime<Utc> {
        let mut now = Utc::now();
        if let Some(last) = self.last_timestamp {
            if now <= last {
                now = last + Duration::microseconds(1);
            }
        }
        self.last_timestamp = Some(now);
        now
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored reservations, across all events.
    pub async fn reservation_count(&self) -> usize {
        self.tables.lock().await.reservations.len()
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn find_event(&self, id: Uuid) -> Result<Option<Event>, AppError> {
        Ok(self.tables.lock().await.events.get(&id).cloned())
    }

    async fn insert_event(&self, new: NewEvent) -> Result<Event, AppError> {
        let mut tables = self.tables.lock().await;
        let now = tables.now();
        let event = Event {
            id: Uuid::new_v4(),
            creator_id: new.creator_id,
            title: new.title,
            description: new.description,
            max_reservations: new.max_reservations,
            amount_reservations: 0,
            start_date: new.start_date,
            end_date: new.end_date,
            created_at: now,
            updated_at: now,
        };
        tables.events.insert(event.id, event.clone());
        Ok(event)
    }

    async fn update_event(
        &self,
        id: Uuid,
        owner_id: Uuid,
        patch: EventPatch,
    ) -> Result<EventUpdate, AppError> {
        let mut tables = self.tables.lock().await;
        let now = tables.now();

        let Some(event) = tables.events.get_mut(&id) else {
            return Ok(EventUpdate::NotFound);
        };
        if event.creator_id != owner_id {
            return Ok(EventUpdate::NotFound);
        }
        if let Some(Some(max)) = patch.max_reservations {
            if max < event.amount_reservations {
                return Ok(EventUpdate::BelowCurrentAmount);
            }
        }

        if let Some(title) = patch.title {
            event.title = title;
        }
        if let Some(description) = patch.description {
            event.description = Some(description);
        }
        if let Some(max) = patch.max_reservations {
            event.max_reservations = max;
        }
        if let Some(start_date) = patch.start_date {
            event.start_date = start_date;
        }
        if let Some(end_date) = patch.end_date {
            event.end_date = end_date;
        }
        event.updated_at = now;

        Ok(EventUpdate::Updated(event.clone()))
    }

    async fn delete_event(&self, id: Uuid, owner_id: Uuid) -> Result<bool, AppError> {
        let mut tables = self.tables.lock().await;
        match tables.events.get(&id) {
            Some(event) if event.creator_id == owner_id => {}
            _ => return Ok(false),
        }
        tables.reservations.retain(|r| r.event_id != id);
        tables.events.remove(&id);
        Ok(true)
    }

    async fn events_by_creator(&self, creator_id: Uuid) -> Result<Vec<Event>, AppError> {
        let tables = self.tables.lock().await;
        let mut events: Vec<Event> = tables
            .events
            .values()
            .filter(|e| e.creator_id == creator_id)
            .cloned()
            .collect();
        events.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(events)
    }
}

#[async_trait]
impl ReservationStore for MemoryStore {
    async fn admit(&self, event_id: Uuid, email: &str, name: &str) -> Result<Admission, AppError> {
        let mut tables = self.tables.lock().await;
        let now = tables.now();

        let Some(event) = tables.events.get_mut(&event_id) else {
            return Ok(Admission::EventNotFound);
        };
        if event.is_full() {
            return Ok(Admission::CapacityReached);
        }
        event.amount_reservations += 1;
        event.updated_at = now;
        let event = event.clone();

        let reservation = Reservation {
            id: Uuid::new_v4(),
            event_id,
            email: email.to_string(),
            name: name.to_string(),
            created_at: now,
            updated_at: now,
        };
        tables.reservations.push(reservation.clone());

        Ok(Admission::Admitted { event, reservation })
    }

    async fn reservations_for_event(&self, event_id: Uuid) -> Result<Vec<Reservation>, AppError> {
        let tables = self.tables.lock().await;
        let mut reservations: Vec<Reservation> = tables
            .reservations
            .iter()
            .filter(|r| r.event_id == event_id)
            .cloned()
            .collect();
        reservations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(reservations)
    }

    async fn reservations_by_owner(
        &self,
        owner_id: Uuid,
        cursor: Option<DateTime<Utc>>,
        fetch: i64,
    ) -> Result<Vec<Reservation>, AppError> {
        let tables = self.tables.lock().await;
        let mut reservations: Vec<Reservation> = tables
            .reservations
            .iter()
            .filter(|r| {
                tables
                    .events
                    .get(&r.event_id)
                    .is_some_and(|e| e.creator_id == owner_id)
            })
            .filter(|r| cursor.map_or(true, |c| r.created_at < c))
            .cloned()
            .collect();

        reservations.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        reservations.truncate(usize::try_from(fetch.max(0)).unwrap_or(usize::MAX));
        Ok(reservations)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let tables = self.tables.lock().await;
        Ok(tables.users.values().find(|u| u.username == username).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let tables = self.tables.lock().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn insert_user(&self, new: NewUser) -> Result<UserInsert, AppError> {
        let mut tables = self.tables.lock().await;
        if tables.users.values().any(|u| u.username == new.username) {
            return Ok(UserInsert::UsernameTaken);
        }
        if tables.users.values().any(|u| u.email == new.email) {
            return Ok(UserInsert::EmailTaken);
        }

        let now = tables.now();
        let user = User {
            id: Uuid::new_v4(),
            username: new.username,
            email: new.email,
            password: new.password_hash,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(user.id, user.clone());
        Ok(UserInsert::Created(user))
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), AppError> {
        let mut tables = self.tables.lock().await;
        let now = tables.now();
        let user = tables
            .users
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("user {id}")))?;
        user.password = password_hash.to_string();
        user.updated_at = now;
        Ok(())
    }
}
