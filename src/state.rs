use std::sync::Arc;

use crate::mail::{MailDispatcher, Mailer};
use crate::services::{EventService, ReservationEngine, UserService};
use crate::session::{MemorySessionStore, ResetTokenStore, SessionStore};
use crate::store::{EventStore, MemoryStore, ReservationStore, UserStore};

/// Shared handles for request handlers. Cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<dyn SessionStore>,
    pub users: Arc<UserService>,
    pub events: Arc<EventService>,
    pub reservations: Arc<ReservationEngine>,
}

/// Backends a state is assembled from.
pub struct Backends {
    pub events: Arc<dyn EventStore>,
    pub reservations: Arc<dyn ReservationStore>,
    pub users: Arc<dyn UserStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub reset_tokens: Arc<dyn ResetTokenStore>,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub fn new(backends: Backends, frontend_url: &str) -> Self {
        let Backends {
            events,
            reservations,
            users,
            sessions,
            reset_tokens,
            mailer,
        } = backends;

        let user_service = UserService::new(
            users.clone(),
            sessions.clone(),
            reset_tokens,
            mailer.clone(),
            frontend_url,
        );
        let event_service = EventService::new(events.clone(), reservations.clone(), users);
        let engine = ReservationEngine::new(
            events,
            reservations,
            MailDispatcher::new(mailer),
            frontend_url,
        );

        Self {
            sessions,
            users: Arc::new(user_service),
            events: Arc::new(event_service),
            reservations: Arc::new(engine),
        }
    }

    /// Everything in process memory. Used by tests and local runs without
    /// Postgres or Redis.
    pub fn in_memory(mailer: Arc<dyn Mailer>, frontend_url: &str) -> Self {
        let store = Arc::new(MemoryStore::new());
        let sessions = Arc::new(MemorySessionStore::default());
        Self::new(
            Backends {
                events: store.clone(),
                reservations: store.clone(),
                users: store,
                sessions: sessions.clone(),
                reset_tokens: sessions,
                mailer,
            },
            frontend_url,
        )
    }
}
