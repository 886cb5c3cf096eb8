use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{new_token, ResetTokenStore, SessionStore, FORGOT_PASSWORD_PREFIX, SESSION_PREFIX};
use crate::utils::error::AppError;

/// In-process stand-in for Redis. Expiry is checked lazily on read.
pub struct MemorySessionStore {
    entries: Mutex<HashMap<String, (Uuid, DateTime<Utc>)>>,
    session_ttl: Duration,
}

impl MemorySessionStore {
    pub fn new(session_ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            session_ttl,
        }
    }

    async fn put(&self, key: String, user_id: Uuid, ttl: Duration) -> Result<(), AppError> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| AppError::InternalServerError(format!("ttl out of range: {e}")))?;
        self.entries
            .lock()
            .await
            .insert(key, (user_id, Utc::now() + ttl));
        Ok(())
    }

    async fn get(&self, key: &str) -> Option<Uuid> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some((user_id, expires_at)) if *expires_at > Utc::now() => Some(*user_id),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    async fn take(&self, key: &str) -> Option<Uuid> {
        let entry = self.entries.lock().await.remove(key);
        entry
            .filter(|(_, expires_at)| *expires_at > Utc::now())
            .map(|(user_id, _)| user_id)
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(60 * 60 * 24 * 30))
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create_session(&self, user_id: Uuid) -> Result<String, AppError> {
        let token = new_token();
        self.put(format!("{SESSION_PREFIX}{token}"), user_id, self.session_ttl)
            .await?;
        Ok(token)
    }

    async fn resolve_session(&self, token: &str) -> Result<Option<Uuid>, AppError> {
        Ok(self.get(&format!("{SESSION_PREFIX}{token}")).await)
    }

    async fn destroy_session(&self, token: &str) -> Result<(), AppError> {
        self.entries
            .lock()
            .await
            .remove(&format!("{SESSION_PREFIX}{token}"));
        Ok(())
    }
}

#[async_trait]
impl ResetTokenStore for MemorySessionStore {
    async fn store_reset_token(
        &self,
        token: &str,
        user_id: Uuid,
        ttl: Duration,
    ) -> Result<(), AppError> {
        self.put(format!("{FORGOT_PASSWORD_PREFIX}{token}"), user_id, ttl)
            .await
    }

    async fn take_reset_token(&self, token: &str) -> Result<Option<Uuid>, AppError> {
        Ok(self.take(&format!("{FORGOT_PASSWORD_PREFIX}{token}")).await)
    }
}
