use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::time::Duration;
use uuid::Uuid;

use super::{new_token, ResetTokenStore, SessionStore, FORGOT_PASSWORD_PREFIX, SESSION_PREFIX};
use crate::utils::error::AppError;

/// Redis-backed sessions and reset tokens.
///
/// Values are the user id as a string. Every key is written with `SETEX` so
/// Redis expires it on its own. Clones share one `ConnectionManager`.
#[derive(Clone)]
pub struct RedisSessionStore {
    conn: ConnectionManager,
    session_ttl: Duration,
}

impl RedisSessionStore {
    pub async fn connect(redis_url: &str, session_ttl: Duration) -> Result<Self, AppError> {
        let client = Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;

        tracing::info!(
            session_ttl_secs = session_ttl.as_secs(),
            "Connected to Redis"
        );

        Ok(Self { conn, session_ttl })
    }

    async fn get_user_id(&self, key: &str) -> Result<Option<Uuid>, AppError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(parse_user_id(key, value))
    }

    /// `GETDEL`: the read and the delete are one command, so only one
    /// caller ever sees the value.
    async fn take_user_id(&self, key: &str) -> Result<Option<Uuid>, AppError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = redis::cmd("GETDEL")
            .arg(key)
            .query_async(&mut conn)
            .await?;
        Ok(parse_user_id(key, value))
    }

    async fn set_user_id(&self, key: &str, user_id: Uuid, ttl: Duration) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(key, user_id.to_string(), ttl.as_secs().max(1))
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn create_session(&self, user_id: Uuid) -> Result<String, AppError> {
        let token = new_token();
        self.set_user_id(&format!("{SESSION_PREFIX}{token}"), user_id, self.session_ttl)
            .await?;

        tracing::debug!(user_id = %user_id, "Session created");
        Ok(token)
    }

    async fn resolve_session(&self, token: &str) -> Result<Option<Uuid>, AppError> {
        self.get_user_id(&format!("{SESSION_PREFIX}{token}")).await
    }

    async fn destroy_session(&self, token: &str) -> Result<(), AppError> {
        self.delete(&format!("{SESSION_PREFIX}{token}")).await
    }
}

#[async_trait]
impl ResetTokenStore for RedisSessionStore {
    async fn store_reset_token(
        &self,
        token: &str,
        user_id: Uuid,
        ttl: Duration,
    ) -> Result<(), AppError> {
        self.set_user_id(&format!("{FORGOT_PASSWORD_PREFIX}{token}"), user_id, ttl)
            .await
    }

    async fn take_reset_token(&self, token: &str) -> Result<Option<Uuid>, AppError> {
        self.take_user_id(&format!("{FORGOT_PASSWORD_PREFIX}{token}"))
            .await
    }
}

fn parse_user_id(key: &str, value: Option<String>) -> Option<Uuid> {
    value.and_then(|raw| match Uuid::parse_str(&raw) {
        Ok(id) => Some(id),
        Err(e) => {
            tracing::warn!(key, error = %e, "Ignoring malformed user id in Redis");
            None
        }
    })
}
