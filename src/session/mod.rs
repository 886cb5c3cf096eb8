//! Session tokens and single-use password-reset tokens.
//!
//! Both live in a key-value store with a TTL: Redis in production
//! ([`redis_store::RedisSessionStore`]) or [`memory::MemorySessionStore`] in tests.

use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;

use crate::utils::error::AppError;

pub mod memory;
pub mod redis_store;

pub use self::memory::MemorySessionStore;
pub use self::redis_store::RedisSessionStore;

pub const SESSION_PREFIX: &str = "sess:";
pub const FORGOT_PASSWORD_PREFIX: &str = "forget-password:";

/// How long a password-reset link stays valid.
pub const RESET_TOKEN_TTL: Duration = Duration::from_secs(60 * 60 * 24);

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Opens a session for `user_id` and returns its bearer token.
    async fn create_session(&self, user_id: Uuid) -> Result<String, AppError>;

    async fn resolve_session(&self, token: &str) -> Result<Option<Uuid>, AppError>;

    async fn destroy_session(&self, token: &str) -> Result<(), AppError>;
}

#[async_trait]
pub trait ResetTokenStore: Send + Sync {
    async fn store_reset_token(
        &self,
        token: &str,
        user_id: Uuid,
        ttl: Duration,
    ) -> Result<(), AppError>;

    /// Reads and deletes the token in one step, so a token is redeemed at
    /// most once even under concurrent requests.
    async fn take_reset_token(&self, token: &str) -> Result<Option<Uuid>, AppError>;
}

pub fn new_token() -> String {
    Uuid::new_v4().simple().to_string()
}
