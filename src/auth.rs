//! Per-request authentication context.
//!
//! The session is resolved once from `Authorization: Bearer <token>` and
//! passed explicitly into every operation that cares about the caller.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::state::AppState;
use crate::utils::error::AppError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: Option<Uuid>,
    /// Raw bearer token, kept so logout can destroy the session.
    pub token: Option<String>,
}

impl AuthContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user(user_id: Uuid) -> Self {
        Self {
            user_id: Some(user_id),
            token: None,
        }
    }

    pub fn require_user(&self) -> Result<Uuid, AppError> {
        self.user_id.ok_or_else(AppError::unauthenticated)
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Unknown or expired tokens yield an anonymous context rather than a
/// rejection; operations that need a user call [`AuthContext::require_user`].
#[async_trait]
impl FromRequestParts<AppState> for AuthContext {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(parts) else {
            return Ok(Self::anonymous());
        };

        let user_id = state.sessions.resolve_session(token).await?;
        if user_id.is_none() {
            tracing::debug!("Bearer token did not match a live session");
        }

        Ok(Self {
            user_id,
            token: Some(token.to_string()),
        })
    }
}

/// Extractor for routes that reject anonymous callers outright.
#[derive(Debug, Clone)]
pub struct RequireUser(pub AuthContext);

#[async_trait]
impl FromRequestParts<AppState> for RequireUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth = AuthContext::from_request_parts(parts, state).await?;
        auth.require_user()?;
        Ok(Self(auth))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn bearer_token_parsing() {
        assert_eq!(bearer_token(&parts(Some("Bearer abc"))), Some("abc"));
        assert_eq!(bearer_token(&parts(Some("Basic abc"))), None);
        assert_eq!(bearer_token(&parts(Some("Bearer   "))), None);
        assert_eq!(bearer_token(&parts(None)), None);
    }

    #[test]
    fn anonymous_context_is_rejected_by_require_user() {
        assert!(AuthContext::anonymous().require_user().is_err());
        let id = Uuid::new_v4();
        assert_eq!(AuthContext::user(id).require_user().unwrap(), id);
    }
}
