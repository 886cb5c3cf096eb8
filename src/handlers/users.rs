use axum::extract::State;
use axum::response::Response;
use serde::Deserialize;

use crate::auth::{AuthContext, RequireUser};
use crate::services::users::{ChangePasswordInput, LoginInput, RegisterInput};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::extract::ApiJson;
use crate::utils::response::{created, success};

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordInput {
    pub email: String,
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<RegisterInput>,
) -> Result<Response, AppError> {
    let res = state.users.register(input).await?;
    if res.error.is_some() {
        return Ok(success(res, "Registration rejected"));
    }
    Ok(created(res, "User registered"))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<LoginInput>,
) -> Result<Response, AppError> {
    let res = state.users.login(input).await?;
    let message = if res.error.is_some() {
        "Login rejected"
    } else {
        "Logged in"
    };
    Ok(success(res, message))
}

pub async fn logout(
    State(state): State<AppState>,
    RequireUser(auth): RequireUser,
) -> Response {
    let done = state.users.logout(&auth).await;
    success(done, "Logged out")
}

pub async fn me(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Response, AppError> {
    let user = state.users.me(&auth).await?;
    Ok(success(user, "Current user"))
}

pub async fn forgot_password(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<ForgotPasswordInput>,
) -> Result<Response, AppError> {
    let done = state.users.forgot_password(&input.email).await?;
    Ok(success(done, "If the account exists, a reset link was sent"))
}

pub async fn change_password(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<ChangePasswordInput>,
) -> Result<Response, AppError> {
    let res = state.users.change_password(input).await?;
    let message = if res.error.is_some() {
        "Password change rejected"
    } else {
        "Password changed"
    };
    Ok(success(res, message))
}
