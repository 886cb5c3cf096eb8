use axum::extract::State;
use axum::response::Response;
use uuid::Uuid;

use crate::auth::{AuthContext, RequireUser};
use crate::services::events::{CreateEventInput, UpdateEventInput};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::extract::{ApiJson, ApiPath};
use crate::utils::response::{created, success};

fn event_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Event with id '{}' was not found", id))
}

pub async fn create_event(
    State(state): State<AppState>,
    RequireUser(auth): RequireUser,
    ApiJson(input): ApiJson<CreateEventInput>,
) -> Result<Response, AppError> {
    let res = state.events.create_event(&auth, input).await?;
    if res.error.is_some() {
        return Ok(success(res, "Event rejected"));
    }
    Ok(created(res, "Event created"))
}

pub async fn list_events(
    State(state): State<AppState>,
    RequireUser(auth): RequireUser,
) -> Result<Response, AppError> {
    let events = state.events.events(&auth).await?;
    Ok(success(events, "Events retrieved"))
}

pub async fn get_event(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Response, AppError> {
    let event = state
        .events
        .event_by_id(&auth, id)
        .await?
        .ok_or_else(|| event_not_found(id))?;
    Ok(success(event, "Event retrieved"))
}

pub async fn update_event(
    State(state): State<AppState>,
    RequireUser(auth): RequireUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<UpdateEventInput>,
) -> Result<Response, AppError> {
    let res = state
        .events
        .update_event(&auth, id, input)
        .await?
        .ok_or_else(|| event_not_found(id))?;
    let message = if res.error.is_some() {
        "Update rejected"
    } else {
        "Event updated"
    };
    Ok(success(res, message))
}

pub async fn delete_event(
    State(state): State<AppState>,
    RequireUser(auth): RequireUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Response, AppError> {
    if !state.events.delete_event(&auth, id).await? {
        return Err(event_not_found(id));
    }
    Ok(success(true, "Event deleted"))
}
