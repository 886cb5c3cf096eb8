use axum::extract::State;
use axum::response::Response;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::RequireUser;
use crate::services::reservations::ReserveResponse;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::extract::{ApiJson, ApiPath, ApiQuery};
use crate::utils::response::{created, success};

const DEFAULT_PAGE_SIZE: i64 = 10;

/// Missing fields deserialize as empty so they surface as field errors.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ReserveInput {
    pub email: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
    pub cursor: Option<DateTime<Utc>>,
}

pub async fn reserve(
    State(state): State<AppState>,
    ApiPath(event_id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<ReserveInput>,
) -> Result<Response, AppError> {
    let outcome = state
        .reservations
        .reserve(event_id, &input.email, &input.name)
        .await?;

    if outcome.is_reserved() {
        return Ok(created(ReserveResponse::from(outcome), "Reservation confirmed"));
    }
    Ok(success(ReserveResponse::from(outcome), "Reservation rejected"))
}

pub async fn list_reservations(
    State(state): State<AppState>,
    RequireUser(auth): RequireUser,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Response, AppError> {
    let page = state
        .reservations
        .paginated_reservations(
            &auth,
            query.limit.unwrap_or(DEFAULT_PAGE_SIZE),
            query.cursor,
        )
        .await?;
    Ok(success(page, "Reservations retrieved"))
}
