use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::instrument;

use crate::error::RideError;
use crate::state::AppState;
use crate::store::types::User;
use crate::store::Store;
use crate::users::dto::{RegisterUserRequest, SetAvailabilityRequest, SetRoleRequest};

#[instrument(skip(state, body), fields(user_id = body.id))]
pub async fn register_user(
    State(state): State<AppState>,
    Json(body): Json<RegisterUserRequest>,
) -> Result<(StatusCode, Json<User>), RideError> {
    let user = state
        .store
        .register_user(body.id, body.role, body.display_name)
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<User>, RideError> {
    let user = state.store.get_user(id).await?.ok_or(RideError::NotFound)?;
    Ok(Json(user))
}

#[instrument(skip(state, body))]
pub async fn set_role(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<SetRoleRequest>,
) -> Result<Json<User>, RideError> {
    let user = state
        .store
        .set_role(id, body.role)
        .await?
        .ok_or(RideError::NotFound)?;
    Ok(Json(user))
}

/// Puts a driver on or off shift. Only users who can drive are in scope;
/// riders have nothing to toggle.
#[instrument(skip(state, body))]
pub async fn set_availability(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<SetAvailabilityRequest>,
) -> Result<Json<User>, RideError> {
    let user = state.store.get_user(id).await?.ok_or(RideError::NotFound)?;
    if !user.role.can_drive() {
        return Err(RideError::Forbidden("only drivers have an availability"));
    }
    let user = state
        .store
        .set_availability(id, body.available)
        .await?
        .ok_or(RideError::NotFound)?;
    Ok(Json(user))
}
