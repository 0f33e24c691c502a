use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::instrument;
use uuid::Uuid;

use crate::error::RideError;
use crate::rides::dto::{ActorRequest, ClaimRideRequest, ClaimResponse, RideResponse, SubmitRideRequest};
use crate::rides::service::{self, ClaimOutcome};
use crate::state::AppState;
use crate::store::Store;

#[instrument(skip(state, body), fields(rider_id = body.rider_id))]
pub async fn submit_ride(
    State(state): State<AppState>,
    Json(body): Json<SubmitRideRequest>,
) -> Result<(StatusCode, Json<RideResponse>), RideError> {
    let ride = service::submit(
        state.store.as_ref(),
        &state.dispatcher,
        body.rider_id,
        body.pickup,
        body.drop,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(ride.into())))
}

#[instrument(skip(state))]
pub async fn get_ride(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RideResponse>, RideError> {
    let ride = state
        .store
        .get_ride_request(id)
        .await?
        .ok_or(RideError::NotFound)?;
    Ok(Json(ride.into()))
}

#[instrument(skip(state, body), fields(driver_id = body.driver_id))]
pub async fn claim_ride(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<ClaimRideRequest>,
) -> Result<Json<ClaimResponse>, RideError> {
    let outcome =
        service::claim(state.store.as_ref(), &state.dispatcher, id, body.driver_id).await?;
    let response = match outcome {
        ClaimOutcome::Claimed(ride) => ClaimResponse::Claimed { ride: ride.into() },
        ClaimOutcome::AlreadyTaken => ClaimResponse::AlreadyTaken,
    };
    Ok(Json(response))
}

#[instrument(skip(state, body), fields(by_user_id = body.by_user_id))]
pub async fn cancel_ride(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<ActorRequest>,
) -> Result<Json<RideResponse>, RideError> {
    let ride = service::cancel(
        state.store.as_ref(),
        &state.dispatcher,
        id,
        body.by_user_id,
        state.config.admin_id,
    )
    .await?;
    Ok(Json(ride.into()))
}

#[instrument(skip(state, body), fields(by_user_id = body.by_user_id))]
pub async fn complete_ride(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<ActorRequest>,
) -> Result<Json<RideResponse>, RideError> {
    let ride = service::complete(
        state.store.as_ref(),
        id,
        body.by_user_id,
        state.config.admin_id,
    )
    .await?;
    Ok(Json(ride.into()))
}
