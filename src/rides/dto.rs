use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::store::types::{DropOff, Pickup, RideRequest, RideStatus};

#[derive(Debug, Deserialize)]
pub struct SubmitRideRequest {
    pub rider_id: i64,
    pub pickup: Pickup,
    #[serde(default)]
    pub drop: Option<DropOff>,
}

#[derive(Debug, Deserialize)]
pub struct ClaimRideRequest {
    pub driver_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct ActorRequest {
    pub by_user_id: i64,
}

#[derive(Debug, Serialize)]
pub struct RideResponse {
    pub id: Uuid,
    pub rider_id: i64,
    pub driver_id: Option<i64>,
    pub status: RideStatus,
    pub pickup: Pickup,
    pub drop: Option<DropOff>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub claimed_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub ended_at: Option<OffsetDateTime>,
}

impl From<RideRequest> for RideResponse {
    fn from(ride: RideRequest) -> Self {
        Self {
            pickup: ride.pickup(),
            drop: ride.dropoff(),
            id: ride.id,
            rider_id: ride.rider_id,
            driver_id: ride.driver_id,
            status: ride.status,
            created_at: ride.created_at,
            claimed_at: ride.claimed_at,
            ended_at: ride.ended_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum ClaimResponse {
    Claimed { ride: RideResponse },
    AlreadyTaken,
}
