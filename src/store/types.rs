use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::RideError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Rider,
    Driver,
    Both,
}

impl Role {
    pub fn can_drive(self) -> bool {
        matches!(self, Role::Driver | Role::Both)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub role: Role,
    /// Drivers start offline and only join the dispatch pool after going
    /// available; rides they already claimed are unaffected.
    pub available: bool,
    pub display_name: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub archived_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RideStatus {
    Open,
    Claimed,
    Completed,
    Cancelled,
}

impl RideStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RideStatus::Completed | RideStatus::Cancelled)
    }
}

impl std::fmt::Display for RideStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RideStatus::Open => "open",
            RideStatus::Claimed => "claimed",
            RideStatus::Completed => "completed",
            RideStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Validated pickup point. Label is a free-text landmark from the rider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pickup {
    pub lat: f64,
    pub lng: f64,
    pub label: Option<String>,
}

/// Optional drop-off: either coordinates, a typed address, or nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DropOff {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub text: Option<String>,
}

impl DropOff {
    pub fn is_empty(&self) -> bool {
        self.lat.is_none() && self.lng.is_none() && self.text.is_none()
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RideRequest {
    pub id: Uuid,
    pub rider_id: i64,
    pub driver_id: Option<i64>,
    pub status: RideStatus,
    pub pickup_lat: f64,
    pub pickup_lng: f64,
    pub pickup_label: Option<String>,
    pub drop_lat: Option<f64>,
    pub drop_lng: Option<f64>,
    pub drop_text: Option<String>,
    pub created_at: OffsetDateTime,
    pub claimed_at: Option<OffsetDateTime>,
    pub ended_at: Option<OffsetDateTime>,
}

impl RideRequest {
    pub fn pickup(&self) -> Pickup {
        Pickup {
            lat: self.pickup_lat,
            lng: self.pickup_lng,
            label: self.pickup_label.clone(),
        }
    }

    pub fn dropoff(&self) -> Option<DropOff> {
        let d = DropOff {
            lat: self.drop_lat,
            lng: self.drop_lng,
            text: self.drop_text.clone(),
        };
        if d.is_empty() {
            None
        } else {
            Some(d)
        }
    }
}

/// Outcome of the atomic claim primitive.
#[derive(Debug, Clone)]
pub enum ClaimResult {
    Claimed(RideRequest),
    AlreadyTaken,
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum HandleState {
    Offered,
    Taken,
    Confirmed,
}

/// One outbound offer message, kept so a claim (or a crash-recovery re-run)
/// can edit every copy of the broadcast afterwards. `driver_id` is None for
/// the shared dispatch-channel copy.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DispatchHandle {
    pub ride_id: Uuid,
    pub chat_id: i64,
    pub message_id: i64,
    pub driver_id: Option<i64>,
    pub state: HandleState,
}

/// Keyset pagination cursor: creation timestamp plus ride id as tie-break.
/// Resumable under concurrent inserts, unlike an offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub created_at: OffsetDateTime,
    pub id: Uuid,
}

impl Cursor {
    pub fn encode(&self) -> String {
        let raw = format!("{}:{}", self.created_at.unix_timestamp_nanos(), self.id);
        URL_SAFE_NO_PAD.encode(raw)
    }

    pub fn decode(s: &str) -> Result<Self, RideError> {
        let invalid = || RideError::Validation("invalid history cursor".into());
        let raw = URL_SAFE_NO_PAD.decode(s).map_err(|_| invalid())?;
        let raw = String::from_utf8(raw).map_err(|_| invalid())?;
        let (ts, id) = raw.split_once(':').ok_or_else(invalid)?;
        let nanos: i128 = ts.parse().map_err(|_| invalid())?;
        let created_at =
            OffsetDateTime::from_unix_timestamp_nanos(nanos).map_err(|_| invalid())?;
        let id = Uuid::parse_str(id).map_err(|_| invalid())?;
        Ok(Cursor { created_at, id })
    }
}

#[derive(Debug, Clone)]
pub struct HistoryPage {
    pub items: Vec<RideRequest>,
    pub next_cursor: Option<Cursor>,
}
