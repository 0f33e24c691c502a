//! Ride lifecycle engine. State-free between calls: every transition
//! re-reads and re-writes through the store's conditional updates, so any
//! number of concurrent callers (across any number of processes) are safe
//! without an in-process lock.

use tracing::{info, warn};
use uuid::Uuid;

use crate::dispatch::Dispatcher;
use crate::error::RideError;
use crate::store::types::{ClaimResult, DropOff, Pickup, RideRequest, RideStatus, Role};
use crate::store::Store;

/// Result of a claim attempt. Losing the race is an ordinary outcome the
/// caller relays to the driver, not an error.
#[derive(Debug, Clone)]
pub enum ClaimOutcome {
    Claimed(RideRequest),
    AlreadyTaken,
}

pub async fn submit(
    store: &dyn Store,
    dispatcher: &Dispatcher,
    rider_id: i64,
    pickup: Pickup,
    drop: Option<DropOff>,
) -> Result<RideRequest, RideError> {
    let pickup = validate_pickup(pickup)?;
    let drop = validate_drop(drop)?;

    // First contact from an unknown rider registers them, as the bot did.
    if store.get_user(rider_id).await?.is_none() {
        store.register_user(rider_id, Role::Rider, None).await?;
    }

    let ride = store.create_ride_request(rider_id, pickup, drop).await?;
    info!(ride_id = %ride.id, rider_id, "ride request created");

    // The ride exists whether or not the fan-out lands; a broadcast failure
    // is reported, not bubbled into the rider's submission.
    if let Err(e) = dispatcher.announce(store, &ride).await {
        warn!(error = %e, ride_id = %ride.id, "dispatch announce failed");
    }
    Ok(ride)
}

pub async fn claim(
    store: &dyn Store,
    dispatcher: &Dispatcher,
    ride_id: Uuid,
    driver_id: i64,
) -> Result<ClaimOutcome, RideError> {
    let driver = store
        .get_user(driver_id)
        .await?
        .ok_or(RideError::Forbidden("only registered drivers can claim rides"))?;
    if !driver.role.can_drive() || driver.archived_at.is_some() {
        return Err(RideError::Forbidden("only registered drivers can claim rides"));
    }

    match store.try_claim(ride_id, driver_id).await? {
        ClaimResult::Claimed(ride) => {
            info!(ride_id = %ride.id, driver_id, "ride claimed");
            // Reconcile strictly after the claim is durable. If it fails the
            // claim stands; handles stay Offered and a re-run settles them.
            if let Err(e) = dispatcher.reconcile(store, &ride, driver_id).await {
                warn!(error = %e, ride_id = %ride.id, "dispatch reconcile failed");
            }
            Ok(ClaimOutcome::Claimed(ride))
        }
        ClaimResult::AlreadyTaken => Ok(ClaimOutcome::AlreadyTaken),
        ClaimResult::NotFound => Err(RideError::NotFound),
    }
}

pub async fn cancel(
    store: &dyn Store,
    dispatcher: &Dispatcher,
    ride_id: Uuid,
    by_user: i64,
    admin: i64,
) -> Result<RideRequest, RideError> {
    let ride = store
        .get_ride_request(ride_id)
        .await?
        .ok_or(RideError::NotFound)?;

    let allowed =
        by_user == ride.rider_id || ride.driver_id == Some(by_user) || by_user == admin;
    if !allowed {
        return Err(RideError::Forbidden("you are not part of this ride"));
    }
    if ride.status.is_terminal() {
        return Err(RideError::InvalidTransition {
            from: ride.status,
            action: "cancel",
        });
    }

    // The expected-state guard re-checks everything the read above saw; a
    // concurrent claim or completion in between makes this a clean miss.
    let cancelled = match store
        .update_status(ride_id, ride.status, RideStatus::Cancelled)
        .await?
    {
        Some(ride) => ride,
        None => return Err(current_state_error(store, ride_id, "cancel").await),
    };
    info!(ride_id = %ride_id, by_user, "ride cancelled");

    if ride.status == RideStatus::Open {
        if let Err(e) = dispatcher.withdraw(store, &cancelled).await {
            warn!(error = %e, ride_id = %ride_id, "offer withdrawal failed");
        }
    }
    Ok(cancelled)
}

pub async fn complete(
    store: &dyn Store,
    ride_id: Uuid,
    by_user: i64,
    admin: i64,
) -> Result<RideRequest, RideError> {
    let ride = store
        .get_ride_request(ride_id)
        .await?
        .ok_or(RideError::NotFound)?;

    if ride.status != RideStatus::Claimed {
        return Err(RideError::InvalidTransition {
            from: ride.status,
            action: "complete",
        });
    }
    if ride.driver_id != Some(by_user) && by_user != admin {
        return Err(RideError::Forbidden(
            "only the assigned driver can complete this ride",
        ));
    }

    let completed = match store
        .update_status(ride_id, RideStatus::Claimed, RideStatus::Completed)
        .await?
    {
        Some(ride) => ride,
        None => return Err(current_state_error(store, ride_id, "complete").await),
    };
    info!(ride_id = %ride_id, by_user, "ride completed");
    Ok(completed)
}

// A conditional-update miss means the pre-read was stale. Report the state
// the ride is actually in now, not the one the caller saw.
async fn current_state_error(
    store: &dyn Store,
    ride_id: Uuid,
    action: &'static str,
) -> RideError {
    match store.get_ride_request(ride_id).await {
        Ok(Some(ride)) => RideError::InvalidTransition {
            from: ride.status,
            action,
        },
        Ok(None) => RideError::NotFound,
        Err(e) => e,
    }
}

fn validate_pickup(pickup: Pickup) -> Result<Pickup, RideError> {
    if !coord_ok(pickup.lat, pickup.lng) {
        return Err(RideError::Validation(
            "pickup location is missing or malformed".into(),
        ));
    }
    Ok(Pickup {
        lat: pickup.lat,
        lng: pickup.lng,
        label: pickup.label.and_then(non_empty),
    })
}

fn validate_drop(drop: Option<DropOff>) -> Result<Option<DropOff>, RideError> {
    let Some(drop) = drop else { return Ok(None) };
    let drop = DropOff {
        lat: drop.lat,
        lng: drop.lng,
        text: drop.text.and_then(non_empty),
    };
    match (drop.lat, drop.lng) {
        (Some(lat), Some(lng)) if !coord_ok(lat, lng) => Err(RideError::Validation(
            "drop-off coordinates are malformed".into(),
        )),
        (Some(_), None) | (None, Some(_)) => Err(RideError::Validation(
            "drop-off needs both latitude and longitude".into(),
        )),
        _ if drop.is_empty() => Ok(None),
        _ => Ok(Some(drop)),
    }
}

fn coord_ok(lat: f64, lng: f64) -> bool {
    lat.is_finite() && lng.is_finite() && (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng)
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
