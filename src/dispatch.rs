//! Dispatch broadcaster: fans a fresh ride request out to the driver pool and
//! reconciles the broadcast once a claim has been durably recorded.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::warn;

use crate::error::RideError;
use crate::store::types::{DispatchHandle, HandleState, RideRequest};
use crate::store::Store;
use crate::transport::Transport;

pub const DISPATCH_CHANNEL_KEY: &str = "dispatch_channel";

/// Injected broadcast configuration plus the transport handle. The optional
/// dispatch channel is a group chat that receives a copy of every offer; an
/// admin can repoint it at runtime.
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    channel: RwLock<Option<i64>>,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn Transport>, channel: Option<i64>) -> Self {
        Self {
            transport,
            channel: RwLock::new(channel),
        }
    }

    pub async fn channel(&self) -> Option<i64> {
        *self.channel.read().await
    }

    pub async fn set_channel(&self, chat_id: Option<i64>) {
        *self.channel.write().await = chat_id;
    }

    /// Offers the ride to every active driver (and the dispatch channel if
    /// one is configured). A recipient that cannot be reached is logged and
    /// skipped; one dead chat must not starve the rest of the pool. Handles
    /// are persisted before returning so a later reconcile can find them.
    pub async fn announce(
        &self,
        store: &dyn Store,
        ride: &RideRequest,
    ) -> Result<Vec<DispatchHandle>, RideError> {
        let text = offer_text(ride);
        let mut handles = Vec::new();

        for driver in store.list_active_drivers().await? {
            if driver.id == ride.rider_id {
                continue;
            }
            match self.transport.send_offer(driver.id, &text).await {
                Ok(message_id) => handles.push(DispatchHandle {
                    ride_id: ride.id,
                    chat_id: driver.id,
                    message_id,
                    driver_id: Some(driver.id),
                    state: HandleState::Offered,
                }),
                Err(e) => {
                    warn!(error = %e, driver_id = driver.id, ride_id = %ride.id,
                          "failed to offer ride to driver");
                }
            }
        }

        if let Some(channel) = self.channel().await {
            match self.transport.send_offer(channel, &text).await {
                Ok(message_id) => handles.push(DispatchHandle {
                    ride_id: ride.id,
                    chat_id: channel,
                    message_id,
                    driver_id: None,
                    state: HandleState::Offered,
                }),
                Err(e) => {
                    warn!(error = %e, channel, ride_id = %ride.id,
                          "failed to post ride to dispatch channel");
                }
            }
        }

        store.save_dispatch_handles(&handles).await?;
        Ok(handles)
    }

    /// Settles the broadcast after a claim: the winner's copy becomes a
    /// confirmation, every other copy becomes "taken". Only handles still in
    /// `Offered` are touched, and an edit that finds the message already in
    /// its target state counts as success, so re-running after a crash
    /// mid-reconciliation neither double-notifies nor errors. The winner DM
    /// and rider notification are gated on a durable per-ride marker; a
    /// resumed run that only settles leftover edits sends nothing new.
    ///
    /// Callers invoke this only after `try_claim` returned `Claimed`.
    pub async fn reconcile(
        &self,
        store: &dyn Store,
        ride: &RideRequest,
        winner: i64,
    ) -> Result<(), RideError> {
        for handle in store.list_dispatch_handles(ride.id).await? {
            if handle.state != HandleState::Offered {
                continue;
            }
            let (text, next) = if handle.driver_id == Some(winner) {
                (confirmed_text(ride), HandleState::Confirmed)
            } else {
                (taken_text(ride), HandleState::Taken)
            };
            match self
                .transport
                .edit_message(handle.chat_id, handle.message_id, &text)
                .await
            {
                Ok(_) => {
                    store
                        .mark_dispatch_handle(ride.id, handle.chat_id, handle.message_id, next)
                        .await?;
                }
                Err(e) => {
                    // Left in Offered; the next reconcile run picks it up.
                    warn!(error = %e, chat_id = handle.chat_id, ride_id = %ride.id,
                          "failed to edit dispatch message");
                }
            }
        }

        if store.try_mark_claim_notified(ride.id).await? {
            if let Err(e) = self.transport.notify(winner, &winner_dm_text(ride)).await {
                warn!(error = %e, driver_id = winner, ride_id = %ride.id,
                      "failed to DM winning driver");
            }
            if let Err(e) = self
                .transport
                .notify(ride.rider_id, &rider_claimed_text(ride, winner))
                .await
            {
                warn!(error = %e, rider_id = ride.rider_id, ride_id = %ride.id,
                      "failed to notify rider");
            }
        }
        Ok(())
    }

    /// Withdraws every outstanding offer for a ride cancelled while open.
    /// Idempotent the same way `reconcile` is.
    pub async fn withdraw(&self, store: &dyn Store, ride: &RideRequest) -> Result<(), RideError> {
        for handle in store.list_dispatch_handles(ride.id).await? {
            if handle.state != HandleState::Offered {
                continue;
            }
            match self
                .transport
                .edit_message(handle.chat_id, handle.message_id, &withdrawn_text(ride))
                .await
            {
                Ok(_) => {
                    store
                        .mark_dispatch_handle(
                            ride.id,
                            handle.chat_id,
                            handle.message_id,
                            HandleState::Taken,
                        )
                        .await?;
                }
                Err(e) => {
                    warn!(error = %e, chat_id = handle.chat_id, ride_id = %ride.id,
                          "failed to withdraw dispatch message");
                }
            }
        }
        Ok(())
    }
}

fn offer_text(ride: &RideRequest) -> String {
    let mut text = format!(
        "New ride request {}\nPickup: ({:.5}, {:.5})",
        short_id(ride),
        ride.pickup_lat,
        ride.pickup_lng
    );
    if let Some(label) = &ride.pickup_label {
        text.push_str(&format!(" ({label})"));
    }
    match (ride.drop_lat, ride.drop_lng, &ride.drop_text) {
        (Some(lat), Some(lng), _) => text.push_str(&format!("\nDrop-off: ({lat:.5}, {lng:.5})")),
        (_, _, Some(t)) => text.push_str(&format!("\nDrop-off: {t}")),
        _ => text.push_str("\nDrop-off: not specified"),
    }
    text.push_str("\nReply to claim this ride.");
    text
}

fn taken_text(ride: &RideRequest) -> String {
    format!("Ride {} was taken by another driver.", short_id(ride))
}

fn confirmed_text(ride: &RideRequest) -> String {
    format!("You claimed ride {}. Head to the pickup point.", short_id(ride))
}

fn withdrawn_text(ride: &RideRequest) -> String {
    format!("Ride {} was cancelled by the rider.", short_id(ride))
}

fn winner_dm_text(ride: &RideRequest) -> String {
    format!(
        "You accepted ride {}. Pickup: ({:.5}, {:.5}). Mark it complete when done.",
        short_id(ride),
        ride.pickup_lat,
        ride.pickup_lng
    )
}

fn rider_claimed_text(ride: &RideRequest, driver: i64) -> String {
    format!(
        "Driver {driver} accepted your ride {}. Please wait at the pickup point.",
        short_id(ride)
    )
}

// First uuid segment; enough to talk about a ride in chat.
fn short_id(ride: &RideRequest) -> String {
    ride.id.to_string()[..8].to_string()
}
