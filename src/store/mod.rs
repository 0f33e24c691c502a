pub mod pg;
pub mod types;

#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::RideError;
use types::{
    ClaimResult, Cursor, DispatchHandle, DropOff, HandleState, HistoryPage, Pickup, RideRequest,
    RideStatus, Role, User,
};

/// The persistence gateway. Every ride transition goes through a
/// single-statement conditional update here; callers never read-modify-write.
/// Connectivity failures surface as `RideError::Storage` and are never
/// retried silently — `create_ride_request` is not idempotent.
#[async_trait]
pub trait Store: Send + Sync {
    // users
    async fn register_user(
        &self,
        id: i64,
        role: Role,
        display_name: Option<String>,
    ) -> Result<User, RideError>;
    async fn get_user(&self, id: i64) -> Result<Option<User>, RideError>;
    async fn set_role(&self, id: i64, role: Role) -> Result<Option<User>, RideError>;
    /// Moves a driver in or out of the dispatch pool.
    async fn set_availability(&self, id: i64, available: bool)
        -> Result<Option<User>, RideError>;
    /// The dispatch pool: available drivers (or dual-role users) that are
    /// not archived.
    async fn list_active_drivers(&self) -> Result<Vec<User>, RideError>;

    // ride requests
    async fn create_ride_request(
        &self,
        rider_id: i64,
        pickup: Pickup,
        drop: Option<DropOff>,
    ) -> Result<RideRequest, RideError>;
    async fn get_ride_request(&self, id: Uuid) -> Result<Option<RideRequest>, RideError>;
    /// The linchpin primitive: one conditional write, `WHERE status = 'open'`.
    /// Exactly one concurrent caller can ever get `Claimed` for a given ride.
    async fn try_claim(&self, id: Uuid, driver_id: i64) -> Result<ClaimResult, RideError>;
    /// Generalized compare-and-swap used for completion and cancellation.
    /// `None` means the expected state no longer held at write time.
    async fn update_status(
        &self,
        id: Uuid,
        expected: RideStatus,
        next: RideStatus,
    ) -> Result<Option<RideRequest>, RideError>;
    /// Conditional flip of the per-ride claim-notification marker. Returns
    /// true for exactly one caller per ride, so resumed reconciliations
    /// never notify twice.
    async fn try_mark_claim_notified(&self, ride_id: Uuid) -> Result<bool, RideError>;
    async fn list_history(
        &self,
        user_id: i64,
        role: Role,
        page_size: i64,
        cursor: Option<Cursor>,
    ) -> Result<HistoryPage, RideError>;

    // dispatch handles
    async fn save_dispatch_handles(&self, handles: &[DispatchHandle]) -> Result<(), RideError>;
    async fn list_dispatch_handles(&self, ride_id: Uuid) -> Result<Vec<DispatchHandle>, RideError>;
    async fn mark_dispatch_handle(
        &self,
        ride_id: Uuid,
        chat_id: i64,
        message_id: i64,
        state: HandleState,
    ) -> Result<(), RideError>;

    // settings
    async fn get_setting(&self, key: &str) -> Result<Option<String>, RideError>;
    async fn set_setting(&self, key: &str, value: &str) -> Result<(), RideError>;
}
