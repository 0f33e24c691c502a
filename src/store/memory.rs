//! In-memory `Store` used by tests, mirroring the conditional-update
//! semantics of `PgStore`: every transition is a compare-and-swap performed
//! under a single lock, so concurrent claim races behave like the real thing.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::RideError;
use crate::store::types::{
    ClaimResult, Cursor, DispatchHandle, DropOff, HandleState, HistoryPage, Pickup, RideRequest,
    RideStatus, Role, User,
};
use crate::store::Store;

#[derive(Default)]
struct Inner {
    users: HashMap<i64, User>,
    rides: HashMap<Uuid, RideRequest>,
    handles: Vec<DispatchHandle>,
    notified: HashSet<Uuid>,
    settings: HashMap<String, String>,
    clock: i64,
}

impl Inner {
    // Strictly increasing timestamps so history ordering is deterministic.
    fn tick(&mut self) -> OffsetDateTime {
        self.clock += 1;
        OffsetDateTime::from_unix_timestamp_nanos(i128::from(self.clock) * 1_000)
            .expect("synthetic timestamp")
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn register_user(
        &self,
        id: i64,
        role: Role,
        display_name: Option<String>,
    ) -> Result<User, RideError> {
        let mut inner = self.inner.lock().expect("memory store lock");
        let now = inner.tick();
        let user = inner
            .users
            .entry(id)
            .and_modify(|u| {
                if u.role != role {
                    u.role = Role::Both;
                }
                if display_name.is_some() {
                    u.display_name = display_name.clone();
                }
            })
            .or_insert(User {
                id,
                role,
                available: false,
                display_name,
                created_at: now,
                archived_at: None,
            });
        Ok(user.clone())
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>, RideError> {
        let inner = self.inner.lock().expect("memory store lock");
        Ok(inner.users.get(&id).cloned())
    }

    async fn set_role(&self, id: i64, role: Role) -> Result<Option<User>, RideError> {
        let mut inner = self.inner.lock().expect("memory store lock");
        Ok(inner.users.get_mut(&id).map(|u| {
            u.role = role;
            u.clone()
        }))
    }

    async fn set_availability(
        &self,
        id: i64,
        available: bool,
    ) -> Result<Option<User>, RideError> {
        let mut inner = self.inner.lock().expect("memory store lock");
        Ok(inner.users.get_mut(&id).map(|u| {
            u.available = available;
            u.clone()
        }))
    }

    async fn list_active_drivers(&self) -> Result<Vec<User>, RideError> {
        let inner = self.inner.lock().expect("memory store lock");
        let mut drivers: Vec<User> = inner
            .users
            .values()
            .filter(|u| u.role.can_drive() && u.available && u.archived_at.is_none())
            .cloned()
            .collect();
        drivers.sort_by_key(|u| u.id);
        Ok(drivers)
    }

    async fn create_ride_request(
        &self,
        rider_id: i64,
        pickup: Pickup,
        drop: Option<DropOff>,
    ) -> Result<RideRequest, RideError> {
        let mut inner = self.inner.lock().expect("memory store lock");
        let now = inner.tick();
        let drop = drop.unwrap_or_default();
        let ride = RideRequest {
            id: Uuid::new_v4(),
            rider_id,
            driver_id: None,
            status: RideStatus::Open,
            pickup_lat: pickup.lat,
            pickup_lng: pickup.lng,
            pickup_label: pickup.label,
            drop_lat: drop.lat,
            drop_lng: drop.lng,
            drop_text: drop.text,
            created_at: now,
            claimed_at: None,
            ended_at: None,
        };
        inner.rides.insert(ride.id, ride.clone());
        Ok(ride)
    }

    async fn get_ride_request(&self, id: Uuid) -> Result<Option<RideRequest>, RideError> {
        let inner = self.inner.lock().expect("memory store lock");
        Ok(inner.rides.get(&id).cloned())
    }

    async fn try_claim(&self, id: Uuid, driver_id: i64) -> Result<ClaimResult, RideError> {
        let mut inner = self.inner.lock().expect("memory store lock");
        let now = inner.tick();
        match inner.rides.get_mut(&id) {
            None => Ok(ClaimResult::NotFound),
            Some(ride) if ride.status == RideStatus::Open => {
                ride.status = RideStatus::Claimed;
                ride.driver_id = Some(driver_id);
                ride.claimed_at = Some(now);
                Ok(ClaimResult::Claimed(ride.clone()))
            }
            Some(_) => Ok(ClaimResult::AlreadyTaken),
        }
    }

    async fn update_status(
        &self,
        id: Uuid,
        expected: RideStatus,
        next: RideStatus,
    ) -> Result<Option<RideRequest>, RideError> {
        let mut inner = self.inner.lock().expect("memory store lock");
        let now = inner.tick();
        Ok(inner.rides.get_mut(&id).and_then(|ride| {
            if ride.status != expected {
                return None;
            }
            ride.status = next;
            if next.is_terminal() {
                ride.ended_at = Some(now);
            }
            Some(ride.clone())
        }))
    }

    async fn try_mark_claim_notified(&self, ride_id: Uuid) -> Result<bool, RideError> {
        let mut inner = self.inner.lock().expect("memory store lock");
        Ok(inner.notified.insert(ride_id))
    }

    async fn list_history(
        &self,
        user_id: i64,
        role: Role,
        page_size: i64,
        cursor: Option<Cursor>,
    ) -> Result<HistoryPage, RideError> {
        let limit = page_size.clamp(1, 100) as usize;
        let inner = self.inner.lock().expect("memory store lock");
        let mut items: Vec<RideRequest> = inner
            .rides
            .values()
            .filter(|r| match role {
                Role::Rider => r.rider_id == user_id,
                Role::Driver | Role::Both => r.driver_id == Some(user_id),
            })
            .filter(|r| match cursor {
                None => true,
                Some(c) => (r.created_at, r.id) < (c.created_at, c.id),
            })
            .cloned()
            .collect();
        items.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        items.truncate(limit);
        let next_cursor = if items.len() == limit {
            items.last().map(|r| Cursor {
                created_at: r.created_at,
                id: r.id,
            })
        } else {
            None
        };
        Ok(HistoryPage { items, next_cursor })
    }

    async fn save_dispatch_handles(&self, handles: &[DispatchHandle]) -> Result<(), RideError> {
        let mut inner = self.inner.lock().expect("memory store lock");
        for h in handles {
            let exists = inner.handles.iter().any(|e| {
                e.ride_id == h.ride_id && e.chat_id == h.chat_id && e.message_id == h.message_id
            });
            if !exists {
                inner.handles.push(h.clone());
            }
        }
        Ok(())
    }

    async fn list_dispatch_handles(&self, ride_id: Uuid) -> Result<Vec<DispatchHandle>, RideError> {
        let inner = self.inner.lock().expect("memory store lock");
        Ok(inner
            .handles
            .iter()
            .filter(|h| h.ride_id == ride_id)
            .cloned()
            .collect())
    }

    async fn mark_dispatch_handle(
        &self,
        ride_id: Uuid,
        chat_id: i64,
        message_id: i64,
        state: HandleState,
    ) -> Result<(), RideError> {
        let mut inner = self.inner.lock().expect("memory store lock");
        for h in inner.handles.iter_mut() {
            if h.ride_id == ride_id && h.chat_id == chat_id && h.message_id == message_id {
                h.state = state;
            }
        }
        Ok(())
    }

    async fn get_setting(&self, key: &str) -> Result<Option<String>, RideError> {
        let inner = self.inner.lock().expect("memory store lock");
        Ok(inner.settings.get(key).cloned())
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<(), RideError> {
        let mut inner = self.inner.lock().expect("memory store lock");
        inner.settings.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod pagination_tests {
    use super::*;

    fn pickup() -> Pickup {
        Pickup {
            lat: -1.28333,
            lng: 36.81667,
            label: None,
        }
    }

    #[tokio::test]
    async fn visits_every_ride_exactly_once_in_descending_order() {
        let store = MemoryStore::new();
        let mut expected = Vec::new();
        for _ in 0..23 {
            let ride = store
                .create_ride_request(7, pickup(), None)
                .await
                .expect("create");
            expected.push(ride.id);
        }
        expected.reverse(); // newest first

        let mut seen = Vec::new();
        let mut cursor = None;
        loop {
            let page = store
                .list_history(7, Role::Rider, 5, cursor)
                .await
                .expect("page");
            for window in page.items.windows(2) {
                assert!(
                    (window[0].created_at, window[0].id) > (window[1].created_at, window[1].id)
                );
            }
            seen.extend(page.items.iter().map(|r| r.id));
            match page.next_cursor {
                Some(c) => cursor = Some(c),
                None => break,
            }
        }
        assert_eq!(seen, expected);
    }

    #[tokio::test]
    async fn cursor_is_stable_while_new_rides_arrive() {
        let store = MemoryStore::new();
        let mut old: Vec<Uuid> = Vec::new();
        for _ in 0..6 {
            old.push(store.create_ride_request(7, pickup(), None).await.expect("create").id);
        }
        let first = store
            .list_history(7, Role::Rider, 3, None)
            .await
            .expect("page");
        // Rides inserted mid-traversal are newer than the cursor, so they
        // never shift what the next page returns.
        store.create_ride_request(7, pickup(), None).await.expect("create");
        let second = store
            .list_history(7, Role::Rider, 3, first.next_cursor)
            .await
            .expect("page");
        let ids: Vec<Uuid> = second.items.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![old[2], old[1], old[0]]);
    }

    #[tokio::test]
    async fn history_is_scoped_to_the_queried_role() {
        let store = MemoryStore::new();
        let ride = store
            .create_ride_request(7, pickup(), None)
            .await
            .expect("create");
        store.try_claim(ride.id, 99).await.expect("claim");

        let as_rider = store
            .list_history(99, Role::Rider, 10, None)
            .await
            .expect("page");
        assert!(as_rider.items.is_empty());

        let as_driver = store
            .list_history(99, Role::Driver, 10, None)
            .await
            .expect("page");
        assert_eq!(as_driver.items.len(), 1);
        assert_eq!(as_driver.items[0].driver_id, Some(99));
    }
}
