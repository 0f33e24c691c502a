use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::RideError;
use crate::store::types::{
    ClaimResult, Cursor, DispatchHandle, DropOff, HandleState, HistoryPage, Pickup, RideRequest,
    RideStatus, Role, User,
};
use crate::store::Store;

const RIDE_COLS: &str = "id, rider_id, driver_id, status, pickup_lat, pickup_lng, pickup_label, \
                         drop_lat, drop_lng, drop_text, created_at, claimed_at, ended_at";

const USER_COLS: &str = "id, role, available, display_name, created_at, archived_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn register_user(
        &self,
        id: i64,
        role: Role,
        display_name: Option<String>,
    ) -> Result<User, RideError> {
        // Re-registering under the other role merges to 'both'; display name
        // is only overwritten when a new one was supplied.
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, role, display_name)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE
              SET role = CASE
                    WHEN users.role = EXCLUDED.role THEN users.role
                    ELSE 'both'
                  END,
                  display_name = COALESCE(EXCLUDED.display_name, users.display_name)
            RETURNING {USER_COLS}
            "#
        ))
        .bind(id)
        .bind(role)
        .bind(display_name)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>, RideError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn set_role(&self, id: i64, role: Role) -> Result<Option<User>, RideError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET role = $2 WHERE id = $1 RETURNING {USER_COLS}"
        ))
        .bind(id)
        .bind(role)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn set_availability(
        &self,
        id: i64,
        available: bool,
    ) -> Result<Option<User>, RideError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET available = $2 WHERE id = $1 RETURNING {USER_COLS}"
        ))
        .bind(id)
        .bind(available)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn list_active_drivers(&self) -> Result<Vec<User>, RideError> {
        let drivers = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLS}
            FROM users
            WHERE role IN ('driver', 'both') AND available AND archived_at IS NULL
            ORDER BY id
            "#
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(drivers)
    }

    async fn create_ride_request(
        &self,
        rider_id: i64,
        pickup: Pickup,
        drop: Option<DropOff>,
    ) -> Result<RideRequest, RideError> {
        let drop = drop.unwrap_or_default();
        let ride = sqlx::query_as::<_, RideRequest>(&format!(
            r#"
            INSERT INTO ride_requests
                (id, rider_id, status, pickup_lat, pickup_lng, pickup_label,
                 drop_lat, drop_lng, drop_text)
            VALUES ($1, $2, 'open', $3, $4, $5, $6, $7, $8)
            RETURNING {RIDE_COLS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(rider_id)
        .bind(pickup.lat)
        .bind(pickup.lng)
        .bind(pickup.label)
        .bind(drop.lat)
        .bind(drop.lng)
        .bind(drop.text)
        .fetch_one(&self.pool)
        .await?;
        Ok(ride)
    }

    async fn get_ride_request(&self, id: Uuid) -> Result<Option<RideRequest>, RideError> {
        let ride = sqlx::query_as::<_, RideRequest>(&format!(
            "SELECT {RIDE_COLS} FROM ride_requests WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(ride)
    }

    async fn try_claim(&self, id: Uuid, driver_id: i64) -> Result<ClaimResult, RideError> {
        // The whole system's correctness hangs on this being one conditional
        // write. No row back means another claim or a cancellation won.
        let claimed = sqlx::query_as::<_, RideRequest>(&format!(
            r#"
            UPDATE ride_requests
            SET status = 'claimed', driver_id = $2, claimed_at = now()
            WHERE id = $1 AND status = 'open'
            RETURNING {RIDE_COLS}
            "#
        ))
        .bind(id)
        .bind(driver_id)
        .fetch_optional(&self.pool)
        .await?;

        match claimed {
            Some(ride) => Ok(ClaimResult::Claimed(ride)),
            None => match self.get_ride_request(id).await? {
                Some(_) => Ok(ClaimResult::AlreadyTaken),
                None => Ok(ClaimResult::NotFound),
            },
        }
    }

    async fn update_status(
        &self,
        id: Uuid,
        expected: RideStatus,
        next: RideStatus,
    ) -> Result<Option<RideRequest>, RideError> {
        let ended_at = if next.is_terminal() { "now()" } else { "ended_at" };
        let ride = sqlx::query_as::<_, RideRequest>(&format!(
            r#"
            UPDATE ride_requests
            SET status = $3, ended_at = {ended_at}
            WHERE id = $1 AND status = $2
            RETURNING {RIDE_COLS}
            "#
        ))
        .bind(id)
        .bind(expected)
        .bind(next)
        .fetch_optional(&self.pool)
        .await?;
        Ok(ride)
    }

    async fn try_mark_claim_notified(&self, ride_id: Uuid) -> Result<bool, RideError> {
        // Same conditional-write discipline as try_claim: only the run that
        // flips the marker gets to send the claim notifications.
        let result = sqlx::query(
            r#"
            UPDATE ride_requests
            SET notified_at = now()
            WHERE id = $1 AND notified_at IS NULL
            "#,
        )
        .bind(ride_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn list_history(
        &self,
        user_id: i64,
        role: Role,
        page_size: i64,
        cursor: Option<Cursor>,
    ) -> Result<HistoryPage, RideError> {
        let limit = page_size.clamp(1, 100);
        let column = match role {
            Role::Rider => "rider_id",
            Role::Driver | Role::Both => "driver_id",
        };
        // Keyset pagination on (created_at, id): resumable and gap-free while
        // rows keep arriving, which OFFSET is not.
        let items = sqlx::query_as::<_, RideRequest>(&format!(
            r#"
            SELECT {RIDE_COLS}
            FROM ride_requests
            WHERE {column} = $1
              AND ($2::timestamptz IS NULL OR (created_at, id) < ($2, $3))
            ORDER BY created_at DESC, id DESC
            LIMIT $4
            "#
        ))
        .bind(user_id)
        .bind(cursor.map(|c| c.created_at))
        .bind(cursor.map(|c| c.id))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let next_cursor = if items.len() as i64 == limit {
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
        for h in handles {
            sqlx::query(
                r#"
                INSERT INTO dispatch_messages (ride_id, chat_id, message_id, driver_id, state)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (ride_id, chat_id, message_id) DO NOTHING
                "#,
            )
            .bind(h.ride_id)
            .bind(h.chat_id)
            .bind(h.message_id)
            .bind(h.driver_id)
            .bind(h.state)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn list_dispatch_handles(&self, ride_id: Uuid) -> Result<Vec<DispatchHandle>, RideError> {
        let handles = sqlx::query_as::<_, DispatchHandle>(
            r#"
            SELECT ride_id, chat_id, message_id, driver_id, state
            FROM dispatch_messages
            WHERE ride_id = $1
            ORDER BY chat_id, message_id
            "#,
        )
        .bind(ride_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(handles)
    }

    async fn mark_dispatch_handle(
        &self,
        ride_id: Uuid,
        chat_id: i64,
        message_id: i64,
        state: HandleState,
    ) -> Result<(), RideError> {
        sqlx::query(
            r#"
            UPDATE dispatch_messages
            SET state = $4
            WHERE ride_id = $1 AND chat_id = $2 AND message_id = $3
            "#,
        )
        .bind(ride_id)
        .bind(chat_id)
        .bind(message_id)
        .bind(state)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_setting(&self, key: &str) -> Result<Option<String>, RideError> {
        let value: Option<(String,)> =
            sqlx::query_as("SELECT v FROM settings WHERE k = $1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(value.map(|(v,)| v))
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<(), RideError> {
        sqlx::query(
            r#"
            INSERT INTO settings (k, v) VALUES ($1, $2)
            ON CONFLICT (k) DO UPDATE SET v = EXCLUDED.v
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
