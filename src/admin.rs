//! Admin surface: repointing the dispatch channel at runtime.

use axum::{extract::State, routing::put, Json, Router};
use serde::Deserialize;
use tracing::{info, instrument};

use crate::dispatch::DISPATCH_CHANNEL_KEY;
use crate::error::RideError;
use crate::state::AppState;
use crate::store::Store;

#[derive(Debug, Deserialize)]
pub struct SetDispatchChannelRequest {
    pub admin_id: i64,
    /// None clears the channel; offers then go only to driver DMs.
    pub chat_id: Option<i64>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/admin/dispatch-channel", put(set_dispatch_channel))
}

#[instrument(skip(state, body))]
pub async fn set_dispatch_channel(
    State(state): State<AppState>,
    Json(body): Json<SetDispatchChannelRequest>,
) -> Result<Json<serde_json::Value>, RideError> {
    if body.admin_id != state.config.admin_id {
        return Err(RideError::Forbidden(
            "only the admin can set the dispatch channel",
        ));
    }
    let value = body.chat_id.map(|id| id.to_string()).unwrap_or_default();
    state.store.set_setting(DISPATCH_CHANNEL_KEY, &value).await?;
    state.dispatcher.set_channel(body.chat_id).await;
    info!(chat_id = ?body.chat_id, "dispatch channel updated");
    Ok(Json(serde_json::json!({ "dispatch_channel": body.chat_id })))
}
