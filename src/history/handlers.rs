use axum::{extract::{Query, State}, Json};
use tracing::instrument;

use crate::error::RideError;
use crate::history::dto::{HistoryQuery, HistoryResponse};
use crate::state::AppState;
use crate::store::types::{Cursor, Role};
use crate::store::Store;

/// Ownership-scoped, cursor-paginated ride history. A user who is both rider
/// and driver queries each role separately.
#[instrument(skip(state, q), fields(user_id = q.user_id))]
pub async fn get_history(
    State(state): State<AppState>,
    Query(q): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, RideError> {
    if q.role == Role::Both {
        return Err(RideError::Validation(
            "history role must be 'rider' or 'driver'".into(),
        ));
    }
    let cursor = q.cursor.as_deref().map(Cursor::decode).transpose()?;
    let page = state
        .store
        .list_history(q.user_id, q.role, q.limit, cursor)
        .await?;
    Ok(Json(HistoryResponse {
        items: page.items.into_iter().map(Into::into).collect(),
        next_cursor: page.next_cursor.map(|c| c.encode()),
    }))
}
