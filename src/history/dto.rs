use serde::{Deserialize, Serialize};

use crate::rides::dto::RideResponse;
use crate::store::types::Role;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub user_id: i64,
    pub role: Role,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub cursor: Option<String>,
}

fn default_limit() -> i64 {
    20
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub items: Vec<RideResponse>,
    pub next_cursor: Option<String>,
}
