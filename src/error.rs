use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::store::types::RideStatus;

/// Every failure mode of the lifecycle engine and the gateway is a distinct
/// variant the caller can branch on. A lost claim race is NOT here — that is
/// a normal `ClaimResult::AlreadyTaken` outcome, not an error.
#[derive(Debug, Error)]
pub enum RideError {
    #[error("{0}")]
    Validation(String),

    #[error("cannot {action} a ride that is {from}")]
    InvalidTransition {
        from: RideStatus,
        action: &'static str,
    },

    #[error("this ride no longer exists")]
    NotFound,

    #[error("{0}")]
    Forbidden(&'static str),

    #[error(transparent)]
    Storage(#[from] sqlx::Error),
}

impl RideError {
    pub fn status(&self) -> StatusCode {
        match self {
            RideError::Validation(_) => StatusCode::BAD_REQUEST,
            RideError::InvalidTransition { .. } => StatusCode::CONFLICT,
            RideError::NotFound => StatusCode::NOT_FOUND,
            RideError::Forbidden(_) => StatusCode::FORBIDDEN,
            RideError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RideError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            RideError::Storage(e) => {
                error!(error = %e, "storage failure");
                "temporary failure, please try again later".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
