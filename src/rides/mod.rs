pub mod dto;
pub mod handlers;
pub mod service;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/rides", post(handlers::submit_ride))
        .route("/rides/:id", get(handlers::get_ride))
        .route("/rides/:id/claim", post(handlers::claim_ride))
        .route("/rides/:id/cancel", post(handlers::cancel_ride))
        .route("/rides/:id/complete", post(handlers::complete_ride))
}
