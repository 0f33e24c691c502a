pub mod dto;
pub mod handlers;

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", post(handlers::register_user))
        .route("/users/:id", get(handlers::get_user))
        .route("/users/:id/role", put(handlers::set_role))
        .route("/users/:id/availability", put(handlers::set_availability))
}
