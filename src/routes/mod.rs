pub mod auth;

use axum::routing::post;
use axum::Router;

use crate::state::SharedState;

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        .route("/api/v1/auth/change-password", post(auth::change_password))
        .route("/api/v1/auth/forgot-password", post(auth::forgot_password))
}
