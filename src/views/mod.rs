pub mod auth;

use axum::routing::get;
use axum::Router;

use crate::state::SharedState;

pub fn view_routes() -> Router<SharedState> {
    Router::new()
        .route(
            "/reset-password",
            get(auth::reset_password_page).post(auth::reset_password_submit),
        )
        .route(
            "/forgot-password",
            get(auth::forgot_password_page).post(auth::forgot_password_submit),
        )
}
