use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::Json;
use serde::Serialize;

use crate::actions;
use crate::client_ip::ClientIp;
use crate::error::AppError;
use crate::rate_limit::{self, rate_limit_by_ip};
use crate::state::SharedState;
use crate::validation::{ChangePasswordInput, ForgotPasswordInput};

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

pub async fn change_password(
    State(state): State<SharedState>,
    ClientIp(ip): ClientIp,
    payload: Result<Json<ChangePasswordInput>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let input = match payload {
        Ok(Json(input)) => input,
        Err(rejection) => {
            // A malformed body still counts against the caller's budget
            rate_limit_by_ip(&state.limiter, rate_limit::CHANGE_PASSWORD, ip)?;
            return Err(AppError::BadRequest(rejection.body_text()));
        }
    };

    actions::change_password_action(&state, ip, input).await?;

    Ok(Json(MessageResponse {
        message: "Password updated".to_string(),
    }))
}

pub async fn forgot_password(
    State(state): State<SharedState>,
    ClientIp(ip): ClientIp,
    Json(input): Json<ForgotPasswordInput>,
) -> Result<Json<MessageResponse>, AppError> {
    actions::reset_password_action(&state, ip, input).await?;

    Ok(Json(MessageResponse {
        message: "If that email is registered, a reset link has been sent.".to_string(),
    }))
}
