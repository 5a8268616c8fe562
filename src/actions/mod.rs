//! Server actions: the operations the UI calls directly.
//!
//! Each one charges the caller's per-IP budget first, then validates its
//! input, then delegates to a use case. The JSON routes and the form
//! handlers both go through here.

use std::net::IpAddr;

use crate::error::AppError;
use crate::rate_limit::{self, rate_limit_by_ip};
use crate::state::SharedState;
use crate::use_cases;
use validator::Validate;

use crate::validation::{ChangePasswordInput, ForgotPasswordInput};

/// Set a new password using an emailed reset token.
pub async fn change_password_action(
    state: &SharedState,
    ip: IpAddr,
    input: ChangePasswordInput,
) -> Result<(), AppError> {
    rate_limit_by_ip(&state.limiter, rate_limit::CHANGE_PASSWORD, ip)?;

    input.validate()?;

    use_cases::users::change_password(&state.pool, &input.token, &input.password).await?;
    Ok(())
}

/// Email a reset link if the address belongs to an account.
pub async fn reset_password_action(
    state: &SharedState,
    ip: IpAddr,
    input: ForgotPasswordInput,
) -> Result<(), AppError> {
    rate_limit_by_ip(&state.limiter, rate_limit::RESET_PASSWORD, ip)?;

    input.validate()?;

    use_cases::users::request_password_reset(state, &input.email).await
}
