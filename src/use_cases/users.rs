use chrono::{Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::{password, token};
use crate::db;
use crate::error::AppError;
use crate::state::SharedState;

/// Consume a reset token and set the owner's new password.
///
/// Token, password hash and sessions change in one transaction; a token can
/// only ever succeed once.
pub async fn change_password(
    pool: &PgPool,
    reset_token: &str,
    new_password: &str,
) -> Result<Uuid, AppError> {
    let token_hash = token::hash(reset_token);

    // Hash before opening the transaction so the row lock is held briefly
    let pw_hash = password::hash(new_password)?;

    let mut tx = pool.begin().await?;

    let stored = db::password_reset_tokens::find_valid_by_hash(&mut *tx, &token_hash)
        .await?
        .ok_or_else(|| AppError::Public("Invalid token".to_string()))?;

    db::password_reset_tokens::mark_used(&mut *tx, stored.id).await?;
    db::password_reset_tokens::delete_unused_for_user(&mut *tx, stored.user_id).await?;
    db::users::update_password(&mut *tx, stored.user_id, &pw_hash).await?;
    let revoked = db::sessions::delete_all_for_user(&mut *tx, stored.user_id).await?;

    tx.commit().await?;

    tracing::info!(user_id = %stored.user_id, revoked_sessions = revoked, "Password changed via reset token");
    Ok(stored.user_id)
}

/// Issue a reset token for `email` and deliver the link.
///
/// Unknown addresses are ignored without telling the caller.
pub async fn request_password_reset(state: &SharedState, email: &str) -> Result<(), AppError> {
    let Some(user) = db::users::find_by_email(&state.pool, email.trim()).await? else {
        tracing::debug!("Password reset requested for unknown email");
        return Ok(());
    };

    let reset_token = token::generate();
    db::password_reset_tokens::create(
        &state.pool,
        user.id,
        &token::hash(&reset_token),
        Utc::now() + Duration::minutes(state.config.reset_token_ttl_minutes),
    )
    .await?;

    let reset_url = reset_link(&state.config.base_url, &reset_token);

    match &state.mailer {
        Some(mailer) => {
            mailer
                .send_password_reset(&user.email, &reset_url, state.config.reset_token_ttl_minutes)
                .await
                .map_err(AppError::Internal)?;
            tracing::info!(user_id = %user.id, "Password reset email sent");
        }
        None => {
            tracing::warn!("SMTP not configured. Password reset link: {reset_url}");
        }
    }

    Ok(())
}

fn reset_link(base_url: &str, reset_token: &str) -> String {
    format!("{}/reset-password?token={reset_token}", base_url.trim_end_matches('/'))
}
