use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;

use validator::ValidationErrors;

use crate::validation;

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Validation(ValidationErrors),
    /// Failure whose message is safe to show to the caller as-is.
    Public(String),
    RateLimited { message: String, retry_after: u64 },
    Internal(String),
    Database(sqlx::Error),
}

impl AppError {
    /// Text shown to the user in the form's error alert.
    pub fn public_message(&self) -> String {
        match self {
            AppError::BadRequest(msg) | AppError::Public(msg) => msg.clone(),
            AppError::Validation(errors) => validation::summary(errors),
            AppError::RateLimited { message, .. } => message.clone(),
            AppError::Internal(_) | AppError::Database(_) => "Internal server error".to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::Public(_) => StatusCode::BAD_REQUEST,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Internal(_) | AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Log server-side failures; caller-facing ones stay quiet.
    pub fn log(&self) {
        match self {
            AppError::Internal(msg) => tracing::error!("Internal error: {msg}"),
            AppError::Database(err) => tracing::error!("Database error: {err}"),
            _ => {}
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::BadRequest(msg) => write!(f, "Bad Request: {msg}"),
            AppError::Validation(errors) => {
                write!(f, "Validation Failed: {}", validation::summary(errors))
            }
            AppError::Public(msg) => write!(f, "{msg}"),
            AppError::RateLimited { message, .. } => write!(f, "Rate Limited: {message}"),
            AppError::Internal(msg) => write!(f, "Internal Error: {msg}"),
            AppError::Database(err) => write!(f, "Database Error: {err}"),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.log();
        let status = self.status();

        let body = match &self {
            AppError::Validation(errors) => json!({
                "error": validation::summary(errors),
                "fields": validation::to_json(errors),
            }),
            other => json!({ "error": other.public_message() }),
        };

        let mut response = (status, axum::Json(body)).into_response();
        if let AppError::RateLimited { retry_after, .. } = self {
            if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err)
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        AppError::Validation(errors)
    }
}
