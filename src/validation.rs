//! Input schemas for the password reset flow.
//!
//! `ChangePasswordInput` is what the change-password action accepts.
//! `ResetPasswordForm` is what the form collects; it is checked before the
//! action is ever invoked, so a mismatched confirmation never costs a
//! rate-limit slot.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::{Validate, ValidationErrors};

/// Payload of the change-password action.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct ChangePasswordInput {
    pub token: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

/// Fields posted by the reset-password form.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ResetPasswordForm {
    #[serde(default)]
    pub token: String,

    #[serde(default)]
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    #[serde(default)]
    #[validate(
        length(min = 8, message = "Password must be at least 8 characters"),
        must_match(other = "password", message = "Passwords don't match")
    )]
    pub password_confirmation: String,
}

impl ResetPasswordForm {
    /// The action payload; the confirmation stays behind in the form.
    pub fn into_input(self) -> ChangePasswordInput {
        ChangePasswordInput {
            token: self.token,
            password: self.password,
        }
    }
}

/// Payload of the forgot-password action, from JSON or the form.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ForgotPasswordInput {
    #[serde(default)]
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

/// First message recorded for `field`, if any.
pub fn field_message(errors: &ValidationErrors, field: &str) -> Option<String> {
    errors
        .field_errors()
        .get(field)
        .and_then(|list| list.first())
        .map(|error| {
            error
                .message
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_else(|| error.code.to_string())
        })
}

/// `(field, first message)` pairs sorted by field name.
pub fn field_messages(errors: &ValidationErrors) -> Vec<(String, String)> {
    let mut fields: Vec<String> = errors
        .field_errors()
        .keys()
        .map(|field| field.to_string())
        .collect();
    fields.sort();

    fields
        .into_iter()
        .filter_map(|field| field_message(errors, &field).map(|msg| (field, msg)))
        .collect()
}

pub fn to_json(errors: &ValidationErrors) -> Value {
    let map: Map<String, Value> = field_messages(errors)
        .into_iter()
        .map(|(field, msg)| (field, Value::String(msg)))
        .collect();
    Value::Object(map)
}

/// One-line description suitable for an error alert.
pub fn summary(errors: &ValidationErrors) -> String {
    field_messages(errors)
        .into_iter()
        .map(|(field, msg)| format!("{field}: {msg}"))
        .collect::<Vec<_>>()
        .join("; ")
}
