use askama::Template;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::Form;
use serde::Deserialize;

use crate::actions;
use crate::client_ip::ClientIp;
use crate::error::AppError;
use crate::state::SharedState;
use validator::{Validate, ValidationErrors};

use crate::validation::{self, ForgotPasswordInput, ResetPasswordForm};

pub const SIGN_IN_PATH: &str = "/sign-in/email";

#[derive(Template, Default)]
#[template(path = "auth/reset_password.html")]
struct ResetPasswordTemplate {
    token: String,
    updated: bool,
    error: Option<String>,
    password_error: Option<String>,
    confirmation_error: Option<String>,
    sign_in_path: &'static str,
}

#[derive(Template, Default)]
#[template(path = "auth/forgot_password.html")]
struct ForgotPasswordTemplate {
    message: Option<String>,
    error: Option<String>,
}

#[derive(Deserialize)]
pub struct ResetQuery {
    pub token: Option<String>,
}

fn render(status: StatusCode, template: impl Template) -> Response {
    match template.render() {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            tracing::error!("Template render failed: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn reset_password_page(Query(q): Query<ResetQuery>) -> Response {
    render(
        StatusCode::OK,
        ResetPasswordTemplate {
            token: q.token.unwrap_or_default(),
            sign_in_path: SIGN_IN_PATH,
            ..Default::default()
        },
    )
}

/// Form post. The form schema is checked here before the action is called,
/// so a rejected form never reaches the rate limiter or the database.
pub async fn reset_password_submit(
    State(state): State<SharedState>,
    ClientIp(ip): ClientIp,
    Form(form): Form<ResetPasswordForm>,
) -> Response {
    let mut page = ResetPasswordTemplate {
        token: form.token.clone(),
        sign_in_path: SIGN_IN_PATH,
        ..Default::default()
    };

    if let Err(errors) = form.validate() {
        fill_field_errors(&mut page, &errors);
        return render(StatusCode::UNPROCESSABLE_ENTITY, page);
    }

    match actions::change_password_action(&state, ip, form.into_input()).await {
        Ok(()) => {
            page.updated = true;
            render(StatusCode::OK, page)
        }
        Err(err) => {
            err.log();
            if let AppError::Validation(errors) = &err {
                fill_field_errors(&mut page, errors);
            }
            page.error = Some(err.public_message());
            render(err.status(), page)
        }
    }
}

fn fill_field_errors(page: &mut ResetPasswordTemplate, errors: &ValidationErrors) {
    page.password_error = validation::field_message(errors, "password");
    page.confirmation_error = validation::field_message(errors, "password_confirmation");
}

pub async fn forgot_password_page() -> Response {
    render(StatusCode::OK, ForgotPasswordTemplate::default())
}

pub async fn forgot_password_submit(
    State(state): State<SharedState>,
    ClientIp(ip): ClientIp,
    Form(form): Form<ForgotPasswordInput>,
) -> Response {
    match actions::reset_password_action(&state, ip, form).await {
        Ok(()) => render(
            StatusCode::OK,
            ForgotPasswordTemplate {
                message: Some("If that email is registered, a reset link has been sent.".to_string()),
                error: None,
            },
        ),
        Err(err) => {
            err.log();
            render(
                err.status(),
                ForgotPasswordTemplate {
                    message: None,
                    error: Some(err.public_message()),
                },
            )
        }
    }
}
