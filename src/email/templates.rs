use askama::Template;

#[derive(Template)]
#[template(path = "email/password_reset.html")]
struct PasswordResetEmail<'a> {
    reset_url: &'a str,
    expires_in: String,
}

fn describe_ttl(minutes: i64) -> String {
    match minutes {
        60 => "1 hour".to_string(),
        m if m % 60 == 0 => format!("{} hours", m / 60),
        1 => "1 minute".to_string(),
        m => format!("{m} minutes"),
    }
}

pub fn render_password_reset(reset_url: &str, ttl_minutes: i64) -> String {
    PasswordResetEmail {
        reset_url,
        expires_in: describe_ttl(ttl_minutes),
    }
    .render()
    .unwrap_or_else(|e| {
        tracing::error!("Failed to render password reset email: {e}");
        format!("Reset your password: {reset_url}")
    })
}
