mod password_reset_token;
mod user;

pub use password_reset_token::PasswordResetToken;
pub use user::User;
