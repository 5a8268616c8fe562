pub mod password_reset_tokens;
pub mod sessions;
pub mod users;
