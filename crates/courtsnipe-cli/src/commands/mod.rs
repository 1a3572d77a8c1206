pub mod auth;
pub mod book;
pub mod config;
pub mod doctor;

/// Environment variable holding the portal password.
pub const PASSWORD_ENV: &str = "COURTSNIPE_PASSWORD";

pub(crate) fn password_from_env() -> Option<String> {
    std::env::var(PASSWORD_ENV)
        .ok()
        .filter(|password| !password.is_empty())
}
