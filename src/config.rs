use std::net::IpAddr;
use std::path::PathBuf;

use ipnet::IpNet;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: IpAddr,
    pub port: u16,
    pub base_url: String,
    /// Directory of ordered migration files. `None` uses the embedded set.
    pub migrations_dir: Option<PathBuf>,
    pub trusted_proxies: Vec<IpNet>,
    pub reset_token_ttl_minutes: i64,
    pub max_body_size: usize,
    pub log_level: String,
    pub smtp: Option<SmtpConfig>,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    pub from: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let database_url = env_required("DATABASE_URL")?;

        let host: IpAddr = env_or("PASSGATE_HOST", "0.0.0.0")
            .parse()
            .map_err(|e| format!("Invalid PASSGATE_HOST: {e}"))?;

        let port: u16 = env_or("PASSGATE_PORT", "3000")
            .parse()
            .map_err(|e| format!("Invalid PASSGATE_PORT: {e}"))?;

        let base_url = env_or("PASSGATE_BASE_URL", &format!("http://{host}:{port}"));

        let migrations_dir = std::env::var("PASSGATE_MIGRATIONS_DIR")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        let trusted_proxies = parse_proxies(&env_or("PASSGATE_TRUSTED_PROXIES", ""))?;

        let reset_token_ttl_minutes: i64 = env_or("PASSGATE_RESET_TOKEN_TTL_MINUTES", "60")
            .parse()
            .map_err(|e| format!("Invalid PASSGATE_RESET_TOKEN_TTL_MINUTES: {e}"))?;
        if reset_token_ttl_minutes <= 0 {
            return Err("PASSGATE_RESET_TOKEN_TTL_MINUTES must be positive".to_string());
        }

        let max_body_size: usize = env_or("PASSGATE_MAX_BODY_SIZE", "65536")
            .parse()
            .map_err(|e| format!("Invalid PASSGATE_MAX_BODY_SIZE: {e}"))?;

        let log_level = env_or("PASSGATE_LOG_LEVEL", "info");

        let smtp = match (
            std::env::var("PASSGATE_SMTP_HOST").ok(),
            std::env::var("PASSGATE_SMTP_PORT").ok(),
            std::env::var("PASSGATE_SMTP_USER").ok(),
            std::env::var("PASSGATE_SMTP_PASS").ok(),
            std::env::var("PASSGATE_SMTP_FROM").ok(),
        ) {
            (Some(host), Some(port), Some(user), Some(pass), Some(from)) => Some(SmtpConfig {
                host,
                port: port
                    .parse()
                    .map_err(|e| format!("Invalid PASSGATE_SMTP_PORT: {e}"))?,
                user,
                pass,
                from,
            }),
            _ => None,
        };

        Ok(Config {
            database_url,
            host,
            port,
            base_url,
            migrations_dir,
            trusted_proxies,
            reset_token_ttl_minutes,
            max_body_size,
            log_level,
            smtp,
        })
    }
}

fn parse_proxies(raw: &str) -> Result<Vec<IpNet>, String> {
    raw.split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|s| {
            s.trim()
                .parse()
                .map_err(|e| format!("Invalid PASSGATE_TRUSTED_PROXIES entry '{s}': {e}"))
        })
        .collect()
}

fn env_required(key: &str) -> Result<String, String> {
    std::env::var(key).map_err(|_| format!("Missing required environment variable: {key}"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
