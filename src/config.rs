use std::{env, str::FromStr};

use anyhow::{Context, Result};
use dotenvy::dotenv;

use crate::{family::DEFAULT_MAX_ATTEMPTS, tax::generator::RegenerationPolicy};

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    /// Seconds
    pub access_token_ttl: i64,
    pub refresh_token_ttl: i64,
    pub reset_token_ttl: i64,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_forgot_per_min: u32,
    pub rate_refresh_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,
    pub log_dir: String,

    // Seeded at startup when no admin with this username exists
    pub default_admin_username: String,
    pub default_admin_email: String,
    pub default_admin_password: String,

    pub generation_batch_size: usize,
    pub family_id_attempts: u32,
    pub regeneration_policy: RegenerationPolicy,
}

fn required(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("{key} must be set"))
}

fn or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parsed<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    or_default(key, default)
        .parse()
        .with_context(|| format!("{key} is not a valid value"))
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let preserve_paid: bool = parsed("PRESERVE_PAID_ON_RATE_CHANGE", "false")?;

        Ok(Self {
            server_addr: or_default("SERVER_ADDR", "127.0.0.1:8080"),
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            access_token_ttl: parsed("ACCESS_TOKEN_TTL", "900")?, // 15 min
            refresh_token_ttl: parsed("REFRESH_TOKEN_TTL", "604800")?, // 7 days
            reset_token_ttl: parsed("RESET_TOKEN_TTL", "3600")?,

            rate_login_per_min: parsed("RATE_LOGIN_PER_MIN", "60")?,
            rate_forgot_per_min: parsed("RATE_FORGOT_PER_MIN", "10")?,
            rate_refresh_per_min: parsed("RATE_REFRESH_PER_MIN", "30")?,
            rate_protected_per_min: parsed("RATE_PROTECTED_PER_MIN", "1000")?,

            api_prefix: or_default("API_PREFIX", "/api"),
            log_dir: or_default("LOG_DIR", "logs"),

            default_admin_username: or_default("DEFAULT_ADMIN_USERNAME", "admin"),
            default_admin_email: or_default("DEFAULT_ADMIN_EMAIL", "admin@parish.local"),
            default_admin_password: or_default("DEFAULT_ADMIN_PASSWORD", "admin123"),

            generation_batch_size: parsed("GENERATION_BATCH_SIZE", "500")?,
            family_id_attempts: parsed(
                "FAMILY_ID_ATTEMPTS",
                &DEFAULT_MAX_ATTEMPTS.to_string(),
            )?,
            regeneration_policy: if preserve_paid {
                RegenerationPolicy::PreservePaid
            } else {
                RegenerationPolicy::OverwritePaid
            },
        })
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            database_url: String::new(),
            jwt_secret: "test-secret".into(),
            server_addr: "127.0.0.1:0".into(),
            access_token_ttl: 900,
            refresh_token_ttl: 604_800,
            reset_token_ttl: 3600,
            rate_login_per_min: 60,
            rate_forgot_per_min: 10,
            rate_refresh_per_min: 30,
            rate_protected_per_min: 1000,
            api_prefix: "/api".into(),
            log_dir: "logs".into(),
            default_admin_username: "admin".into(),
            default_admin_email: "admin@parish.local".into(),
            default_admin_password: "admin123".into(),
            generation_batch_size: 500,
            family_id_attempts: DEFAULT_MAX_ATTEMPTS,
            regeneration_policy: RegenerationPolicy::OverwritePaid,
        }
    }
}
