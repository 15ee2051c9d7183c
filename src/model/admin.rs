use chrono::{DateTime, Utc};

#[derive(Debug, sqlx::FromRow)]
pub struct Admin {
    pub id: u64, // BIGINT UNSIGNED
    pub username: String,
    pub email: String,
    pub password: String,
    pub reset_token_expiry: Option<DateTime<Utc>>,
}
