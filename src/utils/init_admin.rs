use anyhow::{Context, Result, anyhow};
use sqlx::MySqlPool;
use tracing::info;

use crate::{auth::password::hash_password, config::Config};

/// Creates the configured default admin unless that username already exists.
pub async fn seed_default_admin(pool: &MySqlPool, config: &Config) -> Result<()> {
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM admins WHERE username = ? LIMIT 1)",
    )
    .bind(&config.default_admin_username)
    .fetch_one(pool)
    .await
    .context("Failed to look up default admin")?;

    if exists {
        return Ok(());
    }

    let hashed = hash_password(&config.default_admin_password)
        .map_err(|e| anyhow!("Failed to hash default admin password: {e}"))?;

    sqlx::query("INSERT IGNORE INTO admins (username, email, password) VALUES (?, ?, ?)")
        .bind(&config.default_admin_username)
        .bind(&config.default_admin_email)
        .bind(hashed)
        .execute(pool)
        .await
        .context("Failed to create default admin")?;

    info!(username = %config.default_admin_username, "Default admin created");
    Ok(())
}
