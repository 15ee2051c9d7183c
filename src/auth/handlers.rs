use crate::{
    auth::{
        jwt::{generate_access_token, generate_refresh_token, verify_token},
        password::{hash_password, verify_password},
    },
    config::Config,
    model::admin::Admin,
    models::{Claims, ForgotPasswordReq, LoginReqDto, ResetPasswordReq, TokenPair, TokenType},
};
use actix_web::{HttpRequest, HttpResponse, Responder, web};
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

const ADMIN_COLUMNS: &str = "id, username, email, password, reset_token_expiry";

fn bearer(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

/// Issues an access token plus a refresh token whose `jti` is persisted.
async fn issue_pair(
    pool: &MySqlPool,
    config: &Config,
    admin_id: u64,
    username: &str,
) -> Result<TokenPair, HttpResponse> {
    let access_token = generate_access_token(
        admin_id,
        username.to_string(),
        &config.jwt_secret,
        config.access_token_ttl,
    )
    .map_err(|e| {
        error!(error = %e, "Failed to sign access token");
        HttpResponse::InternalServerError().finish()
    })?;

    let (refresh_token, refresh_claims) = generate_refresh_token(
        admin_id,
        username.to_string(),
        &config.jwt_secret,
        config.refresh_token_ttl,
    )
    .map_err(|e| {
        error!(error = %e, "Failed to sign refresh token");
        HttpResponse::InternalServerError().finish()
    })?;

    debug!(admin_id, jti = %refresh_claims.jti, "Storing refresh token");

    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (admin_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(admin_id)
    .bind(&refresh_claims.jti)
    .bind(refresh_claims.exp as i64)
    .execute(pool)
    .await
    .map_err(|e| {
        error!(error = %e, "Failed to store refresh token");
        HttpResponse::InternalServerError().finish()
    })?;

    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

#[instrument(
    name = "auth_login",
    skip(pool, config, user),
    fields(username = %user.username)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    info!("Login request received");

    if user.username.trim().is_empty() || user.password.is_empty() {
        info!("Validation failed: empty username or password");
        return HttpResponse::BadRequest().json(json!({"error": "Username or password required"}));
    }

    let admin = match sqlx::query_as::<_, Admin>(&format!(
        "SELECT {ADMIN_COLUMNS} FROM admins WHERE username = ?"
    ))
    .bind(user.username.trim())
    .fetch_optional(pool.get_ref())
    .await
    {
        Ok(Some(admin)) => {
            debug!(admin_id = admin.id, "Admin found");
            admin
        }
        Ok(None) => {
            info!("Invalid credentials: admin not found");
            return HttpResponse::Unauthorized().json(json!({"error": "Invalid credentials"}));
        }
        Err(e) => {
            error!(error = %e, "Database error while fetching admin");
            return HttpResponse::InternalServerError().finish();
        }
    };

    if let Err(e) = verify_password(&user.password, &admin.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return HttpResponse::Unauthorized().json(json!({"error": "Invalid credentials"}));
    }

    let pair = match issue_pair(pool.get_ref(), &config, admin.id, &admin.username).await {
        Ok(pair) => pair,
        Err(resp) => return resp,
    };

    if let Err(e) = sqlx::query("UPDATE admins SET last_login_at = NOW() WHERE id = ?")
        .bind(admin.id)
        .execute(pool.get_ref())
        .await
    {
        // login still succeeds
        error!(error = %e, "Failed to update last_login_at");
    }

    info!("Login successful");
    HttpResponse::Ok().json(pair)
}

async fn revoke(pool: &MySqlPool, jti: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE jti = ? AND revoked = FALSE")
        .bind(jti)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

fn refresh_claims(req: &HttpRequest, config: &Config) -> Option<Claims> {
    let claims = verify_token(bearer(req)?, &config.jwt_secret).ok()?;
    (claims.token_type == TokenType::Refresh).then_some(claims)
}

/// Rotates a refresh token: the presented one is revoked and a new pair issued.
pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    let Some(claims) = refresh_claims(&req, &config) else {
        return HttpResponse::Unauthorized().json(json!({"error": "Invalid refresh token"}));
    };

    // revoking first makes a replayed token lose the race
    match revoke(pool.get_ref(), &claims.jti).await {
        Ok(1) => {}
        Ok(_) => {
            warn!(admin_id = claims.admin_id, jti = %claims.jti, "Unknown or revoked refresh token");
            return HttpResponse::Unauthorized().json(json!({"error": "Invalid refresh token"}));
        }
        Err(e) => {
            error!(error = %e, "Failed to revoke refresh token");
            return HttpResponse::InternalServerError().finish();
        }
    }

    match issue_pair(pool.get_ref(), &config, claims.admin_id, &claims.sub).await {
        Ok(pair) => HttpResponse::Ok().json(pair),
        Err(resp) => resp,
    }
}

/// Idempotent: anything but a valid refresh token still answers 204.
pub async fn logout(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    if let Some(claims) = refresh_claims(&req, &config) {
        if let Err(e) = revoke(pool.get_ref(), &claims.jti).await {
            error!(error = %e, "Failed to revoke refresh token on logout");
        }
    }

    HttpResponse::NoContent().finish()
}

pub fn reset_token_valid(expiry: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    expiry.is_some_and(|expiry| expiry > now)
}

/// Issues a reset token for the admin owning `email`. The token is returned
/// in the response body; nothing is mailed.
#[instrument(name = "auth_forgot_password", skip(pool, config, body))]
pub async fn forgot_password(
    body: web::Json<ForgotPasswordReq>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    let email = body.email.trim();
    if email.is_empty() {
        return HttpResponse::BadRequest().json(json!({"error": "Email is required"}));
    }

    let admin = match sqlx::query_as::<_, Admin>(&format!(
        "SELECT {ADMIN_COLUMNS} FROM admins WHERE email = ?"
    ))
    .bind(email)
    .fetch_optional(pool.get_ref())
    .await
    {
        Ok(Some(admin)) => admin,
        Ok(None) => {
            return HttpResponse::NotFound().json(json!({"error": "Admin with this email not found"}));
        }
        Err(e) => {
            error!(error = %e, "Database error while fetching admin");
            return HttpResponse::InternalServerError().finish();
        }
    };

    let token = Uuid::new_v4().to_simple().to_string();
    let expiry = Utc::now() + Duration::seconds(config.reset_token_ttl);

    if let Err(e) = sqlx::query(
        "UPDATE admins SET reset_token = ?, reset_token_expiry = ? WHERE id = ?",
    )
    .bind(&token)
    .bind(expiry)
    .bind(admin.id)
    .execute(pool.get_ref())
    .await
    {
        error!(error = %e, "Failed to store reset token");
        return HttpResponse::InternalServerError().finish();
    }

    info!(admin_id = admin.id, "Password reset token issued");
    HttpResponse::Ok().json(json!({
        "message": "Password reset token generated",
        "token": token,
    }))
}

#[instrument(name = "auth_reset_password", skip(pool, body))]
pub async fn reset_password(
    body: web::Json<ResetPasswordReq>,
    pool: web::Data<MySqlPool>,
) -> impl Responder {
    if body.token.trim().is_empty() || body.new_password.len() < 6 {
        return HttpResponse::BadRequest().json(json!({
            "error": "token and a newPassword of at least 6 characters are required"
        }));
    }

    let admin = match sqlx::query_as::<_, Admin>(&format!(
        "SELECT {ADMIN_COLUMNS} FROM admins WHERE reset_token = ?"
    ))
    .bind(body.token.trim())
    .fetch_optional(pool.get_ref())
    .await
    {
        Ok(Some(admin)) if reset_token_valid(admin.reset_token_expiry, Utc::now()) => admin,
        Ok(_) => {
            return HttpResponse::BadRequest().json(json!({"error": "Invalid or expired token"}));
        }
        Err(e) => {
            error!(error = %e, "Database error while fetching admin");
            return HttpResponse::InternalServerError().finish();
        }
    };

    let hashed = match hash_password(&body.new_password) {
        Ok(h) => h,
        Err(e) => {
            error!(error = %e, "Failed to hash password");
            return HttpResponse::InternalServerError().finish();
        }
    };

    if let Err(e) = sqlx::query(
        "UPDATE admins SET password = ?, reset_token = NULL, reset_token_expiry = NULL WHERE id = ?",
    )
    .bind(hashed)
    .bind(admin.id)
    .execute(pool.get_ref())
    .await
    {
        error!(error = %e, "Failed to update password");
        return HttpResponse::InternalServerError().finish();
    }

    info!(admin_id = admin.id, email = %admin.email, "Password reset");
    HttpResponse::Ok().json(json!({"message": "Password has been reset"}))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_token_expires() {
        let now = Utc::now();
        assert!(reset_token_valid(Some(now + Duration::minutes(5)), now));
        assert!(!reset_token_valid(Some(now - Duration::seconds(1)), now));
        assert!(!reset_token_valid(None, now));
    }
}
