use crate::models::{Claims, TokenType};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::Error};
use uuid::Uuid;

fn expiry(ttl: i64) -> usize {
    (chrono::Utc::now().timestamp() + ttl).max(0) as usize
}

fn issue(
    admin_id: u64,
    username: String,
    token_type: TokenType,
    secret: &str,
    ttl: i64,
) -> Result<(String, Claims), Error> {
    let claims = Claims {
        admin_id,
        sub: username,
        exp: expiry(ttl),
        jti: Uuid::new_v4().to_string(),
        token_type,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok((token, claims))
}

pub fn generate_access_token(
    admin_id: u64,
    username: String,
    secret: &str,
    ttl: i64,
) -> Result<String, Error> {
    issue(admin_id, username, TokenType::Access, secret, ttl).map(|(token, _)| token)
}

pub fn generate_refresh_token(
    admin_id: u64,
    username: String,
    secret: &str,
    ttl: i64,
) -> Result<(String, Claims), Error> {
    issue(admin_id, username, TokenType::Refresh, secret, ttl)
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| e.to_string())
}
