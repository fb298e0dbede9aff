//! Password reset tokens.
//!
//! Token format: `ccr_<32 random bytes, base64url>`. The raw token is only
//! ever sent to the user's inbox; the database keeps its SHA-256 hash.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use campus_id::UserId;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::db::{DbError, ResetStore, ValidReset};

pub const RESET_TOKEN_PREFIX: &str = "ccr_";

pub const RESET_TOKEN_LIFETIME_MINUTES: i64 = 15;

/// Token bytes (32 bytes = 256 bits of entropy).
const TOKEN_BYTES: usize = 32;

/// Generate a new reset token.
pub fn generate_reset_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill(&mut bytes);
    format!("{}{}", RESET_TOKEN_PREFIX, URL_SAFE_NO_PAD.encode(bytes))
}

/// Hash a token for storage using SHA-256, hex encoded.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Create a reset grant for a user and return the raw token and its expiry.
pub async fn issue_reset(
    store: &ResetStore,
    user_id: &UserId,
) -> Result<(String, DateTime<Utc>), DbError> {
    let token = generate_reset_token();
    let expires_at = Utc::now() + Duration::minutes(RESET_TOKEN_LIFETIME_MINUTES);
    store.create(user_id, &hash_token(&token), expires_at).await?;
    Ok((token, expires_at))
}

/// Consume a raw reset token. Returns `None` for unknown, used, expired or
/// malformed tokens without distinguishing between them.
pub async fn redeem_reset(store: &ResetStore, token: &str) -> Result<Option<ValidReset>, DbError> {
    if !token.starts_with(RESET_TOKEN_PREFIX) {
        return Ok(None);
    }
    store.consume(&hash_token(token)).await
}
