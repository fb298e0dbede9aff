//! Bearer tokens: HS256 JWTs asserting user id and role.

use campus_id::UserId;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::AuthError;
use crate::model::Role;

/// Session tokens are valid for a week.
pub const TOKEN_LIFETIME_DAYS: i64 = 7;

/// OAuth `state` tokens only need to survive the consent screen.
pub const STATE_LIFETIME_MINUTES: i64 = 10;

const STATE_AUDIENCE: &str = "oauth-state";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: UserId,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct StateClaims {
    aud: String,
    nonce: String,
    exp: i64,
}

/// Signs and verifies tokens with one shared secret.
#[derive(Clone)]
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenSigner {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    /// Issue a session token for a user.
    pub fn issue(&self, user_id: UserId, role: Role) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id,
            role,
            iat: now.timestamp(),
            exp: (now + Duration::days(TOKEN_LIFETIME_DAYS)).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(AuthError::Signing)
    }

    /// Verify signature and expiry and return the claims.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(AuthError::InvalidToken)
    }

    /// Issue a short-lived, self-verifying OAuth `state` value.
    pub fn issue_state(&self, nonce: &str) -> Result<String, AuthError> {
        let claims = StateClaims {
            aud: STATE_AUDIENCE.to_string(),
            nonce: nonce.to_string(),
            exp: (Utc::now() + Duration::minutes(STATE_LIFETIME_MINUTES)).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(AuthError::Signing)
    }

    pub fn verify_state(&self, state: &str) -> Result<(), AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[STATE_AUDIENCE]);
        decode::<StateClaims>(state, &self.decoding, &validation)
            .map(|_| ())
            .map_err(AuthError::InvalidToken)
    }
}
