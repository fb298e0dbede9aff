//! Credentials and identity: password hashing, bearer tokens, Google sign-in.

pub mod google;
pub mod jwt;
pub mod password;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error("invalid token: {0}")]
    InvalidToken(#[source] jsonwebtoken::errors::Error),

    #[error("token signing failed: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),

    #[error("oauth provider request failed: {0}")]
    Provider(#[from] reqwest::Error),

    #[error("oauth provider rejected the exchange: {0}")]
    ProviderRejected(String),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
