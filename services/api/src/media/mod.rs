//! Hosted poster images.
//!
//! Posters live on an external image host; the event row only stores the
//! returned URL. Deleting a poster is always best-effort.

mod cloudinary;

pub use cloudinary::{CloudinaryConfig, CloudinaryHost};

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Upload cap for a single poster.
pub const MAX_POSTER_BYTES: usize = 2 * 1024 * 1024;

/// Folder posters are uploaded into on the image host.
pub const POSTER_FOLDER: &str = "campusconnect_events";

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("poster uploads are not configured")]
    Disabled,

    #[error("poster is {size} bytes; the limit is {max} bytes")]
    TooLarge { size: usize, max: usize },

    #[error("poster must be an image, got '{0}'")]
    NotAnImage(String),

    #[error("image host request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("image host rejected the request: {0}")]
    Rejected(String),
}

/// A poster file received from a client.
#[derive(Debug, Clone)]
pub struct PosterUpload {
    pub bytes: Bytes,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
}

impl PosterUpload {
    /// Enforce the size cap and require an `image/*` content type.
    pub fn validate(&self) -> Result<(), MediaError> {
        if self.bytes.len() > MAX_POSTER_BYTES {
            return Err(MediaError::TooLarge {
                size: self.bytes.len(),
                max: MAX_POSTER_BYTES,
            });
        }
        match self.content_type.as_deref() {
            Some(ct) if ct.starts_with("image/") => Ok(()),
            Some(ct) => Err(MediaError::NotAnImage(ct.to_string())),
            None => Err(MediaError::NotAnImage("unknown".to_string())),
        }
    }
}

#[async_trait]
pub trait ImageHost: Send + Sync {
    /// Store a poster and return its public URL.
    async fn upload(&self, poster: PosterUpload) -> Result<String, MediaError>;

    /// Remove a previously uploaded poster by its URL.
    async fn destroy(&self, poster_url: &str) -> Result<(), MediaError>;
}

/// Used when no image host is configured: uploads are refused, deletes are no-ops.
pub struct DisabledImageHost;

#[async_trait]
impl ImageHost for DisabledImageHost {
    async fn upload(&self, _poster: PosterUpload) -> Result<String, MediaError> {
        Err(MediaError::Disabled)
    }

    async fn destroy(&self, poster_url: &str) -> Result<(), MediaError> {
        tracing::debug!(poster_url, "Image host disabled; skipping poster delete");
        Ok(())
    }
}

/// Host-side id of a poster: folder plus the file stem of the URL's last segment.
///
/// `https://res.cloudinary.com/x/image/upload/v1/campusconnect_events/abc123.jpg`
/// becomes `campusconnect_events/abc123`.
pub fn poster_public_id(poster_url: &str) -> Option<String> {
    let path = poster_url.split(['?', '#']).next()?;
    let last = path.rsplit('/').next()?;
    let stem = last.split('.').next()?;
    if stem.is_empty() {
        return None;
    }
    Some(format!("{POSTER_FOLDER}/{stem}"))
}
