//! Application state shared across request handlers.

use std::sync::Arc;

use crate::auth::google::GoogleOAuth;
use crate::auth::jwt::TokenSigner;
use crate::db::Database;
use crate::media::ImageHost;
use crate::side_effects::SideEffects;

/// Shared application state.
///
/// This is passed to all request handlers via Axum's state extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    db: Database,
    tokens: TokenSigner,
    effects: SideEffects,
    images: Arc<dyn ImageHost>,
    google: Option<GoogleOAuth>,
    client_url: String,
}

/// Everything [`AppState`] is built from.
pub struct AppServices {
    pub db: Database,
    pub tokens: TokenSigner,
    pub effects: SideEffects,
    pub images: Arc<dyn ImageHost>,
    pub google: Option<GoogleOAuth>,
    pub client_url: String,
}

impl AppState {
    pub fn new(services: AppServices) -> Self {
        let AppServices {
            db,
            tokens,
            effects,
            images,
            google,
            client_url,
        } = services;

        Self {
            inner: Arc::new(AppStateInner {
                db,
                tokens,
                effects,
                images,
                google,
                client_url,
            }),
        }
    }

    /// Get a reference to the database.
    pub fn db(&self) -> &Database {
        &self.inner.db
    }

    pub fn tokens(&self) -> &TokenSigner {
        &self.inner.tokens
    }

    pub fn effects(&self) -> &SideEffects {
        &self.inner.effects
    }

    pub fn images(&self) -> &dyn ImageHost {
        self.inner.images.as_ref()
    }

    /// `None` when Google sign-in is not configured.
    pub fn google(&self) -> Option<&GoogleOAuth> {
        self.inner.google.as_ref()
    }

    /// Base URL of the web client, without a trailing slash.
    pub fn client_url(&self) -> &str {
        &self.inner.client_url
    }
}
