//! API v1 routes.

mod admin;
mod auth;
mod events;
mod form;
mod me;
mod oauth;
mod views;

use std::str::FromStr;

use axum::Router;
use campus_id::IdError;

use crate::api::error::ApiError;
use crate::state::AppState;

/// Create API v1 routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::routes())
        .nest("/events", events::routes())
        .nest("/me", me::routes())
        .nest("/admin", admin::routes())
}

/// Parse a typed id from a path segment. A malformed id cannot name an
/// existing record, so it is reported as not found.
fn parse_path_id<T>(
    raw: &str,
    code: &'static str,
    message: &'static str,
    request_id: &str,
) -> Result<T, ApiError>
where
    T: FromStr<Err = IdError>,
{
    raw.parse()
        .map_err(|_: IdError| ApiError::not_found(code, message).with_request_id(request_id))
}
