//! Caller-scoped listings.
//!
//! - GET /v1/me/registrations - The caller's registrations, newest first
//! - GET /v1/me/events - Organizer dashboard with live registration counts

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};

use super::views::{EventResponse, ListResponse, MyRegistrationResponse};
use crate::api::authz;
use crate::api::error::{ApiError, ApiResultExt};
use crate::api::request_context::RequestContext;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/registrations", get(my_registrations))
        .route("/events", get(my_events))
}

async fn my_registrations(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<impl IntoResponse, ApiError> {
    let actor = authz::require_authenticated(&ctx)?;

    let registrations = state
        .db()
        .registrations()
        .list_for_student(&actor.user_id)
        .await
        .or_api(&ctx.request_id)?;

    Ok(Json(ListResponse::<MyRegistrationResponse>::new(
        registrations,
    )))
}

/// Counts are recomputed from the registration store on every read.
async fn my_events(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<impl IntoResponse, ApiError> {
    let actor = authz::require_organizer(&ctx)?;

    let events = state
        .db()
        .events()
        .list_for_organizer_refreshed(&actor.user_id)
        .await
        .or_api(&ctx.request_id)?;

    Ok(Json(ListResponse::<EventResponse>::new(events)))
}
