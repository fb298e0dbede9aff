//! Admin moderation endpoints. Every route requires the `admin` role.
//!
//! - GET    /v1/admin/events/pending
//! - PUT    /v1/admin/events/{id}/approve
//! - DELETE /v1/admin/events/{id}/reject
//! - GET    /v1/admin/organizers/pending
//! - PUT    /v1/admin/organizers/{id}/approve
//! - DELETE /v1/admin/organizers/{id}/reject

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::{delete, get, put},
    Json, Router,
};
use campus_id::{EventId, UserId};
use serde::Serialize;
use tracing::info;

use super::parse_path_id;
use super::views::{EventResponse, ListResponse, UserResponse};
use crate::api::authz;
use crate::api::error::{ApiError, ApiResultExt};
use crate::api::request_context::RequestContext;
use crate::state::AppState;
use crate::workflow::moderation;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/events/pending", get(pending_events))
        .route("/events/{event_id}/approve", put(approve_event))
        .route("/events/{event_id}/reject", delete(reject_event))
        .route("/organizers/pending", get(pending_organizers))
        .route("/organizers/{user_id}/approve", put(approve_organizer))
        .route("/organizers/{user_id}/reject", delete(reject_organizer))
}

#[derive(Debug, Serialize)]
struct EventDecision {
    message: &'static str,
    event: EventResponse,
}

#[derive(Debug, Serialize)]
struct RejectedEvent {
    message: &'static str,
    id: String,
    registrations_deleted: u64,
}

#[derive(Debug, Serialize)]
struct OrganizerDecision {
    message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<UserResponse>,
}

async fn pending_events(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<impl IntoResponse, ApiError> {
    authz::require_admin(&ctx)?;

    let events = state
        .db()
        .events()
        .list_pending()
        .await
        .or_api(&ctx.request_id)?;

    Ok(Json(ListResponse::<EventResponse>::new(events)))
}

async fn approve_event(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(raw_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let admin = authz::require_admin(&ctx)?;
    let event_id: EventId =
        parse_path_id(&raw_id, "event_not_found", "Event not found", &ctx.request_id)?;

    let event = moderation::approve_event(state.db(), &event_id)
        .await
        .or_api(&ctx.request_id)?;

    info!(event_id = %event_id, admin_id = %admin.user_id, "Admin approved event");
    Ok(Json(EventDecision {
        message: "Event approved",
        event: event.into(),
    }))
}

async fn reject_event(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(raw_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let admin = authz::require_admin(&ctx)?;
    let event_id: EventId =
        parse_path_id(&raw_id, "event_not_found", "Event not found", &ctx.request_id)?;

    let deleted = moderation::reject_event(state.db(), state.effects(), &event_id)
        .await
        .or_api(&ctx.request_id)?;

    info!(event_id = %event_id, admin_id = %admin.user_id, "Admin rejected event");
    Ok(Json(RejectedEvent {
        message: "Event rejected and removed",
        id: deleted.event.id.to_string(),
        registrations_deleted: deleted.registrations_deleted,
    }))
}

async fn pending_organizers(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<impl IntoResponse, ApiError> {
    authz::require_admin(&ctx)?;

    let users = state
        .db()
        .users()
        .list_pending_organizers()
        .await
        .or_api(&ctx.request_id)?;

    Ok(Json(ListResponse::<UserResponse>::new(users)))
}

async fn approve_organizer(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(raw_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let admin = authz::require_admin(&ctx)?;
    let user_id: UserId =
        parse_path_id(&raw_id, "user_not_found", "User not found", &ctx.request_id)?;

    let user = moderation::approve_organizer(state.db(), &user_id)
        .await
        .or_api(&ctx.request_id)?;

    info!(user_id = %user_id, admin_id = %admin.user_id, "Admin approved organizer");
    Ok(Json(OrganizerDecision {
        message: "Organizer approved",
        user: Some(user.into()),
    }))
}

async fn reject_organizer(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(raw_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let admin = authz::require_admin(&ctx)?;
    let user_id: UserId =
        parse_path_id(&raw_id, "user_not_found", "User not found", &ctx.request_id)?;

    moderation::reject_organizer(state.db(), &user_id)
        .await
        .or_api(&ctx.request_id)?;

    info!(user_id = %user_id, admin_id = %admin.user_id, "Admin rejected organizer");
    Ok(Json(OrganizerDecision {
        message: "Organizer rejected and removed",
        user: None,
    }))
}
