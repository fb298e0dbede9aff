//! Event discovery, management and registration endpoints.
//!
//! Endpoints:
//! - GET    /v1/events - Approved events (search, category, sort)
//! - POST   /v1/events - Create an event (multipart)
//! - GET    /v1/events/upcoming/slider - Approved events in the next 7 days
//! - GET    /v1/events/calendar/month - Approved events in a calendar month
//! - GET    /v1/events/{id} - Single event
//! - PUT    /v1/events/{id} - Edit an event (multipart); resets approval
//! - DELETE /v1/events/{id} - Delete an event and its registrations
//! - POST   /v1/events/{id}/register - Register the calling student
//! - GET    /v1/events/{id}/registration-status - Whether the caller is registered
//! - GET    /v1/events/{id}/attendees - Registration snapshots

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use campus_id::EventId;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::form::EventForm;
use super::parse_path_id;
use super::views::{
    CalendarEntryResponse, EventResponse, ListResponse, RegistrationResponse,
};
use crate::api::authz;
use crate::api::error::{ApiError, ApiResultExt};
use crate::api::request_context::RequestContext;
use crate::db::EventFilter;
use crate::discovery::{current_month, month_bounds, slider_window, SortOrder};
use crate::model::Category;
use crate::state::AppState;
use crate::workflow::{moderation, registration};

/// Room for a 2 MiB poster plus the text fields.
const EVENT_FORM_BODY_LIMIT: usize = 3 * 1024 * 1024;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_events).post(create_event))
        .route("/upcoming/slider", get(upcoming_slider))
        .route("/calendar/month", get(calendar_month))
        .route(
            "/{event_id}",
            get(get_event).put(update_event).delete(delete_event),
        )
        .route("/{event_id}/register", post(register))
        .route("/{event_id}/registration-status", get(registration_status))
        .route("/{event_id}/attendees", get(attendees))
        .layer(DefaultBodyLimit::max(EVENT_FORM_BODY_LIMIT))
}

fn event_id(raw: &str, request_id: &str) -> Result<EventId, ApiError> {
    parse_path_id(raw, "event_not_found", "Event not found", request_id)
}

// ============================================================================
// Discovery
// ============================================================================

#[derive(Debug, Deserialize)]
struct ListQuery {
    search: Option<String>,
    category: Option<String>,
    sort: Option<String>,
}

impl ListQuery {
    fn into_filter(self, request_id: &str) -> Result<EventFilter, ApiError> {
        let category = match self.category.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(raw.parse::<Category>().map_err(|e| {
                ApiError::bad_request("invalid_category", e).with_request_id(request_id)
            })?),
        };
        let sort = match self.sort.as_deref().map(str::trim) {
            None | Some("") => SortOrder::default(),
            Some(raw) => raw.parse::<SortOrder>().map_err(|e| {
                ApiError::bad_request("invalid_sort", e).with_request_id(request_id)
            })?,
        };
        let search = self
            .search
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Ok(EventFilter {
            search,
            category,
            sort,
        })
    }
}

async fn list_events(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = query.into_filter(&ctx.request_id)?;
    let events = state
        .db()
        .events()
        .list_approved(&filter)
        .await
        .or_api(&ctx.request_id)?;

    Ok(Json(ListResponse::<EventResponse>::new(events)))
}

async fn upcoming_slider(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<impl IntoResponse, ApiError> {
    let (from, to) = slider_window(Utc::now().date_naive());
    let events = state
        .db()
        .events()
        .list_approved_between(from, to)
        .await
        .or_api(&ctx.request_id)?;

    Ok(Json(ListResponse::<EventResponse>::new(events)))
}

#[derive(Debug, Deserialize)]
struct CalendarQuery {
    year: Option<i32>,
    month: Option<u32>,
}

#[derive(Debug, Serialize)]
struct CalendarResponse {
    year: i32,
    month: u32,
    items: Vec<CalendarEntryResponse>,
}

async fn calendar_month(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(query): Query<CalendarQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (this_year, this_month) = current_month(Utc::now().date_naive());
    let year = query.year.unwrap_or(this_year);
    let month = query.month.unwrap_or(this_month);

    let Some((first, last)) = month_bounds(year, month) else {
        return Err(ApiError::bad_request(
            "invalid_month",
            "month must be between 1 and 12",
        )
        .with_request_id(ctx.request_id));
    };

    let entries = state
        .db()
        .events()
        .calendar(first, last)
        .await
        .or_api(&ctx.request_id)?;

    Ok(Json(CalendarResponse {
        year,
        month,
        items: entries.into_iter().map(Into::into).collect(),
    }))
}

/// Unapproved events are only visible to their owner and admins.
async fn get_event(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(raw_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let event_id = event_id(&raw_id, &ctx.request_id)?;

    let event = state
        .db()
        .events()
        .find(&event_id)
        .await
        .or_api(&ctx.request_id)?
        .ok_or_else(|| {
            ApiError::not_found("event_not_found", "Event not found")
                .with_request_id(ctx.request_id.clone())
        })?;

    if !event.is_approved && !ctx.actor.is_some_and(|actor| actor.can_manage(&event)) {
        return Err(
            ApiError::forbidden("event_pending", "This event is awaiting approval")
                .with_request_id(ctx.request_id),
        );
    }

    Ok(Json(EventResponse::from(event)))
}

// ============================================================================
// Management
// ============================================================================

async fn create_event(
    State(state): State<AppState>,
    ctx: RequestContext,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let actor = authz::require_organizer(&ctx)?;

    let form = EventForm::read(multipart).await.or_api(&ctx.request_id)?;
    let (draft, poster) = form.into_draft().or_api(&ctx.request_id)?;

    let event = moderation::create_event(
        state.db(),
        state.effects(),
        state.images(),
        &actor,
        draft,
        poster,
    )
    .await
    .or_api(&ctx.request_id)?;

    Ok((StatusCode::CREATED, Json(EventResponse::from(event))))
}

async fn update_event(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(raw_id): Path<String>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let actor = authz::require_organizer(&ctx)?;
    let event_id = event_id(&raw_id, &ctx.request_id)?;

    let form = EventForm::read(multipart).await.or_api(&ctx.request_id)?;
    let (update, poster) = form.into_update().or_api(&ctx.request_id)?;

    let event = moderation::edit_event(
        state.db(),
        state.effects(),
        state.images(),
        &actor,
        &event_id,
        update,
        poster,
    )
    .await
    .or_api(&ctx.request_id)?;

    Ok(Json(EventResponse::from(event)))
}

#[derive(Debug, Serialize)]
struct DeleteEventResponse {
    id: String,
    registrations_deleted: u64,
}

async fn delete_event(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(raw_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = authz::require_organizer(&ctx)?;
    let event_id = event_id(&raw_id, &ctx.request_id)?;

    let deleted = moderation::remove_event(state.db(), state.effects(), &actor, &event_id)
        .await
        .or_api(&ctx.request_id)?;

    Ok(Json(DeleteEventResponse {
        id: deleted.event.id.to_string(),
        registrations_deleted: deleted.registrations_deleted,
    }))
}

// ============================================================================
// Registration
// ============================================================================

async fn register(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(raw_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = authz::require_authenticated(&ctx)?;
    let event_id = event_id(&raw_id, &ctx.request_id)?;

    let registration = registration::register(state.db(), state.effects(), &actor, &event_id)
        .await
        .or_api(&ctx.request_id)?;

    Ok((
        StatusCode::CREATED,
        Json(RegistrationResponse::from(registration)),
    ))
}

#[derive(Debug, Serialize)]
struct RegistrationStatusResponse {
    registered: bool,
}

async fn registration_status(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(raw_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = authz::require_authenticated(&ctx)?;
    let event_id = event_id(&raw_id, &ctx.request_id)?;

    let registered = registration::is_registered(state.db(), &actor, &event_id)
        .await
        .or_api(&ctx.request_id)?;

    Ok(Json(RegistrationStatusResponse { registered }))
}

async fn attendees(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(raw_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = authz::require_organizer(&ctx)?;
    let event_id = event_id(&raw_id, &ctx.request_id)?;

    let event = state
        .db()
        .events()
        .find(&event_id)
        .await
        .or_api(&ctx.request_id)?
        .ok_or_else(|| {
            ApiError::not_found("event_not_found", "Event not found")
                .with_request_id(ctx.request_id.clone())
        })?;

    if !actor.can_manage(&event) {
        return Err(
            ApiError::forbidden("not_owner", "you do not manage this event")
                .with_request_id(ctx.request_id),
        );
    }

    let registrations = state
        .db()
        .registrations()
        .list_for_event(&event_id)
        .await
        .or_api(&ctx.request_id)?;

    Ok(Json(ListResponse::<RegistrationResponse>::new(registrations)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(category: Option<&str>, sort: Option<&str>, search: Option<&str>) -> ListQuery {
        ListQuery {
            search: search.map(str::to_string),
            category: category.map(str::to_string),
            sort: sort.map(str::to_string),
        }
    }

    #[test]
    fn test_filter_defaults() {
        let filter = query(None, None, Some("   ")).into_filter("req").unwrap();
        assert_eq!(filter.search, None);
        assert_eq!(filter.category, None);
        assert_eq!(filter.sort, SortOrder::Ascending);
    }

    #[test]
    fn test_filter_parses_values() {
        let filter = query(Some("workshop"), Some("desc"), Some(" work "))
            .into_filter("req")
            .unwrap();
        assert_eq!(filter.search.as_deref(), Some("work"));
        assert_eq!(filter.category, Some(Category::Workshop));
        assert_eq!(filter.sort, SortOrder::Descending);
    }

    #[test]
    fn test_filter_rejects_unknown_values() {
        let err = query(Some("party"), None, None).into_filter("req").unwrap_err();
        assert_eq!(err.code(), "invalid_category");
        let err = query(None, Some("sideways"), None).into_filter("req").unwrap_err();
        assert_eq!(err.code(), "invalid_sort");
    }
}
