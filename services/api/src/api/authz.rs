//! Authorization helpers (v1).
//!
//! Roles come from the verified bearer token. Event ownership checks live
//! in the workflows, which have the event row at hand.

use crate::api::error::ApiError;
use crate::api::request_context::RequestContext;
use crate::model::Role;
use crate::workflow::Actor;

pub fn require_authenticated(ctx: &RequestContext) -> Result<Actor, ApiError> {
    ctx.actor.ok_or_else(|| {
        ApiError::unauthorized("unauthorized", "Missing or invalid Authorization token")
            .with_request_id(ctx.request_id.clone())
    })
}

pub fn require_admin(ctx: &RequestContext) -> Result<Actor, ApiError> {
    let actor = require_authenticated(ctx)?;
    if actor.role != Role::Admin {
        return Err(
            ApiError::forbidden("admins_only", "Admin role required for this operation")
                .with_request_id(ctx.request_id.clone()),
        );
    }
    Ok(actor)
}

/// Organizers and admins.
pub fn require_organizer(ctx: &RequestContext) -> Result<Actor, ApiError> {
    let actor = require_authenticated(ctx)?;
    if !actor.role.can_organize() {
        return Err(ApiError::forbidden(
            "organizers_only",
            "Organizer or admin role required for this operation",
        )
        .with_request_id(ctx.request_id.clone()));
    }
    Ok(actor)
}
