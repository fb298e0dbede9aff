//! Event lifecycle and admin moderation.
//!
//! Events and organizer accounts each follow `pending -> approved` or
//! `pending -> rejected`. Rejecting an event deletes it; rejecting an
//! organizer deletes the pending account. Any edit sends an event back to
//! pending.

use campus_id::{EventId, UserId};
use chrono::NaiveDate;
use tracing::{info, instrument, warn};

use super::{Actor, WorkflowError};
use crate::db::{Database, DeletedEvent, EventUpdate, NewEvent};
use crate::media::{ImageHost, PosterUpload};
use crate::model::{Category, Event, Role, User};
use crate::side_effects::SideEffects;

/// Fields an organizer supplies when creating an event.
#[derive(Debug, Clone)]
pub struct EventDraft {
    pub title: String,
    pub description: String,
    pub category: Category,
    pub date: NaiveDate,
    pub time: String,
    pub venue: String,
    pub external_form_url: Option<String>,
    pub has_refreshments: bool,
    pub registration_deadline: Option<NaiveDate>,
}

/// Create a pending event owned by the caller.
///
/// Pending organizers are refused. The poster, if any, is uploaded before
/// the row is written; if the write then fails the upload is queued for
/// deletion.
#[instrument(skip(db, effects, images, draft, poster), fields(user_id = %actor.user_id))]
pub async fn create_event(
    db: &Database,
    effects: &SideEffects,
    images: &dyn ImageHost,
    actor: &Actor,
    draft: EventDraft,
    poster: Option<PosterUpload>,
) -> Result<Event, WorkflowError> {
    let organizer = active_organizer(db, actor).await?;

    let poster_url = match poster {
        Some(poster) => {
            poster.validate()?;
            Some(images.upload(poster).await?)
        }
        None => None,
    };

    let created = db
        .events()
        .create(NewEvent {
            title: draft.title,
            description: draft.description,
            category: draft.category,
            date: draft.date,
            time: draft.time,
            venue: draft.venue,
            organizer_id: organizer.id,
            organization_name: organizer.organization,
            poster_url: poster_url.clone(),
            external_form_url: draft.external_form_url,
            has_refreshments: draft.has_refreshments,
            registration_deadline: draft.registration_deadline,
        })
        .await;

    let event = match created {
        Ok(event) => event,
        Err(e) => {
            discard_upload(effects, None, poster_url);
            return Err(e.into());
        }
    };

    info!(event_id = %event.id, "Event created; awaiting approval");
    Ok(event)
}

/// Apply an edit from the owner or an admin. The event returns to pending.
///
/// A replaced poster is removed from the image host in the background.
#[instrument(skip(db, effects, images, update, poster), fields(user_id = %actor.user_id))]
pub async fn edit_event(
    db: &Database,
    effects: &SideEffects,
    images: &dyn ImageHost,
    actor: &Actor,
    event_id: &EventId,
    mut update: EventUpdate,
    poster: Option<PosterUpload>,
) -> Result<Event, WorkflowError> {
    let existing = managed_event(db, actor, event_id).await?;

    let uploaded = match poster {
        Some(poster) => {
            poster.validate()?;
            let url = images.upload(poster).await?;
            update.poster_url = Some(url.clone());
            Some(url)
        }
        None => None,
    };

    let event = match db.events().update(event_id, update).await {
        Ok(Some(event)) => event,
        result => {
            discard_upload(effects, Some(*event_id), uploaded);
            return Err(match result {
                Err(e) => e.into(),
                Ok(_) => WorkflowError::EventNotFound,
            });
        }
    };

    if let Some(old) = existing.poster_url {
        if event.poster_url.as_deref() != Some(old.as_str()) {
            effects.delete_poster(event.id, old);
        }
    }

    info!(event_id = %event.id, "Event edited; approval reset");
    Ok(event)
}

/// Delete an event on behalf of its owner or an admin.
pub async fn remove_event(
    db: &Database,
    effects: &SideEffects,
    actor: &Actor,
    event_id: &EventId,
) -> Result<DeletedEvent, WorkflowError> {
    managed_event(db, actor, event_id).await?;
    delete_event(db, effects, event_id).await
}

/// Delete an event with its registrations, then queue poster removal.
///
/// Shared by owner deletion and admin rejection. Poster cleanup is
/// best-effort and never blocks the record delete.
#[instrument(skip(db, effects))]
pub async fn delete_event(
    db: &Database,
    effects: &SideEffects,
    event_id: &EventId,
) -> Result<DeletedEvent, WorkflowError> {
    let deleted = db
        .events()
        .delete_cascade(event_id)
        .await?
        .ok_or(WorkflowError::EventNotFound)?;

    if let Some(poster_url) = &deleted.event.poster_url {
        effects.delete_poster(deleted.event.id, poster_url.clone());
    }

    info!(
        event_id = %event_id,
        registrations_deleted = deleted.registrations_deleted,
        "Event deleted"
    );
    Ok(deleted)
}

#[instrument(skip(db))]
pub async fn approve_event(db: &Database, event_id: &EventId) -> Result<Event, WorkflowError> {
    let event = db
        .events()
        .approve(event_id)
        .await?
        .ok_or(WorkflowError::EventNotFound)?;

    info!(event_id = %event_id, "Event approved");
    Ok(event)
}

/// Rejecting an event deletes it.
pub async fn reject_event(
    db: &Database,
    effects: &SideEffects,
    event_id: &EventId,
) -> Result<DeletedEvent, WorkflowError> {
    delete_event(db, effects, event_id).await
}

#[instrument(skip(db))]
pub async fn approve_organizer(db: &Database, user_id: &UserId) -> Result<User, WorkflowError> {
    let user = db
        .users()
        .approve_organizer(user_id)
        .await?
        .ok_or(WorkflowError::UserNotFound)?;

    info!(user_id = %user_id, "Organizer approved");
    Ok(user)
}

/// Delete a pending organizer account. Approved organizers cannot be rejected.
#[instrument(skip(db))]
pub async fn reject_organizer(db: &Database, user_id: &UserId) -> Result<(), WorkflowError> {
    let users = db.users();
    let user = users
        .find_by_id(user_id)
        .await?
        .filter(|u| u.role == Role::Organizer)
        .ok_or(WorkflowError::UserNotFound)?;

    if user.is_approved {
        return Err(WorkflowError::OrganizerNotPending);
    }

    if !users.delete_pending_organizer(user_id).await? {
        warn!(user_id = %user_id, "Organizer was approved while being rejected");
        return Err(WorkflowError::OrganizerNotPending);
    }

    info!(user_id = %user_id, "Pending organizer rejected");
    Ok(())
}

/// The caller's account if it may create events.
async fn active_organizer(db: &Database, actor: &Actor) -> Result<User, WorkflowError> {
    if !actor.role.can_organize() {
        return Err(WorkflowError::OrganizersOnly);
    }

    let user = db
        .users()
        .find_by_id(&actor.user_id)
        .await?
        .ok_or(WorkflowError::UserNotFound)?;

    if user.role == Role::Organizer && !user.is_approved {
        return Err(WorkflowError::OrganizerPending);
    }
    Ok(user)
}

/// Load an event the caller owns (or any event, for admins).
async fn managed_event(
    db: &Database,
    actor: &Actor,
    event_id: &EventId,
) -> Result<Event, WorkflowError> {
    if !actor.role.can_organize() {
        return Err(WorkflowError::OrganizersOnly);
    }

    let event = db
        .events()
        .find(event_id)
        .await?
        .ok_or(WorkflowError::EventNotFound)?;

    if !actor.can_manage(&event) {
        return Err(WorkflowError::NotOwner);
    }
    Ok(event)
}

/// Queue deletion of a poster whose row write did not happen.
fn discard_upload(effects: &SideEffects, event_id: Option<EventId>, poster_url: Option<String>) {
    if let Some(poster_url) = poster_url {
        warn!(poster_url = %poster_url, "Event write failed; discarding uploaded poster");
        effects.delete_poster(event_id, poster_url);
    }
}

