//! Student registration for an approved event.

use campus_id::EventId;
use tracing::{info, instrument};

use super::{Actor, WorkflowError};
use crate::db::{Database, DbError, EVENT_STUDENT_CONSTRAINT};
use crate::model::{Event, Registration, Role, User};
use crate::notify::Email;
use crate::side_effects::SideEffects;

/// Register the calling student for an event.
///
/// Checks run in a fixed order: role, event visibility, then profile
/// completeness. Duplicate registrations are detected by the unique index,
/// never by a pre-check, so two concurrent attempts cannot both succeed.
/// The confirmation email is queued after commit and cannot fail the call.
#[instrument(skip(db, effects), fields(user_id = %actor.user_id))]
pub async fn register(
    db: &Database,
    effects: &SideEffects,
    actor: &Actor,
    event_id: &EventId,
) -> Result<Registration, WorkflowError> {
    if actor.role != Role::Student {
        return Err(WorkflowError::StudentsOnly);
    }

    let event = approved_event(db, event_id).await?;

    let student = db
        .users()
        .find_by_id(&actor.user_id)
        .await?
        .ok_or(WorkflowError::UserNotFound)?;

    let Some(snapshot) = student.snapshot() else {
        return Err(WorkflowError::ProfileIncomplete {
            missing: student.missing_academic_fields(),
        });
    };

    let registration = db
        .registrations()
        .register(event_id, &actor.user_id, &snapshot)
        .await
        .map_err(|e| match e.unique_constraint() {
            Some(EVENT_STUDENT_CONSTRAINT) => WorkflowError::AlreadyRegistered,
            _ => WorkflowError::Db(e),
        })?
        // Deleted or sent back to review since it was loaded.
        .ok_or(WorkflowError::EventNotFound)?;

    info!(
        event_id = %event_id,
        registration_id = %registration.id,
        "Student registered for event"
    );

    effects.send_email(confirmation_email(&student, &event));

    Ok(registration)
}

/// Whether the student already holds a registration for the event.
pub async fn is_registered(
    db: &Database,
    actor: &Actor,
    event_id: &EventId,
) -> Result<bool, DbError> {
    db.registrations().is_registered(event_id, &actor.user_id).await
}

/// Missing and unapproved events are reported identically.
async fn approved_event(db: &Database, event_id: &EventId) -> Result<Event, WorkflowError> {
    match db.events().find(event_id).await? {
        Some(event) if event.is_approved => Ok(event),
        _ => Err(WorkflowError::EventNotFound),
    }
}

fn confirmation_email(student: &User, event: &Event) -> Email {
    Email::registration_confirmation(
        &student.email,
        &student.name,
        &event.title,
        &event.date.format("%A, %B %-d, %Y").to_string(),
        &event.venue,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Category;
    use campus_id::UserId;
    use chrono::{NaiveDate, Utc};

    #[test]
    fn confirmation_email_spells_out_the_date() {
        let now = Utc::now();
        let student = User {
            id: UserId::new(),
            name: "Asha".to_string(),
            email: "asha@campus.edu".to_string(),
            password_hash: None,
            role: Role::Student,
            organization: None,
            is_approved: true,
            batch: Some("2026".to_string()),
            roll_number: Some("CS-042".to_string()),
            branch: Some("CSE".to_string()),
            created_at: now,
            updated_at: now,
        };
        let event = Event {
            id: EventId::new(),
            title: "Workshop on AI".to_string(),
            description: String::new(),
            category: Category::Workshop,
            date: NaiveDate::from_ymd_opt(2026, 11, 2).unwrap(),
            time: "10:00 AM".to_string(),
            venue: "Hall A".to_string(),
            organizer_id: UserId::new(),
            organization_name: None,
            is_approved: true,
            poster_url: None,
            external_form_url: None,
            has_refreshments: true,
            registration_count: 0,
            registration_deadline: None,
            created_at: now,
            updated_at: now,
        };

        let email = confirmation_email(&student, &event);
        assert_eq!(email.to, "asha@campus.edu");
        assert!(email.subject.contains("Workshop on AI"));
        assert!(email.body.contains("Monday, November 2, 2026"));
        assert!(email.body.contains("Hall A"));
    }
}
