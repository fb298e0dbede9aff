//! JSON response bodies shared by the v1 handlers.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::db::{CalendarEntry, MyRegistration};
use crate::model::{Category, Event, Registration, Role, StudentSnapshot, User};

#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
}

impl<T> ListResponse<T> {
    pub fn new<S>(items: impl IntoIterator<Item = S>) -> Self
    where
        S: Into<T>,
    {
        Self {
            items: items.into_iter().map(Into::into).collect(),
        }
    }
}

/// A user profile. Never carries the password hash.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    pub is_approved: bool,
    pub batch: Option<String>,
    pub roll_number: Option<String>,
    pub branch: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id.to_string(),
            name: user.name,
            email: user.email,
            role: user.role,
            organization: user.organization,
            is_approved: user.is_approved,
            batch: user.batch,
            roll_number: user.roll_number,
            branch: user.branch,
            created_at: user.created_at,
        }
    }
}

/// Token plus profile, returned by register, login and OAuth.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub user: UserResponse,
}

#[derive(Debug, Serialize)]
pub struct EventResponse {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub date: NaiveDate,
    pub time: String,
    pub venue: String,
    pub organizer_id: String,
    pub organization_name: Option<String>,
    pub is_approved: bool,
    pub poster_url: Option<String>,
    pub external_form_url: Option<String>,
    pub has_refreshments: bool,
    pub registration_count: i64,
    pub registration_deadline: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Event> for EventResponse {
    fn from(event: Event) -> Self {
        Self {
            id: event.id.to_string(),
            title: event.title,
            description: event.description,
            category: event.category,
            date: event.date,
            time: event.time,
            venue: event.venue,
            organizer_id: event.organizer_id.to_string(),
            organization_name: event.organization_name,
            is_approved: event.is_approved,
            poster_url: event.poster_url,
            external_form_url: event.external_form_url,
            has_refreshments: event.has_refreshments,
            registration_count: event.registration_count,
            registration_deadline: event.registration_deadline,
            created_at: event.created_at,
            updated_at: event.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CalendarEntryResponse {
    pub id: String,
    pub title: String,
    pub date: NaiveDate,
    pub time: String,
    pub venue: String,
    pub category: Category,
}

impl From<CalendarEntry> for CalendarEntryResponse {
    fn from(entry: CalendarEntry) -> Self {
        Self {
            id: entry.id.to_string(),
            title: entry.title,
            date: entry.date,
            time: entry.time,
            venue: entry.venue,
            category: entry.category,
        }
    }
}

/// An attendee as recorded at registration time.
#[derive(Debug, Serialize)]
pub struct RegistrationResponse {
    pub id: String,
    pub event_id: String,
    pub student_id: String,
    pub student: StudentSnapshot,
    pub registered_at: DateTime<Utc>,
}

impl From<Registration> for RegistrationResponse {
    fn from(registration: Registration) -> Self {
        Self {
            id: registration.id.to_string(),
            event_id: registration.event_id.to_string(),
            student_id: registration.student_id.to_string(),
            student: registration.student,
            registered_at: registration.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MyRegistrationResponse {
    pub id: String,
    pub registered_at: DateTime<Utc>,
    pub event: EventResponse,
}

impl From<MyRegistration> for MyRegistrationResponse {
    fn from(mine: MyRegistration) -> Self {
        Self {
            id: mine.registration.id.to_string(),
            registered_at: mine.registration.created_at,
            event: mine.event.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campus_id::UserId;

    #[test]
    fn user_response_omits_password_hash() {
        let now = Utc::now();
        let user = User {
            id: UserId::new(),
            name: "Asha".to_string(),
            email: "asha@campus.edu".to_string(),
            password_hash: Some("$argon2id$secret".to_string()),
            role: Role::Student,
            organization: None,
            is_approved: true,
            batch: None,
            roll_number: None,
            branch: None,
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_value(UserResponse::from(user)).unwrap();
        assert!(json.get("password_hash").is_none());
        assert!(json.get("organization").is_none());
        assert_eq!(json["role"], "student");
    }
}
