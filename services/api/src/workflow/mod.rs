//! Domain workflows that span more than one store.
//!
//! Handlers authenticate the caller and translate [`WorkflowError`] into HTTP
//! problems; everything between those two steps lives here.

pub mod moderation;
pub mod registration;

use campus_id::UserId;
use thiserror::Error;

use crate::db::DbError;
use crate::media::MediaError;
use crate::model::{Event, Role};

/// The authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Owners and admins may edit, delete and inspect an event.
    pub fn can_manage(&self, event: &Event) -> bool {
        self.is_admin() || event.organizer_id == self.user_id
    }
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("only students can register for events")]
    StudentsOnly,

    #[error("only organizers and admins can manage events")]
    OrganizersOnly,

    #[error("your organizer account is awaiting admin approval")]
    OrganizerPending,

    #[error("you do not manage this event")]
    NotOwner,

    #[error("event not found")]
    EventNotFound,

    #[error("user not found")]
    UserNotFound,

    #[error("organizer is not pending approval")]
    OrganizerNotPending,

    #[error("please complete your profile first; missing: {}", .missing.join(", "))]
    ProfileIncomplete { missing: Vec<&'static str> },

    #[error("already registered for this event")]
    AlreadyRegistered,

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error(transparent)]
    Db(#[from] DbError),
}
