//! Outbound email.

mod smtp;

pub use smtp::{SmtpConfig, SmtpMailer};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid address '{address}': {message}")]
    Address { address: String, message: String },

    #[error("failed to build message: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("smtp transport failed: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

/// A plain-text email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl Email {
    pub fn registration_confirmation(to: &str, student_name: &str, event_title: &str, date: &str, venue: &str) -> Self {
        Self {
            to: to.to_string(),
            subject: format!("Registration confirmed: {event_title}"),
            body: format!(
                "Hi {student_name},\n\n\
                 You are registered for \"{event_title}\" on {date} at {venue}.\n\n\
                 See you there!\nCampusConnect"
            ),
        }
    }

    pub fn password_reset(to: &str, reset_link: &str, valid_minutes: i64) -> Self {
        Self {
            to: to.to_string(),
            subject: "Reset your CampusConnect password".to_string(),
            body: format!(
                "Someone asked to reset the password for this account.\n\n\
                 Open this link within {valid_minutes} minutes to choose a new one:\n{reset_link}\n\n\
                 If this wasn't you, ignore this email."
            ),
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> Result<(), MailError>;
}

/// Writes emails to the log instead of sending them. Used in dev mode and
/// whenever SMTP is not configured.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        tracing::info!(to = %email.to, subject = %email.subject, "Email (log mailer)");
        tracing::debug!(body = %email.body, "Email body");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confirmation_mentions_event() {
        let email = Email::registration_confirmation(
            "asha@campus.edu",
            "Asha",
            "Workshop on AI",
            "2026-11-02",
            "Hall B",
        );
        assert_eq!(email.to, "asha@campus.edu");
        assert!(email.subject.contains("Workshop on AI"));
        assert!(email.body.contains("Hall B"));
    }

    #[test]
    fn test_reset_contains_link() {
        let email = Email::password_reset("a@b.c", "https://app/reset/ccr_x", 15);
        assert!(email.body.contains("https://app/reset/ccr_x"));
        assert!(email.body.contains("15 minutes"));
    }

    #[tokio::test]
    async fn test_log_mailer_never_fails() {
        let email = Email::password_reset("a@b.c", "link", 15);
        assert!(LogMailer.send(&email).await.is_ok());
    }
}
