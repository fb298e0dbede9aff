//! Core record types shared by the stores, workflows and API handlers.

use std::fmt;
use std::str::FromStr;

use campus_id::{EventId, RegistrationId, UserId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Account role. Stored as lowercase text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Organizer,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Organizer => "organizer",
            Role::Admin => "admin",
        }
    }

    /// Organizers and admins may create and manage events.
    pub fn can_organize(&self) -> bool {
        matches!(self, Role::Organizer | Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "organizer" => Ok(Role::Organizer),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// Event category. Stored and serialized in title case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Category {
    Workshop,
    Talk,
    Hackathon,
    Seminar,
    #[default]
    Other,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Workshop,
        Category::Talk,
        Category::Hackathon,
        Category::Seminar,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Workshop => "Workshop",
            Category::Talk => "Talk",
            Category::Hackathon => "Hackathon",
            Category::Seminar => "Seminar",
            Category::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown category '{s}'"))
    }
}

/// A stored account.
#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub role: Role,
    pub organization: Option<String>,
    pub is_approved: bool,
    pub batch: Option<String>,
    pub roll_number: Option<String>,
    pub branch: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Academic fields that are still blank, in display order.
    pub fn missing_academic_fields(&self) -> Vec<&'static str> {
        [
            ("batch", &self.batch),
            ("roll_number", &self.roll_number),
            ("branch", &self.branch),
        ]
        .into_iter()
        .filter(|(_, value)| is_blank(value.as_deref()))
        .map(|(name, _)| name)
        .collect()
    }

    /// Point-in-time copy of the fields recorded on a registration.
    ///
    /// Returns `None` unless every academic field is filled in.
    pub fn snapshot(&self) -> Option<StudentSnapshot> {
        if !self.missing_academic_fields().is_empty() {
            return None;
        }
        Some(StudentSnapshot {
            name: self.name.clone(),
            batch: self.batch.clone()?.trim().to_string(),
            roll_number: self.roll_number.clone()?.trim().to_string(),
            branch: self.branch.clone()?.trim().to_string(),
        })
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.map(|v| v.trim().is_empty()).unwrap_or(true)
}

/// The student's profile as it was when they registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentSnapshot {
    pub name: String,
    pub batch: String,
    pub roll_number: String,
    pub branch: String,
}

/// A stored event.
#[derive(Debug, Clone)]
pub struct Event {
    pub id: EventId,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub date: NaiveDate,
    pub time: String,
    pub venue: String,
    pub organizer_id: UserId,
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

/// A stored registration.
#[derive(Debug, Clone)]
pub struct Registration {
    pub id: RegistrationId,
    pub event_id: EventId,
    pub student_id: UserId,
    pub student: StudentSnapshot,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn student(batch: Option<&str>, roll: Option<&str>, branch: Option<&str>) -> User {
        let now = Utc::now();
        User {
            id: UserId::new(),
            name: "Asha".to_string(),
            email: "asha@campus.edu".to_string(),
            password_hash: None,
            role: Role::Student,
            organization: None,
            is_approved: true,
            batch: batch.map(str::to_string),
            roll_number: roll.map(str::to_string),
            branch: branch.map(str::to_string),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn complete_profile_snapshots_trimmed_fields() {
        let user = student(Some("2026 "), Some(" CS-042"), Some("CSE"));
        let snapshot = user.snapshot().unwrap();
        assert_eq!(snapshot.name, "Asha");
        assert_eq!(snapshot.batch, "2026");
        assert_eq!(snapshot.roll_number, "CS-042");
        assert_eq!(snapshot.branch, "CSE");
    }

    #[rstest]
    #[case(None, Some("R1"), Some("CSE"), vec!["batch"])]
    #[case(Some("2026"), Some("   "), Some("CSE"), vec!["roll_number"])]
    #[case(Some("2026"), Some("R1"), Some(""), vec!["branch"])]
    #[case(None, None, None, vec!["batch", "roll_number", "branch"])]
    fn incomplete_profile_has_no_snapshot(
        #[case] batch: Option<&str>,
        #[case] roll: Option<&str>,
        #[case] branch: Option<&str>,
        #[case] missing: Vec<&str>,
    ) {
        let user = student(batch, roll, branch);
        assert_eq!(user.missing_academic_fields(), missing);
        assert!(user.snapshot().is_none());
    }

    #[test]
    fn category_parse_is_case_insensitive() {
        assert_eq!("workshop".parse::<Category>().unwrap(), Category::Workshop);
        assert_eq!("HACKATHON".parse::<Category>().unwrap(), Category::Hackathon);
        assert!("party".parse::<Category>().is_err());
    }

    #[test]
    fn role_roundtrip() {
        for role in [Role::Student, Role::Organizer, Role::Admin] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!(Role::Admin.can_organize());
        assert!(!Role::Student.can_organize());
    }
}
