//! Credential store: students, organizers and admins.

use campus_id::UserId;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use super::{parse_id, DbError};
use crate::model::{Role, User};

const USER_COLUMNS: &str = r#"
    user_id, name, email, password_hash, role, organization, is_approved,
    batch, roll_number, branch, created_at, updated_at
"#;

/// Unique index on the normalized email.
pub const EMAIL_CONSTRAINT: &str = "users_email_key";

/// Unique index on roll numbers that are present.
pub const ROLL_NUMBER_CONSTRAINT: &str = "users_roll_number_key";

/// Emails are unique after trimming and lower-casing.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Input for creating an account.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub role: Role,
    pub organization: Option<String>,
}

/// Named optional fields for a profile update. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub organization: Option<String>,
    pub batch: Option<String>,
    pub roll_number: Option<String>,
    pub branch: Option<String>,
}

pub struct UserStore {
    pool: PgPool,
}

impl UserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new account.
    ///
    /// Organizers start pending; students and admins are approved on creation.
    /// A taken email surfaces as [`DbError::UniqueViolation`] on `users_email_key`.
    pub async fn create(&self, new: NewUser) -> Result<User, DbError> {
        let user_id = UserId::new();
        let is_approved = new.role != Role::Organizer;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO users (user_id, name, email, password_hash, role, organization, is_approved)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user_id.to_string())
        .bind(new.name.trim())
        .bind(normalize_email(&new.email))
        .bind(new.password_hash)
        .bind(new.role.as_str())
        .bind(new.organization)
        .bind(is_approved)
        .fetch_one(&self.pool)
        .await?;

        user_from_row(&row)
    }

    pub async fn find_by_id(&self, user_id: &UserId) -> Result<Option<User>, DbError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = $1"))
            .bind(user_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, DbError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(normalize_email(email))
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    /// Apply a profile patch. A roll number already held by another account
    /// surfaces as [`DbError::UniqueViolation`] on `users_roll_number_key`.
    pub async fn update_profile(
        &self,
        user_id: &UserId,
        update: ProfileUpdate,
    ) -> Result<Option<User>, DbError> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE users
            SET name = COALESCE($2, name),
                organization = COALESCE($3, organization),
                batch = COALESCE($4, batch),
                roll_number = COALESCE($5, roll_number),
                branch = COALESCE($6, branch),
                updated_at = now()
            WHERE user_id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user_id.to_string())
        .bind(update.name)
        .bind(update.organization)
        .bind(update.batch)
        .bind(update.roll_number)
        .bind(update.branch)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    pub async fn set_password_hash(
        &self,
        user_id: &UserId,
        password_hash: &str,
    ) -> Result<bool, DbError> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $2, updated_at = now() WHERE user_id = $1",
        )
        .bind(user_id.to_string())
        .bind(password_hash)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Organizers awaiting admin review, oldest first.
    pub async fn list_pending_organizers(&self) -> Result<Vec<User>, DbError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE role = 'organizer' AND NOT is_approved
            ORDER BY created_at ASC
            "#
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(user_from_row).collect()
    }

    /// Flip an organizer's approval flag. Returns `None` if no organizer has this id.
    pub async fn approve_organizer(&self, user_id: &UserId) -> Result<Option<User>, DbError> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE users
            SET is_approved = TRUE, updated_at = now()
            WHERE user_id = $1 AND role = 'organizer'
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    /// Delete an organizer that is still pending. Returns false if nothing matched.
    pub async fn delete_pending_organizer(&self, user_id: &UserId) -> Result<bool, DbError> {
        let result = sqlx::query(
            r#"
            DELETE FROM users
            WHERE user_id = $1 AND role = 'organizer' AND NOT is_approved
            "#,
        )
        .bind(user_id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn user_from_row(row: &PgRow) -> Result<User, DbError> {
    let user_id: String = row.try_get("user_id")?;
    let role: String = row.try_get("role")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at")?;

    Ok(User {
        id: parse_id("users", &user_id)?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        role: role.parse().map_err(|message| DbError::Corrupt {
            table: "users",
            message,
        })?,
        organization: row.try_get("organization")?,
        is_approved: row.try_get("is_approved")?,
        batch: row.try_get("batch")?,
        roll_number: row.try_get("roll_number")?,
        branch: row.try_get("branch")?,
        created_at,
        updated_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Asha@Campus.EDU "), "asha@campus.edu");
    }
}
