//! Password reset grants. Only SHA-256 hashes of reset tokens are stored.

use campus_id::{PasswordResetId, UserId};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use super::{parse_id, DbError};

/// A reset grant that has just been consumed.
#[derive(Debug, Clone)]
pub struct ValidReset {
    pub reset_id: PasswordResetId,
    pub user_id: UserId,
}

pub struct ResetStore {
    pool: PgPool,
}

impl ResetStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        user_id: &UserId,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<PasswordResetId, DbError> {
        let reset_id = PasswordResetId::new();

        sqlx::query(
            r#"
            INSERT INTO password_resets (reset_id, user_id, token_hash, expires_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(reset_id.to_string())
        .bind(user_id.to_string())
        .bind(token_hash)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(reset_id)
    }

    /// Mark an unexpired, unused grant as used and return it.
    ///
    /// A single UPDATE does the check and the consumption, so two concurrent
    /// resets with the same token cannot both succeed.
    pub async fn consume(&self, token_hash: &str) -> Result<Option<ValidReset>, DbError> {
        let row = sqlx::query(
            r#"
            UPDATE password_resets
            SET used_at = now()
            WHERE token_hash = $1 AND used_at IS NULL AND expires_at > now()
            RETURNING reset_id, user_id
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let reset_id: String = row.try_get("reset_id")?;
        let user_id: String = row.try_get("user_id")?;

        Ok(Some(ValidReset {
            reset_id: parse_id("password_resets", &reset_id)?,
            user_id: parse_id("password_resets", &user_id)?,
        }))
    }

    /// Drop grants that can no longer be used.
    pub async fn purge_stale(&self) -> Result<u64, DbError> {
        let result = sqlx::query(
            "DELETE FROM password_resets WHERE used_at IS NOT NULL OR expires_at < now()",
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
