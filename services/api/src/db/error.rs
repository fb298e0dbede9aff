//! Database error types.

use thiserror::Error;

/// SQLSTATE for `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Failed to connect to the database.
    #[error("failed to connect to database: {0}")]
    Connect(#[source] sqlx::Error),

    /// Failed to execute a query.
    #[error("query failed: {0}")]
    Query(#[source] sqlx::Error),

    /// A unique index rejected the write.
    #[error("unique constraint '{constraint}' violated")]
    UniqueViolation { constraint: String },

    /// A stored value could not be mapped back into a record type.
    #[error("corrupt row in {table}: {message}")]
    Corrupt { table: &'static str, message: String },

    /// Failed to run migrations.
    #[error("migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

impl DbError {
    /// Name of the violated unique constraint, if this is a duplicate-key error.
    pub fn unique_constraint(&self) -> Option<&str> {
        match self {
            DbError::UniqueViolation { constraint } => Some(constraint),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for DbError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &e {
            if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
                return DbError::UniqueViolation {
                    constraint: db_err.constraint().unwrap_or_default().to_string(),
                };
            }
        }
        DbError::Query(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_not_found_is_query_error() {
        let err = DbError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, DbError::Query(_)));
        assert!(err.unique_constraint().is_none());
    }

    #[test]
    fn test_unique_constraint_accessor() {
        let err = DbError::UniqueViolation {
            constraint: "users_email_key".to_string(),
        };
        assert_eq!(err.unique_constraint(), Some("users_email_key"));
    }
}
