//! Registration store.

use campus_id::{EventId, RegistrationId, UserId};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use super::events::event_from_row;
use super::{parse_id, DbError};
use crate::model::{Event, Registration, StudentSnapshot};

/// Unique index guarding one registration per (event, student).
pub const EVENT_STUDENT_CONSTRAINT: &str = "registrations_event_student_key";

/// A student's registration joined with its event.
#[derive(Debug, Clone)]
pub struct MyRegistration {
    pub registration: Registration,
    pub event: Event,
}

pub struct RegistrationStore {
    pool: PgPool,
}

impl RegistrationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Bump the event's counter and insert a registration in one transaction.
    ///
    /// The counter update only matches an approved event and holds its row
    /// lock until commit, so a concurrent delete or edit cannot interleave.
    /// Returns `None` when the event is missing or not approved. A repeat
    /// registration fails on the unique index with
    /// [`DbError::UniqueViolation`] and the counter is rolled back.
    pub async fn register(
        &self,
        event_id: &EventId,
        student_id: &UserId,
        snapshot: &StudentSnapshot,
    ) -> Result<Option<Registration>, DbError> {
        let mut tx = self.pool.begin().await?;

        let bumped = sqlx::query(
            r#"
            UPDATE events
            SET registration_count = registration_count + 1
            WHERE event_id = $1 AND is_approved
            "#,
        )
        .bind(event_id.to_string())
        .execute(&mut *tx)
        .await?;

        if bumped.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let row = sqlx::query(
            r#"
            INSERT INTO registrations (
                registration_id, event_id, student_id, student_name, batch, roll_number, branch
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING registration_id, event_id, student_id, student_name, batch,
                      roll_number, branch, created_at
            "#,
        )
        .bind(RegistrationId::new().to_string())
        .bind(event_id.to_string())
        .bind(student_id.to_string())
        .bind(&snapshot.name)
        .bind(&snapshot.batch)
        .bind(&snapshot.roll_number)
        .bind(&snapshot.branch)
        .fetch_one(&mut *tx)
        .await?;

        let registration = registration_from_row(&row)?;
        tx.commit().await?;

        Ok(Some(registration))
    }

    pub async fn is_registered(
        &self,
        event_id: &EventId,
        student_id: &UserId,
    ) -> Result<bool, DbError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM registrations WHERE event_id = $1 AND student_id = $2)",
        )
        .bind(event_id.to_string())
        .bind(student_id.to_string())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    /// Attendee list for an event, oldest registration first.
    pub async fn list_for_event(&self, event_id: &EventId) -> Result<Vec<Registration>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT registration_id, event_id, student_id, student_name, batch,
                   roll_number, branch, created_at
            FROM registrations
            WHERE event_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(event_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(registration_from_row).collect()
    }

    /// A student's registrations with their events, newest first.
    pub async fn list_for_student(&self, student_id: &UserId) -> Result<Vec<MyRegistration>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT r.registration_id, r.event_id, r.student_id, r.student_name, r.batch,
                   r.roll_number, r.branch, r.created_at AS registered_at,
                   e.title, e.description, e.category, e.event_date, e.event_time, e.venue,
                   e.organizer_id, e.organization_name, e.is_approved, e.poster_url,
                   e.external_form_url, e.has_refreshments, e.registration_count,
                   e.registration_deadline, e.created_at, e.updated_at
            FROM registrations r
            JOIN events e ON e.event_id = r.event_id
            WHERE r.student_id = $1
            ORDER BY r.created_at DESC
            "#,
        )
        .bind(student_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<MyRegistration, DbError> {
                let registration_id: String = row.try_get("registration_id")?;
                let event_id: String = row.try_get("event_id")?;
                let student_id: String = row.try_get("student_id")?;
                Ok(MyRegistration {
                    registration: Registration {
                        id: parse_id("registrations", &registration_id)?,
                        event_id: parse_id("registrations", &event_id)?,
                        student_id: parse_id("registrations", &student_id)?,
                        student: snapshot_from_row(row)?,
                        created_at: row.try_get("registered_at")?,
                    },
                    event: event_from_row(row)?,
                })
            })
            .collect()
    }
}

fn snapshot_from_row(row: &PgRow) -> Result<StudentSnapshot, DbError> {
    Ok(StudentSnapshot {
        name: row.try_get("student_name")?,
        batch: row.try_get("batch")?,
        roll_number: row.try_get("roll_number")?,
        branch: row.try_get("branch")?,
    })
}

fn registration_from_row(row: &PgRow) -> Result<Registration, DbError> {
    let registration_id: String = row.try_get("registration_id")?;
    let event_id: String = row.try_get("event_id")?;
    let student_id: String = row.try_get("student_id")?;

    Ok(Registration {
        id: parse_id("registrations", &registration_id)?,
        event_id: parse_id("registrations", &event_id)?,
        student_id: parse_id("registrations", &student_id)?,
        student: snapshot_from_row(row)?,
        created_at: row.try_get("created_at")?,
    })
}
