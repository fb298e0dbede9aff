//! Event store.

use campus_id::{EventId, UserId};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};

use super::{parse_id, DbError};
use crate::discovery::{escape_like, SortOrder};
use crate::model::{Category, Event};

const EVENT_COLUMNS: &str = r#"
    event_id, title, description, category, event_date, event_time, venue,
    organizer_id, organization_name, is_approved, poster_url, external_form_url,
    has_refreshments, registration_count, registration_deadline, created_at, updated_at
"#;

/// Input for creating an event. New events are always pending.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub title: String,
    pub description: String,
    pub category: Category,
    pub date: NaiveDate,
    pub time: String,
    pub venue: String,
    pub organizer_id: UserId,
    pub organization_name: Option<String>,
    pub poster_url: Option<String>,
    pub external_form_url: Option<String>,
    pub has_refreshments: bool,
    pub registration_deadline: Option<NaiveDate>,
}

/// Named optional fields for an event edit.
///
/// The outer `Option` means "leave untouched"; for the clearable fields the
/// inner `None` clears the stored value.
#[derive(Debug, Clone, Default)]
pub struct EventUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<Category>,
    pub date: Option<NaiveDate>,
    pub time: Option<String>,
    pub venue: Option<String>,
    pub poster_url: Option<String>,
    pub external_form_url: Option<Option<String>>,
    pub has_refreshments: Option<bool>,
    pub registration_deadline: Option<Option<NaiveDate>>,
}

/// Filters for the approved listing.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub search: Option<String>,
    pub category: Option<Category>,
    pub sort: SortOrder,
}

/// Reduced projection for the month calendar.
#[derive(Debug, Clone)]
pub struct CalendarEntry {
    pub id: EventId,
    pub title: String,
    pub date: NaiveDate,
    pub time: String,
    pub venue: String,
    pub category: Category,
}

/// What a cascade delete removed.
#[derive(Debug, Clone)]
pub struct DeletedEvent {
    pub event: Event,
    pub registrations_deleted: u64,
}

pub struct EventStore {
    pool: PgPool,
}

impl EventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, new: NewEvent) -> Result<Event, DbError> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO events (
                event_id, title, description, category, event_date, event_time, venue,
                organizer_id, organization_name, poster_url, external_form_url,
                has_refreshments, registration_deadline
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {EVENT_COLUMNS}
            "#
        ))
        .bind(EventId::new().to_string())
        .bind(new.title.trim())
        .bind(new.description)
        .bind(new.category.as_str())
        .bind(new.date)
        .bind(new.time)
        .bind(new.venue)
        .bind(new.organizer_id.to_string())
        .bind(new.organization_name)
        .bind(new.poster_url)
        .bind(new.external_form_url)
        .bind(new.has_refreshments)
        .bind(new.registration_deadline)
        .fetch_one(&self.pool)
        .await?;

        event_from_row(&row)
    }

    pub async fn find(&self, event_id: &EventId) -> Result<Option<Event>, DbError> {
        let row = sqlx::query(&format!("SELECT {EVENT_COLUMNS} FROM events WHERE event_id = $1"))
            .bind(event_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(event_from_row).transpose()
    }

    /// Approved events matching the filter.
    pub async fn list_approved(&self, filter: &EventFilter) -> Result<Vec<Event>, DbError> {
        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {EVENT_COLUMNS} FROM events WHERE is_approved"));

        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            query
                .push(" AND title ILIKE ")
                .push_bind(format!("%{}%", escape_like(search)))
                .push(r" ESCAPE '\'");
        }

        if let Some(category) = filter.category {
            query.push(" AND category = ").push_bind(category.as_str());
        }

        query.push(format!(
            " ORDER BY event_date {}, created_at ASC",
            filter.sort.as_sql()
        ));

        let rows = query.build().fetch_all(&self.pool).await?;
        rows.iter().map(event_from_row).collect()
    }

    /// Approved events dated within `[from, to]`, ascending.
    pub async fn list_approved_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Event>, DbError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {EVENT_COLUMNS}
            FROM events
            WHERE is_approved AND event_date BETWEEN $1 AND $2
            ORDER BY event_date ASC, created_at ASC
            "#
        ))
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(event_from_row).collect()
    }

    /// Calendar projection of approved events dated within `[from, to]`.
    pub async fn calendar(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<CalendarEntry>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT event_id, title, event_date, event_time, venue, category
            FROM events
            WHERE is_approved AND event_date BETWEEN $1 AND $2
            ORDER BY event_date ASC, created_at ASC
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<CalendarEntry, DbError> {
                let event_id: String = row.try_get("event_id")?;
                let category: String = row.try_get("category")?;
                Ok(CalendarEntry {
                    id: parse_id("events", &event_id)?,
                    title: row.try_get("title")?,
                    date: row.try_get("event_date")?,
                    time: row.try_get("event_time")?,
                    venue: row.try_get("venue")?,
                    category: parse_category(&category)?,
                })
            })
            .collect()
    }

    /// Events awaiting moderation, oldest first.
    pub async fn list_pending(&self) -> Result<Vec<Event>, DbError> {
        let rows = sqlx::query(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE NOT is_approved ORDER BY created_at ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(event_from_row).collect()
    }

    /// Every stored event, for the retention sweep.
    pub async fn list_all(&self) -> Result<Vec<Event>, DbError> {
        let rows = sqlx::query(&format!("SELECT {EVENT_COLUMNS} FROM events"))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(event_from_row).collect()
    }

    /// An organizer's events with `registration_count` recomputed from the
    /// registration store, ascending by date.
    pub async fn list_for_organizer_refreshed(
        &self,
        organizer_id: &UserId,
    ) -> Result<Vec<Event>, DbError> {
        let rows = sqlx::query(&format!(
            r#"
            UPDATE events AS e
            SET registration_count = (
                SELECT COUNT(*) FROM registrations r WHERE r.event_id = e.event_id
            )
            WHERE e.organizer_id = $1
            RETURNING {EVENT_COLUMNS}
            "#
        ))
        .bind(organizer_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut events = rows.iter().map(event_from_row).collect::<Result<Vec<_>, _>>()?;
        events.sort_by(|a, b| a.date.cmp(&b.date).then(a.created_at.cmp(&b.created_at)));
        Ok(events)
    }

    /// Apply an edit. Any edit sends the event back to pending review.
    pub async fn update(
        &self,
        event_id: &EventId,
        update: EventUpdate,
    ) -> Result<Option<Event>, DbError> {
        let (set_form_url, form_url) = split_clearable(update.external_form_url);
        let (set_deadline, deadline) = split_clearable(update.registration_deadline);

        let row = sqlx::query(&format!(
            r#"
            UPDATE events
            SET title = COALESCE($2, title),
                description = COALESCE($3, description),
                category = COALESCE($4, category),
                event_date = COALESCE($5, event_date),
                event_time = COALESCE($6, event_time),
                venue = COALESCE($7, venue),
                poster_url = COALESCE($8, poster_url),
                external_form_url = CASE WHEN $9 THEN $10 ELSE external_form_url END,
                has_refreshments = COALESCE($11, has_refreshments),
                registration_deadline = CASE WHEN $12 THEN $13 ELSE registration_deadline END,
                is_approved = FALSE,
                updated_at = now()
            WHERE event_id = $1
            RETURNING {EVENT_COLUMNS}
            "#
        ))
        .bind(event_id.to_string())
        .bind(update.title.map(|t| t.trim().to_string()))
        .bind(update.description)
        .bind(update.category.map(|c| c.as_str()))
        .bind(update.date)
        .bind(update.time)
        .bind(update.venue)
        .bind(update.poster_url)
        .bind(set_form_url)
        .bind(form_url)
        .bind(update.has_refreshments)
        .bind(set_deadline)
        .bind(deadline)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(event_from_row).transpose()
    }

    /// Mark an event approved. Returns `None` if it does not exist.
    pub async fn approve(&self, event_id: &EventId) -> Result<Option<Event>, DbError> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE events
            SET is_approved = TRUE, updated_at = now()
            WHERE event_id = $1
            RETURNING {EVENT_COLUMNS}
            "#
        ))
        .bind(event_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(event_from_row).transpose()
    }

    /// Delete an event and all of its registrations in one transaction.
    ///
    /// Returns `None` if the event does not exist. Hosted posters are not
    /// touched here.
    pub async fn delete_cascade(&self, event_id: &EventId) -> Result<Option<DeletedEvent>, DbError> {
        let mut tx = self.pool.begin().await?;

        // Waits for in-flight registrations so none are left behind.
        sqlx::query("SELECT 1 FROM events WHERE event_id = $1 FOR UPDATE")
            .bind(event_id.to_string())
            .fetch_optional(&mut *tx)
            .await?;

        let registrations = sqlx::query("DELETE FROM registrations WHERE event_id = $1")
            .bind(event_id.to_string())
            .execute(&mut *tx)
            .await?;

        let row = sqlx::query(&format!(
            "DELETE FROM events WHERE event_id = $1 RETURNING {EVENT_COLUMNS}"
        ))
        .bind(event_id.to_string())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };

        let event = event_from_row(&row)?;
        tx.commit().await?;

        Ok(Some(DeletedEvent {
            event,
            registrations_deleted: registrations.rows_affected(),
        }))
    }
}

fn split_clearable<T>(value: Option<Option<T>>) -> (bool, Option<T>) {
    match value {
        Some(inner) => (true, inner),
        None => (false, None),
    }
}

fn parse_category(raw: &str) -> Result<Category, DbError> {
    raw.parse().map_err(|message| DbError::Corrupt {
        table: "events",
        message,
    })
}

pub(super) fn event_from_row(row: &PgRow) -> Result<Event, DbError> {
    let event_id: String = row.try_get("event_id")?;
    let organizer_id: String = row.try_get("organizer_id")?;
    let category: String = row.try_get("category")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at")?;

    Ok(Event {
        id: parse_id("events", &event_id)?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        category: parse_category(&category)?,
        date: row.try_get("event_date")?,
        time: row.try_get("event_time")?,
        venue: row.try_get("venue")?,
        organizer_id: parse_id("events", &organizer_id)?,
        organization_name: row.try_get("organization_name")?,
        is_approved: row.try_get("is_approved")?,
        poster_url: row.try_get("poster_url")?,
        external_form_url: row.try_get("external_form_url")?,
        has_refreshments: row.try_get("has_refreshments")?,
        registration_count: row.try_get("registration_count")?,
        registration_deadline: row.try_get("registration_deadline")?,
        created_at,
        updated_at,
    })
}
