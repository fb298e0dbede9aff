//! Retention sweep: delete events whose date is older than the cutoff.

mod worker;

pub use worker::{next_run_after, RetentionWorker};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::db::{Database, DbError};
use crate::media::ImageHost;

/// Upper bound accepted for `retention_days` (about a century).
pub const MAX_RETENTION_DAYS: u32 = 36_500;

#[derive(Debug, Clone)]
pub struct RetentionConfig {
    /// Events whose date started more than this many days ago are deleted.
    pub retention_days: u32,
    /// UTC hour of the daily sweep.
    pub sweep_hour_utc: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            retention_days: 30,
            sweep_hour_utc: 3,
        }
    }
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub scanned: usize,
    pub expired: usize,
    pub deleted: usize,
    pub failed: usize,
    pub posters_failed: usize,
    pub resets_purged: u64,
}

/// An event is expired when midnight UTC of its date is strictly before
/// `now - retention_days`. A cutoff before the representable range expires
/// nothing.
pub fn is_expired(date: NaiveDate, now: DateTime<Utc>, retention_days: u32) -> bool {
    match now.checked_sub_signed(Duration::days(i64::from(retention_days))) {
        Some(cutoff) => date.and_time(chrono::NaiveTime::MIN).and_utc() < cutoff,
        None => false,
    }
}

/// Run one sweep.
///
/// Each expired event is handled on its own: its poster is removed from the
/// image host (failures only logged), then the event and its registrations
/// are deleted. One event failing does not stop the rest. Only a failed
/// initial scan aborts the run.
#[instrument(skip(db, images, config))]
pub async fn run_sweep(
    db: &Database,
    images: &dyn ImageHost,
    config: &RetentionConfig,
    now: DateTime<Utc>,
) -> Result<SweepReport, DbError> {
    let events = db.events().list_all().await?;
    let mut report = SweepReport {
        scanned: events.len(),
        ..SweepReport::default()
    };

    for event in events
        .into_iter()
        .filter(|e| is_expired(e.date, now, config.retention_days))
    {
        report.expired += 1;

        if let Some(poster_url) = &event.poster_url {
            if let Err(e) = images.destroy(poster_url).await {
                warn!(event_id = %event.id, error = %e, "Failed to delete poster of expired event");
                report.posters_failed += 1;
            }
        }

        match db.events().delete_cascade(&event.id).await {
            Ok(Some(deleted)) => {
                report.deleted += 1;
                info!(
                    event_id = %event.id,
                    registrations_deleted = deleted.registrations_deleted,
                    "Deleted expired event"
                );
            }
            // Deleted concurrently by its owner or an admin.
            Ok(None) => {}
            Err(e) => {
                error!(event_id = %event.id, error = %e, "Failed to delete expired event");
                report.failed += 1;
            }
        }
    }

    match db.resets().purge_stale().await {
        Ok(purged) => report.resets_purged = purged,
        Err(e) => warn!(error = %e, "Failed to purge stale password resets"),
    }

    info!(
        scanned = report.scanned,
        expired = report.expired,
        deleted = report.deleted,
        failed = report.failed,
        posters_failed = report.posters_failed,
        "Retention sweep complete"
    );
    Ok(report)
}
