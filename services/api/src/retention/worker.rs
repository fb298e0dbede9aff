use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Days, NaiveTime, Utc};
use tokio::sync::watch;
use tracing::{error, info, instrument};

use super::{run_sweep, RetentionConfig};
use crate::db::Database;
use crate::media::ImageHost;

/// Next occurrence of `hour:00` UTC strictly after `now`.
pub fn next_run_after(now: DateTime<Utc>, hour: u32) -> DateTime<Utc> {
    let time = NaiveTime::from_hms_opt(hour.min(23), 0, 0).unwrap_or(NaiveTime::MIN);
    let today = now.date_naive().and_time(time).and_utc();
    if today > now {
        today
    } else {
        now.date_naive()
            .checked_add_days(Days::new(1))
            .map(|d| d.and_time(time).and_utc())
            .unwrap_or(today)
    }
}

pub struct RetentionWorker {
    db: Database,
    images: Arc<dyn ImageHost>,
    config: RetentionConfig,
}

impl RetentionWorker {
    pub fn new(db: Database, images: Arc<dyn ImageHost>, config: RetentionConfig) -> Self {
        Self { db, images, config }
    }

    /// Sweep once a day at the configured hour until shutdown.
    ///
    /// Each sweep is awaited before the next wait starts, so runs never overlap.
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            retention_days = self.config.retention_days,
            sweep_hour_utc = self.config.sweep_hour_utc,
            "Starting retention worker"
        );

        loop {
            let now = Utc::now();
            let next = next_run_after(now, self.config.sweep_hour_utc);
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            info!(next_run = %next, "Next retention sweep scheduled");

            tokio::select! {
                _ = tokio::time::sleep(wait) => {
                    if let Err(e) = run_sweep(&self.db, self.images.as_ref(), &self.config, Utc::now()).await {
                        error!(error = %e, "Retention sweep failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Retention worker shutting down");
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn at(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, d, h, m, 0).unwrap()
    }

    #[rstest]
    #[case(at(17, 1, 30), at(17, 3, 0))]
    #[case(at(17, 3, 0), at(18, 3, 0))]
    #[case(at(17, 22, 15), at(18, 3, 0))]
    fn schedules_next_sweep(#[case] now: DateTime<Utc>, #[case] expected: DateTime<Utc>) {
        assert_eq!(next_run_after(now, 3), expected);
    }

    #[test]
    fn wraps_month_end() {
        let now = Utc.with_ymd_and_hms(2026, 10, 31, 23, 0, 0).unwrap();
        let next = next_run_after(now, 3);
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 11, 1, 3, 0, 0).unwrap());
    }
}
