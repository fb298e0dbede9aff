//! Fire-and-forget side effects.
//!
//! Email delivery and poster cleanup never decide the outcome of a request.
//! Handlers enqueue them on [`SideEffects`]; a single [`SideEffectWorker`]
//! task drains the queue, logs and counts failures, and publishes them on a
//! broadcast channel for anyone who wants to watch.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use campus_id::EventId;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, instrument, warn};

use crate::media::ImageHost;
use crate::notify::{Email, Mailer};

const FAILURE_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub enum SideEffect {
    SendEmail(Email),
    /// `event_id` is absent for posters whose event row was never written.
    DeletePoster {
        event_id: Option<EventId>,
        poster_url: String,
    },
}

impl SideEffect {
    pub fn kind(&self) -> &'static str {
        match self {
            SideEffect::SendEmail(_) => "send_email",
            SideEffect::DeletePoster { .. } => "delete_poster",
        }
    }
}

/// A side effect that did not complete.
#[derive(Debug, Clone)]
pub struct SideEffectFailure {
    pub kind: &'static str,
    pub error: String,
}

#[derive(Debug, Default)]
struct Counters {
    enqueued: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time counter values, reported on `/readyz`.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct SideEffectStats {
    pub enqueued: u64,
    pub completed: u64,
    pub failed: u64,
}

/// Producer handle, cheap to clone into request handlers.
#[derive(Clone)]
pub struct SideEffects {
    tx: mpsc::UnboundedSender<SideEffect>,
    counters: Arc<Counters>,
    failures: broadcast::Sender<SideEffectFailure>,
}

impl SideEffects {
    /// Create the producer handle and the worker that will drain it.
    pub fn new(mailer: Arc<dyn Mailer>, images: Arc<dyn ImageHost>) -> (Self, SideEffectWorker) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (failures, _) = broadcast::channel(FAILURE_CHANNEL_CAPACITY);
        let counters = Arc::new(Counters::default());

        let handle = Self {
            tx,
            counters: counters.clone(),
            failures: failures.clone(),
        };
        let worker = SideEffectWorker {
            rx,
            mailer,
            images,
            counters,
            failures,
        };
        (handle, worker)
    }

    /// Queue a side effect. Never blocks and never fails the caller; if the
    /// worker is gone the effect is dropped and counted as failed.
    pub fn enqueue(&self, effect: SideEffect) {
        self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
        let kind = effect.kind();
        if self.tx.send(effect).is_err() {
            warn!(kind, "Side-effect worker stopped; dropping side effect");
            self.record_failure(kind, "worker stopped".to_string());
        }
    }

    pub fn send_email(&self, email: Email) {
        self.enqueue(SideEffect::SendEmail(email));
    }

    pub fn delete_poster(&self, event_id: impl Into<Option<EventId>>, poster_url: String) {
        self.enqueue(SideEffect::DeletePoster {
            event_id: event_id.into(),
            poster_url,
        });
    }

    pub fn stats(&self) -> SideEffectStats {
        snapshot(&self.counters)
    }

    /// Subscribe to failures published from now on.
    pub fn subscribe_failures(&self) -> broadcast::Receiver<SideEffectFailure> {
        self.failures.subscribe()
    }

    fn record_failure(&self, kind: &'static str, error: String) {
        self.counters.failed.fetch_add(1, Ordering::Relaxed);
        let _ = self.failures.send(SideEffectFailure { kind, error });
    }
}

fn snapshot(counters: &Counters) -> SideEffectStats {
    SideEffectStats {
        enqueued: counters.enqueued.load(Ordering::Relaxed),
        completed: counters.completed.load(Ordering::Relaxed),
        failed: counters.failed.load(Ordering::Relaxed),
    }
}

pub struct SideEffectWorker {
    rx: mpsc::UnboundedReceiver<SideEffect>,
    mailer: Arc<dyn Mailer>,
    images: Arc<dyn ImageHost>,
    counters: Arc<Counters>,
    failures: broadcast::Sender<SideEffectFailure>,
}

impl SideEffectWorker {
    /// Process side effects until shutdown, then drain what is already queued.
    #[instrument(skip(self, shutdown))]
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("Starting side-effect worker");

        loop {
            tokio::select! {
                effect = self.rx.recv() => {
                    match effect {
                        Some(effect) => self.process(effect).await,
                        None => break,
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        self.rx.close();
        let mut drained = 0u64;
        while let Ok(effect) = self.rx.try_recv() {
            self.process(effect).await;
            drained += 1;
        }

        info!(drained, "Side-effect worker shutting down");
    }

    async fn process(&self, effect: SideEffect) {
        let kind = effect.kind();
        let result = match &effect {
            SideEffect::SendEmail(email) => self
                .mailer
                .send(email)
                .await
                .map_err(|e| e.to_string()),
            SideEffect::DeletePoster {
                event_id,
                poster_url,
            } => {
                debug!(event_id = ?event_id, poster_url = %poster_url, "Deleting hosted poster");
                self.images
                    .destroy(poster_url)
                    .await
                    .map_err(|e| e.to_string())
            }
        };

        match result {
            Ok(()) => {
                self.counters.completed.fetch_add(1, Ordering::Relaxed);
            }
            Err(error) => {
                warn!(kind, error = %error, "Side effect failed");
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                let _ = self.failures.send(SideEffectFailure { kind, error });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{DisabledImageHost, MediaError, PosterUpload};
    use crate::notify::{LogMailer, MailError};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RecordingMailer {
        sent: Mutex<Vec<Email>>,
        fail: bool,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, email: &Email) -> Result<(), MailError> {
            if self.fail {
                return Err(MailError::Address {
                    address: email.to.clone(),
                    message: "mailbox unavailable".to_string(),
                });
            }
            self.sent.lock().unwrap().push(email.clone());
            Ok(())
        }
    }

    struct FailingImageHost;

    #[async_trait]
    impl ImageHost for FailingImageHost {
        async fn upload(&self, _poster: PosterUpload) -> Result<String, MediaError> {
            Err(MediaError::Disabled)
        }

        async fn destroy(&self, _poster_url: &str) -> Result<(), MediaError> {
            Err(MediaError::Rejected("host down".to_string()))
        }
    }

    fn email() -> Email {
        Email::password_reset("a@campus.edu", "https://app/reset", 15)
    }

    async fn run_to_completion(worker: SideEffectWorker) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(worker.run(shutdown_rx));
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn queued_effects_are_drained_on_shutdown() {
        let mailer = Arc::new(RecordingMailer {
            sent: Mutex::new(Vec::new()),
            fail: false,
        });
        let (effects, worker) = SideEffects::new(mailer.clone(), Arc::new(DisabledImageHost));

        effects.send_email(email());
        effects.send_email(email());
        run_to_completion(worker).await;

        assert_eq!(mailer.sent.lock().unwrap().len(), 2);
        assert_eq!(
            effects.stats(),
            SideEffectStats {
                enqueued: 2,
                completed: 2,
                failed: 0
            }
        );
    }

    #[tokio::test]
    async fn failures_are_counted_and_published() {
        let mailer = Arc::new(RecordingMailer {
            sent: Mutex::new(Vec::new()),
            fail: true,
        });
        let (effects, worker) = SideEffects::new(mailer, Arc::new(FailingImageHost));
        let mut failures = effects.subscribe_failures();

        effects.send_email(email());
        effects.delete_poster(EventId::new(), "https://cdn/p.png".to_string());
        run_to_completion(worker).await;

        let stats = effects.stats();
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.completed, 0);

        let first = failures.recv().await.unwrap();
        let second = failures.recv().await.unwrap();
        assert_eq!(first.kind, "send_email");
        assert_eq!(second.kind, "delete_poster");
        assert!(second.error.contains("host down"));
    }

    #[tokio::test]
    async fn enqueue_after_worker_stopped_counts_failure() {
        let (effects, worker) = SideEffects::new(Arc::new(LogMailer), Arc::new(DisabledImageHost));
        drop(worker);

        effects.send_email(email());

        let stats = effects.stats();
        assert_eq!(stats.enqueued, 1);
        assert_eq!(stats.failed, 1);
    }
}
