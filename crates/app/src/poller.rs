use std::sync::Arc;

use chrono::{DateTime, Utc};
use ingest::UsageSource;
use tokio::sync::{mpsc, watch};

use crate::session::{CycleReport, TrackerSession};

/// Message sent from the poller to the renderer
#[derive(Debug)]
pub enum PollMessage {
    /// Results of a successful cycle
    Cycle(Box<CycleReport>),
    /// The cycle was skipped; the previous snapshot is kept
    CycleFailed { message: String, at: DateTime<Utc> },
}

/// Drives a [`TrackerSession`] on the configured interval.
pub struct Poller<S> {
    session: Arc<TrackerSession>,
    source: S,
}

impl<S> Poller<S>
where
    S: UsageSource + Send + 'static,
{
    pub fn new(session: Arc<TrackerSession>, source: S) -> Self {
        Self { session, source }
    }

    /// Start polling in a background task.
    ///
    /// Polling stops once `shutdown` turns true (or its sender is dropped),
    /// checked between cycles, or when the returned receiver is dropped.
    pub fn start(self, shutdown: watch::Receiver<bool>) -> mpsc::Receiver<PollMessage> {
        let (tx, rx) = mpsc::channel(16);

        tokio::spawn(async move {
            self.run(tx, shutdown).await;
        });

        rx
    }

    async fn run(self, tx: mpsc::Sender<PollMessage>, mut shutdown: watch::Receiver<bool>) {
        let Self { session, mut source } = self;
        let interval = session.config().poll_interval();
        let mut cycles: u64 = 0;

        loop {
            if *shutdown.borrow() {
                break;
            }

            cycles = cycles.wrapping_add(1);
            // Fetching reads the report from disk, so the cycle runs on the blocking pool.
            let cycle_session = Arc::clone(&session);
            let joined = tokio::task::spawn_blocking(move || {
                let result = cycle_session.run_once(&mut source, Utc::now());
                (source, result)
            })
            .await;
            let result = match joined {
                Ok((returned, result)) => {
                    source = returned;
                    result
                }
                Err(err) => {
                    tracing::error!(cycle = cycles, error = %err, "usage cycle task failed");
                    break;
                }
            };

            let message = match result {
                Ok(report) => PollMessage::Cycle(Box::new(report)),
                Err(err) => {
                    tracing::warn!(cycle = cycles, error = %err, "usage cycle skipped");
                    PollMessage::CycleFailed {
                        message: err.to_string(),
                        at: Utc::now(),
                    }
                }
            };

            if tx.send(message).await.is_err() {
                break; // Receiver dropped
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::debug!(cycles, "poller stopped");
    }
}
