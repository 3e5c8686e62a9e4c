//! Feeder queueing new METARs and submitting them downstream in batches.
//!
//! Reports handed over by the cycle workers are normalized and appended to
//! an in-memory FIFO. A background task pops a bounded batch every interval
//! and submits it. A batch is never lost on failure: depending on the
//! [`RetryPolicy`] it is either appended to the queue again or repaired by
//! dropping the elements the downstream flags as malformed. On a controlled
//! shutdown the queue is written to disk and restored on the next start.

use std::sync::Arc;

use metrics::{counter, gauge};
use storage::{load_queue, save_queue, PersistentQueue};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{FeederConfig, RetryPolicy};
use crate::error::{with_timeout, IngestionError, Result};
use crate::normalize::normalize;
use crate::port::{ReportSink, SubmissionPort, SubmitError, SubmitReceipt};

/// Result of a single feeding attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedOutcome {
    /// Nothing was queued.
    Idle,
    /// The batch was accepted, minus the reports dropped as malformed.
    Delivered { delivered: usize, dropped: usize },
    /// The batch failed and went back into the queue.
    Requeued { requeued: usize, dropped: usize },
}

struct RunningFeeder {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

struct Shared {
    queue: PersistentQueue<String>,
    port: Arc<dyn SubmissionPort>,
    config: FeederConfig,
}

/// Queues and feeds the METARs assembled by the cycle workers.
pub struct Feeder {
    shared: Arc<Shared>,
    running: Mutex<Option<RunningFeeder>>,
}

impl Feeder {
    pub fn new(port: Arc<dyn SubmissionPort>, config: FeederConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                queue: PersistentQueue::new(),
                port,
                config,
            }),
            running: Mutex::new(None),
        }
    }

    /// Normalize reports and append them to the queue in arrival order.
    pub fn queue(&self, reports: Vec<String>) {
        let amount = reports.len();
        self.shared
            .queue
            .push(reports.iter().map(|report| normalize(report)));
        counter!("metar_reports_queued_total").increment(amount as u64);
        gauge!("metar_feeder_queue_depth").set(self.shared.queue.size() as f64);
    }

    /// Number of reports waiting to be fed.
    pub fn pending(&self) -> usize {
        self.shared.queue.size()
    }

    /// Copy of the queued reports, head first.
    pub fn pending_reports(&self) -> Vec<String> {
        self.shared.queue.snapshot()
    }

    pub async fn is_running(&self) -> bool {
        self.running
            .lock()
            .await
            .as_ref()
            .is_some_and(|running| !running.handle.is_finished())
    }

    /// Restore the queue backup if there is one and start the feeding task.
    /// Does nothing if the feeder is already running.
    ///
    /// A stopped feeder holds no reports of its own, since `stop` moves them
    /// into the backup. Restoring therefore yields the backed up queue,
    /// followed by anything queued while the feeder was stopped.
    pub async fn start(&self) -> Result<()> {
        let mut running = self.running.lock().await;
        if running
            .as_ref()
            .is_some_and(|running| !running.handle.is_finished())
        {
            return Ok(());
        }

        self.restore_queue().await?;

        let (stop_tx, stop_rx) = oneshot::channel();
        let handle = tokio::spawn(self.shared.clone().run(stop_rx));
        *running = Some(RunningFeeder {
            stop: stop_tx,
            handle,
        });

        info!(
            pending = self.pending(),
            batch_size = self.shared.config.batch_size,
            interval_ms = self.shared.config.interval.as_millis() as u64,
            policy = %self.shared.config.retry_policy,
            "Started METAR feeder"
        );
        Ok(())
    }

    /// Stop the feeding task and move the queue to disk. A feeding attempt
    /// in progress completes first, so every report still queued afterwards
    /// ends up in the backup. Does nothing if the feeder is not running.
    ///
    /// The backup is written even if the feeding task failed; the task's
    /// error is returned afterwards.
    pub async fn stop(&self) -> Result<()> {
        let Some(running) = self.running.lock().await.take() else {
            return Ok(());
        };

        let _ = running.stop.send(());
        let joined = running.handle.await.map_err(|err| {
            error!(error = %err, "METAR feeder task failed");
            IngestionError::Task(err.to_string())
        });

        let backup = self.backup_queue().await;
        joined?;
        let written = backup?;
        info!(written, "Stopped METAR feeder");
        Ok(())
    }

    /// Run a single feeding attempt.
    pub async fn feed_once(&self) -> FeedOutcome {
        self.shared.feed_once().await
    }

    /// Write every queued report to the backup and remove them from memory.
    /// On failure the reports stay queued.
    async fn backup_queue(&self) -> Result<usize> {
        let config = &self.shared.config;
        let pending = PersistentQueue::new();
        pending.push(self.shared.queue.pop_n(usize::MAX));

        let saved = with_timeout("queue backup", config.io_timeout, async {
            save_queue(&config.backup_path, &pending)
                .await
                .map_err(IngestionError::from)
        })
        .await;

        let written = pending.size();
        if let Err(err) = saved {
            error!(error = %err, pending = written, "Could not back up feeder queue");
            self.shared.queue.push_front(pending.into_vec());
            return Err(err);
        }

        gauge!("metar_feeder_queue_depth").set(self.shared.queue.size() as f64);
        debug!(path = %config.backup_path.display(), written, "Backed up feeder queue");
        Ok(written)
    }

    async fn restore_queue(&self) -> Result<()> {
        let config = &self.shared.config;
        let restored = with_timeout("queue restore", config.io_timeout, async {
            load_queue::<String>(&config.backup_path, &config.decode_limits)
                .await
                .map_err(IngestionError::from)
        })
        .await?;

        if let Some(restored) = restored {
            let restored = restored.into_vec();
            info!(amount = restored.len(), "Restored feeder queue from backup");
            self.shared.queue.push_front(restored);
        }
        Ok(())
    }
}

impl ReportSink for Feeder {
    fn enqueue(&self, reports: Vec<String>) {
        self.queue(reports);
    }
}

impl Shared {
    async fn run(self: Arc<Self>, mut stop: oneshot::Receiver<()>) {
        loop {
            tokio::select! {
                _ = &mut stop => break,
                _ = tokio::time::sleep(self.config.interval) => {}
            }
            self.feed_once().await;
        }
    }

    #[instrument(skip(self))]
    async fn feed_once(&self) -> FeedOutcome {
        let batch = self.queue.pop_n(self.config.batch_size);
        if batch.is_empty() {
            return FeedOutcome::Idle;
        }

        let outcome = match self.config.retry_policy {
            RetryPolicy::WholeBatch => self.feed_whole_batch(batch).await,
            RetryPolicy::SelectiveRepair => self.feed_selectively(batch).await,
        };

        match outcome {
            FeedOutcome::Delivered { delivered, dropped } => {
                counter!("metar_reports_fed_total").increment(delivered as u64);
                counter!("metar_reports_dropped_total").increment(dropped as u64);
                debug!(delivered, dropped, "Fed METARs");
            }
            FeedOutcome::Requeued { dropped, .. } => {
                counter!("metar_reports_dropped_total").increment(dropped as u64);
            }
            FeedOutcome::Idle => {}
        }
        gauge!("metar_feeder_queue_depth").set(self.queue.size() as f64);
        outcome
    }

    async fn feed_whole_batch(&self, batch: Vec<String>) -> FeedOutcome {
        match self.submit(&batch).await {
            Ok(receipt) => {
                log_duplicates(&receipt);
                FeedOutcome::Delivered {
                    delivered: batch.len(),
                    dropped: 0,
                }
            }
            Err(err) => {
                warn!(error = %err, amount = batch.len(), "Could not feed METARs; appending them to the queue again");
                let requeued = batch.len();
                self.queue.push(batch);
                FeedOutcome::Requeued {
                    requeued,
                    dropped: 0,
                }
            }
        }
    }

    /// Submit a batch, dropping elements flagged as malformed one at a time.
    ///
    /// Every rejected attempt removes one element, so at most `len + 1`
    /// submissions happen.
    async fn feed_selectively(&self, mut batch: Vec<String>) -> FeedOutcome {
        let max_attempts = batch.len() + 1;
        let mut dropped = 0;

        for _ in 0..max_attempts {
            if batch.is_empty() {
                break;
            }

            match self.submit(&batch).await {
                Ok(receipt) => {
                    log_duplicates(&receipt);
                    return FeedOutcome::Delivered {
                        delivered: batch.len(),
                        dropped,
                    };
                }
                Err(SubmitError::InvalidFormat { index, message }) if index < batch.len() => {
                    let invalid = batch.remove(index);
                    warn!(metar = %invalid, reason = %message, "Skipping invalid METAR");
                    dropped += 1;
                }
                Err(err) => {
                    warn!(error = %err, amount = batch.len(), "Could not feed METARs; putting them back at the head of the queue");
                    let requeued = batch.len();
                    self.queue.push_front(batch);
                    return FeedOutcome::Requeued { requeued, dropped };
                }
            }
        }

        FeedOutcome::Delivered {
            delivered: 0,
            dropped,
        }
    }

    async fn submit(&self, batch: &[String]) -> std::result::Result<SubmitReceipt, SubmitError> {
        let timeout = self.config.submit_timeout;
        tokio::time::timeout(timeout, self.port.submit(batch))
            .await
            .unwrap_or_else(|_| {
                Err(SubmitError::Transport(format!(
                    "submission timed out after {:?}",
                    timeout
                )))
            })
    }
}

fn log_duplicates(receipt: &SubmitReceipt) {
    if !receipt.duplicates.is_empty() {
        debug!(amount = receipt.duplicates.len(), "Downstream already knew some METARs");
    }
}
