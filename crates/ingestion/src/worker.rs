//! Worker fetching, deduplicating and queueing a single METAR cycle.
//!
//! Each worker owns one session against the archive and polls its cycle
//! file on a fixed period. Only reports that were not part of the previous
//! snapshot of the file are handed to the feeder.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use metar_common::Cycle;
use metrics::counter;
use serde::Serialize;
use storage::{load_set, save_set, DedupSet};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::archive::{ArchiveConnector, ArchiveSession};
use crate::config::WorkerConfig;
use crate::error::{with_timeout, IngestionError, Result};
use crate::extract::extract_reports;
use crate::port::ReportSink;

/// Lifecycle state of a cycle worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Stopped,
    Polling,
}

/// Observable state of one cycle worker.
#[derive(Debug, Clone, Serialize)]
pub struct CycleStatus {
    pub cycle: Cycle,
    pub state: WorkerState,
    /// Completion time of the last successful poll
    pub last_poll: Option<DateTime<Utc>>,
    /// Modification time of the remote file seen by the last successful poll
    pub last_modified: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub reports_forwarded: u64,
}

impl CycleStatus {
    fn new(cycle: Cycle) -> Self {
        Self {
            cycle,
            state: WorkerState::Stopped,
            last_poll: None,
            last_modified: None,
            last_error: None,
            reports_forwarded: 0,
        }
    }
}

/// Result of a single poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The remote file was not modified since the last poll.
    Unchanged,
    /// The file was processed and this many reports were forwarded.
    Forwarded(usize),
}

struct RunningPoller {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Polls one cycle file of the archive.
pub struct CycleWorker {
    cycle: Cycle,
    state_path: PathBuf,
    config: WorkerConfig,
    connector: Arc<dyn ArchiveConnector>,
    sink: Arc<dyn ReportSink>,
    status: Arc<Mutex<CycleStatus>>,
    running: Option<RunningPoller>,
}

impl CycleWorker {
    pub fn new(
        cycle: Cycle,
        config: WorkerConfig,
        connector: Arc<dyn ArchiveConnector>,
        sink: Arc<dyn ReportSink>,
    ) -> Self {
        Self {
            cycle,
            state_path: cycle.state_path(&config.state_dir),
            config,
            connector,
            sink,
            status: Arc::new(Mutex::new(CycleStatus::new(cycle))),
            running: None,
        }
    }

    pub fn cycle(&self) -> Cycle {
        self.cycle
    }

    /// Path of this cycle's dedup state file.
    pub fn state_path(&self) -> &PathBuf {
        &self.state_path
    }

    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|running| !running.handle.is_finished())
    }

    /// Snapshot of the worker's observable state.
    pub fn status(&self) -> CycleStatus {
        lock(&self.status).clone()
    }

    /// Open a session to the archive and start polling. Does nothing if the
    /// worker is already running.
    pub async fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }

        let session = with_timeout(
            "archive connect",
            self.config.operation_timeout,
            self.connector.connect(),
        )
        .await?;

        let (stop_tx, stop_rx) = oneshot::channel();
        let poller = self.poller(session);
        let handle = tokio::spawn(poller.run(stop_rx));

        lock(&self.status).state = WorkerState::Polling;
        self.running = Some(RunningPoller {
            stop: stop_tx,
            handle,
        });

        info!(cycle = %self.cycle, "Started cycle worker");
        Ok(())
    }

    /// Stop polling and close the archive session. A poll in progress is
    /// allowed to finish first. Does nothing if the worker is stopped.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };

        let _ = running.stop.send(());
        if let Err(err) = running.handle.await {
            error!(cycle = %self.cycle, error = %err, "Cycle worker task failed");
        }

        lock(&self.status).state = WorkerState::Stopped;
        info!(cycle = %self.cycle, "Stopped cycle worker");
    }

    pub(crate) fn status_handle(&self) -> Arc<Mutex<CycleStatus>> {
        self.status.clone()
    }

    pub(crate) fn poller(&self, session: Box<dyn ArchiveSession>) -> Poller {
        let last_modified = lock(&self.status).last_modified;
        Poller {
            cycle: self.cycle,
            remote_filename: self.cycle.remote_filename(),
            state_path: self.state_path.clone(),
            config: self.config.clone(),
            session,
            sink: self.sink.clone(),
            status: self.status.clone(),
            last_modified,
        }
    }
}

/// The polling loop of a running worker. Owns the archive session.
pub(crate) struct Poller {
    cycle: Cycle,
    remote_filename: String,
    state_path: PathBuf,
    config: WorkerConfig,
    session: Box<dyn ArchiveSession>,
    sink: Arc<dyn ReportSink>,
    status: Arc<Mutex<CycleStatus>>,
    last_modified: Option<DateTime<Utc>>,
}

impl Poller {
    async fn run(mut self, mut stop: oneshot::Receiver<()>) {
        loop {
            tokio::select! {
                _ = &mut stop => break,
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
            // The tick runs outside the select so a stop request never
            // interrupts it halfway.
            self.tick().await;
        }

        if let Err(err) = self.session.quit().await {
            warn!(cycle = %self.cycle, error = %err, "Could not close archive session");
        }
    }

    async fn tick(&mut self) {
        counter!("metar_cycle_polls_total").increment(1);

        match self.poll_once().await {
            Ok(outcome) => {
                let mut status = lock(&self.status);
                status.last_poll = Some(Utc::now());
                status.last_modified = self.last_modified;
                status.last_error = None;
                if let PollOutcome::Forwarded(amount) = outcome {
                    status.reports_forwarded += amount as u64;
                }
            }
            Err(err) => {
                counter!("metar_cycle_poll_failures_total").increment(1);
                error!(cycle = %self.cycle, error = %err, "Cycle poll failed");
                lock(&self.status).last_error = Some(err.to_string());
            }
        }
    }

    /// Run one poll: fetch the cycle file if it changed, replace the stored
    /// snapshot and forward the difference to the sink.
    #[instrument(skip(self), fields(cycle = %self.cycle))]
    pub(crate) async fn poll_once(&mut self) -> Result<PollOutcome> {
        let timeout = self.config.operation_timeout;

        let modified = with_timeout(
            "modification time query",
            timeout,
            self.session.modified_time(&self.remote_filename),
        )
        .await?;
        if modified.is_some() && modified == self.last_modified {
            debug!("Cycle file unchanged, skipping");
            return Ok(PollOutcome::Unchanged);
        }

        let contents = with_timeout(
            "cycle file download",
            timeout,
            self.session.retrieve(&self.remote_filename),
        )
        .await?;
        let current = extract_reports(&contents);

        let previous: DedupSet<String> = with_timeout("state load", timeout, async {
            load_set(&self.state_path, &self.config.decode_limits)
                .await
                .map_err(IngestionError::from)
        })
        .await?;

        with_timeout("state save", timeout, async {
            save_set(&self.state_path, &current)
                .await
                .map_err(IngestionError::from)
        })
        .await?;

        let fresh = DedupSet::diff(&current, &previous).to_vec();
        let amount = fresh.len();
        if amount > 0 {
            self.sink.enqueue(fresh);
        }
        debug!(
            amount,
            extracted = current.size(),
            previous = previous.size(),
            "Queued METARs to feed"
        );

        self.last_modified = modified;
        Ok(PollOutcome::Forwarded(amount))
    }
}

pub(crate) fn lock(status: &Mutex<CycleStatus>) -> MutexGuard<'_, CycleStatus> {
    status.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::TimeZone;

    use super::*;
    use crate::testing::{FakeArchive, RecordingSink};

    fn worker_config(dir: &std::path::Path) -> WorkerConfig {
        WorkerConfig {
            state_dir: dir.to_path_buf(),
            poll_interval: Duration::from_millis(20),
            operation_timeout: Duration::from_secs(5),
            ..WorkerConfig::default()
        }
    }

    fn cycle(hour: u32) -> Cycle {
        Cycle::new(hour).unwrap()
    }

    fn sorted(mut values: Vec<String>) -> Vec<String> {
        values.sort();
        values
    }

    #[tokio::test]
    async fn test_forwards_difference_against_previous_state() {
        let dir = tempfile::tempdir().unwrap();
        let archive = FakeArchive::new();
        archive.publish("05Z.TXT", test_utils::SAMPLE_CYCLE_FILE.as_bytes(), None);
        let sink = Arc::new(RecordingSink::default());
        let worker = CycleWorker::new(
            cycle(5),
            worker_config(dir.path()),
            Arc::new(archive.clone()),
            sink.clone(),
        );

        // Previous snapshot of this cycle already contained R1.
        let previous: DedupSet<String> = [test_utils::SAMPLE_R1.to_string()].into_iter().collect();
        save_set(worker.state_path(), &previous).await.unwrap();

        let mut poller = worker.poller(archive.session());
        let outcome = poller.poll_once().await.unwrap();

        assert_eq!(outcome, PollOutcome::Forwarded(2));
        assert_eq!(
            sorted(sink.reports()),
            sorted(vec![
                test_utils::SAMPLE_R2.to_string(),
                test_utils::SAMPLE_WRAPPED_JOINED.to_string(),
            ])
        );

        // The stored snapshot is replaced by the full extracted set.
        let stored = load_set::<String>(worker.state_path(), &Default::default())
            .await
            .unwrap();
        assert_eq!(
            sorted(stored.to_vec()),
            sorted(
                test_utils::sample_cycle_reports()
                    .into_iter()
                    .map(String::from)
                    .collect()
            )
        );
    }

    #[tokio::test]
    async fn test_first_poll_forwards_everything() {
        let dir = tempfile::tempdir().unwrap();
        let archive = FakeArchive::new();
        archive.publish("00Z.TXT", test_utils::SAMPLE_CYCLE_FILE.as_bytes(), None);
        let sink = Arc::new(RecordingSink::default());
        let worker = CycleWorker::new(
            cycle(0),
            worker_config(dir.path()),
            Arc::new(archive.clone()),
            sink.clone(),
        );

        let outcome = worker.poller(archive.session()).poll_once().await.unwrap();
        assert_eq!(outcome, PollOutcome::Forwarded(3));
    }

    #[tokio::test]
    async fn test_skips_unchanged_file() {
        let dir = tempfile::tempdir().unwrap();
        let archive = FakeArchive::new();
        let modified = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        archive.publish("12Z.TXT", b"KJFK 011251Z 18010KT\n", Some(modified));
        let sink = Arc::new(RecordingSink::default());
        let worker = CycleWorker::new(
            cycle(12),
            worker_config(dir.path()),
            Arc::new(archive.clone()),
            sink.clone(),
        );

        let mut poller = worker.poller(archive.session());
        assert_eq!(poller.poll_once().await.unwrap(), PollOutcome::Forwarded(1));
        assert_eq!(poller.poll_once().await.unwrap(), PollOutcome::Unchanged);
        assert_eq!(archive.retrievals(), 1);

        let later = Utc.with_ymd_and_hms(2024, 3, 1, 12, 5, 0).unwrap();
        archive.publish("12Z.TXT", b"KJFK 011251Z 18010KT\nKLGA 011251Z\n", Some(later));
        assert_eq!(poller.poll_once().await.unwrap(), PollOutcome::Forwarded(1));
        assert_eq!(sink.reports().last().map(String::as_str), Some("KLGA 011251Z"));
    }

    #[tokio::test]
    async fn test_without_modification_times_always_downloads() {
        let dir = tempfile::tempdir().unwrap();
        let archive = FakeArchive::new();
        archive.publish("01Z.TXT", b"KJFK 011251Z\n", None);
        let sink = Arc::new(RecordingSink::default());
        let worker = CycleWorker::new(
            cycle(1),
            worker_config(dir.path()),
            Arc::new(archive.clone()),
            sink.clone(),
        );

        let mut poller = worker.poller(archive.session());
        assert_eq!(poller.poll_once().await.unwrap(), PollOutcome::Forwarded(1));
        assert_eq!(poller.poll_once().await.unwrap(), PollOutcome::Forwarded(0));
        assert_eq!(archive.retrievals(), 2);
        assert_eq!(sink.batches(), 1);
    }

    #[tokio::test]
    async fn test_disappeared_report_is_forwarded_again() {
        let dir = tempfile::tempdir().unwrap();
        let archive = FakeArchive::new();
        archive.publish("02Z.TXT", b"A 1\nB 2\n", None);
        let sink = Arc::new(RecordingSink::default());
        let worker = CycleWorker::new(
            cycle(2),
            worker_config(dir.path()),
            Arc::new(archive.clone()),
            sink.clone(),
        );
        let mut poller = worker.poller(archive.session());
        poller.poll_once().await.unwrap();

        archive.publish("02Z.TXT", b"A 1\n", None);
        assert_eq!(poller.poll_once().await.unwrap(), PollOutcome::Forwarded(1));
        assert_eq!(sink.reports().last().map(String::as_str), Some("B 2"));
    }

    #[tokio::test]
    async fn test_missing_remote_file_fails_tick() {
        let dir = tempfile::tempdir().unwrap();
        let archive = FakeArchive::new();
        let sink = Arc::new(RecordingSink::default());
        let worker = CycleWorker::new(
            cycle(3),
            worker_config(dir.path()),
            Arc::new(archive.clone()),
            sink.clone(),
        );

        let result = worker.poller(archive.session()).poll_once().await;
        assert!(matches!(result, Err(IngestionError::Archive(_))));
        assert!(!worker.state_path().exists());
        assert!(sink.reports().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_state_fails_tick_without_forwarding() {
        let dir = tempfile::tempdir().unwrap();
        let archive = FakeArchive::new();
        archive.publish("04Z.TXT", b"KJFK 011251Z\n", None);
        let sink = Arc::new(RecordingSink::default());
        let worker = CycleWorker::new(
            cycle(4),
            worker_config(dir.path()),
            Arc::new(archive.clone()),
            sink.clone(),
        );
        storage::write_snapshot(worker.state_path(), &[0xff, 0xff])
            .await
            .unwrap();

        let result = worker.poller(archive.session()).poll_once().await;
        assert!(matches!(result, Err(IngestionError::Storage(_))));
        assert!(sink.reports().is_empty());
    }

    #[tokio::test]
    async fn test_start_and_stop_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let archive = FakeArchive::new();
        archive.publish("06Z.TXT", b"KJFK 011251Z\n", None);
        let sink = Arc::new(RecordingSink::default());
        let mut worker = CycleWorker::new(
            cycle(6),
            worker_config(dir.path()),
            Arc::new(archive.clone()),
            sink.clone(),
        );

        worker.start().await.unwrap();
        worker.start().await.unwrap();
        assert!(worker.is_running());
        assert_eq!(worker.status().state, WorkerState::Polling);
        assert_eq!(archive.connections(), 1);

        sink.wait_for(1, Duration::from_secs(5)).await;

        worker.stop().await;
        worker.stop().await;
        assert!(!worker.is_running());
        assert_eq!(worker.status().state, WorkerState::Stopped);
        assert_eq!(worker.status().reports_forwarded, 1);
        assert_eq!(archive.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_start_fails_when_archive_unreachable() {
        let dir = tempfile::tempdir().unwrap();
        let archive = FakeArchive::new();
        archive.set_reachable(false);
        let mut worker = CycleWorker::new(
            cycle(7),
            worker_config(dir.path()),
            Arc::new(archive),
            Arc::new(RecordingSink::default()),
        );

        assert!(worker.start().await.is_err());
        assert!(!worker.is_running());
        assert_eq!(worker.status().state, WorkerState::Stopped);
    }
}
