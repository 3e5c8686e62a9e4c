//! In-memory collaborators for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::archive::{ArchiveConnector, ArchiveSession};
use crate::error::{IngestionError, Result};
use crate::port::{ReportSink, SubmissionPort, SubmitError, SubmitReceipt};

#[derive(Default)]
struct ArchiveState {
    files: Mutex<HashMap<String, (Vec<u8>, Option<DateTime<Utc>>)>>,
    unreachable: AtomicBool,
    refusals: AtomicUsize,
    connections: AtomicUsize,
    open_sessions: AtomicUsize,
    retrievals: AtomicUsize,
}

/// Archive serving files from memory.
#[derive(Clone, Default)]
pub struct FakeArchive {
    state: Arc<ArchiveState>,
}

impl FakeArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, filename: &str, contents: &[u8], modified: Option<DateTime<Utc>>) {
        self.state
            .files
            .lock()
            .unwrap()
            .insert(filename.to_string(), (contents.to_vec(), modified));
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.state.unreachable.store(!reachable, Ordering::SeqCst);
    }

    /// Refuse the next `count` connection attempts.
    pub fn refuse_next(&self, count: usize) {
        self.state.refusals.store(count, Ordering::SeqCst);
    }

    /// Open a session directly, bypassing the connection counter.
    pub fn session(&self) -> Box<dyn ArchiveSession> {
        self.state.open_sessions.fetch_add(1, Ordering::SeqCst);
        Box::new(FakeSession {
            state: self.state.clone(),
            open: true,
        })
    }

    pub fn connections(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }

    pub fn open_sessions(&self) -> usize {
        self.state.open_sessions.load(Ordering::SeqCst)
    }

    pub fn retrievals(&self) -> usize {
        self.state.retrievals.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArchiveConnector for FakeArchive {
    async fn connect(&self) -> Result<Box<dyn ArchiveSession>> {
        let refused = self
            .state
            .refusals
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused || self.state.unreachable.load(Ordering::SeqCst) {
            return Err(IngestionError::Archive("connection refused".to_string()));
        }
        self.state.connections.fetch_add(1, Ordering::SeqCst);
        Ok(self.session())
    }
}

struct FakeSession {
    state: Arc<ArchiveState>,
    open: bool,
}

#[async_trait]
impl ArchiveSession for FakeSession {
    async fn modified_time(&mut self, filename: &str) -> Result<Option<DateTime<Utc>>> {
        let files = self.state.files.lock().unwrap();
        Ok(files.get(filename).and_then(|(_, modified)| *modified))
    }

    async fn retrieve(&mut self, filename: &str) -> Result<Vec<u8>> {
        self.state.retrievals.fetch_add(1, Ordering::SeqCst);
        let files = self.state.files.lock().unwrap();
        files
            .get(filename)
            .map(|(contents, _)| contents.clone())
            .ok_or_else(|| IngestionError::Archive(format!("550 {}: not found", filename)))
    }

    async fn quit(&mut self) -> Result<()> {
        if std::mem::replace(&mut self.open, false) {
            self.state.open_sessions.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// Sink recording every enqueued batch.
#[derive(Default)]
pub struct RecordingSink {
    batches: Mutex<Vec<Vec<String>>>,
}

impl RecordingSink {
    /// All reports received so far, in arrival order.
    pub fn reports(&self) -> Vec<String> {
        self.batches.lock().unwrap().iter().flatten().cloned().collect()
    }

    pub fn batches(&self) -> usize {
        self.batches.lock().unwrap().len()
    }

    /// Wait until at least `count` reports arrived.
    pub async fn wait_for(&self, count: usize, timeout: Duration) {
        tokio::time::timeout(timeout, async {
            while self.reports().len() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("reports did not arrive in time");
    }
}

impl ReportSink for RecordingSink {
    fn enqueue(&self, reports: Vec<String>) {
        self.batches.lock().unwrap().push(reports);
    }
}

/// Submission port answering from a script of responses. Once the script
/// runs out every batch is accepted.
#[derive(Default)]
pub struct ScriptedPort {
    responses: Mutex<VecDeque<std::result::Result<SubmitReceipt, SubmitError>>>,
    submissions: Mutex<Vec<Vec<String>>>,
    accepted: Mutex<Vec<String>>,
}

impl ScriptedPort {
    pub fn new(
        responses: impl IntoIterator<Item = std::result::Result<SubmitReceipt, SubmitError>>,
    ) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            submissions: Mutex::new(Vec::new()),
            accepted: Mutex::new(Vec::new()),
        }
    }

    /// Every batch submitted so far, including rejected ones.
    pub fn submissions(&self) -> Vec<Vec<String>> {
        self.submissions.lock().unwrap().clone()
    }

    /// Reports of every accepted batch, in submission order.
    pub fn accepted(&self) -> Vec<String> {
        self.accepted.lock().unwrap().clone()
    }
}

#[async_trait]
impl SubmissionPort for ScriptedPort {
    async fn submit(&self, batch: &[String]) -> std::result::Result<SubmitReceipt, SubmitError> {
        self.submissions.lock().unwrap().push(batch.to_vec());
        let response = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(SubmitReceipt::default()));
        if response.is_ok() {
            self.accepted.lock().unwrap().extend_from_slice(batch);
        }
        response
    }
}
