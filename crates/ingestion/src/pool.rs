//! The fixed group of 24 cycle workers.

use std::sync::{Arc, Mutex};

use metar_common::{Cycle, CYCLE_COUNT};
use tracing::{error, info};

use crate::archive::ArchiveConnector;
use crate::config::WorkerConfig;
use crate::port::ReportSink;
use crate::worker::{lock, CycleStatus, CycleWorker};

/// Groups and controls one worker per cycle, indexed by cycle hour.
pub struct CycleWorkerPool {
    workers: [CycleWorker; CYCLE_COUNT],
}

impl CycleWorkerPool {
    /// Create the 24 workers. Each is bound to its cycle's remote file and
    /// local state file for its whole lifetime.
    pub fn new(
        config: WorkerConfig,
        connector: Arc<dyn ArchiveConnector>,
        sink: Arc<dyn ReportSink>,
    ) -> Self {
        let workers = Cycle::ALL.map(|cycle| {
            CycleWorker::new(cycle, config.clone(), connector.clone(), sink.clone())
        });
        Self { workers }
    }

    pub fn worker(&self, cycle: Cycle) -> &CycleWorker {
        &self.workers[cycle.index()]
    }

    pub fn workers(&self) -> impl Iterator<Item = &CycleWorker> {
        self.workers.iter()
    }

    /// Number of workers currently polling.
    pub fn running(&self) -> usize {
        self.workers.iter().filter(|w| w.is_running()).count()
    }

    /// Start every worker that is not running yet. A worker failing to start
    /// is logged and does not keep the others from starting; calling this
    /// again retries only the workers that are still stopped.
    pub async fn start(&mut self) -> usize {
        for worker in self.workers.iter_mut() {
            if let Err(err) = worker.start().await {
                error!(cycle = %worker.cycle(), error = %err, "Could not start cycle worker");
            }
        }

        let running = self.running();
        info!(running, total = CYCLE_COUNT, "Cycle workers started");
        running
    }

    /// Stop every running worker.
    pub async fn stop(&mut self) {
        for worker in self.workers.iter_mut() {
            worker.stop().await;
        }
        info!("Cycle workers stopped");
    }

    /// Handle to the workers' status, usable after the pool moved elsewhere.
    pub fn status_board(&self) -> StatusBoard {
        StatusBoard {
            statuses: self.workers.iter().map(CycleWorker::status_handle).collect(),
        }
    }
}

/// Read-only view of the status of all cycle workers.
#[derive(Clone)]
pub struct StatusBoard {
    statuses: Vec<Arc<Mutex<CycleStatus>>>,
}

impl StatusBoard {
    /// Status of every cycle, in hour order.
    pub fn snapshot(&self) -> Vec<CycleStatus> {
        self.statuses
            .iter()
            .map(|status| lock(status).clone())
            .collect()
    }
}
