//! Configuration for cycle polling and feeding.
//!
//! All values have defaults matching the NOAA archive and the production
//! feeding setup; the harvester binary overrides them from its CLI.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use storage::DecodeLimits;

/// Host of NOAA's public observation archive.
pub const NOAA_FTP_ADDRESS: &str = "tgftp.nws.noaa.gov:21";

/// Directory holding the hourly METAR cycle files.
pub const NOAA_CYCLES_DIRECTORY: &str = "/data/observations/metar/cycles/";

/// Name of the feeder's queue backup inside the state directory.
pub const QUEUE_BACKUP_FILENAME: &str = "feeder-queue";

/// Directory holding all METAR state below the application data directory.
pub fn state_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("metar")
}

/// Connection settings for the remote FTP archive.
#[derive(Debug, Clone)]
pub struct FtpConfig {
    /// `host:port` of the server
    pub address: String,
    /// Directory containing the cycle files
    pub directory: String,
    pub user: String,
    pub password: String,
    /// Timeout for establishing the control connection
    pub connect_timeout: Duration,
    /// Timeout for a single command, including file transfers
    pub operation_timeout: Duration,
}

impl Default for FtpConfig {
    fn default() -> Self {
        Self {
            address: NOAA_FTP_ADDRESS.to_string(),
            directory: NOAA_CYCLES_DIRECTORY.to_string(),
            user: "anonymous".to_string(),
            password: "anonymous".to_string(),
            connect_timeout: Duration::from_secs(5),
            operation_timeout: Duration::from_secs(30),
        }
    }
}

/// Settings shared by all cycle workers.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Directory holding the per-cycle dedup state files
    pub state_dir: PathBuf,
    /// Time between two polls of the same cycle
    pub poll_interval: Duration,
    /// Upper bound for a single remote or disk operation
    pub operation_timeout: Duration,
    pub decode_limits: DecodeLimits,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            state_dir: state_dir(Path::new("./data")),
            poll_interval: Duration::from_secs(30),
            operation_timeout: Duration::from_secs(30),
            decode_limits: DecodeLimits::default(),
        }
    }
}

/// How the feeder reconciles a batch the downstream rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryPolicy {
    /// Append the whole batch to the tail of the queue again.
    WholeBatch,
    /// Drop elements the downstream flags as malformed and resubmit the rest;
    /// anything left after another kind of failure goes back to the head.
    #[default]
    SelectiveRepair,
}

impl FromStr for RetryPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "whole-batch" | "whole_batch" => Ok(Self::WholeBatch),
            "selective" | "selective-repair" | "selective_repair" => Ok(Self::SelectiveRepair),
            other => Err(format!(
                "unknown retry policy '{}' (expected 'selective' or 'whole-batch')",
                other
            )),
        }
    }
}

impl fmt::Display for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WholeBatch => f.write_str("whole-batch"),
            Self::SelectiveRepair => f.write_str("selective"),
        }
    }
}

/// Settings of the feeder.
#[derive(Debug, Clone)]
pub struct FeederConfig {
    /// Maximum number of reports submitted at once
    pub batch_size: usize,
    /// Time between two feeding attempts
    pub interval: Duration,
    /// Location of the queue backup written on shutdown
    pub backup_path: PathBuf,
    pub retry_policy: RetryPolicy,
    /// Upper bound for a single submission
    pub submit_timeout: Duration,
    /// Upper bound for reading or writing the queue backup
    pub io_timeout: Duration,
    pub decode_limits: DecodeLimits,
}

impl Default for FeederConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            interval: Duration::from_secs(1),
            backup_path: state_dir(Path::new("./data")).join(QUEUE_BACKUP_FILENAME),
            retry_policy: RetryPolicy::default(),
            submit_timeout: Duration::from_secs(30),
            io_timeout: Duration::from_secs(10),
            decode_limits: DecodeLimits::default(),
        }
    }
}
