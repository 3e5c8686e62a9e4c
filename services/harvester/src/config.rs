//! Command line and environment configuration.
//!
//! Every option can be given as a flag or as an `SBF_`-prefixed environment
//! variable, optionally loaded from a `.env` file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{ArgAction, Parser};
use ingestion::config::QUEUE_BACKUP_FILENAME;
use ingestion::{state_dir, FeederConfig, FtpConfig, RetryPolicy, WorkerConfig};
use metar_common::{MetarError, MetarResult};

/// Load variables from an env file, overriding ones already set. Returns
/// whether the file was loaded.
pub fn load_env_file(path: &Path) -> bool {
    dotenvy::from_path_override(path).is_ok()
}

#[derive(Parser, Debug, Clone)]
#[command(name = "harvester")]
#[command(about = "Harvests METARs from NOAA's cycle files and feeds them into the data API")]
pub struct Args {
    /// Runtime environment; anything but `dev` is treated as production
    #[arg(long, env = "SBF_ENVIRONMENT", default_value = "prod")]
    pub environment: String,

    /// Base address of the data API
    #[arg(long, env = "SBF_API_ADDRESS", default_value = "http://localhost:8082")]
    pub api_address: String,

    /// Key used to authenticate against the data API
    #[arg(long, env = "SBF_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Feed harvested METARs into the data API
    #[arg(long, env = "SBF_FEED_METARS", default_value_t = false, action = ArgAction::Set)]
    pub feed_metars: bool,

    /// Directory holding the dedup state and the feeder queue backup
    #[arg(long, env = "SBF_DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    /// Seconds between two polls of the same cycle file
    #[arg(long, env = "SBF_POLL_INTERVAL_SECS", default_value = "30")]
    pub poll_interval_secs: u64,

    /// Milliseconds between two feeding attempts
    #[arg(long, env = "SBF_FEED_INTERVAL_MS", default_value = "1000")]
    pub feed_interval_ms: u64,

    /// Maximum number of METARs fed at once
    #[arg(long, env = "SBF_BATCH_SIZE", default_value = "100")]
    pub batch_size: usize,

    /// What to do with a rejected batch (`selective` or `whole-batch`)
    #[arg(long, env = "SBF_RETRY_POLICY", default_value = "selective")]
    pub retry_policy: RetryPolicy,

    /// `host:port` of the FTP archive
    #[arg(long, env = "SBF_FTP_ADDRESS", default_value = ingestion::config::NOAA_FTP_ADDRESS)]
    pub ftp_address: String,

    /// Directory of the cycle files on the FTP archive
    #[arg(long, env = "SBF_FTP_DIRECTORY", default_value = ingestion::config::NOAA_CYCLES_DIRECTORY)]
    pub ftp_directory: String,

    /// Timeout in seconds for any single network operation
    #[arg(long, env = "SBF_NETWORK_TIMEOUT_SECS", default_value = "30")]
    pub network_timeout_secs: u64,

    /// Port for status HTTP server
    #[arg(long, env = "SBF_STATUS_PORT", default_value = "8083")]
    pub status_port: u16,

    /// Disable status HTTP server
    #[arg(long, env = "SBF_NO_STATUS_SERVER")]
    pub no_status_server: bool,

    /// Log level (defaults to `info` in production and `debug` otherwise)
    #[arg(long, env = "SBF_LOG_LEVEL")]
    pub log_level: Option<String>,
}

impl Args {
    pub fn is_production(&self) -> bool {
        !self.environment.eq_ignore_ascii_case("dev")
    }

    pub fn log_level(&self) -> &str {
        match &self.log_level {
            Some(level) => level,
            None if self.is_production() => "info",
            None => "debug",
        }
    }

    /// Reject values the components cannot work with.
    pub fn validate(&self) -> MetarResult<()> {
        let positive = [
            ("batch size", self.batch_size as u64),
            ("poll interval", self.poll_interval_secs),
            ("feed interval", self.feed_interval_ms),
            ("network timeout", self.network_timeout_secs),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(MetarError::InvalidConfig(format!("{} must be positive", name)));
            }
        }
        if self.api_key.trim().is_empty() {
            return Err(MetarError::InvalidConfig("API key must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn network_timeout(&self) -> Duration {
        Duration::from_secs(self.network_timeout_secs)
    }

    pub fn state_dir(&self) -> PathBuf {
        state_dir(&self.data_dir)
    }

    pub fn ftp_config(&self) -> FtpConfig {
        FtpConfig {
            address: self.ftp_address.clone(),
            directory: self.ftp_directory.clone(),
            connect_timeout: self.network_timeout(),
            operation_timeout: self.network_timeout(),
            ..FtpConfig::default()
        }
    }

    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            state_dir: self.state_dir(),
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            operation_timeout: self.network_timeout(),
            ..WorkerConfig::default()
        }
    }

    pub fn feeder_config(&self) -> FeederConfig {
        FeederConfig {
            batch_size: self.batch_size,
            interval: Duration::from_millis(self.feed_interval_ms),
            backup_path: self.state_dir().join(QUEUE_BACKUP_FILENAME),
            retry_policy: self.retry_policy,
            submit_timeout: self.network_timeout(),
            ..FeederConfig::default()
        }
    }
}
