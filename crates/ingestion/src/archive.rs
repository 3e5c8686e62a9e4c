//! Remote archive access.
//!
//! The cycle workers talk to the archive through [`ArchiveConnector`] and
//! [`ArchiveSession`] so the polling logic does not depend on FTP. The
//! production implementation is an anonymous FTP session against NOAA's
//! cycle directory.

use std::net::ToSocketAddrs;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use suppaftp::{FtpError, FtpStream};
use tracing::{debug, info, warn};

use crate::config::FtpConfig;
use crate::error::{IngestionError, Result};

/// Opens sessions against the remote archive.
#[async_trait]
pub trait ArchiveConnector: Send + Sync {
    /// Open a session positioned in the cycles directory.
    async fn connect(&self) -> Result<Box<dyn ArchiveSession>>;
}

/// An open session against the remote archive.
#[async_trait]
pub trait ArchiveSession: Send {
    /// Modification time of a remote file, or `None` if the server cannot
    /// report it.
    async fn modified_time(&mut self, filename: &str) -> Result<Option<DateTime<Utc>>>;

    /// Download the full contents of a remote file.
    async fn retrieve(&mut self, filename: &str) -> Result<Vec<u8>>;

    /// Close the session.
    async fn quit(&mut self) -> Result<()>;
}

/// Connector for anonymous FTP archives.
#[derive(Debug, Clone)]
pub struct FtpConnector {
    config: FtpConfig,
}

impl FtpConnector {
    pub fn new(config: FtpConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ArchiveConnector for FtpConnector {
    async fn connect(&self) -> Result<Box<dyn ArchiveSession>> {
        let mut session = FtpSession {
            config: self.config.clone(),
            stream: None,
        };
        session.ensure_connected().await?;
        Ok(Box::new(session))
    }
}

/// A single FTP control connection.
///
/// `suppaftp`'s client is blocking, so every command runs on the blocking
/// pool under a timeout. A session whose connection was lost reconnects on
/// its next command.
pub struct FtpSession {
    config: FtpConfig,
    stream: Option<FtpStream>,
}

impl FtpSession {
    async fn ensure_connected(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let config = self.config.clone();
        let timeout = self.config.connect_timeout + self.config.operation_timeout;
        let handle = tokio::task::spawn_blocking(move || open_stream(&config));
        let stream = tokio::time::timeout(timeout, handle)
            .await
            .map_err(|_| IngestionError::Timeout {
                operation: "FTP connect",
                timeout,
            })?
            .map_err(|err| IngestionError::Task(err.to_string()))??;

        info!(address = %self.config.address, directory = %self.config.directory, "Opened FTP session");
        self.stream = Some(stream);
        Ok(())
    }

    /// Run a blocking FTP command against the control connection.
    async fn run<T, F>(&mut self, operation: &'static str, command: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut FtpStream) -> std::result::Result<T, FtpError> + Send + 'static,
    {
        self.ensure_connected().await?;
        let Some(mut stream) = self.stream.take() else {
            return Err(IngestionError::Archive("FTP session is closed".to_string()));
        };

        let timeout = self.config.operation_timeout;
        let handle = tokio::task::spawn_blocking(move || {
            let result = command(&mut stream);
            (stream, result)
        });

        // On timeout the stream stays with the blocking task and is dropped
        // when it finishes; the next command reconnects.
        let (stream, result) = tokio::time::timeout(timeout, handle)
            .await
            .map_err(|_| IngestionError::Timeout { operation, timeout })?
            .map_err(|err| IngestionError::Task(err.to_string()))?;

        match result {
            Err(FtpError::ConnectionError(err)) => {
                warn!(operation, error = %err, "FTP connection lost");
                Err(IngestionError::Archive(format!("{}: {}", operation, err)))
            }
            other => {
                self.stream = Some(stream);
                other.map_err(|err| IngestionError::Archive(format!("{}: {}", operation, err)))
            }
        }
    }
}

#[async_trait]
impl ArchiveSession for FtpSession {
    async fn modified_time(&mut self, filename: &str) -> Result<Option<DateTime<Utc>>> {
        let filename = filename.to_string();
        self.run("MDTM", move |stream| match stream.mdtm(&filename) {
            Ok(modified) => Ok(Some(Utc.from_utc_datetime(&modified))),
            // Servers without MDTM answer with an error reply; the file is
            // then simply downloaded on every poll.
            Err(FtpError::UnexpectedResponse(response)) => {
                debug!(?response, "MDTM not available");
                Ok(None)
            }
            Err(err) => Err(err),
        })
        .await
    }

    async fn retrieve(&mut self, filename: &str) -> Result<Vec<u8>> {
        let filename = filename.to_string();
        self.run("RETR", move |stream| {
            stream
                .retr_as_buffer(&filename)
                .map(|cursor| cursor.into_inner())
        })
        .await
    }

    async fn quit(&mut self) -> Result<()> {
        let Some(mut stream) = self.stream.take() else {
            return Ok(());
        };
        let timeout = self.config.operation_timeout;
        let handle = tokio::task::spawn_blocking(move || stream.quit());
        tokio::time::timeout(timeout, handle)
            .await
            .map_err(|_| IngestionError::Timeout {
                operation: "FTP quit",
                timeout,
            })?
            .map_err(|err| IngestionError::Task(err.to_string()))?
            .map_err(|err| IngestionError::Archive(format!("QUIT: {}", err)))
    }
}

fn open_stream(config: &FtpConfig) -> Result<FtpStream> {
    let address = config
        .address
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| IngestionError::Archive(format!("Could not resolve {}", config.address)))?;

    let mut stream = FtpStream::connect_timeout(address, config.connect_timeout)
        .map_err(|err| IngestionError::Archive(format!("connect: {}", err)))?;
    set_socket_timeouts(&stream, config.operation_timeout)?;

    let setup = stream
        .login(config.user.as_str(), config.password.as_str())
        .and_then(|_| stream.cwd(config.directory.as_str()));
    if let Err(err) = setup {
        let _ = stream.quit();
        return Err(IngestionError::Archive(format!("login: {}", err)));
    }

    Ok(stream)
}

fn set_socket_timeouts(stream: &FtpStream, timeout: Duration) -> Result<()> {
    let socket = stream.get_ref();
    socket.set_read_timeout(Some(timeout))?;
    socket.set_write_timeout(Some(timeout))?;
    Ok(())
}
