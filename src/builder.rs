//! Builder for [`LogentriesOutput`](crate::output::LogentriesOutput).
//!
//! Hosts that deserialise an [`OutputConfig`](crate::config::OutputConfig)
//! section can call [`LogentriesOutput::from_config`] directly; the
//! builder exists for programmatic construction and exposes the retry
//! and timing knobs that the config surface deliberately does not.

use std::{path::PathBuf, thread, time::Duration};

use thiserror::Error;

use crate::{
    config::{
        DEFAULT_MAX_RETRIES, DEFAULT_PORT, DEFAULT_RETRY_BASE, DEFAULT_TAG_ACCESS_LOG,
        DEFAULT_TAG_ERROR_LOG, OutputConfig, RETRY_FACTOR, RetryPolicy,
    },
    output::LogentriesOutput,
    transport::{ConnectionManager, DEFAULT_CONNECT_TIMEOUT},
};

/// Errors that may occur while building an output.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Invalid user supplied configuration.
    #[error("invalid output configuration: {0}")]
    InvalidConfig(String),
}

/// Fluent construction of a [`LogentriesOutput`].
pub struct OutputBuilder {
    host: Option<String>,
    port: u16,
    path: Option<PathBuf>,
    max_retries: u32,
    use_ssl: bool,
    tag_access_log: String,
    tag_error_log: String,
    retry_base: Duration,
    connect_timeout: Duration,
    sleep: Box<dyn Fn(Duration) + Send>,
}

impl Default for OutputBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputBuilder {
    pub fn new() -> Self {
        Self {
            host: None,
            port: DEFAULT_PORT,
            path: None,
            max_retries: DEFAULT_MAX_RETRIES,
            use_ssl: false,
            tag_access_log: DEFAULT_TAG_ACCESS_LOG.to_owned(),
            tag_error_log: DEFAULT_TAG_ERROR_LOG.to_owned(),
            retry_base: DEFAULT_RETRY_BASE,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            sleep: Box::new(thread::sleep),
        }
    }

    /// Destination host for plain TCP delivery.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Destination port for plain TCP delivery.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Location of the token table file.
    pub fn with_token_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Retries allowed per record before the batch fails.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Enable TLS towards the fixed ingestion endpoint.
    pub fn with_use_ssl(mut self, use_ssl: bool) -> Self {
        self.use_ssl = use_ssl;
        self
    }

    /// Tag whose exact match selects the `access` sub-token.
    pub fn with_tag_access_log(mut self, tag: impl Into<String>) -> Self {
        self.tag_access_log = tag.into();
        self
    }

    /// Tag whose exact match selects the `error` sub-token.
    pub fn with_tag_error_log(mut self, tag: impl Into<String>) -> Self {
        self.tag_error_log = tag.into();
        self
    }

    /// Override the backoff time unit (intended for tests).
    pub fn with_retry_base(mut self, base: Duration) -> Self {
        self.retry_base = base;
        self
    }

    /// Override the connection establishment timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Replace the backoff sleep with a custom hook (intended for tests).
    pub fn with_sleep_fn(mut self, sleep: impl Fn(Duration) + Send + 'static) -> Self {
        self.sleep = Box::new(sleep);
        self
    }

    /// Validate the configuration and build the output.
    pub fn build(self) -> Result<LogentriesOutput, BuildError> {
        let host = self
            .host
            .filter(|host| !host.is_empty())
            .ok_or_else(|| BuildError::InvalidConfig("host must be set".into()))?;
        let path = self
            .path
            .filter(|path| !path.as_os_str().is_empty())
            .ok_or_else(|| BuildError::InvalidConfig("token table path must be set".into()))?;
        if self.retry_base.is_zero() {
            return Err(BuildError::InvalidConfig(
                "retry base must be greater than zero".into(),
            ));
        }
        if self.connect_timeout.is_zero() {
            return Err(BuildError::InvalidConfig(
                "connect timeout must be greater than zero".into(),
            ));
        }

        let config = OutputConfig {
            host,
            port: self.port,
            path,
            max_retries: self.max_retries,
            use_ssl: self.use_ssl,
            tag_access_log: self.tag_access_log,
            tag_error_log: self.tag_error_log,
        };
        let retry = RetryPolicy {
            max_retries: self.max_retries,
            base: self.retry_base,
            factor: RETRY_FACTOR,
        };
        let connection =
            ConnectionManager::from_config(&config).with_connect_timeout(self.connect_timeout);
        Ok(LogentriesOutput::with_parts(
            config, retry, connection, self.sleep,
        ))
    }
}

impl std::fmt::Debug for OutputBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputBuilder")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("path", &self.path)
            .field("max_retries", &self.max_retries)
            .field("use_ssl", &self.use_ssl)
            .finish()
    }
}
