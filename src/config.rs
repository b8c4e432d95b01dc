//! Configuration consumed by the output plugin.
//!
//! The host framework populates [`OutputConfig`] before the plugin is
//! constructed; the plugin itself never reloads or mutates it. Field
//! defaults mirror the plugin's published configuration keys so a config
//! section can omit everything except `host` and `path`.

use std::{path::PathBuf, time::Duration};

use serde::Deserialize;

/// Default destination port for plain TCP connections.
pub const DEFAULT_PORT: u16 = 80;
/// Default number of retries before a send is declared failed.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default tag marking access logs for categorized token selection.
pub const DEFAULT_TAG_ACCESS_LOG: &str = "logs-access";
/// Default tag marking error logs for categorized token selection.
pub const DEFAULT_TAG_ERROR_LOG: &str = "logs-error";
/// Default unit of backoff time between retries.
pub const DEFAULT_RETRY_BASE: Duration = Duration::from_secs(1);
/// Multiplier applied per retry; retry `n` sleeps `base * FACTOR^n`.
pub const RETRY_FACTOR: u32 = 5;

/// Settings for one output instance, set once at startup.
#[derive(Clone, Debug, Deserialize)]
pub struct OutputConfig {
    /// Destination host for plain TCP delivery.
    pub host: String,
    /// Destination port for plain TCP delivery.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Location of the token table file, re-read on every batch.
    pub path: PathBuf,
    /// Retries allowed per record before the batch fails.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Wrap the connection in TLS towards the fixed ingestion endpoint.
    #[serde(default)]
    pub use_ssl: bool,
    /// Tag whose exact match selects the `access` sub-token.
    #[serde(default = "default_tag_access_log")]
    pub tag_access_log: String,
    /// Tag whose exact match selects the `error` sub-token.
    #[serde(default = "default_tag_error_log")]
    pub tag_error_log: String,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_tag_access_log() -> String {
    DEFAULT_TAG_ACCESS_LOG.to_owned()
}

fn default_tag_error_log() -> String {
    DEFAULT_TAG_ERROR_LOG.to_owned()
}

/// Bounded exponential backoff applied between resend attempts.
///
/// Retry `n` (1-based) sleeps `base * factor^n`, so with the default base
/// of one second the sequence is 5 s, 25 s, 125 s. Tests shrink `base` to
/// keep the same shape at millisecond scale.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base: Duration,
    pub factor: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base: DEFAULT_RETRY_BASE,
            factor: RETRY_FACTOR,
        }
    }
}

impl RetryPolicy {
    /// Backoff delay preceding retry `retry` (1-based).
    pub fn delay(&self, retry: u32) -> Duration {
        self.base.saturating_mul(self.factor.saturating_pow(retry))
    }
}
