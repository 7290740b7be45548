//! # Client Configuration & Constants
//!
//! Every magic number the client relies on lives here, next to the one
//! typed configuration struct an application assembles at startup.
//!
//! There is no global configuration. [`ClientConfig`] is loaded once (from
//! JSON, or built in code), validated, and then its pieces are handed to
//! the components that need them: the [`RetryPolicy`] to the requester,
//! the chain id to whoever builds transactions, the log settings to
//! [`ClientConfig::init_logging`].

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use tracing_subscriber::util::TryInitError;

use crate::logging::{self, LogFormat};
use crate::transaction::types::ChainIdHash;

// ---------------------------------------------------------------------------
// Encoding Versions
// ---------------------------------------------------------------------------

/// Version byte of an account address in text form.
pub const ACCOUNT_ADDRESS_VERSION: u8 = 0x42;

/// Version byte of a password-sealed private key in text form.
pub const ENCRYPTED_PRIVATE_KEY_VERSION: u8 = 0xAA;

/// Version byte of a plaintext private key in text form. Distinct from the
/// sealed envelope so the two can never be confused.
pub const PRIVATE_KEY_VERSION: u8 = 0xAB;

// ---------------------------------------------------------------------------
// Cryptographic Parameters
// ---------------------------------------------------------------------------

/// secp256k1 private scalar length in bytes.
pub const PRIVATE_KEY_LENGTH: usize = 32;

/// Account address length: parity byte plus 32-byte X coordinate.
pub const ACCOUNT_ADDRESS_LENGTH: usize = 33;

/// SHA-256 output length.
pub const HASH_OUTPUT_LENGTH: usize = 32;

/// AES-256-GCM key length in bytes.
pub const AES_KEY_LENGTH: usize = 32;

/// AES-256-GCM nonce length in bytes. Twelve. Not 16. Not 8.
pub const AES_NONCE_LENGTH: usize = 12;

/// AES-256-GCM authentication tag length in bytes.
pub const AES_TAG_LENGTH: usize = 16;

// ---------------------------------------------------------------------------
// Retry Defaults
// ---------------------------------------------------------------------------

/// Retries after the first attempt. Two is enough to ride out one stale
/// nonce plus one racing sender.
pub const DEFAULT_TRY_COUNT: u32 = 2;

/// Pause between attempts. Long enough for the node to settle a racing
/// transaction, short enough that users don't notice.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// Prefix for every Prometheus metric the client registers.
pub const DEFAULT_METRICS_PREFIX: &str = "nova_client";

/// Default `tracing` filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_LEVEL: &str = "info";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// RetryPolicy
// ---------------------------------------------------------------------------

/// How hard the requester tries before giving up.
///
/// `try_count` is the number of *retries*: a request makes at most
/// `1 + try_count` submissions. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    try_count: u32,
    interval: Duration,
    retry_on_connection_error: bool,
}

impl RetryPolicy {
    /// Build a policy. `try_count` must be at least 1.
    pub fn new(try_count: u32, interval: Duration) -> Result<Self, ConfigError> {
        if try_count == 0 {
            return Err(ConfigError::Invalid("try_count must be >= 1".into()));
        }
        Ok(Self {
            try_count,
            interval,
            retry_on_connection_error: false,
        })
    }

    /// Also treat transport failures as retryable. Off by default: a
    /// connection error says nothing about the nonce, and resubmitting
    /// blind can double-spend a transaction that actually landed.
    pub fn with_connection_retries(mut self, enabled: bool) -> Self {
        self.retry_on_connection_error = enabled;
        self
    }

    pub fn try_count(&self) -> u32 {
        self.try_count
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn retry_on_connection_error(&self) -> bool {
        self.retry_on_connection_error
    }

    /// Upper bound on submissions for one request.
    pub fn max_attempts(&self) -> u32 {
        self.try_count.saturating_add(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            try_count: DEFAULT_TRY_COUNT,
            interval: DEFAULT_RETRY_INTERVAL,
            retry_on_connection_error: false,
        }
    }
}

// ---------------------------------------------------------------------------
// ClientConfig
// ---------------------------------------------------------------------------

/// Retry settings as they appear in a config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    pub try_count: u32,
    pub interval_ms: u64,
    pub retry_on_connection_error: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            try_count: DEFAULT_TRY_COUNT,
            interval_ms: DEFAULT_RETRY_INTERVAL.as_millis() as u64,
            retry_on_connection_error: false,
        }
    }
}

/// Everything a client needs, assembled once at startup.
///
/// ```json
/// {
///   "chain_id": "<base58 chain id hash>",
///   "retry": { "try_count": 3, "interval_ms": 250 },
///   "log_level": "nova_client=debug",
///   "log_format": "json"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    pub chain_id: Option<ChainIdHash>,
    pub retry: RetryConfig,
    pub log_level: String,
    pub log_format: LogFormat,
    pub metrics_prefix: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            chain_id: None,
            retry: RetryConfig::default(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_format: LogFormat::Pretty,
            metrics_prefix: DEFAULT_METRICS_PREFIX.to_string(),
        }
    }
}

impl ClientConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Reject values no component can work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.try_count == 0 {
            return Err(ConfigError::Invalid("retry.try_count must be >= 1".into()));
        }
        if self.metrics_prefix.is_empty() {
            return Err(ConfigError::Invalid("metrics_prefix must not be empty".into()));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> Result<RetryPolicy, ConfigError> {
        Ok(RetryPolicy::new(
            self.retry.try_count,
            Duration::from_millis(self.retry.interval_ms),
        )?
        .with_connection_retries(self.retry.retry_on_connection_error))
    }

    /// Install the global `tracing` subscriber with the configured level
    /// and format. `RUST_LOG` still wins when set.
    pub fn init_logging(&self) -> Result<(), TryInitError> {
        logging::init_logging(&self.log_level, self.log_format)
    }

    /// The configured chain, or an error if none was set.
    pub fn chain_id(&self) -> Result<ChainIdHash, ConfigError> {
        self.chain_id
            .ok_or_else(|| ConfigError::Invalid("chain_id is not configured".into()))
    }
}
