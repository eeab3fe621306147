use crate::error::MirageError;
use clap::Parser;
use std::time::Duration;

const DEFAULT_MAX_RETRIES: u32 = 5;
const DEFAULT_TIMEOUT_SECS: u64 = 1;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// The network interface to send raw frames on (e.g., 'eth0', 'en0')
    #[arg(short, long)]
    pub interface: String,

    /// Seconds to wait for an offer after each Discover attempt
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub discover_timeout: u64,

    /// Seconds to wait for an acknowledgment after each Request attempt
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub request_timeout: u64,

    /// Maximum number of Discover attempts
    #[arg(long, default_value_t = DEFAULT_MAX_RETRIES)]
    pub discover_retries: u32,

    /// Maximum number of Request attempts
    #[arg(long, default_value_t = DEFAULT_MAX_RETRIES)]
    pub request_retries: u32,

    /// Log every frame sent and received
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    pub fn into_config(self) -> Result<ClientConfig, MirageError> {
        if self.discover_retries == 0 || self.request_retries == 0 {
            return Err(MirageError::InvalidConfig(
                "retry counts must be at least 1".to_string(),
            ));
        }
        if self.discover_timeout == 0 || self.request_timeout == 0 {
            return Err(MirageError::InvalidConfig(
                "timeouts must be at least 1 second".to_string(),
            ));
        }

        Ok(ClientConfig {
            interface: self.interface,
            discover_timeout: Duration::from_secs(self.discover_timeout),
            request_timeout: Duration::from_secs(self.request_timeout),
            discover_retries: self.discover_retries,
            request_retries: self.request_retries,
        })
    }
}

/// Immutable settings for a single DORA run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub interface: String,
    pub discover_timeout: Duration,
    pub request_timeout: Duration,
    pub discover_retries: u32,
    pub request_retries: u32,
}

impl ClientConfig {
    pub fn new(interface: String) -> Self {
        Self {
            interface,
            discover_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            discover_retries: DEFAULT_MAX_RETRIES,
            request_retries: DEFAULT_MAX_RETRIES,
        }
    }
}
