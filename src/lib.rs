//! # Mirage - A DHCPv4 Lease Probe
//!
//! Mirage acquires a single DHCPv4 lease while presenting a synthetic,
//! randomly generated hardware address and client identity. It builds the
//! Discover and Request frames itself, down to the Ethernet header, and sends
//! them on a raw link-layer socket, so no OS DHCP client and no real host
//! identity is involved.
//!
//! ## Features
//!
//! - Byte-exact Discover/Request construction (RFC 2131/2132)
//! - Bounded per-phase retries with a fixed timeout per attempt
//! - Asynchronous operation using Tokio
//! - Pluggable transceiver for testing without a network
//!
//! ## Example
//!
//! ```rust,no_run
//! use mirage::{ClientConfig, ClientIdentity, DoraClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::new("eth0".to_string());
//!     let identity = ClientIdentity::generate();
//!     let mut client = DoraClient::bind(config, identity)?;
//!     let lease = client.run().await?;
//!     println!("{lease}");
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod identity;
pub mod network;
pub mod v4;

pub use client::{send_with_retries, DoraClient, DoraState, LeaseResult};
pub use config::{Args, ClientConfig};
pub use error::{FailureReason, MirageError, Phase};
pub use identity::{ClientIdentity, MacAddr};
pub use network::{RawSocketTransceiver, Transceiver};
