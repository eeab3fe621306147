//! Synthetic client identity
//!
//! Every run presents a freshly generated hardware address and transaction id
//! instead of the host's real ones. The identity is created once and shared
//! read-only by both phases so the server can correlate Discover and Request.

use rand::Rng;
use std::fmt;

/// First two octets of every generated hardware address.
pub const VENDOR_PREFIX: [u8; 2] = [0x5c, 0x39];

pub const ETH_ALEN: usize = 6;

const XID_FIRST_FACTOR_MAX: u32 = 400;
const XID_SECOND_FACTOR_MAX: u32 = 1236;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddr([u8; ETH_ALEN]);

impl MacAddr {
    pub const BROADCAST: MacAddr = MacAddr([0xff; ETH_ALEN]);

    pub const fn new(octets: [u8; ETH_ALEN]) -> Self {
        Self(octets)
    }

    pub fn octets(&self) -> [u8; ETH_ALEN] {
        self.0
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl From<[u8; ETH_ALEN]> for MacAddr {
    fn from(octets: [u8; ETH_ALEN]) -> Self {
        Self(octets)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    mac: MacAddr,
    xid: u32,
    hostname: String,
}

impl ClientIdentity {
    /// Builds an identity from a fixed hardware address and transaction id.
    pub fn new(mac: MacAddr, xid: u32) -> Self {
        let hostname = mac.to_string().replace(':', "");
        Self { mac, xid, hostname }
    }

    /// Generates an identity from the thread-local RNG.
    pub fn generate() -> Self {
        Self::generate_with(&mut rand::rng())
    }

    /// Generates an identity from the given RNG.
    ///
    /// The transaction id is the product of two independent draws and is only
    /// meant for correlation, not unpredictability.
    pub fn generate_with<R: Rng>(rng: &mut R) -> Self {
        let mut octets = [0u8; ETH_ALEN];
        octets[..VENDOR_PREFIX.len()].copy_from_slice(&VENDOR_PREFIX);
        for octet in &mut octets[VENDOR_PREFIX.len()..] {
            *octet = rng.random();
        }

        let xid = rng.random_range(1..=XID_FIRST_FACTOR_MAX)
            * rng.random_range(1..=XID_SECOND_FACTOR_MAX);

        Self::new(MacAddr::new(octets), xid)
    }

    pub fn mac(&self) -> MacAddr {
        self.mac
    }

    pub fn xid(&self) -> u32 {
        self.xid
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }
}
