//! DHCPv4 wire handling
//!
//! This module contains the DHCPv4-specific pieces of the DORA exchange:
//! - Discover and Request frame construction
//! - Reply parsing and field extraction

pub mod message;
pub mod reply;

#[cfg(test)]
pub(crate) mod tests;

pub use message::{build_dhcp_discover, build_dhcp_request, DhcpFrame};
pub use reply::{extract_ack_info, extract_offer_info, AckInfo, DhcpReply, OfferInfo};
