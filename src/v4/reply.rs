//! Parsing of inbound DHCP replies
//!
//! A reply arrives as a full Ethernet frame. It is sliced down to the UDP
//! payload and decoded once into a `dhcproto` message, whose option set is
//! then queried by code for the fields each phase needs.

use super::message::{BOOTREPLY, DHCP_CLIENT_PORT};
use crate::error::{FailureReason, MirageError};
use dhcproto::{v4, Decodable};
use std::net::Ipv4Addr;

/// A decoded DHCP reply received from the transceiver.
#[derive(Debug, Clone)]
pub struct DhcpReply {
    msg: v4::Message,
}

impl DhcpReply {
    /// Parses a raw Ethernet frame carrying a DHCP message over UDP.
    pub fn parse_eth_packet(buf: &[u8]) -> Result<Self, MirageError> {
        let packet = etherparse::SlicedPacket::from_ethernet(buf).map_err(|e| {
            MirageError::MalformedFrame(format!("failed to slice ethernet frame: {e}"))
        })?;

        match packet.transport {
            Some(etherparse::TransportSlice::Udp(udp)) => Self::parse(udp.payload()),
            _ => Err(MirageError::MalformedFrame(
                "ethernet frame does not carry a UDP payload".to_string(),
            )),
        }
    }

    /// Parses a bare BOOTP/DHCP payload.
    pub fn parse(payload: &[u8]) -> Result<Self, MirageError> {
        let msg = v4::Message::decode(&mut v4::Decoder::new(payload))
            .map_err(|e| MirageError::MalformedFrame(format!("failed to decode DHCP message: {e}")))?;
        Ok(Self { msg })
    }

    pub fn xid(&self) -> u32 {
        self.msg.xid()
    }

    /// The `yiaddr` field: the address being offered or assigned.
    pub fn your_ip(&self) -> Ipv4Addr {
        self.msg.yiaddr()
    }

    pub fn message_type(&self) -> Option<v4::MessageType> {
        match self.msg.opts().get(v4::OptionCode::MessageType) {
            Some(v4::DhcpOption::MessageType(t)) => Some(*t),
            _ => None,
        }
    }

    pub fn server_identifier(&self) -> Option<Ipv4Addr> {
        match self.msg.opts().get(v4::OptionCode::ServerIdentifier) {
            Some(v4::DhcpOption::ServerIdentifier(ip)) => Some(*ip),
            _ => None,
        }
    }

    pub fn subnet_mask(&self) -> Option<Ipv4Addr> {
        match self.msg.opts().get(v4::OptionCode::SubnetMask) {
            Some(v4::DhcpOption::SubnetMask(mask)) => Some(*mask),
            _ => None,
        }
    }

    /// The first router listed in option 3.
    pub fn router(&self) -> Option<Ipv4Addr> {
        match self.msg.opts().get(v4::OptionCode::Router) {
            Some(v4::DhcpOption::Router(routers)) => routers.first().copied(),
            _ => None,
        }
    }

    pub fn lease_time(&self) -> Option<u32> {
        match self.msg.opts().get(v4::OptionCode::AddressLeaseTime) {
            Some(v4::DhcpOption::AddressLeaseTime(secs)) => Some(*secs),
            _ => None,
        }
    }
}

/// Fields of an offer needed to build the Request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OfferInfo {
    pub server_id: Ipv4Addr,
    pub offered_ip: Ipv4Addr,
}

/// Optional lease parameters reported by the acknowledgment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AckInfo {
    pub subnet_mask: Option<Ipv4Addr>,
    pub router: Option<Ipv4Addr>,
    pub lease_seconds: Option<u32>,
}

pub fn extract_offer_info(reply: &DhcpReply) -> Result<OfferInfo, FailureReason> {
    let server_id = reply
        .server_identifier()
        .ok_or(FailureReason::MissingServerIdentifier)?;

    Ok(OfferInfo {
        server_id,
        offered_ip: reply.your_ip(),
    })
}

pub fn extract_ack_info(reply: &DhcpReply) -> AckInfo {
    AckInfo {
        subnet_mask: reply.subnet_mask(),
        router: reply.router(),
        lease_seconds: reply.lease_time(),
    }
}

/// Whether a raw frame is a BOOTREPLY to the client port echoing `xid`.
pub fn matches_transaction(buf: &[u8], xid: u32) -> bool {
    let Ok(packet) = etherparse::SlicedPacket::from_ethernet(buf) else {
        return false;
    };
    let Some(etherparse::TransportSlice::Udp(udp)) = packet.transport else {
        return false;
    };
    if udp.destination_port() != DHCP_CLIENT_PORT {
        return false;
    }

    let payload = udp.payload();
    payload.len() >= 8 && payload[0] == BOOTREPLY && payload[4..8] == xid.to_be_bytes()
}
