use crate::{
    error::MirageError,
    identity::{ClientIdentity, MacAddr, ETH_ALEN},
};
use bytes::{BufMut as _, Bytes, BytesMut};
use dhcproto::v4::{MessageType, OptionCode};
use std::net::Ipv4Addr;

pub const DHCP_CLIENT_PORT: u16 = 68;
pub const DHCP_SERVER_PORT: u16 = 67;

pub(crate) const BOOTREQUEST: u8 = 1;
pub(crate) const BOOTREPLY: u8 = 2;
pub(crate) const DHCP_MAGIC_COOKIE: [u8; 4] = [99, 130, 83, 99];

const HTYPE_ETHERNET: u8 = 1;
const BROADCAST_FLAG: u16 = 0x8000;
const CHADDR_LEN: usize = 16;
const SNAME_LEN: usize = 64;
const FILE_LEN: usize = 128;
// RFC 1542 minimum BOOTP message size, reached with Pad (0) bytes after End.
const BOOTP_MIN_LEN: usize = 300;
const DEFAULT_TTL: u8 = 64;

const MAX_MESSAGE_SIZE: u16 = 1500;
const REQUESTED_LEASE_SECS: u32 = 30;

/// Option codes asked of the server in both Discover and Request.
pub const PARAMETER_REQUEST_LIST: [u8; 12] = [1, 121, 3, 6, 15, 108, 114, 119, 252, 95, 44, 46];

/// An outbound Ethernet/IPv4/UDP/BOOTP frame ready for the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct DhcpFrame {
    message_type: MessageType,
    xid: u32,
    client_mac: MacAddr,
    bytes: Bytes,
}

impl DhcpFrame {
    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    pub fn xid(&self) -> u32 {
        self.xid
    }

    pub fn client_mac(&self) -> MacAddr {
        self.client_mac
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Constructs a DHCP Discover frame.
pub fn build_dhcp_discover(identity: &ClientIdentity) -> Result<DhcpFrame, MirageError> {
    let mut buf = BytesMut::with_capacity(BOOTP_MIN_LEN);
    put_bootp_header(&mut buf, identity);

    // DHCP Message Type (53) - DHCPDISCOVER
    put_option(&mut buf, OptionCode::MessageType, &[u8::from(MessageType::Discover)])?;

    // Parameter Request List (55)
    put_option(&mut buf, OptionCode::ParameterRequestList, &PARAMETER_REQUEST_LIST)?;

    // Maximum DHCP Message Size (57)
    put_option(&mut buf, OptionCode::MaxMessageSize, &MAX_MESSAGE_SIZE.to_be_bytes())?;

    // Client Identifier (61): htype Ethernet followed by the MAC address
    let mut client_id = BytesMut::with_capacity(1 + ETH_ALEN);
    client_id.put_u8(HTYPE_ETHERNET);
    client_id.put_slice(&identity.mac().octets());
    put_option(&mut buf, OptionCode::ClientIdentifier, &client_id)?;

    // IP Address Lease Time (51), kept short for a throwaway lease
    put_option(&mut buf, OptionCode::AddressLeaseTime, &REQUESTED_LEASE_SECS.to_be_bytes())?;

    // Host Name (12)
    put_option(&mut buf, OptionCode::Hostname, identity.hostname().as_bytes())?;

    finish(buf, identity, MessageType::Discover)
}

/// Constructs a DHCP Request frame for the address offered by `server_id`.
pub fn build_dhcp_request(
    identity: &ClientIdentity,
    server_id: Ipv4Addr,
    offered_ip: Ipv4Addr,
) -> Result<DhcpFrame, MirageError> {
    let mut buf = BytesMut::with_capacity(BOOTP_MIN_LEN);
    put_bootp_header(&mut buf, identity);

    // DHCP Message Type (53) - DHCPREQUEST
    put_option(&mut buf, OptionCode::MessageType, &[u8::from(MessageType::Request)])?;

    // Server Identifier (54), echoed verbatim from the offer
    put_option(&mut buf, OptionCode::ServerIdentifier, &server_id.octets())?;

    // Requested IP Address (50)
    put_option(&mut buf, OptionCode::RequestedIpAddress, &offered_ip.octets())?;

    // Parameter Request List (55) - same as Discover
    put_option(&mut buf, OptionCode::ParameterRequestList, &PARAMETER_REQUEST_LIST)?;

    // Host Name (12)
    put_option(&mut buf, OptionCode::Hostname, identity.hostname().as_bytes())?;

    finish(buf, identity, MessageType::Request)
}

fn put_bootp_header(buf: &mut BytesMut, identity: &ClientIdentity) {
    buf.put_u8(BOOTREQUEST);
    buf.put_u8(HTYPE_ETHERNET);
    buf.put_u8(ETH_ALEN as u8);
    buf.put_u8(0); // hops
    buf.put_u32(identity.xid());
    buf.put_u16(0); // secs
    buf.put_u16(BROADCAST_FLAG);
    // ciaddr, yiaddr, siaddr, giaddr
    for _ in 0..4 {
        buf.put_slice(&Ipv4Addr::UNSPECIFIED.octets());
    }
    buf.put_slice(&identity.mac().octets());
    buf.put_bytes(0, CHADDR_LEN - ETH_ALEN);
    buf.put_bytes(0, SNAME_LEN + FILE_LEN);
    buf.put_slice(&DHCP_MAGIC_COOKIE);
}

fn put_option(buf: &mut BytesMut, code: OptionCode, value: &[u8]) -> Result<(), MirageError> {
    let len = u8::try_from(value.len()).map_err(|_| {
        MirageError::FrameBuild(format!(
            "option {} value is {} bytes, limit is 255",
            u8::from(code),
            value.len()
        ))
    })?;
    buf.put_u8(code.into());
    buf.put_u8(len);
    buf.put_slice(value);
    Ok(())
}

fn finish(
    mut buf: BytesMut,
    identity: &ClientIdentity,
    message_type: MessageType,
) -> Result<DhcpFrame, MirageError> {
    buf.put_u8(OptionCode::End.into());
    if buf.len() < BOOTP_MIN_LEN {
        let padding = BOOTP_MIN_LEN - buf.len();
        buf.put_bytes(0, padding);
    }

    let bytes = gen_eth_packet(identity.mac(), &buf)?;
    tracing::debug!(
        "Built {:?} frame: xid={:#010x}, {} bytes",
        message_type,
        identity.xid(),
        bytes.len()
    );

    Ok(DhcpFrame {
        message_type,
        xid: identity.xid(),
        client_mac: identity.mac(),
        bytes,
    })
}

/// Wraps a BOOTP payload in broadcast Ethernet II, IPv4 and UDP headers.
fn gen_eth_packet(src_mac: MacAddr, payload: &[u8]) -> Result<Bytes, MirageError> {
    let builder = etherparse::PacketBuilder::ethernet2(src_mac.octets(), MacAddr::BROADCAST.octets())
        .ipv4(
            Ipv4Addr::UNSPECIFIED.octets(),
            Ipv4Addr::BROADCAST.octets(),
            DEFAULT_TTL,
        )
        .udp(DHCP_CLIENT_PORT, DHCP_SERVER_PORT);

    let mut packet = Vec::<u8>::with_capacity(builder.size(payload.len()));
    builder
        .write(&mut packet, payload)
        .map_err(|e| MirageError::FrameBuild(format!("failed to generate ethernet packet: {e}")))?;

    Ok(Bytes::from(packet))
}
