use super::message::{DHCP_CLIENT_PORT, DHCP_MAGIC_COOKIE, DHCP_SERVER_PORT, PARAMETER_REQUEST_LIST};
use super::reply::matches_transaction;
use super::*;
use crate::{
    error::{FailureReason, MirageError},
    identity::{ClientIdentity, MacAddr},
};
use bytes::Bytes;
use dhcproto::{v4, Decodable, Decoder, Encodable, Encoder};
use std::net::Ipv4Addr;

const SERVER_MAC: [u8; 6] = [0x00, 0x0c, 0x29, 0xa8, 0x92, 0xf4];
// Ethernet (14) + IPv4 without options (20) + UDP (8)
const BOOTP_OFFSET: usize = 42;

/// Encodes a BOOTREPLY from 10.0.0.1 and wraps it in a broadcast Ethernet frame.
pub(crate) fn reply_frame(xid: u32, yiaddr: Ipv4Addr, opts: Vec<v4::DhcpOption>) -> Bytes {
    let mut msg = v4::Message::default();
    msg.set_opcode(v4::Opcode::BootReply)
        .set_xid(xid)
        .set_yiaddr(yiaddr)
        .set_flags(v4::Flags::default().set_broadcast());
    for opt in opts {
        msg.opts_mut().insert(opt);
    }

    let mut payload = Vec::new();
    msg.encode(&mut Encoder::new(&mut payload)).unwrap();

    let builder = etherparse::PacketBuilder::ethernet2(SERVER_MAC, [0xff; 6])
        .ipv4([10, 0, 0, 1], [255, 255, 255, 255], 64)
        .udp(DHCP_SERVER_PORT, DHCP_CLIENT_PORT);
    let mut packet = Vec::with_capacity(builder.size(payload.len()));
    builder.write(&mut packet, &payload).unwrap();
    Bytes::from(packet)
}

fn identity() -> ClientIdentity {
    ClientIdentity::new(MacAddr::new([0x5c, 0x39, 0x12, 0x34, 0x56, 0x78]), 0x0001_e240)
}

fn bootp_payload(frame: &DhcpFrame) -> &[u8] {
    &frame.as_bytes()[BOOTP_OFFSET..]
}

/// Walks the option area and returns (code, value) pairs up to and including End.
fn options(payload: &[u8]) -> Vec<(u8, Vec<u8>)> {
    assert_eq!(payload[236..240], DHCP_MAGIC_COOKIE);
    let mut opts = Vec::new();
    let mut i = 240;
    while i < payload.len() {
        match payload[i] {
            0 => i += 1,
            255 => {
                opts.push((255, Vec::new()));
                break;
            }
            code => {
                let len = payload[i + 1] as usize;
                opts.push((code, payload[i + 2..i + 2 + len].to_vec()));
                i += 2 + len;
            }
        }
    }
    opts
}

#[test]
fn test_discover_headers() {
    let frame = build_dhcp_discover(&identity()).unwrap();
    let bytes = frame.as_bytes();

    // Ethernet II: broadcast destination, synthetic source, IPv4 ethertype
    assert_eq!(bytes[0..6], [0xff; 6]);
    assert_eq!(bytes[6..12], identity().mac().octets());
    assert_eq!(bytes[12..14], [0x08, 0x00]);

    // IPv4: 0.0.0.0 -> 255.255.255.255, UDP
    assert_eq!(bytes[14] >> 4, 4);
    assert_eq!(bytes[23], 17);
    assert_eq!(bytes[26..30], [0, 0, 0, 0]);
    assert_eq!(bytes[30..34], [255, 255, 255, 255]);

    // UDP: 68 -> 67
    assert_eq!(bytes[34..36], 68u16.to_be_bytes());
    assert_eq!(bytes[36..38], 67u16.to_be_bytes());

    assert_eq!(frame.message_type(), v4::MessageType::Discover);
    assert_eq!(frame.xid(), identity().xid());
    assert_eq!(frame.client_mac(), identity().mac());
}

#[test]
fn test_build_dhcp_discover() {
    let frame = build_dhcp_discover(&identity()).unwrap();

    // Decode the packet to verify it's valid
    let mut decoder = Decoder::new(bootp_payload(&frame));
    let msg = v4::Message::decode(&mut decoder).unwrap();

    assert_eq!(msg.xid(), 0x0001_e240);
    assert_eq!(msg.chaddr(), &identity().mac().octets()[..]);
    assert_eq!(msg.opcode(), v4::Opcode::BootRequest);
    assert!(msg.flags().broadcast());
    assert_eq!(msg.ciaddr(), Ipv4Addr::UNSPECIFIED);

    let msg_type = msg.opts().get(v4::OptionCode::MessageType);
    assert!(matches!(
        msg_type,
        Some(v4::DhcpOption::MessageType(v4::MessageType::Discover))
    ));

    let hostname = msg.opts().get(v4::OptionCode::Hostname);
    assert!(matches!(hostname, Some(v4::DhcpOption::Hostname(h)) if h == "5c3912345678"));
}

#[test]
fn test_discover_option_order() {
    let frame = build_dhcp_discover(&identity()).unwrap();
    let opts = options(bootp_payload(&frame));

    assert_eq!(
        opts,
        vec![
            (53, vec![1]),
            (55, PARAMETER_REQUEST_LIST.to_vec()),
            (57, vec![0x05, 0xdc]),
            (61, vec![0x01, 0x5c, 0x39, 0x12, 0x34, 0x56, 0x78]),
            (51, vec![0, 0, 0, 30]),
            (12, b"5c3912345678".to_vec()),
            (255, vec![]),
        ]
    );
}

#[test]
fn test_build_dhcp_request() {
    let offered_ip = Ipv4Addr::new(192, 168, 1, 100);
    let server_ip = Ipv4Addr::new(192, 168, 1, 1);

    let frame = build_dhcp_request(&identity(), server_ip, offered_ip).unwrap();

    let mut decoder = Decoder::new(bootp_payload(&frame));
    let msg = v4::Message::decode(&mut decoder).unwrap();

    assert_eq!(msg.xid(), identity().xid());
    assert_eq!(msg.opcode(), v4::Opcode::BootRequest);
    assert!(msg.flags().broadcast());

    let requested_ip = msg.opts().get(v4::OptionCode::RequestedIpAddress);
    assert!(
        matches!(requested_ip, Some(v4::DhcpOption::RequestedIpAddress(ip)) if *ip == offered_ip)
    );

    let server_id = msg.opts().get(v4::OptionCode::ServerIdentifier);
    assert!(matches!(server_id, Some(v4::DhcpOption::ServerIdentifier(ip)) if *ip == server_ip));

    assert_eq!(
        options(bootp_payload(&frame)),
        vec![
            (53, vec![3]),
            (54, vec![192, 168, 1, 1]),
            (50, vec![192, 168, 1, 100]),
            (55, PARAMETER_REQUEST_LIST.to_vec()),
            (12, b"5c3912345678".to_vec()),
            (255, vec![]),
        ]
    );
}

#[test]
fn test_bootp_payload_padded_to_minimum() {
    let frame = build_dhcp_discover(&identity()).unwrap();
    assert_eq!(bootp_payload(&frame).len(), 300);

    let udp_len = u16::from_be_bytes([frame.as_bytes()[38], frame.as_bytes()[39]]);
    assert_eq!(udp_len as usize, 8 + 300);
}

#[test]
fn test_discover_and_request_share_identity() {
    let identity = ClientIdentity::generate();
    let discover = build_dhcp_discover(&identity).unwrap();
    let request =
        build_dhcp_request(&identity, Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 50))
            .unwrap();

    assert_eq!(discover.xid(), request.xid());
    assert_eq!(discover.client_mac(), request.client_mac());
    // xid and chaddr as encoded on the wire
    assert_eq!(bootp_payload(&discover)[4..8], bootp_payload(&request)[4..8]);
    assert_eq!(bootp_payload(&discover)[28..34], bootp_payload(&request)[28..34]);
    assert_eq!(discover.as_bytes()[6..12], request.as_bytes()[6..12]);
}

#[test]
fn test_builders_are_deterministic() {
    let identity = identity();
    let server = Ipv4Addr::new(10, 0, 0, 1);
    let offered = Ipv4Addr::new(10, 0, 0, 50);

    assert_eq!(
        build_dhcp_discover(&identity).unwrap(),
        build_dhcp_discover(&identity).unwrap()
    );
    assert_eq!(
        build_dhcp_request(&identity, server, offered).unwrap().as_bytes(),
        build_dhcp_request(&identity, server, offered).unwrap().as_bytes()
    );
}

#[test]
fn test_extract_offer_info() {
    let frame = reply_frame(
        7,
        Ipv4Addr::new(10, 0, 0, 50),
        vec![
            v4::DhcpOption::MessageType(v4::MessageType::Offer),
            v4::DhcpOption::ServerIdentifier(Ipv4Addr::new(10, 0, 0, 1)),
        ],
    );
    let reply = DhcpReply::parse_eth_packet(&frame).unwrap();

    assert_eq!(reply.xid(), 7);
    assert_eq!(reply.message_type(), Some(v4::MessageType::Offer));
    assert_eq!(
        extract_offer_info(&reply),
        Ok(OfferInfo {
            server_id: Ipv4Addr::new(10, 0, 0, 1),
            offered_ip: Ipv4Addr::new(10, 0, 0, 50),
        })
    );
}

#[test]
fn test_offer_without_server_identifier() {
    let frame = reply_frame(
        7,
        Ipv4Addr::new(10, 0, 0, 50),
        vec![v4::DhcpOption::MessageType(v4::MessageType::Offer)],
    );
    let reply = DhcpReply::parse_eth_packet(&frame).unwrap();

    assert_eq!(
        extract_offer_info(&reply),
        Err(FailureReason::MissingServerIdentifier)
    );
}

#[test]
fn test_extract_ack_info() {
    let frame = reply_frame(
        7,
        Ipv4Addr::new(10, 0, 0, 50),
        vec![
            v4::DhcpOption::MessageType(v4::MessageType::Ack),
            v4::DhcpOption::SubnetMask(Ipv4Addr::new(255, 255, 255, 0)),
            v4::DhcpOption::Router(vec![Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2)]),
            v4::DhcpOption::AddressLeaseTime(3600),
        ],
    );
    let reply = DhcpReply::parse_eth_packet(&frame).unwrap();

    assert_eq!(
        extract_ack_info(&reply),
        AckInfo {
            subnet_mask: Some(Ipv4Addr::new(255, 255, 255, 0)),
            router: Some(Ipv4Addr::new(10, 0, 0, 1)),
            lease_seconds: Some(3600),
        }
    );
}

#[test]
fn test_ack_info_fields_are_optional() {
    let frame = reply_frame(
        7,
        Ipv4Addr::new(10, 0, 0, 50),
        vec![v4::DhcpOption::AddressLeaseTime(120)],
    );
    let reply = DhcpReply::parse_eth_packet(&frame).unwrap();

    assert_eq!(
        extract_ack_info(&reply),
        AckInfo {
            lease_seconds: Some(120),
            ..AckInfo::default()
        }
    );
}

#[test]
fn test_parse_rejects_non_dhcp_frames() {
    assert!(matches!(
        DhcpReply::parse_eth_packet(&[0u8; 10]),
        Err(MirageError::MalformedFrame(_))
    ));

    // Valid Ethernet/IPv4/UDP carrying a payload too short for BOOTP
    let builder = etherparse::PacketBuilder::ethernet2(SERVER_MAC, [0xff; 6])
        .ipv4([10, 0, 0, 1], [255, 255, 255, 255], 64)
        .udp(DHCP_SERVER_PORT, DHCP_CLIENT_PORT);
    let mut packet = Vec::new();
    builder.write(&mut packet, &[2, 1, 6, 0]).unwrap();
    assert!(matches!(
        DhcpReply::parse_eth_packet(&packet),
        Err(MirageError::MalformedFrame(_))
    ));
}

#[test]
fn test_matches_transaction() {
    let reply = reply_frame(0x0001_e240, Ipv4Addr::new(10, 0, 0, 50), vec![]);
    assert!(matches_transaction(&reply, 0x0001_e240));
    assert!(!matches_transaction(&reply, 0x0001_e241));

    // Our own broadcast is seen on the socket too, but it is a BOOTREQUEST to port 67
    let discover = build_dhcp_discover(&identity()).unwrap();
    assert!(!matches_transaction(discover.as_bytes(), identity().xid()));

    assert!(!matches_transaction(&[0u8; 60], 0));
}
