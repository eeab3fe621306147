//! DHCP client implementation
//!
//! This module contains the DORA driver including:
//! - The bounded retry policy shared by the Discover and Request phases
//! - State machine sequencing
//! - The resulting lease report

use crate::{
    config::ClientConfig,
    error::{FailureReason, MirageError, Phase},
    identity::ClientIdentity,
    network::{RawSocketTransceiver, Transceiver},
    v4::{
        build_dhcp_discover, build_dhcp_request, extract_ack_info, extract_offer_info, DhcpFrame,
        DhcpReply,
    },
};
use dhcproto::v4::MessageType;
use std::{fmt, net::Ipv4Addr, time::Duration};

/// States of a single lease acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoraState {
    Start,
    Discovering,
    OfferReceived,
    Requesting,
    Bound,
    Failed,
}

impl DoraState {
    pub fn name(&self) -> &'static str {
        match self {
            DoraState::Start => "Start",
            DoraState::Discovering => "Discovering",
            DoraState::OfferReceived => "OfferReceived",
            DoraState::Requesting => "Requesting",
            DoraState::Bound => "Bound",
            DoraState::Failed => "Failed",
        }
    }
}

/// The lease obtained by a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseResult {
    pub offered_ip: Ipv4Addr,
    pub server_id: Ipv4Addr,
    pub subnet_mask: Option<Ipv4Addr>,
    pub router: Option<Ipv4Addr>,
    pub lease_seconds: Option<u32>,
}

impl fmt::Display for LeaseResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Obtained IP: {}", self.offered_ip)?;
        write!(f, "DHCP Server: {}", self.server_id)?;
        if let Some(mask) = self.subnet_mask {
            write!(f, "\nSubnet Mask: {mask}")?;
        }
        if let Some(router) = self.router {
            write!(f, "\nDefault Gateway: {router}")?;
        }
        if let Some(secs) = self.lease_seconds {
            write!(f, "\nLease Time: {secs} seconds")?;
        }
        Ok(())
    }
}

/// Sends `frame` up to `max_attempts` times, each time waiting `timeout` for a reply.
///
/// The first usable reply wins. A reply that cannot be decoded costs the
/// attempt it arrived on but does not end the loop. Returns `None` once every
/// attempt has come back empty.
pub async fn send_with_retries<T: Transceiver>(
    transceiver: &mut T,
    frame: &DhcpFrame,
    max_attempts: u32,
    timeout: Duration,
) -> Result<Option<DhcpReply>, MirageError> {
    for attempt in 1..=max_attempts {
        tracing::info!(
            "Sending DHCP {:?} (attempt {}/{})",
            frame.message_type(),
            attempt,
            max_attempts
        );

        let replies = transceiver.exchange(frame, timeout).await?;
        match replies.first() {
            Some(raw) => match DhcpReply::parse_eth_packet(raw) {
                Ok(reply) => return Ok(Some(reply)),
                Err(e) => tracing::warn!("Discarding unusable reply on attempt {}: {}", attempt, e),
            },
            None => tracing::warn!(
                "No reply to DHCP {:?} within {:?}",
                frame.message_type(),
                timeout
            ),
        }
    }
    Ok(None)
}

pub struct DoraClient<T> {
    config: ClientConfig,
    identity: ClientIdentity,
    transceiver: T,
    state: DoraState,
}

impl DoraClient<RawSocketTransceiver> {
    /// Creates a client on a raw socket bound to the configured interface.
    pub fn bind(config: ClientConfig, identity: ClientIdentity) -> Result<Self, MirageError> {
        let transceiver = RawSocketTransceiver::bind(&config.interface)?;
        Ok(Self::new(config, identity, transceiver))
    }
}

impl<T: Transceiver> DoraClient<T> {
    pub fn new(config: ClientConfig, identity: ClientIdentity, transceiver: T) -> Self {
        Self {
            config,
            identity,
            transceiver,
            state: DoraState::Start,
        }
    }

    pub fn state(&self) -> DoraState {
        self.state
    }

    /// Name of the current state, for logging.
    pub fn state_name(&self) -> &'static str {
        self.state.name()
    }

    pub fn identity(&self) -> &ClientIdentity {
        &self.identity
    }

    pub fn transceiver(&self) -> &T {
        &self.transceiver
    }

    /// Runs one Discover/Offer/Request/Ack exchange.
    ///
    /// Any error leaves the client in [`DoraState::Failed`]; there is no
    /// restart from the beginning.
    pub async fn run(&mut self) -> Result<LeaseResult, MirageError> {
        let result = self.acquire().await;
        if let Err(e) = &result {
            tracing::error!("DORA failed in state {}: {}", self.state_name(), e);
            self.transition(DoraState::Failed);
        }
        result
    }

    async fn acquire(&mut self) -> Result<LeaseResult, MirageError> {
        let discover = build_dhcp_discover(&self.identity)?;
        self.transition(DoraState::Discovering);

        let offer = send_with_retries(
            &mut self.transceiver,
            &discover,
            self.config.discover_retries,
            self.config.discover_timeout,
        )
        .await?
        .ok_or_else(|| MirageError::phase_failed(Phase::Discover, FailureReason::NoOffer))?;
        self.transition(DoraState::OfferReceived);

        let offer_info = extract_offer_info(&offer)
            .map_err(|reason| MirageError::phase_failed(Phase::Discover, reason))?;
        tracing::info!("Offered IP: {}", offer_info.offered_ip);
        tracing::info!("DHCP Server ID: {}", offer_info.server_id);

        let request = build_dhcp_request(&self.identity, offer_info.server_id, offer_info.offered_ip)?;
        self.transition(DoraState::Requesting);

        let ack = send_with_retries(
            &mut self.transceiver,
            &request,
            self.config.request_retries,
            self.config.request_timeout,
        )
        .await?
        .ok_or_else(|| MirageError::phase_failed(Phase::Request, FailureReason::NoAck))?;

        // Any reply to the Request counts as the acknowledgment.
        if ack.message_type() == Some(MessageType::Nak) {
            tracing::warn!("Server answered the Request with a NAK, treating it as acknowledged");
        }
        self.transition(DoraState::Bound);

        let ack_info = extract_ack_info(&ack);
        let lease = LeaseResult {
            offered_ip: offer_info.offered_ip,
            server_id: offer_info.server_id,
            subnet_mask: ack_info.subnet_mask,
            router: ack_info.router,
            lease_seconds: ack_info.lease_seconds,
        };
        tracing::info!("DHCP Bind Successful! Lease: {:?}", lease);
        Ok(lease)
    }

    fn transition(&mut self, next: DoraState) {
        tracing::info!("State: {} -> {}", self.state.name(), next.name());
        self.state = next;
    }
}
