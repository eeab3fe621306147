use crate::network::SocketError;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MirageError {
    #[error("Socket operation failed")]
    Socket(#[from] SocketError),

    #[error("Failed to build DHCP frame: {0}")]
    FrameBuild(String),

    #[error("Malformed DHCP frame: {0}")]
    MalformedFrame(String),

    #[error("{phase} phase failed: {reason}")]
    PhaseFailed {
        phase: Phase,
        reason: FailureReason,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl MirageError {
    pub(crate) fn phase_failed(phase: Phase, reason: FailureReason) -> Self {
        Self::PhaseFailed { phase, reason }
    }
}

/// The two request/reply exchanges of a DORA run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Discover,
    Request,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Discover => write!(f, "Discover"),
            Phase::Request => write!(f, "Request"),
        }
    }
}

/// Why a run ended in the `Failed` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// Discover retry budget exhausted without a single reply.
    NoOffer,
    /// Request retry budget exhausted without a single reply.
    NoAck,
    /// The offer carried no server identifier (option 54).
    MissingServerIdentifier,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::NoOffer => write!(f, "no offer after retries"),
            FailureReason::NoAck => write!(f, "no acknowledgment after retries"),
            FailureReason::MissingServerIdentifier => write!(f, "missing server identifier"),
        }
    }
}
