use crate::{
    error::MirageError,
    v4::{reply::matches_transaction, DhcpFrame},
};
use bytes::Bytes;
use socket2::Socket;
use std::{future::Future, io, time::Duration};
use thiserror::Error;
use tokio::{io::unix::AsyncFd, time::Instant};

// Room for a full 1500-byte IP datagram plus the Ethernet header.
const RECV_BUFFER_LEN: usize = 2048;

/// Defines all possible errors for socket operations.
#[derive(Error, Debug)]
pub enum SocketError {
    #[error("Failed to create a raw packet socket")]
    CreateSocket(#[source] io::Error),

    #[error("Invalid interface name '{0}'")]
    InvalidInterfaceName(String),

    #[error("Network interface '{interface}' not found")]
    InterfaceNotFound {
        interface: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to bind packet socket to interface '{interface}'")]
    BindToDevice {
        interface: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to set socket to non-blocking mode")]
    SetNonBlocking(#[source] io::Error),

    #[error("Failed to register socket with the async runtime")]
    RegisterAsync(#[source] io::Error),

    #[error("Failed to send frame")]
    Send(#[source] io::Error),

    #[error("Failed to receive frame")]
    Receive(#[source] io::Error),

    #[allow(dead_code)]
    #[error("Raw link-layer sockets are not implemented on this platform")]
    NotImplemented,
}

/// Sends a frame on an interface and gathers the replies that answer it.
pub trait Transceiver {
    /// Sends `frame` and returns the frames matching its transaction that
    /// arrive within `timeout`. An empty list means the attempt timed out.
    fn exchange(
        &mut self,
        frame: &DhcpFrame,
        timeout: Duration,
    ) -> impl Future<Output = Result<Vec<Bytes>, MirageError>> + Send;
}

/// A transceiver on a raw `AF_PACKET` socket bound to one interface.
///
/// Frames are written with their own Ethernet header, so the source MAC on
/// the wire is whatever the frame carries rather than the interface's own.
pub struct RawSocketTransceiver {
    interface: String,
    fd: AsyncFd<Socket>,
}

impl RawSocketTransceiver {
    /// Opens a packet socket for IPv4 frames bound to `interface`.
    ///
    /// Requires `CAP_NET_RAW` and must be called inside a Tokio runtime.
    #[cfg(target_os = "linux")]
    pub fn bind(interface: &str) -> Result<Self, SocketError> {
        use socket2::{Domain, Protocol, Type};
        use std::{ffi::CString, os::fd::AsRawFd};

        let protocol = (libc::ETH_P_IP as u16).to_be();
        let socket = Socket::new(
            Domain::PACKET,
            Type::RAW,
            Some(Protocol::from(i32::from(protocol))),
        )
        .map_err(SocketError::CreateSocket)?;

        let ifname = CString::new(interface)
            .map_err(|_| SocketError::InvalidInterfaceName(interface.to_string()))?;
        // SAFETY: `ifname` is a valid NUL-terminated string for the duration of the call.
        let if_index = unsafe { libc::if_nametoindex(ifname.as_ptr()) };
        if if_index == 0 {
            return Err(SocketError::InterfaceNotFound {
                interface: interface.to_string(),
                source: io::Error::last_os_error(),
            });
        }

        // SAFETY: `sockaddr_ll` is plain old data, all-zeroes is a valid value.
        let mut addr: libc::sockaddr_ll = unsafe { std::mem::zeroed() };
        addr.sll_family = libc::AF_PACKET as libc::c_ushort;
        addr.sll_protocol = protocol;
        addr.sll_ifindex = if_index as libc::c_int;

        // SAFETY: the fd is owned by `socket` and `addr` is a fully initialised sockaddr_ll.
        let ret = unsafe {
            libc::bind(
                socket.as_raw_fd(),
                &addr as *const libc::sockaddr_ll as *const libc::sockaddr,
                std::mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
            )
        };
        if ret < 0 {
            return Err(SocketError::BindToDevice {
                interface: interface.to_string(),
                source: io::Error::last_os_error(),
            });
        }

        socket
            .set_nonblocking(true)
            .map_err(SocketError::SetNonBlocking)?;
        let fd = AsyncFd::new(socket).map_err(SocketError::RegisterAsync)?;

        tracing::debug!("Raw packet socket bound to {} (ifindex {})", interface, if_index);
        Ok(Self {
            interface: interface.to_string(),
            fd,
        })
    }

    /// Fallback for systems without `AF_PACKET`.
    #[cfg(not(target_os = "linux"))]
    pub fn bind(_interface: &str) -> Result<Self, SocketError> {
        Err(SocketError::NotImplemented)
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    async fn send_frame(&self, frame: &[u8]) -> Result<(), SocketError> {
        loop {
            let mut guard = self.fd.writable().await.map_err(SocketError::Send)?;
            match guard.try_io(|inner| inner.get_ref().send(frame)) {
                Ok(result) => {
                    let sent = result.map_err(SocketError::Send)?;
                    tracing::debug!("Sent {} bytes on {}", sent, self.interface);
                    return Ok(());
                }
                Err(_would_block) => continue,
            }
        }
    }

    async fn recv_frame(&self, buf: &mut [u8]) -> Result<usize, SocketError> {
        use std::io::Read as _;

        loop {
            let mut guard = self.fd.readable().await.map_err(SocketError::Receive)?;
            match guard.try_io(|inner| {
                let mut socket: &Socket = inner.get_ref();
                socket.read(buf)
            }) {
                Ok(result) => return result.map_err(SocketError::Receive),
                Err(_would_block) => continue,
            }
        }
    }
}

impl Transceiver for RawSocketTransceiver {
    async fn exchange(
        &mut self,
        frame: &DhcpFrame,
        timeout: Duration,
    ) -> Result<Vec<Bytes>, MirageError> {
        // Only frames arriving after this send may answer it.
        let mut buf = vec![0u8; RECV_BUFFER_LEN];
        let stale = drain_pending(self.fd.get_ref(), &mut buf).map_err(SocketError::Receive)?;
        if stale > 0 {
            tracing::debug!("Discarded {} queued frames before sending", stale);
        }

        self.send_frame(frame.as_bytes()).await?;

        let deadline = Instant::now() + timeout;
        loop {
            match tokio::time::timeout_at(deadline, self.recv_frame(&mut buf)).await {
                Ok(Ok(len)) => {
                    let data = &buf[..len];
                    if matches_transaction(data, frame.xid()) {
                        tracing::debug!("Received {} byte reply for xid {:#010x}", len, frame.xid());
                        return Ok(vec![Bytes::copy_from_slice(data)]);
                    }
                    tracing::trace!("Ignoring unrelated frame of {} bytes", len);
                }
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => return Ok(Vec::new()),
            }
        }
    }
}

/// Reads and discards every frame already queued on a non-blocking source.
///
/// Returns the number of frames discarded.
fn drain_pending<R: io::Read>(mut source: R, buf: &mut [u8]) -> io::Result<usize> {
    let mut drained = 0;
    loop {
        match source.read(buf) {
            Ok(_) => drained += 1,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(drained),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}
