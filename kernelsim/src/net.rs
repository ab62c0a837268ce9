//! The kernel's UDP socket to SFSS.
//!
//! One connected, non-blocking `UdpSocket`: `connect` fixes the peer address
//! so `send`/`recv` can be used instead of `send_to`/`recv_from`, since the
//! kernel only ever talks to the one configured SFSS endpoint.

use std::io;
use std::net::UdpSocket;

use sfp::SfpMessage;

use crate::error::KernelError;

pub struct SfssLink {
    socket: UdpSocket,
}

impl SfssLink {
    pub fn connect(sfss_addr: &str) -> Result<Self, KernelError> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .map_err(|source| KernelError::SocketConnect { addr: sfss_addr.to_string(), source })?;
        socket
            .connect(sfss_addr)
            .map_err(|source| KernelError::SocketConnect { addr: sfss_addr.to_string(), source })?;
        socket.set_nonblocking(true).map_err(|source| KernelError::SocketConnect {
            addr: sfss_addr.to_string(),
            source,
        })?;
        Ok(SfssLink { socket })
    }

    /// Best-effort send. Failures are logged by the caller and never
    /// propagate: a dropped datagram is a transient operational failure,
    /// not lifecycle-fatal.
    pub fn send_request(&self, message: &SfpMessage) -> io::Result<()> {
        self.socket.send(&message.to_bytes())?;
        Ok(())
    }

    /// Non-blocking receive of one reply datagram, if any is waiting.
    /// Returns `Ok(None)` on `WouldBlock`.
    pub fn try_recv_reply(&self) -> io::Result<Option<SfpMessage>> {
        let mut buf = vec![0u8; SfpMessage::WIRE_SIZE];
        match self.socket.recv(&mut buf) {
            Ok(n) if n == SfpMessage::WIRE_SIZE => Ok(SfpMessage::from_bytes(&buf)),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn as_raw_fd(&self) -> std::os::fd::RawFd {
        use std::os::fd::AsRawFd;
        self.socket.as_raw_fd()
    }
}
