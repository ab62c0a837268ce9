//! Lifecycle-fatal errors: the only tier that propagates out of `main` and
//! terminates the process. Transient and protocol-level failures (datagram
//! send failure, malformed line, reply for a non-blocked PCB) are logged and
//! handled inline by the caller; they never construct a `KernelError`.

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    #[error("failed to bind kernel UDP socket: {0}")]
    SocketBind(#[source] io::Error),

    #[error("failed to connect kernel UDP socket to SFSS at {addr}: {source}")]
    SocketConnect { addr: String, #[source] source: io::Error },

    #[error("failed to set up self-pipe for signal notification: {0}")]
    SelfPipe(#[source] io::Error),

    #[error("failed to install signal handler for {signal}: {source}")]
    SignalHandler { signal: &'static str, #[source] source: nix::Error },

    #[error("failed to spawn child process for {role}: {source}")]
    Spawn { role: &'static str, #[source] source: io::Error },

    #[error("failed to set up per-app reply fifo: {0}")]
    ReplyFifoSetup(#[source] io::Error),

    #[error("app id {0} is out of range")]
    AppIdOutOfRange(u32),

    #[error("poll() failed: {0}")]
    Poll(#[source] nix::Error),
}
