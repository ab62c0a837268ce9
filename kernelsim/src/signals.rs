//! Self-pipe based signal-to-flag notification.
//!
//! Signal delivery is modelled as edge-triggered flags that a single
//! `poll`-based readiness wait can observe alongside a socket. Real POSIX
//! signal handlers may only call async-signal-safe functions, so each
//! handler here does nothing but `write()` one byte into a pipe and set an
//! atomic flag; the main loop drains the pipe and atomically snapshots+clears
//! the flags before acting on them.

use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::sync::atomic::{AtomicBool, Ordering};

use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::unistd::{self, pipe};

use crate::children::set_nonblocking;
use crate::error::KernelError;

/// Set by the `SIGUSR1` handler (IC notification).
static IC_FLAG: AtomicBool = AtomicBool::new(false);
/// Set by the `SIGUSR2` handler (app notification).
static APP_FLAG: AtomicBool = AtomicBool::new(false);
/// Set by the `SIGINT` handler (snapshot request).
static SNAPSHOT_FLAG: AtomicBool = AtomicBool::new(false);
/// Set by the `SIGCONT` handler (resume request, observed by the
/// supervisor's own process -- distinct from resuming a *child*).
static RESUME_FLAG: AtomicBool = AtomicBool::new(false);

/// Write end of the self-pipe, used by the signal handlers. Raw fd only:
/// `write(2)` on a raw fd is async-signal-safe, constructing an `OwnedFd`
/// is not guaranteed to be.
static mut SELF_PIPE_WRITE: RawFd = -1;

extern "C" fn handle_usr1(_: i32) {
    IC_FLAG.store(true, Ordering::SeqCst);
    notify();
}

extern "C" fn handle_usr2(_: i32) {
    APP_FLAG.store(true, Ordering::SeqCst);
    notify();
}

extern "C" fn handle_int(_: i32) {
    SNAPSHOT_FLAG.store(true, Ordering::SeqCst);
    notify();
}

extern "C" fn handle_cont(_: i32) {
    RESUME_FLAG.store(true, Ordering::SeqCst);
    notify();
}

fn notify() {
    // SAFETY: SELF_PIPE_WRITE is set once, before any handler is installed,
    // and never mutated afterwards.
    let fd = unsafe { SELF_PIPE_WRITE };
    if fd >= 0 {
        let _ = unistd::write(unsafe { std::os::fd::BorrowedFd::borrow_raw(fd) }, &[1u8]);
    }
}

/// The flags a single wakeup may have set, snapshotted and cleared
/// atomically by [`SignalPipe::drain_and_snapshot`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalSnapshot {
    pub ic: bool,
    pub app: bool,
    pub snapshot: bool,
    pub resume: bool,
}

impl SignalSnapshot {
    pub fn any(&self) -> bool {
        self.ic || self.app || self.snapshot || self.resume
    }
}

/// Owns the self-pipe's read end and installs the four signal handlers on
/// construction.
pub struct SignalPipe {
    read_fd: OwnedFd,
}

impl SignalPipe {
    pub fn install() -> Result<Self, KernelError> {
        let (read_fd, write_fd) = pipe().map_err(|source| KernelError::SelfPipe(source.into()))?;
        set_nonblocking(read_fd.as_raw_fd()).map_err(KernelError::SelfPipe)?;
        set_nonblocking(write_fd.as_raw_fd()).map_err(KernelError::SelfPipe)?;

        // SAFETY: single-threaded setup, happens once before the handlers
        // below can possibly fire.
        unsafe {
            SELF_PIPE_WRITE = write_fd.as_raw_fd();
        }
        // Leak the write end: it must outlive this function and is only
        // ever touched (via the raw fd) from signal handlers for the life
        // of the process.
        std::mem::forget(write_fd);

        install_handler(Signal::SIGUSR1, handle_usr1)?;
        install_handler(Signal::SIGUSR2, handle_usr2)?;
        install_handler(Signal::SIGINT, handle_int)?;
        install_handler(Signal::SIGCONT, handle_cont)?;

        Ok(SignalPipe { read_fd })
    }

    pub fn as_raw_fd(&self) -> RawFd {
        self.read_fd.as_raw_fd()
    }

    /// Drain every byte currently sitting in the self-pipe, then atomically
    /// snapshot and clear the four flags. Call this once per wakeup, before
    /// acting on any of them.
    pub fn drain_and_snapshot(&self) -> SignalSnapshot {
        let mut buf = [0u8; 64];
        loop {
            match unistd::read(self.read_fd.as_raw_fd(), &mut buf) {
                Ok(0) => break,
                Ok(n) if n < buf.len() => break,
                Ok(_) => continue,
                Err(nix::Error::EAGAIN) => break,
                Err(nix::Error::EINTR) => continue,
                Err(_) => break,
            }
        }

        SignalSnapshot {
            ic: IC_FLAG.swap(false, Ordering::SeqCst),
            app: APP_FLAG.swap(false, Ordering::SeqCst),
            snapshot: SNAPSHOT_FLAG.swap(false, Ordering::SeqCst),
            resume: RESUME_FLAG.swap(false, Ordering::SeqCst),
        }
    }
}

fn install_handler(signal: Signal, handler: extern "C" fn(i32)) -> Result<(), KernelError> {
    let action = SigAction::new(SigHandler::Handler(handler), SaFlags::SA_RESTART, SigSet::empty());
    // SAFETY: the handler only stores to atomics and writes one byte to a
    // pre-opened pipe fd, both async-signal-safe operations.
    unsafe { signal::sigaction(signal, &action) }
        .map_err(|source| KernelError::SignalHandler { signal: signal.as_str(), source })?;
    Ok(())
}
