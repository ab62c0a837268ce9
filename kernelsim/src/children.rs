//! Spawning and signaling the IC and application children.
//!
//! The supervisor re-execs itself (`std::env::current_exe()`) with a
//! different subcommand per child, rather than pointing at a separate
//! binary, since IC and app are just other modes of the same `kernelsim`
//! binary. Each `ChildProc` keeps the spawned `Child` handle around for
//! later signal-based control.

use std::io;
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};

use nix::sys::signal::{self, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

use crate::error::KernelError;

/// A spawned child process and its piped stdout, from which the supervisor
/// reads newline-delimited lines (`IRQ0`/`IRQ1`/`IRQ2` for the IC,
/// `TICK`/`DONE`/syscalls for apps).
pub struct ChildProc {
    pub pid: Pid,
    pub stdout: ChildStdout,
    child: Child,
}

impl ChildProc {
    fn from_child(mut child: Child) -> Self {
        let stdout = child.stdout.take().expect("child spawned with Stdio::piped()");
        let pid = Pid::from_raw(child.id() as i32);
        ChildProc { pid, stdout, child }
    }

    /// Send `SIGSTOP`, pausing the child without killing it.
    pub fn stop(&self) -> Result<(), nix::Error> {
        signal::kill(self.pid, Signal::SIGSTOP)
    }

    /// Send `SIGCONT`, resuming a stopped child.
    pub fn resume(&self) -> Result<(), nix::Error> {
        signal::kill(self.pid, Signal::SIGCONT)
    }

    /// Send `SIGTERM`, used at shutdown for the IC.
    pub fn terminate(&self) -> Result<(), nix::Error> {
        signal::kill(self.pid, Signal::SIGTERM)
    }

    /// Non-blocking reap. Returns `true` if the child has exited or was
    /// killed by a signal (i.e. its PCB should move to TERMINATED).
    pub fn try_reap(&mut self) -> bool {
        match waitpid(self.pid, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::Exited(_, _)) | Ok(WaitStatus::Signaled(_, _, _)) => true,
            Ok(_) => false,
            Err(nix::Error::ECHILD) => true,
            Err(_) => false,
        }
    }
}

impl Drop for ChildProc {
    fn drop(&mut self) {
        // Best-effort: if the child is still alive when the supervisor
        // drops its handle (e.g. an early startup failure), don't leave an
        // orphaned stopped process behind.
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Spawn the Interrupt Controller child: `kernelsim inter --quantum-ms ...`.
pub fn spawn_ic(
    quantum_ms: u64,
    p1: u32,
    p2: u32,
) -> Result<ChildProc, KernelError> {
    let exe = std::env::current_exe().map_err(|source| KernelError::Spawn { role: "inter", source })?;
    let child = Command::new(exe)
        .arg("inter")
        .arg("--quantum-ms")
        .arg(quantum_ms.to_string())
        .arg("--p1")
        .arg(p1.to_string())
        .arg("--p2")
        .arg(p2.to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .spawn()
        .map_err(|source| KernelError::Spawn { role: "inter", source })?;
    Ok(ChildProc::from_child(child))
}

/// Spawn application child `app_id`: `kernelsim app <id> --max-pc ...
/// --syscall-prob ... --quantum-ms ... --reply-fifo <path> --apps <n>`.
/// `reply_fifo` is the path to the FIFO the supervisor already created and
/// opened for writing (see `supervisor::Supervisor::start`); the child opens
/// it read-only. `apps` must be forwarded so the child's own bounds check
/// (`id > cli.apps` in `main.rs`) sees the real app count rather than its
/// default.
pub fn spawn_app_with_fifo(
    app_id: u32,
    max_pc: u32,
    syscall_prob: u32,
    quantum_ms: u64,
    reply_fifo: &Path,
    apps: u32,
) -> Result<ChildProc, KernelError> {
    let exe = std::env::current_exe().map_err(|source| KernelError::Spawn { role: "app", source })?;
    let child = Command::new(exe)
        .arg("--apps")
        .arg(apps.to_string())
        .arg("app")
        .arg(app_id.to_string())
        .arg("--max-pc")
        .arg(max_pc.to_string())
        .arg("--syscall-prob")
        .arg(syscall_prob.to_string())
        .arg("--quantum-ms")
        .arg(quantum_ms.to_string())
        .arg("--reply-fifo")
        .arg(reply_fifo)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .spawn()
        .map_err(|source| KernelError::Spawn { role: "app", source })?;
    Ok(ChildProc::from_child(child))
}

/// Set a file descriptor to non-blocking mode, used for each child's piped
/// stdout fd before handing it to `poll`.
pub fn set_nonblocking(fd: std::os::fd::RawFd) -> io::Result<()> {
    use nix::fcntl::{fcntl, FcntlArg, OFlag};
    let flags = fcntl(fd, FcntlArg::F_GETFL).map_err(io::Error::from)?;
    let flags = OFlag::from_bits_truncate(flags) | OFlag::O_NONBLOCK;
    fcntl(fd, FcntlArg::F_SETFL(flags)).map_err(io::Error::from)?;
    Ok(())
}

/// Referenced by tests that want a path to a real executable without
/// spawning `kernelsim` recursively.
#[cfg(test)]
pub(crate) fn true_binary() -> &'static Path {
    Path::new("/bin/true")
}
