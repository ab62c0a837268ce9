//! The process control block and its state machine.
//!
//! A `Ready`/`Running`/`Blocked` core, extended with the absorbing
//! `Terminated` state the simulator needs now that applications actually
//! exit. Ordering lives entirely in the ready queue (see `readyqueue`); a
//! PCB only tracks its own state.

use sfp::MsgType;

/// Execution state of one application PCB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PcbState {
    Ready,
    Running,
    Blocked,
    Terminated,
}

/// The kernel's record for one application, indexed by its logical id minus
/// one (`pcbs[0]` is app 1, etc).
#[derive(Debug)]
pub struct Pcb {
    /// Logical application id, 1..=N.
    pub app_id: u32,
    /// OS process id of the spawned `app <id>` child, set once at spawn.
    pub os_pid: nix::unistd::Pid,
    pub state: PcbState,
    pub pc: u32,
    /// The syscall request message this PCB is waiting on a reply for.
    /// `Some` iff `state == Blocked`.
    pub pending_syscall: Option<sfp::SfpMessage>,
}

impl Pcb {
    pub fn new(app_id: u32, os_pid: nix::unistd::Pid) -> Self {
        Pcb { app_id, os_pid, state: PcbState::Ready, pc: 0, pending_syscall: None }
    }

    /// The message type this PCB is blocked waiting on, for snapshot
    /// reporting.
    pub fn pending_msg_type(&self) -> Option<MsgType> {
        self.pending_syscall.as_ref().and_then(|m| m.msg_type())
    }

    pub fn is_terminated(&self) -> bool {
        self.state == PcbState::Terminated
    }

    /// Transition RUNNING/READY/BLOCKED -> TERMINATED. TERMINATED is
    /// absorbing: calling this on an already-terminated PCB is a no-op.
    pub fn terminate(&mut self) {
        if self.state != PcbState::Terminated {
            self.state = PcbState::Terminated;
            self.pending_syscall = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pcb() -> Pcb {
        Pcb::new(1, nix::unistd::Pid::from_raw(123))
    }

    #[test]
    fn new_pcb_starts_ready() {
        let p = pcb();
        assert_eq!(p.state, PcbState::Ready);
        assert_eq!(p.pc, 0);
        assert!(p.pending_syscall.is_none());
    }

    #[test]
    fn terminate_is_absorbing() {
        let mut p = pcb();
        p.state = PcbState::Running;
        p.terminate();
        assert_eq!(p.state, PcbState::Terminated);
        p.state = PcbState::Terminated;
        p.terminate();
        assert_eq!(p.state, PcbState::Terminated);
    }

    #[test]
    fn terminate_clears_pending_syscall() {
        let mut p = pcb();
        p.state = PcbState::Blocked;
        p.pending_syscall = Some(sfp::SfpMessage::new(sfp::MsgType::RdReq, 1));
        p.terminate();
        assert!(p.pending_syscall.is_none());
    }

    #[test]
    fn pending_msg_type_reflects_blocked_request() {
        let mut p = pcb();
        assert_eq!(p.pending_msg_type(), None);
        p.pending_syscall = Some(sfp::SfpMessage::new(sfp::MsgType::DlReq, 1));
        assert_eq!(p.pending_msg_type(), Some(MsgType::DlReq));
    }
}
