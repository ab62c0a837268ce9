//! The kernel supervisor: the single owned struct holding every PCB, both
//! reply FIFOs, the ready queue, and the child handles. Everything in this
//! module runs on one thread; signal handlers (see `signals.rs`) only ever
//! set flags, all mutation happens here in the main loop.

use std::fs::{File, OpenOptions};
use std::os::fd::{AsRawFd, BorrowedFd, RawFd};
use std::path::PathBuf;

use log::{debug, info, warn};
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::unistd::mkfifo;
use nix::sys::stat::Mode;
use sfp::line::AppLine;
use sfp::{LineParser, MsgType, SfpMessage};

use crate::children::{self, ChildProc};
use crate::error::KernelError;
use crate::net::SfssLink;
use crate::pcb::{Pcb, PcbState};
use crate::readyqueue::ReadyQueue;
use crate::replyqueue::ReplyQueue;
use crate::signals::SignalPipe;

pub struct SupervisorConfig {
    pub apps: u32,
    pub sfss_addr: String,
    pub quantum_ms: u64,
    pub p1: u32,
    pub p2: u32,
    pub max_pc: u32,
    pub syscall_prob: u32,
}

pub struct Supervisor {
    pcbs: Vec<Pcb>,
    ready: ReadyQueue,
    file_replies: ReplyQueue,
    dir_replies: ReplyQueue,
    running: Option<usize>,
    ic: ChildProc,
    ic_parser: LineParser,
    apps: Vec<ChildProc>,
    app_parsers: Vec<LineParser>,
    reply_writers: Vec<File>,
    link: SfssLink,
    signals: SignalPipe,
    fifo_dir: PathBuf,
}

impl Supervisor {
    pub fn start(config: SupervisorConfig) -> Result<Self, KernelError> {
        let link = SfssLink::connect(&config.sfss_addr)?;
        let signals = SignalPipe::install()?;

        let ic = children::spawn_ic(config.quantum_ms, config.p1, config.p2)?;
        children::set_nonblocking(ic.stdout.as_raw_fd())
            .map_err(KernelError::SelfPipe)?;

        let fifo_dir = std::env::temp_dir().join(format!("kernelsim-{}", std::process::id()));
        std::fs::create_dir_all(&fifo_dir).map_err(KernelError::ReplyFifoSetup)?;

        let mut pcbs = Vec::with_capacity(config.apps as usize);
        let mut apps = Vec::with_capacity(config.apps as usize);
        let mut app_parsers = Vec::with_capacity(config.apps as usize);
        let mut reply_writers = Vec::with_capacity(config.apps as usize);

        for app_id in 1..=config.apps {
            let fifo_path = fifo_dir.join(format!("reply-{app_id}.fifo"));
            if fifo_path.exists() {
                let _ = std::fs::remove_file(&fifo_path);
            }
            mkfifo(&fifo_path, Mode::from_bits_truncate(0o600))
                .map_err(|source| KernelError::ReplyFifoSetup(source.into()))?;
            // Opened read-write so this open never blocks waiting for a
            // reader; the app's later read-only open then rendezvous with
            // an already-connected writer instead of blocking on us.
            let writer = OpenOptions::new()
                .read(true)
                .write(true)
                .open(&fifo_path)
                .map_err(KernelError::ReplyFifoSetup)?;

            let child = children::spawn_app_with_fifo(
                app_id,
                config.max_pc,
                config.syscall_prob,
                config.quantum_ms,
                &fifo_path,
                config.apps,
            )?;
            children::set_nonblocking(child.stdout.as_raw_fd()).map_err(KernelError::SelfPipe)?;

            pcbs.push(Pcb::new(app_id, child.pid));
            apps.push(child);
            app_parsers.push(LineParser::new());
            reply_writers.push(writer);
        }

        let mut ready = ReadyQueue::new();
        for idx in 0..pcbs.len() {
            ready.push_tail(idx);
        }

        info!("supervisor started with {} applications", config.apps);

        Ok(Supervisor {
            pcbs,
            ready,
            file_replies: ReplyQueue::new(config.apps as usize),
            dir_replies: ReplyQueue::new(config.apps as usize),
            running: None,
            ic,
            ic_parser: LineParser::new(),
            apps,
            app_parsers,
            reply_writers,
            link,
            signals,
            fifo_dir,
        })
    }

    pub fn run(&mut self) {
        self.schedule_next();

        loop {
            self.reap_children();
            if self.all_terminated() {
                self.shutdown();
                return;
            }

            if let Err(e) = self.wait_and_dispatch() {
                warn!("poll() failed: {e}");
            }
        }
    }

    fn wait_and_dispatch(&mut self) -> Result<(), nix::Error> {
        let sock_fd = unsafe { BorrowedFd::borrow_raw(self.link.as_raw_fd()) };
        let sig_fd = unsafe { BorrowedFd::borrow_raw(self.signals.as_raw_fd()) };
        let ic_fd = unsafe { BorrowedFd::borrow_raw(self.ic.stdout.as_raw_fd()) };
        let app_fds: Vec<RawFd> = self.apps.iter().map(|a| a.stdout.as_raw_fd()).collect();

        let mut fds = vec![
            PollFd::new(sock_fd, PollFlags::POLLIN),
            PollFd::new(sig_fd, PollFlags::POLLIN),
            PollFd::new(ic_fd, PollFlags::POLLIN),
        ];
        for fd in &app_fds {
            fds.push(PollFd::new(unsafe { BorrowedFd::borrow_raw(*fd) }, PollFlags::POLLIN));
        }

        let timeout = PollTimeout::from(200u16);
        poll(&mut fds, timeout)?;

        if readable(&fds[1]) {
            let snapshot = self.signals.drain_and_snapshot();
            if snapshot.snapshot {
                self.handle_snapshot_request();
            }
            if snapshot.resume {
                self.handle_resume_request();
            }
        }

        if readable(&fds[0]) {
            self.drain_sfss_replies();
        }

        if readable(&fds[2]) {
            self.drain_ic_channel();
        }

        for i in 0..self.apps.len() {
            if readable(&fds[3 + i]) {
                self.drain_app_channel(i);
            }
        }

        Ok(())
    }

    fn drain_sfss_replies(&mut self) {
        loop {
            match self.link.try_recv_reply() {
                Ok(Some(reply)) => self.enqueue_reply(reply),
                Ok(None) => break,
                Err(e) => {
                    warn!("error receiving SFSS reply: {e}");
                    break;
                }
            }
        }
    }

    fn enqueue_reply(&mut self, reply: SfpMessage) {
        let Some(msg_type) = reply.msg_type() else {
            warn!("dropping SFSS reply with unrecognized msg_type");
            return;
        };
        let queue = if msg_type.is_file_kind() { &mut self.file_replies } else { &mut self.dir_replies };
        if !queue.push(reply) {
            warn!("reply FIFO full, dropping {:?} reply for owner {}", msg_type, reply.owner);
        }
    }

    fn drain_ic_channel(&mut self) {
        use std::io::Read;
        let mut buf = [0u8; 4096];
        loop {
            match self.ic.stdout.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    let lines = self.ic_parser.push(&buf[..n]);
                    for line in lines {
                        self.handle_ic_line(&line);
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    debug!("error reading from IC channel: {e}");
                    break;
                }
            }
        }
    }

    fn handle_ic_line(&mut self, line: &str) {
        match line {
            "IRQ0" => self.handle_tick(),
            "IRQ1" => self.dispatch_reply(true),
            "IRQ2" => self.dispatch_reply(false),
            other => warn!("unknown IC line {other:?}, dropping"),
        }
    }

    fn drain_app_channel(&mut self, idx: usize) {
        use std::io::Read;
        let mut buf = [0u8; 4096];
        loop {
            match self.apps[idx].stdout.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    let lines = self.app_parsers[idx].push(&buf[..n]);
                    for line in lines {
                        self.handle_app_line(idx, &line);
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    debug!("error reading from A{} channel: {e}", self.pcbs[idx].app_id);
                    break;
                }
            }
        }
    }

    fn handle_app_line(&mut self, idx: usize, line: &str) {
        let Some(parsed) = AppLine::parse(line) else {
            warn!("A{}: malformed line {line:?}, dropping", self.pcbs[idx].app_id);
            return;
        };

        match parsed {
            AppLine::Tick { pc, .. } => {
                self.pcbs[idx].pc = pc;
            }
            AppLine::Done { pc, .. } => {
                self.pcbs[idx].pc = pc;
                self.pcbs[idx].terminate();
                if self.running == Some(idx) {
                    self.running = None;
                    self.schedule_next();
                }
            }
            syscall => self.handle_syscall(idx, syscall),
        }
    }

    fn handle_syscall(&mut self, idx: usize, line: AppLine) {
        if self.pcbs[idx].is_terminated() {
            debug!("ignoring syscall from terminated A{}", self.pcbs[idx].app_id);
            return;
        }

        let request = build_request(&line);
        self.pcbs[idx].state = PcbState::Blocked;
        self.pcbs[idx].pending_syscall = Some(request);
        let _ = self.apps[idx].stop();

        if let Err(e) = self.link.send_request(&request) {
            warn!("failed to send SFP request for A{}: {e}", self.pcbs[idx].app_id);
        }

        if self.running == Some(idx) {
            self.running = None;
            self.schedule_next();
        }
    }

    fn handle_tick(&mut self) {
        if let Some(idx) = self.running.take() {
            self.pcbs[idx].state = PcbState::Ready;
            let _ = self.apps[idx].stop();
            self.ready.push_tail(idx);
        }
        self.schedule_next();
    }

    fn dispatch_reply(&mut self, is_file: bool) {
        let popped = if is_file { self.file_replies.pop() } else { self.dir_replies.pop() };
        let Some(reply) = popped else {
            debug!("spurious IRQ{} with empty reply queue", if is_file { 1 } else { 2 });
            return;
        };

        let owner = reply.owner;
        let idx = match (owner as usize).checked_sub(1) {
            Some(idx) if idx < self.pcbs.len() => idx,
            _ => {
                warn!("reply for out-of-range owner {owner}, dropping");
                return;
            }
        };

        if self.pcbs[idx].state != PcbState::Blocked {
            warn!(
                "reply for A{} which is not BLOCKED ({:?}), dropping",
                self.pcbs[idx].app_id, self.pcbs[idx].state
            );
            return;
        }

        if let Err(e) = write_reply_slot(&mut self.reply_writers[idx], &reply) {
            warn!("failed to deliver reply to A{}: {e}", self.pcbs[idx].app_id);
        }

        self.pcbs[idx].state = PcbState::Ready;
        self.pcbs[idx].pending_syscall = None;
        self.ready.push_tail(idx);

        if self.running.is_none() {
            self.schedule_next();
        }
    }

    /// Pop from the ready queue's head up to its current length, skipping
    /// BLOCKED entries (re-enqueued) and dropping TERMINATED ones: plain
    /// round-robin over everything actually runnable.
    fn schedule_next(&mut self) {
        let attempts = self.ready.len();
        for _ in 0..attempts {
            let Some(idx) = self.ready.pop_head() else { break };
            match self.pcbs[idx].state {
                PcbState::Ready => {
                    self.run_pcb(idx);
                    return;
                }
                PcbState::Blocked => self.ready.push_tail(idx),
                PcbState::Terminated => debug!("dropping terminated A{} from ready queue", self.pcbs[idx].app_id),
                PcbState::Running => warn!("A{} was RUNNING while still in ready queue", self.pcbs[idx].app_id),
            }
        }

        self.reconcile_ready_queue();

        if let Some(idx) = self.ready.pop_head() {
            if self.pcbs[idx].state == PcbState::Ready {
                self.run_pcb(idx);
                return;
            }
            self.ready.push_tail(idx);
        }

        debug!("scheduler idle: no READY pcbs");
    }

    fn reconcile_ready_queue(&mut self) {
        for idx in 0..self.pcbs.len() {
            let is_ready = self.pcbs[idx].state == PcbState::Ready;
            let tracked = self.running == Some(idx) || self.ready.contains(idx);
            if is_ready && !tracked {
                warn!("reconciling ready queue: A{} was READY but missing", self.pcbs[idx].app_id);
                self.ready.push_tail(idx);
            }
        }
    }

    fn run_pcb(&mut self, idx: usize) {
        self.pcbs[idx].state = PcbState::Running;
        self.running = Some(idx);
        if let Err(e) = self.apps[idx].resume() {
            warn!("failed to resume A{}: {e}", self.pcbs[idx].app_id);
        }
        debug!("A{} now RUNNING", self.pcbs[idx].app_id);
    }

    fn handle_snapshot_request(&mut self) {
        if let Some(idx) = self.running {
            let _ = self.apps[idx].stop();
        }
        let _ = self.ic.stop();
        self.print_snapshot();
    }

    fn handle_resume_request(&mut self) {
        let _ = self.ic.resume();
        if let Some(idx) = self.running {
            let _ = self.apps[idx].resume();
        }
    }

    fn print_snapshot(&self) {
        println!("--- kernel snapshot ---");
        for pcb in &self.pcbs {
            println!(
                "A{} pid={} pc={} state={:?} pending={:?} terminated={}",
                pcb.app_id,
                pcb.os_pid,
                pcb.pc,
                pcb.state,
                pcb.pending_msg_type(),
                pcb.is_terminated()
            );
        }
        let queue: Vec<u32> = self.ready.iter().map(|&i| self.pcbs[i].app_id).collect();
        println!("ready queue (head -> tail): {queue:?}");
        println!("running: {:?}", self.running.map(|i| self.pcbs[i].app_id));
        println!("file replies depth: {}", self.file_replies.len());
        println!("dir replies depth: {}", self.dir_replies.len());
        println!("-----------------------");
    }

    fn reap_children(&mut self) {
        for idx in 0..self.apps.len() {
            if self.apps[idx].try_reap() && !self.pcbs[idx].is_terminated() {
                warn!("A{} reaped unexpectedly, marking TERMINATED", self.pcbs[idx].app_id);
                self.pcbs[idx].terminate();
                if self.running == Some(idx) {
                    self.running = None;
                }
            }
        }
    }

    fn all_terminated(&self) -> bool {
        self.pcbs.iter().all(|p| p.is_terminated())
    }

    fn shutdown(&mut self) {
        info!("all applications terminated, shutting down");
        let _ = self.ic.terminate();
        if let Err(e) = std::fs::remove_dir_all(&self.fifo_dir) {
            debug!("failed to clean up reply fifo directory: {e}");
        }
    }
}

fn readable(pfd: &PollFd) -> bool {
    pfd.revents().map(|r| r.contains(PollFlags::POLLIN)).unwrap_or(false)
}

fn write_reply_slot(writer: &mut File, reply: &SfpMessage) -> std::io::Result<()> {
    use std::io::Write;
    writer.write_all(&reply.to_bytes())
}

fn build_request(line: &AppLine) -> SfpMessage {
    match line {
        AppLine::Read { app, path, offset, .. } => {
            let mut m = SfpMessage::new(MsgType::RdReq, *app as u8);
            m.set_path(path);
            m.offset = *offset;
            m
        }
        AppLine::Write { app, path, offset, payload, .. } => {
            let mut m = SfpMessage::new(MsgType::WrReq, *app as u8);
            m.set_path(path);
            m.offset = *offset;
            m.set_payload(payload);
            m
        }
        AppLine::Add { app, path, name, .. } => {
            let mut m = SfpMessage::new(MsgType::DcReq, *app as u8);
            m.set_path(path);
            m.set_name(name);
            m
        }
        AppLine::Rem { app, path, name, .. } => {
            let mut m = SfpMessage::new(MsgType::DrReq, *app as u8);
            m.set_path(path);
            m.set_name(name);
            m
        }
        AppLine::ListDir { app, path, .. } => {
            let mut m = SfpMessage::new(MsgType::DlReq, *app as u8);
            m.set_path(path);
            m
        }
        AppLine::Tick { .. } | AppLine::Done { .. } => {
            unreachable!("TICK/DONE are filtered out before reaching build_request")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_request_maps_read_fields() {
        let line = AppLine::Read { app: 2, pid: 10, path: "/A2/f".into(), offset: 32 };
        let msg = build_request(&line);
        assert_eq!(msg.msg_type(), Some(MsgType::RdReq));
        assert_eq!(msg.owner, 2);
        assert_eq!(msg.path_str(), "/A2/f");
        assert_eq!(msg.offset, 32);
    }

    #[test]
    fn build_request_maps_write_payload() {
        let line = AppLine::Write { app: 1, pid: 1, path: "/A1/f".into(), offset: 0, payload: b"hi".to_vec() };
        let msg = build_request(&line);
        assert_eq!(msg.msg_type(), Some(MsgType::WrReq));
        assert_eq!(&msg.payload[..2], b"hi");
    }

    #[test]
    fn build_request_maps_listdir() {
        let line = AppLine::ListDir { app: 4, pid: 1, path: "/A4".into() };
        let msg = build_request(&line);
        assert_eq!(msg.msg_type(), Some(MsgType::DlReq));
        assert_eq!(msg.path_str(), "/A4");
    }
}
