//! Application child mode (`kernelsim app <id>`).
//!
//! Emits the `TICK`/`DONE`/syscall line grammar on its own stdout (piped
//! into the supervisor) and notifies the kernel with `SIGUSR2`, stopping
//! itself with `SIGSTOP` both before first scheduling and after each
//! syscall. Reads its reply off a dedicated FIFO the supervisor created for
//! it (see `DESIGN.md`'s "shared reply slot" note): the kernel writes the
//! raw `SfpMessage` bytes before `SIGCONT`, and this loop does one blocking
//! read after each resume.

use std::fs::File;
use std::io::{Read, Write};

use log::{debug, info, warn};
use nix::sys::signal::{self, Signal};
use nix::unistd::{getpid, getppid};
use rand::Rng;
use sfp::{line::AppLine, SfpMessage};

pub struct AppConfig {
    pub app_id: u32,
    pub max_pc: u32,
    pub syscall_prob: u32,
    pub quantum_ms: u64,
    pub reply_fifo: std::path::PathBuf,
}

pub fn run(config: AppConfig) -> ! {
    let pid = getpid().as_raw() as u32;
    info!("application A{} starting (max_pc={})", config.app_id, config.max_pc);

    let mut reply_fifo = File::open(&config.reply_fifo).unwrap_or_else(|e| {
        eprintln!("A{}: failed to open reply fifo {:?}: {e}", config.app_id, config.reply_fifo);
        std::process::exit(2);
    });

    stop_self(config.app_id);

    let mut rng = rand::thread_rng();
    let stdout = std::io::stdout();

    for pc in 1..=config.max_pc {
        std::thread::sleep(std::time::Duration::from_millis(config.quantum_ms));

        emit(&stdout, &AppLine::Tick { app: config.app_id, pid, pc });
        notify_kernel(config.app_id);

        if config.syscall_prob > 0 && rng.gen_ratio(1, config.syscall_prob) {
            let line = random_syscall(config.app_id, pid, &mut rng);
            emit(&stdout, &line);
            notify_kernel(config.app_id);
            stop_self(config.app_id);

            match read_reply(&mut reply_fifo) {
                Some(reply) => classify_reply(config.app_id, &line, &reply),
                None => warn!("A{}: reply fifo closed or malformed read", config.app_id),
            }
        }
    }

    emit(&stdout, &AppLine::Done { app: config.app_id, pid, pc: config.max_pc });
    notify_kernel(config.app_id);
    drop(reply_fifo);
    std::process::exit(0);
}

fn stop_self(app_id: u32) {
    debug!("A{app_id}: stopping self");
    if let Err(e) = signal::kill(getpid(), Signal::SIGSTOP) {
        warn!("A{app_id}: failed to stop self: {e}");
    }
}

fn notify_kernel(app_id: u32) {
    if let Err(e) = signal::kill(getppid(), Signal::SIGUSR2) {
        debug!("A{app_id}: failed to signal parent: {e}");
    }
}

fn emit(stdout: &std::io::Stdout, line: &AppLine) {
    let mut handle = stdout.lock();
    let rendered = line.format();
    if let Err(e) = handle.write_all(rendered.as_bytes()).and_then(|_| handle.flush()) {
        debug!("failed to write {rendered:?}: {e}");
    }
}

fn read_reply(fifo: &mut File) -> Option<SfpMessage> {
    let mut buf = vec![0u8; SfpMessage::WIRE_SIZE];
    fifo.read_exact(&mut buf).ok()?;
    SfpMessage::from_bytes(&buf)
}

fn classify_reply(app_id: u32, request: &AppLine, reply: &SfpMessage) {
    let status = match reply.msg_type() {
        Some(sfp::MsgType::RdRep) | Some(sfp::MsgType::WrRep) => reply.offset,
        Some(sfp::MsgType::DcRep) | Some(sfp::MsgType::DrRep) => reply.path_len as i64,
        Some(sfp::MsgType::DlRep) => reply.nrnames as i64,
        Some(other) => {
            warn!("A{app_id}: reply has unexpected msg_type {other:?} for a syscall reply");
            return;
        }
        None => {
            warn!("A{app_id}: reply has unrecognized msg_type {}", reply.msg_type);
            return;
        }
    };
    if status < 0 {
        warn!("A{app_id}: syscall {request:?} failed with status {status}");
    } else {
        debug!("A{app_id}: syscall {request:?} succeeded ({status})");
    }
}

/// Build one of the five syscall lines with a randomized path (alternating
/// private `/A{id}` and shared `/A0` prefixes), offset (multiple of 16),
/// and a short payload.
fn random_syscall(app_id: u32, pid: u32, rng: &mut impl Rng) -> AppLine {
    let prefix = if rng.gen_bool(0.5) { format!("/A{app_id}") } else { "/A0".to_string() };
    let path = format!("{prefix}/scratch.dat");
    let offset = (rng.gen_range(0..8) as i64) * 16;

    match rng.gen_range(0..5) {
        0 => AppLine::Read { app: app_id, pid, path, offset },
        1 => {
            let payload = random_payload(rng);
            AppLine::Write { app: app_id, pid, path, offset, payload }
        }
        2 => AppLine::Add { app: app_id, pid, path: prefix, name: format!("child-{}", rng.gen_range(0..100)) },
        3 => AppLine::Rem { app: app_id, pid, path: prefix, name: format!("child-{}", rng.gen_range(0..100)) },
        _ => AppLine::ListDir { app: app_id, pid, path: prefix },
    }
}

fn random_payload(rng: &mut impl Rng) -> Vec<u8> {
    let len = rng.gen_range(1..=sfp::BLOCK_SIZE);
    (0..len).map(|_| rng.gen_range(b'a'..=b'z')).collect()
}
