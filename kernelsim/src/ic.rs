//! Interrupt Controller child mode (`kernelsim inter`).
//!
//! A paced loop that has no visibility into kernel state at all: it writes
//! `IRQ0`/`IRQ1`/`IRQ2` lines to its own stdout (piped into the supervisor)
//! and signals `SIGUSR1` to its parent to wake the supervisor's readiness
//! wait. Pause/resume of emission is not implemented here: the supervisor
//! pauses this child with plain `SIGSTOP`/`SIGCONT`, so the OS does that
//! suspension for free and the loop body never has to check a flag.

use std::io::Write;
use std::time::Duration;

use log::{debug, info};
use nix::sys::signal::{self, Signal};
use nix::unistd::getppid;
use rand::Rng;

pub struct IcConfig {
    pub quantum_ms: u64,
    pub p1: u32,
    pub p2: u32,
}

pub fn run(config: IcConfig) -> ! {
    info!(
        "interrupt controller starting: quantum={}ms p1=1/{} p2=1/{}",
        config.quantum_ms, config.p1, config.p2
    );
    let parent = getppid();
    let mut rng = rand::thread_rng();
    let stdout = std::io::stdout();

    loop {
        std::thread::sleep(Duration::from_millis(config.quantum_ms));

        emit_line(&stdout, "IRQ0\n");
        notify_kernel(parent);

        if config.p1 > 0 && rng.gen_ratio(1, config.p1) {
            emit_line(&stdout, "IRQ1\n");
            notify_kernel(parent);
        }
        if config.p2 > 0 && rng.gen_ratio(1, config.p2) {
            emit_line(&stdout, "IRQ2\n");
            notify_kernel(parent);
        }
    }
}

fn emit_line(stdout: &std::io::Stdout, line: &str) {
    let mut handle = stdout.lock();
    if let Err(e) = handle.write_all(line.as_bytes()).and_then(|_| handle.flush()) {
        debug!("interrupt controller: failed to write {line:?}: {e}");
    }
}

fn notify_kernel(parent: nix::unistd::Pid) {
    if let Err(e) = signal::kill(parent, Signal::SIGUSR1) {
        debug!("interrupt controller: failed to signal parent: {e}");
    }
}
