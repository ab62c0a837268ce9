//! Entry point for all three modes this binary runs as: with no subcommand
//! this process is the kernel supervisor; `inter` and `app <k>` are the two
//! child modes the supervisor re-execs itself into.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use kernelsim::app::{self, AppConfig};
use kernelsim::ic::{self, IcConfig};
use kernelsim::supervisor::{Supervisor, SupervisorConfig};

#[derive(Parser)]
#[command(name = "kernelsim", about = "Micro-kernel simulator")]
struct Cli {
    #[command(subcommand)]
    mode: Option<Mode>,

    /// SFSS root directory (informational; apps never touch it directly).
    #[arg(long, global = true, default_value = "./sfss-root")]
    root: PathBuf,

    /// Address of the running SFSS instance.
    #[arg(long, global = true, default_value = "127.0.0.1:8888")]
    sfss_addr: String,

    /// Number of application processes to supervise.
    #[arg(short = 'n', long, global = true, default_value_t = 5)]
    apps: u32,

    /// Scheduler quantum, in milliseconds. Only consulted by the supervisor
    /// itself; re-exec'd children receive their own `--quantum-ms` below.
    #[arg(long, default_value_t = 500)]
    quantum_ms: u64,

    /// IRQ1 (file reply) probability denominator.
    #[arg(long, global = true, default_value_t = 3)]
    p1: u32,

    /// IRQ2 (directory reply) probability denominator.
    #[arg(long, global = true, default_value_t = 5)]
    p2: u32,

    /// Maximum ticks an application runs before emitting DONE. Only
    /// consulted by the supervisor; see the note on `quantum_ms`.
    #[arg(long, default_value_t = 20)]
    max_pc: u32,

    /// Syscall emission probability denominator. Only consulted by the
    /// supervisor; see the note on `quantum_ms`.
    #[arg(long, default_value_t = 3)]
    syscall_prob: u32,
}

#[derive(Subcommand)]
enum Mode {
    /// Run as the Interrupt Controller child.
    Inter {
        #[arg(long, default_value_t = 500)]
        quantum_ms: u64,
    },
    /// Run as application child `id` (1..=apps).
    App {
        id: u32,
        #[arg(long, default_value_t = 20)]
        max_pc: u32,
        #[arg(long, default_value_t = 3)]
        syscall_prob: u32,
        #[arg(long, default_value_t = 500)]
        quantum_ms: u64,
        #[arg(long)]
        reply_fifo: PathBuf,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            e.print().ok();
            std::process::exit(1);
        }
    };

    match cli.mode {
        None => run_supervisor(cli),
        Some(Mode::Inter { quantum_ms }) => {
            ic::run(IcConfig { quantum_ms, p1: cli.p1, p2: cli.p2 });
        }
        Some(Mode::App { id, max_pc, syscall_prob, quantum_ms, reply_fifo }) => {
            if id == 0 || id > cli.apps {
                eprintln!("app id {id} out of range 1..={}", cli.apps);
                std::process::exit(1);
            }
            app::run(AppConfig { app_id: id, max_pc, syscall_prob, quantum_ms, reply_fifo });
        }
    }
}

fn run_supervisor(cli: Cli) -> ! {
    log::info!("SFSS root hint: {:?} (informational only, apps never touch it directly)", cli.root);
    let config = SupervisorConfig {
        apps: cli.apps,
        sfss_addr: cli.sfss_addr,
        quantum_ms: cli.quantum_ms,
        p1: cli.p1,
        p2: cli.p2,
        max_pc: cli.max_pc,
        syscall_prob: cli.syscall_prob,
    };

    match Supervisor::start(config) {
        Ok(mut supervisor) => {
            supervisor.run();
            std::process::exit(0);
        }
        Err(e) => {
            log::error!("fatal startup failure: {e}");
            std::process::exit(2);
        }
    }
}
