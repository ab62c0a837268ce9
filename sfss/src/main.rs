//! Entry point for the Simple File Storage Service (`sfss_server <root-dir>`).

use std::path::PathBuf;

use clap::Parser;
use sfss::server::Server;

#[derive(Parser)]
#[command(name = "sfss", about = "Simple File Storage Service")]
struct Cli {
    /// Root directory containing (or to receive) the A0..AN owner subtrees.
    root: PathBuf,

    /// Address to bind the UDP server on.
    #[arg(long, default_value = "0.0.0.0:8888")]
    addr: String,

    /// Number of application owners to precreate directories for (A0..AN).
    #[arg(short = 'n', long, default_value_t = 5)]
    apps: u32,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match Server::bind(&cli.addr, cli.root, cli.apps) {
        Ok(server) => server.run(),
        Err(e) => {
            log::error!("fatal startup failure: {e}");
            std::process::exit(2);
        }
    }
}
