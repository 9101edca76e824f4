//! Stub of the volgindicaties API for local runs
//!
//! Serves `PUT /volgindicaties/{bsn}` and `GET /wijzigingen?vanaf=<date>`
//! from memory. Point the harness at it with `API_BASE_URL=http://<bind>`.

use chrono::NaiveDate;
use clap::Parser;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;

use schouwen::common::logging;
use schouwen::stub::{self, StubConfig};

#[derive(Parser)]
#[command(name = "stub-api", about = "In-memory stub of the volgindicaties API")]
#[command(version, long_about = None)]
struct Cli {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:3000")]
    bind: SocketAddr,

    /// Bearer token to require (any bearer token when omitted)
    #[arg(long)]
    token: Option<String>,

    /// Pretend today is this date (YYYY-MM-DD)
    #[arg(long)]
    today: Option<NaiveDate>,
}

#[tokio::main]
async fn main() {
    logging::init_stub();
    let cli = Cli::parse();

    let listener = match TcpListener::bind(cli.bind).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("Error: failed to bind {}: {e}", cli.bind);
            std::process::exit(1);
        }
    };
    info!(addr = %cli.bind, "stub API listening");

    let config = StubConfig {
        token: cli.token,
        today: cli.today,
    };
    if let Err(e) = stub::serve(listener, config).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
