//! Day plan server entry point.
//!
//! # Responsibility
//! - `serve` (default): load env config, start logging, run the HTTP server.
//! - `ping`: print core linkage info without touching the database.

use clap::{Parser, Subcommand};
use dayplan_core::init_logging;
use dayplan_http::ServerConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "dayplan", version, about = "Day plan reconciliation server")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server.
    Serve {
        /// Overrides DAYPLAN_BIND_ADDR.
        #[arg(long)]
        bind: Option<SocketAddr>,
        /// Overrides DAYPLAN_DB_PATH.
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Print core version and exit.
    Ping,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    match args.command.unwrap_or(Command::Serve {
        bind: None,
        db: None,
    }) {
        Command::Ping => {
            println!("dayplan_core ping={}", dayplan_core::ping());
            println!("dayplan_core version={}", dayplan_core::core_version());
            ExitCode::SUCCESS
        }
        Command::Serve { bind, db } => match serve(bind, db).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                eprintln!("dayplan: {err}");
                ExitCode::FAILURE
            }
        },
    }
}

async fn serve(bind: Option<SocketAddr>, db: Option<PathBuf>) -> Result<(), String> {
    let mut config = ServerConfig::from_env().map_err(|err| err.to_string())?;
    if let Some(bind) = bind {
        config.bind_addr = bind;
    }
    if let Some(db) = db {
        config.db_path = db;
    }

    init_logging(&config.log_config())?;
    dayplan_http::serve(&config).await.map_err(|err| {
        log::error!("event=server_exit module=cli status=error error={err}");
        err
    })
}
