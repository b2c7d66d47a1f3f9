//! teller - wallet agent CLI
//!
//! Main entry point for the teller CLI.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{auth, ping, serve};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// teller - authorized access to your wallet backend
#[derive(Parser)]
#[command(name = "teller")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Authentication management
    Auth(auth::AuthArgs),

    /// Run the hosted-mode server
    Serve(serve::ServeArgs),

    /// Check backend reachability and authorization
    Ping(ping::PingArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing — console (human-readable) + rotating JSON file
    let filter = if cli.verbose {
        "teller=debug,teller_auth=debug,teller_client=debug,teller_server=debug,teller_config=debug,info"
    } else {
        "teller=info,teller_auth=info,teller_client=info,teller_server=info,warn"
    };

    let log_dir = teller_config::config_dir()
        .map(|d| d.join("logs"))
        .unwrap_or_else(|| std::path::PathBuf::from("logs"));
    let file_appender = tracing_appender::rolling::daily(&log_dir, "teller.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "teller=trace,teller_auth=trace,teller_client=trace,teller_server=trace,teller_config=trace,info",
                )),
        )
        .init();

    let settings = teller_config::Settings::load()?;

    let ctx = commands::Context {
        settings,
        json_output: cli.json,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Auth(args) => auth::run(args, &ctx).await,
        Commands::Serve(args) => serve::run(args, &ctx).await,
        Commands::Ping(args) => ping::run(args, &ctx).await,
    }
}
