//! Serve command - run the hosted-mode server.

use anyhow::Result;
use clap::Args;
use teller_server::Server;

use super::Context;

/// Arguments for the serve command.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Bind address (overrides config)
    #[arg(long)]
    pub bind: Option<String>,
}

/// Run the serve command.
pub async fn run(args: ServeArgs, ctx: &Context) -> Result<()> {
    let mut settings = ctx.settings.clone();
    if let Some(bind) = args.bind {
        settings.bind_address = bind;
    }

    println!("Serving wallet API access on {}", settings.bind_address);
    println!("Identity provider: {}", settings.authorization_server());
    tracing::info!(bind = %settings.bind_address, "starting hosted server");

    Server::new(settings)
        .run()
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {e}"))
}
