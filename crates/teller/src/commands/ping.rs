//! Ping command - check backend reachability and authorization.

use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use teller_auth::{CredentialStore, TokenCache};
use teller_client::ApiClient;

use super::Context;

/// Arguments for the ping command.
#[derive(Args, Debug)]
pub struct PingArgs {}

/// Run the ping command.
pub async fn run(_args: PingArgs, ctx: &Context) -> Result<()> {
    let dir = teller_config::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
    let cache = TokenCache::new(CredentialStore::new(&dir));

    let client = ApiClient::builder()
        .base_url(&ctx.settings.api_base_url)
        .token_supplier(Arc::new(cache))
        .build()?;

    if !client.is_healthy().await {
        anyhow::bail!("Backend unreachable at {}", ctx.settings.api_base_url);
    }
    println!("Backend reachable: {}", ctx.settings.api_base_url);

    match client.get::<serde_json::Value>("status").await {
        Ok(status) => {
            if ctx.json_output {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                println!("Authorized.");
            }
            Ok(())
        }
        Err(e) if e.is_auth_error() => {
            anyhow::bail!("Not authorized: {e}\nRun 'teller auth login' to sign in.")
        }
        Err(e) => anyhow::bail!("Backend error: {e}"),
    }
}
