//! Auth command - authentication management.

use anyhow::Result;
use clap::{Args, Subcommand};
use teller_auth::{AuthStatus, CredentialStore, LoginConfig, LoginFlow};

use super::Context;

/// Arguments for the auth command.
#[derive(Args, Debug)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub command: AuthCommand,
}

#[derive(Subcommand, Debug)]
pub enum AuthCommand {
    /// Sign in to the wallet provider via the browser
    Login {
        /// Print the authorization URL instead of opening a browser
        #[arg(long)]
        no_browser: bool,
    },

    /// Show authentication status
    Status,

    /// Remove stored credentials
    Logout,
}

/// Run the auth command.
pub async fn run(args: AuthArgs, ctx: &Context) -> Result<()> {
    match args.command {
        AuthCommand::Login { no_browser } => cmd_login(no_browser, ctx).await,
        AuthCommand::Status => cmd_status(ctx).await,
        AuthCommand::Logout => cmd_logout(ctx).await,
    }
}

fn credential_store() -> Result<CredentialStore> {
    let dir = teller_config::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
    Ok(CredentialStore::new(&dir))
}

async fn cmd_login(no_browser: bool, ctx: &Context) -> Result<()> {
    let store = credential_store()?;

    if let Ok(AuthStatus::Valid { expires_in_secs }) = store.status() {
        println!(
            "Already authenticated (access token valid for {}m {}s).",
            expires_in_secs / 60,
            expires_in_secs % 60
        );
        println!("Run 'teller auth logout' first to sign in again.");
        return Ok(());
    }

    let config = LoginConfig {
        discovery_url: ctx.settings.discovery_url.clone(),
        client_id: ctx.settings.client_id.clone(),
        client_secret: ctx.settings.client_secret.clone(),
        scopes: ctx.settings.scopes.clone(),
        callback_port: ctx.settings.callback_port,
        no_browser,
    };

    println!("Signing in to {} ...", ctx.settings.authorization_server());

    let record = LoginFlow::new(config, store)
        .login()
        .await
        .map_err(|e| anyhow::anyhow!("Login failed: {e}"))?;

    let valid_for = record
        .access_expires_at
        .saturating_sub(teller_auth::credentials::now_millis())
        / 1000;
    println!();
    println!("Authentication successful.");
    println!("Access token valid for {}m {}s.", valid_for / 60, valid_for % 60);

    Ok(())
}

async fn cmd_status(ctx: &Context) -> Result<()> {
    let store = credential_store()?;
    let status = store.status()?;

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    match status {
        AuthStatus::NotAuthenticated => {
            println!("Not authenticated.");
            println!("Run 'teller auth login' to sign in.");
        }
        AuthStatus::Valid { expires_in_secs } => {
            println!("Authenticated.");
            println!(
                "  Access token expires in: {}m {}s",
                expires_in_secs / 60,
                expires_in_secs % 60
            );
        }
        AuthStatus::Refreshable => {
            println!("Authenticated (access token will refresh on next use).");
        }
        AuthStatus::SessionExpired => {
            println!("Session expired.");
            println!("Run 'teller auth login' to sign in again.");
        }
    }

    Ok(())
}

async fn cmd_logout(ctx: &Context) -> Result<()> {
    let store = credential_store()?;

    if store.exists() {
        store
            .clear()
            .map_err(|e| anyhow::anyhow!("Failed to remove credentials: {e}"))?;
        println!("Credentials removed.");
    } else {
        println!("No stored credentials.");
    }

    if ctx.verbose {
        println!("Credential file: {}", store.path().display());
    }

    Ok(())
}
