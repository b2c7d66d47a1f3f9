//! CLI command handlers.

pub mod auth;
pub mod ping;
pub mod serve;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Loaded settings (config file + env overrides).
    pub settings: teller_config::Settings,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}
