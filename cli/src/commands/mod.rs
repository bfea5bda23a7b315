//! CLI command definitions and dispatch.

mod fetch;
mod resolve;
mod version;

use clap::{Parser, Subcommand};

/// Fetch Kong plugin images from OCI registries.
#[derive(Parser)]
#[command(name = "plugin-image", version, about)]
pub struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Command {
    /// Fetch a plugin image and extract handler.lua and schema.lua
    Fetch(fetch::FetchArgs),
    /// Parse an image reference without contacting the registry
    Resolve(resolve::ResolveArgs),
    /// Show version information
    Version(version::VersionArgs),
}

/// Dispatch a parsed CLI to the appropriate command handler.
pub async fn dispatch(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::Fetch(args) => fetch::execute(args).await,
        Command::Resolve(args) => resolve::execute(args).await,
        Command::Version(args) => version::execute(args).await,
    }
}
