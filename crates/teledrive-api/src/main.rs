//! Teledrive operator CLI entry point.
//!
//! Binary name: `tdrive`

mod cli;
mod state;

use clap::Parser;

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = state::load(cli.config.as_deref(), cli.log_level()).await?;
    teledrive_observe::tracing_setup::init_tracing(&config.logging)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let state = AppState::init(config)?;

    let result = match cli.command {
        Commands::Upload {
            path,
            name,
            manifest_out,
        } => {
            cli::transfer::upload(&state, &path, name, manifest_out.as_deref(), cli.json).await
        }
        Commands::Download { manifest, out } => {
            cli::transfer::download(&state, &manifest, &out, cli.json).await
        }
        Commands::Url { manifest } => cli::transfer::url(&state, &manifest, cli.json).await,
        Commands::Delete { manifest } => cli::transfer::delete(&state, &manifest, cli.json).await,
        Commands::Status => cli::status::status(&state, cli.json),
        Commands::Bots => cli::status::bots(&state, cli.json),
    };

    teledrive_observe::tracing_setup::shutdown_tracing();
    result
}
