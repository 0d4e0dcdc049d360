//! ## sixsim-cli
//! **Command-line front end of the simulator**
//!
//! `sixsim run` boots the default scenario from the layered settings and runs
//! it on the `SimEngine` thread. Ctrl-C ends the run at the next slot.
//! `sixsim check` validates the settings and the connectivity model without
//! running anything.

use clap::Parser;

mod commands;

use commands::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = commands::load_settings(cli.config.as_deref())?;

    match cli.command {
        Commands::Run(run_args) => commands::run_simulation(settings, run_args).await,
        Commands::Check => commands::check(settings),
    }
}
