//! Renewal Scheduling Engine daemon
//!
//! Operator CLI and scheduler host for renewal session generation.
//!
//! # Usage
//!
//! ```bash
//! renewal-daemon import dataset.json
//! renewal-daemon generate [--capacity N] [--requirement ID]...
//! renewal-daemon regenerate --capacity N
//! renewal-daemon classify --issue-date 2024-01-31 --validity-months 12
//! renewal-daemon sessions
//! renewal-daemon run
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/renewal-engine/config.toml)
//! 3. Environment variables (RENEWAL_*)
//! 4. CLI flags

use anyhow::Result;
use clap::Parser;
use serde::Serialize;

use renewal_daemon::{
    handle_classify, handle_generate, handle_import, handle_regenerate, handle_sessions,
    init_tracing, load_settings, run_scheduler, Cli, Commands,
};

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Classify {
        issue_date,
        validity_months,
        now,
    } = cli.command
    {
        return print_json(&handle_classify(issue_date, validity_months, now));
    }

    let settings = load_settings(
        cli.config.as_deref(),
        cli.log_level.as_deref(),
        cli.data.as_deref(),
    )?;
    init_tracing(&settings.log_level)?;

    match cli.command {
        Commands::Generate(args) => print_json(&handle_generate(&settings, &args).await?)?,
        Commands::Regenerate {
            capacity,
            requirements,
            timeout_secs,
        } => print_json(
            &handle_regenerate(&settings, capacity, &requirements, timeout_secs).await?,
        )?,
        Commands::Sessions { requirements } => {
            print_json(&handle_sessions(&settings, &requirements)?)?
        }
        Commands::Import { file } => print_json(&handle_import(&settings, &file)?)?,
        Commands::Run => run_scheduler(&settings).await?,
        Commands::Classify { .. } => {}
    }

    Ok(())
}
