//! Haulboard CLI - Command-line interface for the delivery schedule board
//!
//! Add, inspect, check and move schedules against a local database.

use clap::Parser;
use tracing_subscriber::filter::Directive;

mod cli;
mod commands;
mod error;


use cli::{Cli, Commands};
use commands::add::run_add;
use commands::changes::run_changes;
use commands::common::{load_config, resolve_config_path, resolve_db_path};
use commands::conflicts::run_conflicts;
use commands::delete::run_delete;
use commands::export::run_export;
use commands::layout::run_layout;
use commands::list::run_list;
use commands::move_schedule::run_move;
use commands::show::run_show;
use error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "haulboard=info".parse::<Directive>() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);
    let config = load_config(&resolve_config_path(cli.config))?;

    match cli.command {
        Commands::Add(args) => {
            run_add(&args, &config, &db_path)?;
        }
        Commands::List { date, days, json } => run_list(date.as_deref(), days, json, &db_path)?,
        Commands::Show { id, json } => run_show(&id, json, &db_path)?,
        Commands::Conflicts {
            id,
            date,
            start,
            end,
            axis,
            json,
        } => run_conflicts(&id, &date, &start, &end, axis, json, &config, &db_path)?,
        Commands::Layout {
            date,
            driver,
            vehicle,
            json,
        } => run_layout(
            &date,
            driver.as_deref(),
            vehicle.as_deref(),
            json,
            &db_path,
        )?,
        Commands::Move(args) => {
            run_move(&args, &config, &db_path).await?;
        }
        Commands::Delete { id } => {
            run_delete(&id, &db_path)?;
        }
        Commands::Export { format, output } => run_export(format, output.as_deref(), &db_path)?,
        Commands::Changes { since, limit, json } => run_changes(since, limit, json, &db_path)?,
    }

    Ok(())
}
