//! divtrack CLI - record and review dividend payments against the HTTP endpoint

mod cli;
mod commands;
mod error;

use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::add::run_add;
use crate::commands::common::{connect, resolve_endpoint};
use crate::commands::completions::run_completions;
use crate::commands::delete::run_delete;
use crate::commands::export::run_export;
use crate::commands::list::run_list;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    #[cfg(debug_assertions)]
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "divtrack_cli=warn".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Completions { shell, output } = &cli.command {
        return run_completions(*shell, output.as_deref());
    }

    let endpoint = resolve_endpoint(cli.endpoint);
    let session = connect(&endpoint, cli.user).await?;

    match cli.command {
        Commands::List { json } => run_list(&session, json)?,
        Commands::Add {
            stock,
            amount,
            date,
            id,
        } => run_add(&session, &stock, &amount, date, id).await?,
        Commands::Delete { id } => run_delete(&session, id).await?,
        Commands::Export { format, output } => {
            run_export(&session, format.into(), output.as_deref())?;
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}
