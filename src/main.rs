//! pgexplorer - a PostgreSQL data explorer
//!
//! This is the main entry point for the pgexplorer binary.
//! The actual logic is in the library modules for better testability.

use anyhow::Result;
use clap::Parser;
use pgexplorer::app::App;
use pgexplorer::cli::{self, Cli};
use pgexplorer::db::PostgresSession;
use pgexplorer::logging;
use pgexplorer::runtime::Driver;
use std::io::IsTerminal;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(&cli.log_level);

    let mut app = App::new(cli.preferences());
    let mut driver = Driver::<PostgresSession>::new();
    let stdout = std::io::stdout();
    let color = stdout.is_terminal();
    let mut out = stdout.lock();

    cli::run(&cli, &mut app, &mut driver, &mut out, color).await
}
