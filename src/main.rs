mod cli;
mod command;
mod config;
mod editor;
mod handlers;
mod materializer;
mod platform;
mod resolver;
mod runner;
mod utils;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use handlers::{custom, languages, run, session};

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    // One thread: process and terminal callbacks are events on this loop
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start event loop")?;

    match cli.command {
        Commands::Run { source, terminal } => runtime.block_on(run::handle_run(source, terminal)),
        Commands::Custom { source } => runtime.block_on(custom::handle_custom(source)),
        Commands::Languages => languages::handle_languages(),
        Commands::Session { source } => runtime.block_on(session::handle_session(source)),
    }
}
