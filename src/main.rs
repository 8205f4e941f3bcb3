use anyhow::Result;
use clap::Parser;

use chroma_ingest::cli::commands::{
    handle_config, handle_import, handle_menu, handle_query, handle_serve, handle_status,
};
use chroma_ingest::cli::output::get_formatter;
use chroma_ingest::cli::{Cli, Commands};
use chroma_ingest::logging;
use chroma_ingest::models::{Config, OutputFormat};

fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let format = cli.format.unwrap_or_default();

    if let Err(e) = run(cli, format) {
        eprintln!("{}", get_formatter(format).format_error(&format!("{e:#}")));
        std::process::exit(1);
    }
}

fn run(cli: Cli, format: OutputFormat) -> Result<()> {
    let verbose = cli.verbose;
    let explicit = cli.config.as_deref();
    let config = Config::load(explicit)?;

    let logs = logging::init(&config.logging, verbose)?;
    match config.source {
        Some(ref path) => tracing::info!(target: "config", path = %path.display(), "config loaded"),
        None => tracing::warn!(target: "config", "no config file found, using defaults"),
    }
    tracing::debug!(target: "cli", dir = %logs.dir().display(), level = %logs.level(), "logging initialized");

    match cli.command {
        None | Some(Commands::Menu) => handle_menu(&config, format, verbose),
        Some(Commands::Import(args)) => handle_import(args, &config, format, verbose),
        Some(Commands::Query(args)) => handle_query(args, &config, format, verbose),
        Some(Commands::Serve(args)) => handle_serve(args, &config),
        Some(Commands::Status) => handle_status(&config, format, verbose),
        Some(Commands::Config(cmd)) => handle_config(cmd, &config, explicit, format),
    }
}
