//! Import command implementation.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;

use crate::cli::loader;
use crate::cli::output::get_formatter;
use crate::cli::session::Session;
use crate::models::{Config, OutputFormat};
use crate::services::BackendKind;

/// Arguments for the import command.
#[derive(Debug, Args)]
pub struct ImportArgs {
    /// Path to a CSV (id,document,metadata) or JSON file
    #[arg()]
    pub file: PathBuf,

    /// Collection to insert into (created if missing)
    #[arg(long)]
    pub collection: String,

    /// Backend: persistent, http, or async-http
    #[arg(long, short = 'b', default_value = "persistent")]
    pub backend: BackendKind,

    /// Only validate the file without inserting
    #[arg(long)]
    pub validate_only: bool,
}

/// Handle the import command.
pub fn handle_import(
    args: ImportArgs,
    config: &Config,
    format: OutputFormat,
    verbose: bool,
) -> Result<()> {
    let formatter = get_formatter(format);
    let start_time = Instant::now();

    let loaded = loader::load_file(&args.file)
        .with_context(|| format!("Failed to load {}", args.file.display()))?;

    if args.validate_only {
        println!(
            "{}",
            formatter.format_message(&format!(
                "{} is valid: {} document(s)",
                args.file.display(),
                loaded.len()
            ))
        );
        return Ok(());
    }

    if verbose {
        eprintln!(
            "Loaded {} document(s) from {}",
            loaded.len(),
            args.file.display()
        );
    }

    let mut session = Session::open(args.backend, config)?;
    session
        .get_collection(&args.collection)
        .with_context(|| format!("Failed to open collection '{}'", args.collection))?;

    let show_progress = format == OutputFormat::Text && console::user_attended_stderr();
    let report = session.insert_with_progress(loaded.into_documents(), show_progress)?;

    print!(
        "{}",
        formatter.format_insert_report(&args.collection, &report)
    );
    if verbose {
        eprintln!("Completed in {}ms", start_time.elapsed().as_millis());
    }

    Ok(())
}
