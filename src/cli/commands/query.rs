use anyhow::{Context, Result};
use clap::Args;

use crate::cli::output::get_formatter;
use crate::cli::session::Session;
use crate::models::{Config, DEFAULT_N_RESULTS, OutputFormat};
use crate::services::BackendKind;

#[derive(Debug, Args)]
pub struct QueryArgs {
    #[arg(required = true, help = "Query texts")]
    pub texts: Vec<String>,

    #[arg(long, help = "Collection to query")]
    pub collection: String,

    #[arg(long, short = 'b', default_value = "persistent", help = "Backend: persistent, http, or async-http")]
    pub backend: BackendKind,

    #[arg(long = "n-results", short = 'n', default_value_t = DEFAULT_N_RESULTS, help = "Matches per query")]
    pub n_results: usize,
}

pub fn handle_query(
    args: QueryArgs,
    config: &Config,
    format: OutputFormat,
    verbose: bool,
) -> Result<()> {
    if args.texts.iter().all(|t| t.trim().is_empty()) {
        anyhow::bail!("query text cannot be empty");
    }
    if args.n_results == 0 {
        anyhow::bail!("n-results must be at least 1");
    }

    let formatter = get_formatter(format);
    let mut session = Session::open(args.backend, config)?;
    session
        .get_collection(&args.collection)
        .with_context(|| format!("Failed to open collection '{}'", args.collection))?;

    if verbose {
        eprintln!(
            "Querying '{}' ({}) with {} text(s), n={}",
            args.collection,
            session.kind(),
            args.texts.len(),
            args.n_results
        );
    }

    let results = session.query(&args.texts, args.n_results)?;
    print!("{}", formatter.format_query_results(&results));
    Ok(())
}
