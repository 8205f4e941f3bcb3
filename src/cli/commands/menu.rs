//! Interactive menu.

use std::io::{BufRead, Write};
use std::path::Path;

use anyhow::{Context, Result};
use console::style;

use crate::cli::loader::{self, LoadedDocuments};
use crate::cli::output::{Formatter, get_formatter};
use crate::cli::prompt::Prompter;
use crate::cli::session::Session;
use crate::error::LoadError;
use crate::models::{Config, DEFAULT_N_RESULTS, Document, OutputFormat, zip_documents};
use crate::services::BackendKind;

enum Choice {
    Open(BackendKind),
    Exit,
}

fn parse_choice(answer: &str) -> Option<Choice> {
    match answer {
        "1" => Some(Choice::Open(BackendKind::Persistent)),
        "2" => Some(Choice::Open(BackendKind::Http)),
        "3" => Some(Choice::Open(BackendKind::AsyncHttp)),
        "4" => Some(Choice::Exit),
        _ => None,
    }
}

pub fn handle_menu(config: &Config, format: OutputFormat, verbose: bool) -> Result<()> {
    let formatter = get_formatter(format);
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    run_menu(
        &mut Prompter::stdio(),
        config,
        formatter.as_ref(),
        &cwd,
        verbose,
    )
}

/// Show the menu until the user exits or input ends. A failed action is
/// reported and the menu shown again.
pub fn run_menu<R: BufRead, W: Write>(
    prompter: &mut Prompter<R, W>,
    config: &Config,
    formatter: &dyn Formatter,
    dir: &Path,
    verbose: bool,
) -> Result<()> {
    loop {
        prompter.say(style("Main Menu").cyan().bold())?;
        prompter.say(style("Welcome to Chroma ingest toolkit!").cyan())?;
        prompter.say(format!("{} Use Persistent Chroma DB", style("1.").yellow().bold()))?;
        prompter.say(format!(
            "{} Connect to a web (HTTP) Chroma DB",
            style("2.").yellow().bold()
        ))?;
        prompter.say(format!(
            "{} Connect to a web (HTTP) Async Chroma DB",
            style("3.").yellow().bold()
        ))?;
        prompter.say(format!("{} Exit\n", style("4.").yellow().bold()))?;

        let Some(answer) = prompter.ask("Choose an option: ")? else {
            return Ok(());
        };

        let kind = match parse_choice(&answer) {
            Some(Choice::Open(kind)) => kind,
            Some(Choice::Exit) => return Ok(()),
            None => {
                prompter.say(style("Invalid choice").red().bold())?;
                continue;
            }
        };

        tracing::info!(target: "cli", backend = %kind, "menu selection");
        if let Err(e) = run_session(prompter, config, formatter, dir, kind, verbose) {
            tracing::error!(target: "cli", "menu action failed: {e:#}");
            prompter.say(formatter.format_error(&format!("{e:#}")).trim_end())?;
        }
    }
}

fn run_session<R: BufRead, W: Write>(
    prompter: &mut Prompter<R, W>,
    config: &Config,
    formatter: &dyn Formatter,
    dir: &Path,
    kind: BackendKind,
    verbose: bool,
) -> Result<()> {
    let mut session = Session::open(kind, config)?;

    let name = prompter.ask_line("Enter your collection name: ")?;
    session.get_collection(&name)?;
    let collection = session.collection().unwrap_or_default().to_string();

    let documents = collect_documents(prompter, formatter, dir)?;
    if documents.is_empty() {
        prompter.say(style("No documents entered; skipping insert.").yellow())?;
    } else {
        let report = session.insert_with_progress(documents, true)?;
        prompter.say(formatter.format_insert_report(&collection, &report).trim_end())?;
    }
    if verbose && let Ok(count) = session.count() {
        prompter.say(format!("Collection '{collection}' now holds {count} document(s)"))?;
    }

    prompter.say(style("Query Chroma vector Database!").cyan().bold())?;
    loop {
        let queries = prompter.prompt_queries()?;
        if queries.is_empty() {
            return Ok(());
        }
        let results = session.query(&queries, DEFAULT_N_RESULTS)?;
        prompter.say(formatter.format_query_results(&results).trim_end())?;
    }
}

/// Documents from a file when the user asks for one, otherwise typed in. A
/// failed file load falls back to typing.
fn collect_documents<R: BufRead, W: Write>(
    prompter: &mut Prompter<R, W>,
    formatter: &dyn Formatter,
    dir: &Path,
) -> Result<Vec<Document>> {
    if prompter.confirm("Load documents from a CSV/JSON file?")? {
        match load_from_dir(prompter, dir) {
            Ok(loaded) => return Ok(loaded.into_documents()),
            Err(LoadError::NoCandidates(_)) => {
                prompter.say(style(format!(
                    "No CSV or JSON files found. Wrote {} and {} in {}; fill one in and rerun.",
                    loader::CSV_TEMPLATE_FILE,
                    loader::JSON_TEMPLATE_FILE,
                    dir.display()
                )).yellow())?;
            }
            Err(e) => {
                tracing::warn!(target: "cli", "file load failed: {e}");
                prompter.say(formatter.format_error(&e.to_string()).trim_end())?;
            }
        }
        prompter.say(style("Falling back to manual entry.").yellow())?;
    }

    collect_interactive(prompter)
}

fn load_from_dir<R: BufRead, W: Write>(
    prompter: &mut Prompter<R, W>,
    dir: &Path,
) -> Result<LoadedDocuments, LoadError> {
    let path = loader::choose_file(dir, prompter)?;
    loader::load_file(&path)
}

fn collect_interactive<R: BufRead, W: Write>(
    prompter: &mut Prompter<R, W>,
) -> Result<Vec<Document>> {
    prompter.say(style("Collecting Chroma inputs...\n").green().bold())?;
    let ids = prompter.prompt_list("IDs")?;
    let texts = prompter.prompt_list("documents")?;
    let metadatas = prompter.prompt_metadata_list()?;

    zip_documents(ids, texts, metadatas).map_err(|e| anyhow::anyhow!("{e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::output::TextFormatter;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> Config {
        Config::parse(&format!(
            "[Embedding]\nmodel = nomic-embed-text\nhost = http://127.0.0.1:9\n[Chroma]\npersist_dir = {}\n",
            dir.path().join("Embeddings").display()
        ))
        .unwrap()
    }

    fn run(input: &str, dir: &TempDir) -> String {
        let mut prompter = Prompter::new(Cursor::new(input.as_bytes().to_vec()), Vec::new());
        run_menu(&mut prompter, &config(dir), &TextFormatter, dir.path(), false).unwrap();
        let (_, output) = prompter.into_parts();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn test_parse_choice() {
        assert!(matches!(parse_choice("1"), Some(Choice::Open(BackendKind::Persistent))));
        assert!(matches!(parse_choice("3"), Some(Choice::Open(BackendKind::AsyncHttp))));
        assert!(matches!(parse_choice("4"), Some(Choice::Exit)));
        assert!(parse_choice("5").is_none());
    }

    #[test]
    fn test_exit_option() {
        let dir = TempDir::new().unwrap();
        let output = run("4\n", &dir);
        assert!(output.contains("Main Menu"));
    }

    #[test]
    fn test_invalid_choice_then_eof() {
        let dir = TempDir::new().unwrap();
        let output = run("9\n", &dir);
        assert!(output.contains("Invalid choice"));
    }

    #[test]
    fn test_http_without_endpoint_reports_error_and_returns_to_menu() {
        let dir = TempDir::new().unwrap();
        let output = run("2\n4\n", &dir);
        assert!(output.contains("HttpClient_Host"));
        assert_eq!(output.matches("Main Menu").count(), 2);
    }

    #[test]
    fn test_file_load_without_candidates_writes_templates() {
        let dir = TempDir::new().unwrap();
        // persistent store, collection, load from file, no files, then empty
        // manual entry and no queries.
        let output = run("1\ndocs\ny\n\n\n\n\n4\n", &dir);
        assert!(output.contains("fill one in and rerun"));
        assert!(output.contains("No documents entered"));
        assert!(dir.path().join(loader::JSON_TEMPLATE_FILE).exists());
    }

    #[test]
    fn test_mismatched_manual_entry_is_reported() {
        let dir = TempDir::new().unwrap();
        let output = run("1\ndocs\nn\na\nb\n\nonly one\n\n\n4\n", &dir);
        assert!(output.contains("2 ids but 1 documents"));
    }
}
