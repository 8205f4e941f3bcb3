use anyhow::Result;

use crate::cli::output::{ServiceStatus, StatusInfo, get_formatter};
use crate::models::{Config, OutputFormat};
use crate::services::{EmbeddingClient, PersistentStore, ping};

fn embedding_status(config: &Config) -> ServiceStatus {
    let mut status = ServiceStatus {
        name: "Embedding".to_string(),
        url: Some(config.embedding.host.clone()),
        reachable: false,
        detail: None,
    };
    match EmbeddingClient::new(&config.embedding) {
        Ok(client) => match client.health_check() {
            Ok(()) => status.reachable = true,
            Err(e) => status.detail = Some(e.to_string()),
        },
        Err(e) => status.detail = Some(e.to_string()),
    }
    status
}

fn chroma_status(config: &Config) -> ServiceStatus {
    let mut status = ServiceStatus {
        name: "Chroma HTTP".to_string(),
        url: config.chroma.base_url().ok(),
        reachable: false,
        detail: None,
    };
    match ping(&config.chroma) {
        Ok(_) => status.reachable = true,
        Err(e) => status.detail = Some(e.to_string()),
    }
    status
}

pub fn handle_status(config: &Config, format: OutputFormat, verbose: bool) -> Result<()> {
    let formatter = get_formatter(format);

    let services = vec![embedding_status(config), chroma_status(config)];
    let persist_documents = match PersistentStore::total_documents(&config.chroma.persist_dir) {
        Ok(count) => count,
        Err(e) => {
            tracing::warn!(target: "cli", "cannot read persistent store: {e}");
            None
        }
    };

    let status = StatusInfo {
        config_path: config.source.as_ref().map(|p| p.display().to_string()),
        embedding_model: if config.embedding.model.is_empty() {
            "(not set)".to_string()
        } else {
            config.embedding.model.clone()
        },
        services,
        persist_dir: config.chroma.persist_dir.display().to_string(),
        persist_documents,
        log_dir: config.logging.dir.display().to_string(),
    };

    print!("{}", formatter.format_status(&status));

    let embedding_down = !status.services[0].reachable;
    let chroma_down = !status.services[1].reachable;
    if embedding_down || (verbose && chroma_down) {
        eprintln!();
        if embedding_down {
            eprintln!("Hint: start the embedding server with: ollama serve");
            if config.embedding.model.is_empty() {
                eprintln!("      and set [Embedding] model in config.ini");
            }
        }
        if verbose && chroma_down {
            eprintln!(
                "Hint: the HTTP backends need [Chroma] HttpClient_Host and HttpClient_Port; \
                 the persistent backend works without them."
            );
        }
    }

    Ok(())
}
