use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;

use crate::cli::output::{Formatter, get_formatter};
use crate::models::{CONFIG_ENV_VAR, Config, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    #[command(about = "Write a template config.ini")]
    Init {
        #[arg(
            long,
            short = 'g',
            help = "Create the user-wide config instead of ./config.ini"
        )]
        global: bool,
        #[arg(long, help = "Force overwrite existing config")]
        force: bool,
    },
    #[command(about = "Show current configuration")]
    Show {
        #[arg(long, help = "Show every key exactly as read from the file")]
        raw: bool,
    },
    #[command(about = "Show configuration file paths")]
    Path {
        #[arg(long, help = "Show all candidate config paths")]
        all: bool,
    },
}

pub fn handle_config(
    cmd: ConfigCommand,
    config: &Config,
    explicit: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    let formatter = get_formatter(format);

    match cmd {
        ConfigCommand::Init { global, force } => handle_init(global, force, formatter.as_ref()),
        ConfigCommand::Show { raw } => handle_show(config, raw, format),
        ConfigCommand::Path { all } => handle_path(config, explicit, all),
    }
}

fn handle_init(global: bool, force: bool, formatter: &dyn Formatter) -> Result<()> {
    let path = if global {
        Config::global_path()
            .ok_or_else(|| anyhow::anyhow!("could not determine user config directory"))?
    } else {
        PathBuf::from(crate::models::CONFIG_FILE_NAME)
    };

    Config::write_template(&path, force).context("failed to write config template")?;
    println!(
        "{}",
        formatter.format_message(&format!("Created config at: {}", path.display()))
    );
    Ok(())
}

fn handle_show(config: &Config, raw: bool, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        let output = if raw {
            serde_json::to_value(&config.raw)?
        } else {
            serde_json::json!({
                "source": config.source,
                "embedding": config.embedding,
                "chroma": config.chroma,
                "logging": config.logging,
                "server": config.server,
            })
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    match config.source {
        Some(ref path) => println!("# Config: {}", path.display()),
        None => println!("# No config file found; showing defaults"),
    }
    println!();

    if raw {
        for (section, keys) in &config.raw {
            println!("[{section}]");
            for (key, value) in keys {
                println!("{key} = {value}");
            }
            println!();
        }
        return Ok(());
    }

    let embedding = &config.embedding;
    println!("[Embedding]");
    println!("model = {}", embedding.model);
    println!("host = {}", embedding.host);
    println!("batch_size = {}", embedding.batch_size);
    println!(
        "api = {}",
        serde_json::to_value(embedding.api)?.as_str().unwrap_or_default()
    );
    println!("timeout_secs = {}", embedding.timeout_secs);
    println!();

    let chroma = &config.chroma;
    println!("[Chroma]");
    if let Some(ref host) = chroma.http_host {
        println!("HttpClient_Host = {host}");
    }
    if let Some(ref port) = chroma.http_port {
        println!("HttpClient_Port = {port}");
    }
    println!("tenant = {}", chroma.tenant);
    println!("database = {}", chroma.database);
    println!("distance = {}", chroma.distance);
    println!("persist_dir = {}", chroma.persist_dir.display());
    println!();

    println!("[Logging]");
    println!("level = {}", config.logging.level);
    println!("dir = {}", config.logging.dir.display());
    println!();

    println!("[Server]");
    println!("host = {}", config.server.host);
    println!("port = {}", config.server.port);
    println!("collection = {}", config.server.collection);

    Ok(())
}

fn handle_path(config: &Config, explicit: Option<&Path>, all: bool) -> Result<()> {
    match config.source {
        Some(ref path) => println!("In use: {}", path.display()),
        None => println!("In use: (none, defaults)"),
    }

    if all {
        println!("\nSearch order (--config, ${CONFIG_ENV_VAR}, ./, ../, user config dir):");
        for path in Config::search_paths(explicit) {
            let marker = if path.is_file() { "[found]" } else { "[missing]" };
            println!("  {marker:<9} {}", path.display());
        }
    }
    Ok(())
}
