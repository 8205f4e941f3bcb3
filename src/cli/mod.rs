//! CLI module for the Chroma ingestion toolkit.

pub mod commands;
pub mod loader;
pub mod output;
pub mod prompt;
pub mod session;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::models::OutputFormat;

/// Ingest documents into a Chroma vector database and query them back.
#[derive(Debug, Parser)]
#[command(name = "cingest")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(
        long,
        short = 'c',
        global = true,
        env = "CHROMA_INGEST_CONFIG",
        help = "Path to config.ini"
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        short = 'f',
        global = true,
        help = "Output format: text, json, or markdown"
    )]
    pub format: Option<OutputFormat>,

    #[arg(long, short = 'v', global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Without a subcommand the interactive menu starts.
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Interactive menu: pick a backend, enter or load documents, then query
    Menu,

    /// Load documents from a CSV or JSON file into a collection
    Import(commands::ImportArgs),

    /// Query a collection with one or more texts
    Query(commands::QueryArgs),

    /// Run the HTTP ingestion endpoint
    Serve(commands::ServeArgs),

    /// Check embedding server and Chroma reachability
    Status,

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::ConfigCommand),
}
