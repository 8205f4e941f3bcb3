//! Logging setup.
//!
//! Every component logs under its own `tracing` target. Each target gets its
//! own file under the log directory, rewritten on every run, and all targets
//! are also appended to a shared `log.log`. The console only shows warnings
//! unless `--verbose` or `RUST_LOG` asks for more.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::filter::{EnvFilter, LevelFilter, Targets};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{Layer, Registry, fmt};

use crate::models::LoggingConfig;

/// Named loggers, one file each.
pub const TARGETS: [&str; 5] = ["config", "embedding", "chroma", "cli", "server"];

pub const GLOBAL_LOG_FILE: &str = "log.log";

/// Handle to the installed subscriber's sinks. Held by `main` for the life of
/// the process.
#[derive(Debug, Clone)]
pub struct Logging {
    dir: PathBuf,
    level: LevelFilter,
}

impl Logging {
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn level(&self) -> LevelFilter {
        self.level
    }
}

struct Sinks {
    global: File,
    per_target: Vec<(&'static str, File)>,
}

fn target_file(dir: &Path, target: &str) -> PathBuf {
    dir.join(format!("{target}.log"))
}

fn open_sinks(dir: &Path) -> io::Result<Sinks> {
    fs::create_dir_all(dir)?;

    let global = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(GLOBAL_LOG_FILE))?;

    let per_target = TARGETS
        .iter()
        .map(|target| Ok((*target, File::create(target_file(dir, target))?)))
        .collect::<io::Result<Vec<_>>>()?;

    Ok(Sinks { global, per_target })
}

fn parse_level(level: &str) -> LevelFilter {
    level.trim().parse().unwrap_or(LevelFilter::INFO)
}

/// Install the global subscriber. Call once, before any command runs.
pub fn init(config: &LoggingConfig, verbose: bool) -> Result<Logging> {
    let level = parse_level(&config.level);
    let sinks = open_sinks(&config.dir)
        .with_context(|| format!("Failed to open log directory {}", config.dir.display()))?;

    let mut file_layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    file_layers.push(
        fmt::layer()
            .with_ansi(false)
            .with_writer(Mutex::new(sinks.global))
            .with_filter(Targets::new().with_targets(TARGETS.map(|t| (t, level))))
            .boxed(),
    );
    for (target, file) in sinks.per_target {
        file_layers.push(
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(file))
                .with_filter(Targets::new().with_target(target, level))
                .boxed(),
        );
    }

    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));
    let console = fmt::layer()
        .with_writer(io::stderr)
        .with_filter(console_filter);

    tracing_subscriber::registry()
        .with(file_layers)
        .with(console)
        .try_init()
        .context("Failed to install logging subscriber")?;

    Ok(Logging {
        dir: config.dir.clone(),
        level,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_open_sinks_creates_files() {
        let dir = TempDir::new().unwrap();
        let logs = dir.path().join("Logs");
        open_sinks(&logs).unwrap();

        for target in TARGETS {
            assert!(target_file(&logs, target).exists());
        }
        assert!(logs.join(GLOBAL_LOG_FILE).exists());
    }

    #[test]
    fn test_per_target_files_truncate_global_appends() {
        let dir = TempDir::new().unwrap();
        {
            let mut sinks = open_sinks(dir.path()).unwrap();
            writeln!(sinks.global, "first run").unwrap();
            writeln!(sinks.per_target[0].1, "first run").unwrap();
        }
        {
            let mut sinks = open_sinks(dir.path()).unwrap();
            writeln!(sinks.global, "second run").unwrap();
        }

        let global = fs::read_to_string(dir.path().join(GLOBAL_LOG_FILE)).unwrap();
        assert!(global.contains("first run") && global.contains("second run"));
        let config_log = fs::read_to_string(target_file(dir.path(), "config")).unwrap();
        assert!(config_log.is_empty());
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug"), LevelFilter::DEBUG);
        assert_eq!(parse_level(" WARN "), LevelFilter::WARN);
        assert_eq!(parse_level("loud"), LevelFilter::INFO);
    }
}
