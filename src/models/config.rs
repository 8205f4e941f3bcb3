use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ini::Ini;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_EMBEDDING_HOST: &str = "http://localhost:11434";
pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_TENANT: &str = "default_tenant";
pub const DEFAULT_DATABASE: &str = "default_database";
pub const DEFAULT_PERSIST_DIR: &str = "Embeddings";
pub const DEFAULT_LOG_DIR: &str = "Logs";
pub const DEFAULT_SERVER_PORT: u16 = 8000;
pub const DEFAULT_SERVER_COLLECTION: &str = "logs";
pub const CONFIG_FILE_NAME: &str = "config.ini";
pub const CONFIG_ENV_VAR: &str = "CHROMA_INGEST_CONFIG";

/// Template written by `config init`.
pub const CONFIG_TEMPLATE: &str = "\
[Embedding]
model = nomic-embed-text
host = http://localhost:11434
batch_size = 100

[Chroma]
HttpClient_Host = localhost
HttpClient_Port = 8000
distance = l2

[Logging]
level = info
dir = Logs
";

/// Raw configuration: section name -> key -> value.
pub type RawConfig = BTreeMap<String, BTreeMap<String, String>>;

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub embedding: EmbeddingConfig,
    pub chroma: ChromaConfig,
    pub logging: LoggingConfig,
    pub server: ServerConfig,
    /// Every section and key as read from the file.
    pub raw: RawConfig,
    /// File the configuration was read from, if any.
    pub source: Option<PathBuf>,
}

impl Config {
    /// Candidate config paths in lookup order.
    pub fn search_paths(explicit: Option<&Path>) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Some(path) = explicit {
            paths.push(path.to_path_buf());
            return paths;
        }
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR)
            && !path.trim().is_empty()
        {
            paths.push(PathBuf::from(path));
        }
        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd.join(CONFIG_FILE_NAME));
            if let Some(parent) = cwd.parent() {
                paths.push(parent.join(CONFIG_FILE_NAME));
            }
        }
        if let Some(path) = Self::global_path() {
            paths.push(path);
        }
        paths
    }

    pub fn global_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("chroma-ingest").join(CONFIG_FILE_NAME))
    }

    /// Load the first config file found. An explicit path must exist; otherwise
    /// falling through every candidate yields the defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(ConfigError::PathError(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            return Self::from_file(path);
        }

        for path in Self::search_paths(None) {
            if path.is_file() {
                return Self::from_file(&path);
            }
        }

        Ok(Self::default())
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&content)?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(content)
            .map_err(|e| ConfigError::IniParseError(e.to_string()))?;

        let mut raw = RawConfig::new();
        for (section, props) in ini.iter() {
            let Some(section) = section else { continue };
            let entry = raw.entry(section.to_string()).or_default();
            for (key, value) in props.iter() {
                entry.insert(key.to_string(), value.trim().to_string());
            }
        }

        let embedding = EmbeddingConfig::from_raw(&raw)?;
        let chroma = ChromaConfig::from_raw(&raw)?;
        let logging = LoggingConfig::from_raw(&raw);
        let server = ServerConfig::from_raw(&raw)?;

        Ok(Self {
            embedding,
            chroma,
            logging,
            server,
            raw,
            source: None,
        })
    }

    /// Write the template config to `path`.
    pub fn write_template(path: &Path, force: bool) -> Result<(), ConfigError> {
        if path.exists() && !force {
            return Err(ConfigError::PathError(format!(
                "config already exists at {} (use --force to overwrite)",
                path.display()
            )));
        }
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, CONFIG_TEMPLATE)?;
        Ok(())
    }
}

/// Section/key lookup. Keys match case-insensitively, as INI readers usually do.
pub fn lookup<'a>(raw: &'a RawConfig, section: &str, key: &str) -> Option<&'a str> {
    raw.get(section)?
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v.as_str())
        .filter(|v| !v.is_empty())
}

fn parse_value<T: FromStr>(
    raw: &RawConfig,
    section: &str,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(raw, section, key) {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::invalid(section, key, format!("cannot parse '{value}'"))),
        None => Ok(default),
    }
}

/// Which embedding endpoint to call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingApi {
    /// `POST /api/embed` with a list of inputs per request.
    #[default]
    Embed,
    /// `POST /api/embeddings` with one prompt per request.
    Embeddings,
}

impl FromStr for EmbeddingApi {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "embed" => Ok(EmbeddingApi::Embed),
            "embeddings" | "legacy" => Ok(EmbeddingApi::Embeddings),
            _ => Err(format!("unknown embedding api: {s}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub model: String,
    pub host: String,
    pub batch_size: usize,
    pub api: EmbeddingApi,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: String::new(),
            host: DEFAULT_EMBEDDING_HOST.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            api: EmbeddingApi::default(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl EmbeddingConfig {
    const SECTION: &'static str = "Embedding";

    fn from_raw(raw: &RawConfig) -> Result<Self, ConfigError> {
        let s = Self::SECTION;
        let batch_size = parse_value(raw, s, "batch_size", DEFAULT_BATCH_SIZE)?;
        if batch_size == 0 {
            return Err(ConfigError::invalid(s, "batch_size", "must be at least 1"));
        }

        let api = match lookup(raw, s, "api") {
            Some(v) => v.parse().map_err(|e| ConfigError::invalid(s, "api", e))?,
            None => EmbeddingApi::default(),
        };

        Ok(Self {
            model: lookup(raw, s, "model").unwrap_or_default().to_string(),
            host: lookup(raw, s, "host")
                .unwrap_or(DEFAULT_EMBEDDING_HOST)
                .to_string(),
            batch_size,
            api,
            timeout_secs: parse_value(raw, s, "timeout_secs", DEFAULT_TIMEOUT_SECS)?,
        })
    }
}

/// Distance function used to rank query matches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distance {
    /// Squared Euclidean distance.
    #[default]
    L2,
    /// `1 - cosine similarity`.
    Cosine,
    /// `1 - dot product`.
    Ip,
}

impl Distance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Distance::L2 => "l2",
            Distance::Cosine => "cosine",
            Distance::Ip => "ip",
        }
    }
}

impl FromStr for Distance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "l2" => Ok(Distance::L2),
            "cosine" => Ok(Distance::Cosine),
            "ip" => Ok(Distance::Ip),
            _ => Err(format!("unknown distance: {s}")),
        }
    }
}

impl std::fmt::Display for Distance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChromaConfig {
    pub http_host: Option<String>,
    /// Kept raw so a malformed port surfaces when the HTTP client is created.
    pub http_port: Option<String>,
    pub tenant: String,
    pub database: String,
    pub distance: Distance,
    pub persist_dir: PathBuf,
}

impl Default for ChromaConfig {
    fn default() -> Self {
        Self {
            http_host: None,
            http_port: None,
            tenant: DEFAULT_TENANT.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            distance: Distance::default(),
            persist_dir: PathBuf::from(DEFAULT_PERSIST_DIR),
        }
    }
}

impl ChromaConfig {
    const SECTION: &'static str = "Chroma";

    fn from_raw(raw: &RawConfig) -> Result<Self, ConfigError> {
        let s = Self::SECTION;
        let distance = match lookup(raw, s, "distance") {
            Some(v) => v.parse().map_err(|e| ConfigError::invalid(s, "distance", e))?,
            None => Distance::default(),
        };

        Ok(Self {
            http_host: lookup(raw, s, "HttpClient_Host").map(str::to_string),
            http_port: lookup(raw, s, "HttpClient_Port").map(str::to_string),
            tenant: lookup(raw, s, "tenant").unwrap_or(DEFAULT_TENANT).to_string(),
            database: lookup(raw, s, "database")
                .unwrap_or(DEFAULT_DATABASE)
                .to_string(),
            distance,
            persist_dir: PathBuf::from(lookup(raw, s, "persist_dir").unwrap_or(DEFAULT_PERSIST_DIR)),
        })
    }

    /// Host and port of the remote Chroma server. Both are required.
    pub fn http_endpoint(&self) -> Result<(String, u16), ConfigError> {
        let s = Self::SECTION;
        let host = self
            .http_host
            .as_deref()
            .ok_or_else(|| ConfigError::missing(s, "HttpClient_Host"))?;
        let port_str = self
            .http_port
            .as_deref()
            .ok_or_else(|| ConfigError::missing(s, "HttpClient_Port"))?;

        if !port_str.chars().all(|c| c.is_ascii_digit()) {
            return Err(ConfigError::invalid(
                s,
                "HttpClient_Port",
                format!("'{port_str}' is not a number"),
            ));
        }
        let port: u16 = port_str
            .parse()
            .ok()
            .filter(|p| *p != 0)
            .ok_or_else(|| ConfigError::invalid(s, "HttpClient_Port", "out of range"))?;

        Ok((host.to_string(), port))
    }

    /// Base URL for the Chroma REST API.
    pub fn base_url(&self) -> Result<String, ConfigError> {
        let (host, port) = self.http_endpoint()?;
        if host.starts_with("http://") || host.starts_with("https://") {
            Ok(format!("{}:{}", host.trim_end_matches('/'), port))
        } else {
            Ok(format!("http://{host}:{port}"))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: PathBuf::from(DEFAULT_LOG_DIR),
        }
    }
}

impl LoggingConfig {
    fn from_raw(raw: &RawConfig) -> Self {
        let defaults = Self::default();
        Self {
            level: lookup(raw, "Logging", "level")
                .map(str::to_string)
                .unwrap_or(defaults.level),
            dir: lookup(raw, "Logging", "dir")
                .map(PathBuf::from)
                .unwrap_or(defaults.dir),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub collection: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_SERVER_PORT,
            collection: DEFAULT_SERVER_COLLECTION.to_string(),
        }
    }
}

impl ServerConfig {
    fn from_raw(raw: &RawConfig) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            host: lookup(raw, "Server", "host")
                .map(str::to_string)
                .unwrap_or(defaults.host),
            port: parse_value(raw, "Server", "port", defaults.port)?,
            collection: lookup(raw, "Server", "collection")
                .map(str::to_string)
                .unwrap_or(defaults.collection),
        })
    }
}
