//! Query models and result ranking.

use serde::{Deserialize, Serialize};

use super::document::Metadata;

pub const DEFAULT_N_RESULTS: usize = 10;

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable table
    #[default]
    Text,
    /// Machine-parseable JSON format
    Json,
    /// Documentation-friendly Markdown format
    Markdown,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            _ => Err(format!("unknown output format: {}", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

/// One nearest-neighbor hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMatch {
    pub id: String,
    pub document: String,
    pub metadata: Metadata,
    /// Smaller is closer.
    pub distance: f32,
}

/// Matches for a single query text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub query: String,
    pub matches: Vec<QueryMatch>,
}

impl QueryResult {
    pub fn new(query: impl Into<String>, matches: Vec<QueryMatch>) -> Self {
        Self {
            query: query.into(),
            matches,
        }
    }

    /// Matches ordered by ascending distance, regardless of backend ordering.
    pub fn ranked(&self) -> Vec<&QueryMatch> {
        rank_by_distance(&self.matches)
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}

/// Sort matches by ascending distance. NaN distances sort last.
pub fn rank_by_distance(matches: &[QueryMatch]) -> Vec<&QueryMatch> {
    let mut ranked: Vec<&QueryMatch> = matches.iter().collect();
    ranked.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    ranked
}
