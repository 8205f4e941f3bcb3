use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A scalar metadata value. Chroma accepts strings, integers, floats and bools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

impl MetadataValue {
    /// Interpret interactive input: pure ASCII digit strings become integers.
    pub fn from_input(value: &str) -> Self {
        let value = value.trim();
        if !value.is_empty()
            && value.chars().all(|c| c.is_ascii_digit())
            && let Ok(n) = value.parse::<i64>()
        {
            return MetadataValue::Int(n);
        }
        MetadataValue::Str(value.to_string())
    }

    /// Convert a JSON value, rejecting nested objects, arrays and nulls.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) => Some(MetadataValue::Str(s.clone())),
            serde_json::Value::Bool(b) => Some(MetadataValue::Bool(*b)),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(MetadataValue::Int)
                .or_else(|| n.as_f64().map(MetadataValue::Float)),
            _ => None,
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Int(n) => write!(f, "{n}"),
            MetadataValue::Float(n) => write!(f, "{n}"),
            MetadataValue::Bool(b) => write!(f, "{b}"),
            MetadataValue::Str(s) => write!(f, "'{s}'"),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::Str(value.to_string())
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        MetadataValue::Int(value)
    }
}

/// Document metadata, ordered by key.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// Render metadata the way it is shown in result tables: `{'k': 'v', 'n': 1}`.
pub fn format_metadata(metadata: &Metadata) -> String {
    let pairs: Vec<String> = metadata
        .iter()
        .map(|(k, v)| format!("'{k}': {v}"))
        .collect();
    format!("{{{}}}", pairs.join(", "))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub embedding: Option<Vec<f32>>,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata,
            embedding: None,
        }
    }

    /// Build a document for a log line received over HTTP. The id is derived
    /// from the message so identical lines collapse onto one record.
    pub fn from_log_message(message: &str) -> Self {
        use sha2::{Digest, Sha256};
        use uuid::Uuid;

        let id = Uuid::new_v5(&Uuid::NAMESPACE_OID, message.as_bytes()).to_string();
        let checksum = hex::encode(Sha256::digest(message.as_bytes()));

        let mut metadata = Metadata::new();
        metadata.insert("source".to_string(), "ingest/log".into());
        metadata.insert(
            "received_at".to_string(),
            MetadataValue::Str(chrono::Utc::now().to_rfc3339()),
        );
        metadata.insert("checksum".to_string(), MetadataValue::Str(checksum));

        Self::new(id, message, metadata)
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

/// Zip parallel id/text/metadata sequences into documents.
///
/// Missing metadata entries default to empty; more metadata entries than
/// documents, or differing id/text counts, are rejected.
pub fn zip_documents(
    ids: Vec<String>,
    texts: Vec<String>,
    metadatas: Vec<Metadata>,
) -> Result<Vec<Document>, String> {
    if ids.len() != texts.len() {
        return Err(format!(
            "got {} ids but {} documents",
            ids.len(),
            texts.len()
        ));
    }
    if metadatas.len() > ids.len() {
        return Err(format!(
            "got {} metadata objects for {} documents",
            metadatas.len(),
            ids.len()
        ));
    }

    let mut metadatas = metadatas.into_iter();
    Ok(ids
        .into_iter()
        .zip(texts)
        .map(|(id, text)| Document::new(id, text, metadatas.next().unwrap_or_default()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_from_input() {
        assert_eq!(MetadataValue::from_input("123"), MetadataValue::Int(123));
        assert_eq!(
            MetadataValue::from_input("12a"),
            MetadataValue::Str("12a".to_string())
        );
        assert_eq!(
            MetadataValue::from_input("-5"),
            MetadataValue::Str("-5".to_string())
        );
        assert_eq!(
            MetadataValue::from_input(""),
            MetadataValue::Str(String::new())
        );
    }

    #[test]
    fn test_metadata_from_json() {
        let v = serde_json::json!(123);
        assert_eq!(MetadataValue::from_json(&v), Some(MetadataValue::Int(123)));
        let v = serde_json::json!(1.5);
        assert_eq!(MetadataValue::from_json(&v), Some(MetadataValue::Float(1.5)));
        assert_eq!(MetadataValue::from_json(&serde_json::json!({"a": 1})), None);
        assert_eq!(MetadataValue::from_json(&serde_json::Value::Null), None);
    }

    #[test]
    fn test_metadata_serde_untagged() {
        let meta: Metadata = serde_json::from_str(r#"{"category":"example","value":123}"#).unwrap();
        assert_eq!(meta["category"], MetadataValue::Str("example".to_string()));
        assert_eq!(meta["value"], MetadataValue::Int(123));
        assert_eq!(
            serde_json::to_string(&meta).unwrap(),
            r#"{"category":"example","value":123}"#
        );
    }

    #[test]
    fn test_format_metadata() {
        let mut meta = Metadata::new();
        meta.insert("tag".to_string(), "demo".into());
        meta.insert("value".to_string(), 7i64.into());
        assert_eq!(format_metadata(&meta), "{'tag': 'demo', 'value': 7}");
        assert_eq!(format_metadata(&Metadata::new()), "{}");
    }

    #[test]
    fn test_log_message_id_is_stable() {
        let a = Document::from_log_message("disk full on /var");
        let b = Document::from_log_message("disk full on /var");
        assert_eq!(a.id, b.id);
        assert_eq!(a.id.len(), 36);
        assert!(a.metadata.contains_key("received_at"));
    }

    #[test]
    fn test_zip_documents() {
        let docs = zip_documents(
            vec!["1".into(), "2".into()],
            vec!["a".into(), "b".into()],
            vec![Metadata::new()],
        )
        .unwrap();
        assert_eq!(docs.len(), 2);
        assert!(docs[1].metadata.is_empty());

        assert!(zip_documents(vec!["1".into()], vec![], vec![]).is_err());
        assert!(
            zip_documents(
                vec!["1".into()],
                vec!["a".into()],
                vec![Metadata::new(), Metadata::new()]
            )
            .is_err()
        );
    }
}
