//! Bulk document loading from CSV and JSON files.

use std::fs::{self, File};
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::prompt::Prompter;
use crate::error::LoadError;
use crate::models::{Document, Metadata, MetadataValue};

pub const CSV_TEMPLATE_FILE: &str = "template.csv";
pub const JSON_TEMPLATE_FILE: &str = "template.json";

const CANDIDATE_PATTERNS: [&str; 2] = ["*.csv", "*.json"];
const REQUIRED_COLUMNS: [&str; 3] = ["id", "document", "metadata"];

/// Parallel id/document/metadata sequences of equal length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadedDocuments {
    pub ids: Vec<String>,
    pub documents: Vec<String>,
    pub metadatas: Vec<Metadata>,
}

impl LoadedDocuments {
    fn push(&mut self, id: String, document: String, metadata: Metadata) {
        self.ids.push(id);
        self.documents.push(document);
        self.metadatas.push(metadata);
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn into_documents(self) -> Vec<Document> {
        self.ids
            .into_iter()
            .zip(self.documents)
            .zip(self.metadatas)
            .map(|((id, text), metadata)| Document::new(id, text, metadata))
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct JsonRecord {
    id: String,
    document: String,
    #[serde(default)]
    metadata: Option<serde_json::Value>,
}

fn template_rows() -> Vec<(&'static str, &'static str, serde_json::Value)> {
    vec![
        (
            "1",
            "Sample document text",
            serde_json::json!({"category": "example", "value": 123}),
        ),
        (
            "2",
            "Another sample text",
            serde_json::json!({"tag": "demo"}),
        ),
    ]
}

/// Convert a JSON object into metadata. `null` means no metadata.
fn metadata_from_json(value: &serde_json::Value) -> Result<Metadata, String> {
    match value {
        serde_json::Value::Null => Ok(Metadata::new()),
        serde_json::Value::Object(map) => map
            .iter()
            .map(|(k, v)| {
                MetadataValue::from_json(v)
                    .map(|v| (k.clone(), v))
                    .ok_or_else(|| format!("metadata value for '{k}' must be a scalar"))
            })
            .collect(),
        other => Err(format!("metadata must be an object, got {other}")),
    }
}

/// `.csv` and `.json` files directly inside `dir`, sorted by name.
pub fn find_candidates(dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
    let patterns: Vec<glob::Pattern> = CANDIDATE_PATTERNS
        .iter()
        .filter_map(|p| glob::Pattern::new(p).ok())
        .collect();

    let mut found = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if patterns.iter().any(|p| p.matches(&name)) {
            found.push(entry.path());
        }
    }
    found.sort();
    Ok(found)
}

/// Write the CSV and JSON templates into `dir`.
pub fn write_templates(dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
    let csv_path = dir.join(CSV_TEMPLATE_FILE);
    let mut writer = csv::Writer::from_path(&csv_path)?;
    writer.write_record(REQUIRED_COLUMNS)?;
    for (id, document, metadata) in template_rows() {
        writer.write_record([id, document, metadata.to_string().as_str()])?;
    }
    writer.flush()?;

    let json_path = dir.join(JSON_TEMPLATE_FILE);
    let records: Vec<serde_json::Value> = template_rows()
        .into_iter()
        .map(|(id, document, metadata)| {
            serde_json::json!({"id": id, "document": document, "metadata": metadata})
        })
        .collect();
    let mut file = File::create(&json_path)?;
    file.write_all(serde_json::to_string_pretty(&records)?.as_bytes())?;
    file.write_all(b"\n")?;

    tracing::info!(target: "cli", dir = %dir.display(), "wrote template files");
    Ok(vec![csv_path, json_path])
}

/// Find the file to load in `dir`, asking the user when there is a choice.
///
/// With no candidates the templates are written and `NoCandidates` returned,
/// so the caller can ask the user to fill them in and rerun.
pub fn choose_file<R: std::io::BufRead, W: Write>(
    dir: &Path,
    prompter: &mut Prompter<R, W>,
) -> Result<PathBuf, LoadError> {
    let mut candidates = find_candidates(dir)?;
    match candidates.len() {
        0 => {
            write_templates(dir)?;
            Err(LoadError::NoCandidates(dir.display().to_string()))
        }
        1 => Ok(candidates.remove(0)),
        _ => {
            let names: Vec<String> = candidates
                .iter()
                .map(|p| {
                    p.file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| p.display().to_string())
                })
                .collect();
            match prompter.select("Select a file", &names)? {
                Some(index) => Ok(candidates.swap_remove(index)),
                None => Err(LoadError::Selection("no file selected".to_string())),
            }
        }
    }
}

/// Load a CSV or JSON file, by extension.
pub fn load_file(path: &Path) -> Result<LoadedDocuments, LoadError> {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    let reader = BufReader::new(File::open(path)?);
    let loaded = match extension.as_str() {
        "json" => load_json(reader)?,
        "csv" => load_csv(reader)?,
        _ => return Err(LoadError::UnsupportedFile(path.display().to_string())),
    };

    tracing::info!(target: "cli", path = %path.display(), documents = loaded.len(), "loaded file");
    Ok(loaded)
}

/// A JSON array of `{id, document, metadata?}` objects.
pub fn load_json<R: Read>(reader: R) -> Result<LoadedDocuments, LoadError> {
    let records: Vec<JsonRecord> = serde_json::from_reader(reader)?;
    let mut loaded = LoadedDocuments::default();

    for (index, record) in records.into_iter().enumerate() {
        let metadata = match &record.metadata {
            Some(value) => metadata_from_json(value).map_err(|message| LoadError::MalformedRow {
                row: index + 1,
                message,
            })?,
            None => Metadata::new(),
        };
        loaded.push(record.id, record.document, metadata);
    }
    Ok(loaded)
}

/// CSV with `id`, `document` and `metadata` columns; `metadata` holds a JSON
/// object. Rows are numbered from 1, not counting the header.
pub fn load_csv<R: Read>(reader: R) -> Result<LoadedDocuments, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    let column = |name: &str| headers.iter().position(|h| h == name);
    let (Some(id_col), Some(doc_col), Some(meta_col)) =
        (column("id"), column("document"), column("metadata"))
    else {
        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|name| column(name).is_none())
            .collect();
        return Err(LoadError::Schema(format!(
            "CSV header is missing column(s): {}",
            missing.join(", ")
        )));
    };

    let mut loaded = LoadedDocuments::default();
    for (index, record) in reader.records().enumerate() {
        let row = index + 1;
        let record = record?;
        let field = |col: usize| record.get(col).unwrap_or_default();

        let cell = field(meta_col).trim();
        let metadata = if cell.is_empty() {
            Metadata::new()
        } else {
            let value: serde_json::Value =
                serde_json::from_str(cell).map_err(|e| LoadError::MalformedRow {
                    row,
                    message: format!("metadata is not valid JSON: {e}"),
                })?;
            metadata_from_json(&value).map_err(|message| LoadError::MalformedRow { row, message })?
        };

        loaded.push(field(id_col).to_string(), field(doc_col).to_string(), metadata);
    }
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn expected_template() -> LoadedDocuments {
        let mut first = Metadata::new();
        first.insert("category".to_string(), MetadataValue::from("example"));
        first.insert("value".to_string(), MetadataValue::Int(123));
        let mut second = Metadata::new();
        second.insert("tag".to_string(), MetadataValue::from("demo"));

        LoadedDocuments {
            ids: vec!["1".to_string(), "2".to_string()],
            documents: vec![
                "Sample document text".to_string(),
                "Another sample text".to_string(),
            ],
            metadatas: vec![first, second],
        }
    }

    fn prompter(input: &str) -> Prompter<Cursor<Vec<u8>>, Vec<u8>> {
        Prompter::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    #[test]
    fn test_json_template_round_trip() {
        let dir = TempDir::new().unwrap();
        write_templates(dir.path()).unwrap();
        let loaded = load_file(&dir.path().join(JSON_TEMPLATE_FILE)).unwrap();
        assert_eq!(loaded, expected_template());
    }

    #[test]
    fn test_csv_template_round_trip() {
        let dir = TempDir::new().unwrap();
        write_templates(dir.path()).unwrap();
        let loaded = load_file(&dir.path().join(CSV_TEMPLATE_FILE)).unwrap();
        assert_eq!(loaded, expected_template());
    }

    #[test]
    fn test_csv_missing_metadata_header() {
        let data = "id,document\n1,hello\n";
        match load_csv(data.as_bytes()) {
            Err(LoadError::Schema(message)) => assert!(message.contains("metadata")),
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn test_csv_malformed_metadata_row() {
        let data = "id,document,metadata\n1,ok,\"{\"\"a\"\": 1}\"\n2,bad,\"{not json}\"\n";
        match load_csv(data.as_bytes()) {
            Err(LoadError::MalformedRow { row, .. }) => assert_eq!(row, 2),
            other => panic!("expected malformed row, got {other:?}"),
        }
    }

    #[test]
    fn test_csv_column_order_and_blank_metadata() {
        let data = "metadata, document ,id\n,first,a\n";
        let loaded = load_csv(data.as_bytes()).unwrap();
        assert_eq!(loaded.ids, vec!["a"]);
        assert_eq!(loaded.documents, vec!["first"]);
        assert!(loaded.metadatas[0].is_empty());
    }

    #[test]
    fn test_json_metadata_optional() {
        let data = r#"[{"id": "x", "document": "text"}, {"id": "y", "document": "t", "metadata": null}]"#;
        let loaded = load_json(data.as_bytes()).unwrap();
        assert_eq!(loaded.len(), 2);
        assert!(loaded.metadatas.iter().all(|m| m.is_empty()));
    }

    #[test]
    fn test_json_requires_document() {
        let data = r#"[{"id": "x"}]"#;
        assert!(matches!(
            load_json(data.as_bytes()),
            Err(LoadError::JsonParseError(_))
        ));
    }

    #[test]
    fn test_json_rejects_nested_metadata() {
        let data = r#"[{"id": "x", "document": "t", "metadata": {"a": {"b": 1}}}]"#;
        assert!(matches!(
            load_json(data.as_bytes()),
            Err(LoadError::MalformedRow { row: 1, .. })
        ));
    }

    #[test]
    fn test_choose_file_writes_templates_when_empty() {
        let dir = TempDir::new().unwrap();
        let err = choose_file(dir.path(), &mut prompter("")).unwrap_err();
        assert!(matches!(err, LoadError::NoCandidates(_)));
        assert!(dir.path().join(CSV_TEMPLATE_FILE).exists());
        assert!(dir.path().join(JSON_TEMPLATE_FILE).exists());
    }

    #[test]
    fn test_choose_file_single_and_multiple() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        fs::write(dir.path().join("b.json"), "[]").unwrap();
        let chosen = choose_file(dir.path(), &mut prompter("")).unwrap();
        assert_eq!(chosen, dir.path().join("b.json"));

        fs::write(dir.path().join("a.csv"), "id,document,metadata\n").unwrap();
        let chosen = choose_file(dir.path(), &mut prompter("1\n")).unwrap();
        assert_eq!(chosen, dir.path().join("a.csv"));

        let err = choose_file(dir.path(), &mut prompter("\n")).unwrap_err();
        assert!(matches!(err, LoadError::Selection(_)));
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.txt");
        fs::write(&path, "x").unwrap();
        assert!(matches!(
            load_file(&path),
            Err(LoadError::UnsupportedFile(_))
        ));
    }

    #[test]
    fn test_into_documents() {
        let docs = expected_template().into_documents();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1].id, "2");
        assert_eq!(docs[1].metadata["tag"], MetadataValue::from("demo"));
    }
}
