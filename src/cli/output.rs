use std::fmt::Write as FmtWrite;

use console::style;
use serde::Serialize;

use crate::models::{OutputFormat, QueryMatch, QueryResult, format_metadata};
use crate::services::InsertReport;
use crate::utils::{single_line, truncate_chars};

const DOCUMENT_PREVIEW_CHARS: usize = 60;

pub trait Formatter {
    fn format_query_results(&self, results: &[QueryResult]) -> String;
    fn format_insert_report(&self, collection: &str, report: &InsertReport) -> String;
    fn format_status(&self, status: &StatusInfo) -> String;
    fn format_message(&self, message: &str) -> String;
    fn format_error(&self, error: &str) -> String;
}

/// Reachability of one external service.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub name: String,
    pub url: Option<String>,
    pub reachable: bool,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusInfo {
    pub config_path: Option<String>,
    pub embedding_model: String,
    pub services: Vec<ServiceStatus>,
    pub persist_dir: String,
    pub persist_documents: Option<u64>,
    pub log_dir: String,
}

/// One table row, ranked by ascending distance.
fn rows(result: &QueryResult) -> Vec<[String; 5]> {
    result
        .ranked()
        .into_iter()
        .enumerate()
        .map(|(i, m): (usize, &QueryMatch)| {
            [
                (i + 1).to_string(),
                m.id.clone(),
                format!("{:.4}", m.distance),
                truncate_chars(&single_line(&m.document), DOCUMENT_PREVIEW_CHARS),
                format_metadata(&m.metadata),
            ]
        })
        .collect()
}

const COLUMNS: [&str; 5] = ["Rank", "ID", "Distance", "Document", "Metadata"];

pub struct TextFormatter;

impl TextFormatter {
    fn table(rows: &[[String; 5]]) -> String {
        let mut widths = COLUMNS.map(|c| c.chars().count());
        for row in rows {
            for (w, cell) in widths.iter_mut().zip(row) {
                *w = (*w).max(cell.chars().count());
            }
        }

        let mut output = String::new();
        let header: Vec<String> = COLUMNS
            .iter()
            .zip(widths)
            .map(|(c, w)| format!("{c:<w$}"))
            .collect();
        writeln!(output, "{}", style(header.join("  ").trim_end()).cyan().bold()).unwrap();
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        writeln!(output, "{}", rule.join("  ")).unwrap();

        for row in rows {
            let cells: Vec<String> = row
                .iter()
                .zip(widths)
                .map(|(cell, w)| format!("{cell:<w$}"))
                .collect();
            writeln!(output, "{}", cells.join("  ").trim_end()).unwrap();
        }
        output
    }
}

impl Formatter for TextFormatter {
    fn format_query_results(&self, results: &[QueryResult]) -> String {
        if results.is_empty() {
            return "No queries given.\n".to_string();
        }

        let mut output = String::new();
        for result in results {
            writeln!(output, "Query: \"{}\"", style(&result.query).bold()).unwrap();
            if result.is_empty() {
                writeln!(output, "  No results found.\n").unwrap();
                continue;
            }
            output.push_str(&Self::table(&rows(result)));
            writeln!(output).unwrap();
        }
        output
    }

    fn format_insert_report(&self, collection: &str, report: &InsertReport) -> String {
        let mut output = String::new();
        writeln!(
            output,
            "{} {} document(s) into '{}'",
            style("Inserted").green().bold(),
            report.inserted,
            collection
        )
        .unwrap();
        if !report.skipped_ids.is_empty() {
            writeln!(
                output,
                "{} {} with blank text: {}",
                style("Skipped").yellow().bold(),
                report.skipped_ids.len(),
                report.skipped_ids.join(", ")
            )
            .unwrap();
        }
        output
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mut output = String::new();
        writeln!(output, "Status").unwrap();
        writeln!(output, "------").unwrap();
        writeln!(
            output,
            "Config:        {}",
            status.config_path.as_deref().unwrap_or("(defaults)")
        )
        .unwrap();
        writeln!(output, "Model:         {}", status.embedding_model).unwrap();

        for service in &status.services {
            let state = if service.reachable {
                style("[OK]").green()
            } else {
                style("[DOWN]").red()
            };
            writeln!(output, "{:<14} {}", format!("{}:", service.name), state).unwrap();
            if let Some(ref url) = service.url {
                writeln!(output, "  URL:         {}", url).unwrap();
            }
            if let Some(ref detail) = service.detail {
                writeln!(output, "  Detail:      {}", detail).unwrap();
            }
        }

        writeln!(output, "Persist dir:   {}", status.persist_dir).unwrap();
        if let Some(count) = status.persist_documents {
            writeln!(output, "  Documents:   {}", count).unwrap();
        }
        writeln!(output, "Log dir:       {}", status.log_dir).unwrap();
        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("{}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("{} {}\n", style("Error:").red().bold(), style(error).red())
    }
}

pub struct JsonFormatter {
    pub pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    fn render(&self, value: &serde_json::Value) -> String {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        rendered.unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
    }
}

impl Formatter for JsonFormatter {
    fn format_query_results(&self, results: &[QueryResult]) -> String {
        let queries: Vec<serde_json::Value> = results
            .iter()
            .map(|r| {
                serde_json::json!({
                    "query": r.query,
                    "matches": r.ranked(),
                })
            })
            .collect();
        self.render(&serde_json::json!({ "results": queries }))
    }

    fn format_insert_report(&self, collection: &str, report: &InsertReport) -> String {
        self.render(&serde_json::json!({
            "collection": collection,
            "inserted": report.inserted,
            "skipped_ids": report.skipped_ids,
        }))
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        self.render(&serde_json::to_value(status).unwrap_or_default())
    }

    fn format_message(&self, message: &str) -> String {
        serde_json::json!({"message": message}).to_string()
    }

    fn format_error(&self, error: &str) -> String {
        serde_json::json!({"error": error}).to_string()
    }
}

pub struct MarkdownFormatter;

impl Formatter for MarkdownFormatter {
    fn format_query_results(&self, results: &[QueryResult]) -> String {
        let mut output = String::new();
        writeln!(output, "## Query Results\n").unwrap();

        for result in results {
            writeln!(output, "**Query:** `{}`\n", result.query).unwrap();
            if result.is_empty() {
                writeln!(output, "*No results found.*\n").unwrap();
                continue;
            }
            writeln!(output, "| {} |", COLUMNS.join(" | ")).unwrap();
            writeln!(output, "|------|----|----------|----------|----------|").unwrap();
            for row in rows(result) {
                let cells: Vec<String> = row.iter().map(|c| c.replace('|', "\\|")).collect();
                writeln!(output, "| {} |", cells.join(" | ")).unwrap();
            }
            writeln!(output).unwrap();
        }
        output
    }

    fn format_insert_report(&self, collection: &str, report: &InsertReport) -> String {
        let mut output = String::new();
        writeln!(output, "## Insert Complete\n").unwrap();
        writeln!(output, "| Metric | Value |").unwrap();
        writeln!(output, "|--------|-------|").unwrap();
        writeln!(output, "| Collection | `{}` |", collection).unwrap();
        writeln!(output, "| Inserted | {} |", report.inserted).unwrap();
        writeln!(output, "| Skipped | {} |", report.skipped_ids.len()).unwrap();
        output
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mut output = String::new();
        writeln!(output, "## Status\n").unwrap();
        if let Some(ref path) = status.config_path {
            writeln!(output, "- **Config:** `{}`", path).unwrap();
        }
        writeln!(output, "- **Model:** {}\n", status.embedding_model).unwrap();

        for service in &status.services {
            let mark = if service.reachable { "✅" } else { "❌" };
            writeln!(output, "### {} {}\n", service.name, mark).unwrap();
            if let Some(ref url) = service.url {
                writeln!(output, "- **URL:** `{}`", url).unwrap();
            }
            if let Some(ref detail) = service.detail {
                writeln!(output, "- **Detail:** {}", detail).unwrap();
            }
            writeln!(output).unwrap();
        }

        writeln!(output, "- **Persist dir:** `{}`", status.persist_dir).unwrap();
        if let Some(count) = status.persist_documents {
            writeln!(output, "- **Documents:** {}", count).unwrap();
        }
        writeln!(output, "- **Log dir:** `{}`", status.log_dir).unwrap();
        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("> {}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("> ⚠️ **Error:** {}\n", error)
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter),
        OutputFormat::Json => Box::new(JsonFormatter::new(true)),
        OutputFormat::Markdown => Box::new(MarkdownFormatter),
    }
}
