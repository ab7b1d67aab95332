//! Output formatting for the CLI.

use crate::config::OutputFormat;
use crate::error::Result;
use colored::*;
use quarry_batch::{SubmissionManifest, SweepReport};
use quarry_chunker::ChunkingResult;
use quarry_domain::CorrelationId;
use quarry_extractor::RequestPlan;
use tabled::{
    builder::Builder,
    settings::{object::Rows, Alignment, Modify, Style},
};

/// Output formatter.
pub struct Formatter {
    format: OutputFormat,
    color_enabled: bool,
}

impl Formatter {
    /// Create a new formatter.
    pub fn new(format: OutputFormat, color_enabled: bool) -> Self {
        Self {
            format,
            color_enabled,
        }
    }

    /// Format the chunk plan of one document.
    pub fn format_chunks(&self, document: &str, result: &ChunkingResult) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(&serde_json::json!({
                "document": document,
                "strategy": result.strategy,
                "total_tokens": result.total_tokens,
                "chunks": result
                    .chunks
                    .iter()
                    .map(|c| serde_json::json!({
                        "ordinal": c.ordinal,
                        "tokens": c.token_count,
                        "range": c.range.to_string(),
                    }))
                    .collect::<Vec<_>>(),
            }))?),
            OutputFormat::Quiet => Ok(result.chunks.len().to_string()),
            OutputFormat::Table => {
                if result.chunks.is_empty() {
                    return Ok(self.colorize(&format!("{}: no text to chunk.", document), "yellow"));
                }

                let mut builder = Builder::default();
                builder.push_record(["Chunk", "Tokens", "Range", "Preview"]);
                for chunk in &result.chunks {
                    builder.push_record([
                        format!("{:03}", chunk.ordinal),
                        chunk.token_count.to_string(),
                        chunk.range.to_string(),
                        preview(&chunk.text, 40),
                    ]);
                }

                Ok(format!(
                    "{}\n{}",
                    self.info(&format!(
                        "{}: {} tokens, {} chunk(s), strategy {:?}",
                        document,
                        result.total_tokens,
                        result.chunks.len(),
                        result.strategy
                    )),
                    table(builder)
                ))
            }
        }
    }

    /// Format a request plan.
    pub fn format_plan(&self, plan: &RequestPlan) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(&serde_json::json!({
                "requests": plan.requests.len(),
                "documents": plan.documents,
                "skipped": plan.skipped,
            }))?),
            OutputFormat::Quiet => Ok(plan.requests.iter().map(|r| r.id()).collect::<Vec<_>>().join("\n")),
            OutputFormat::Table => {
                let mut builder = Builder::default();
                builder.push_record(["Document", "Tokens", "Chunks", "Categories"]);
                for document in &plan.documents {
                    builder.push_record([
                        document.document.clone(),
                        document.total_tokens.to_string(),
                        document.chunks.to_string(),
                        document.categories.join(", "),
                    ]);
                }

                let mut lines = vec![table(builder)];
                if !plan.skipped.is_empty() {
                    lines.push(self.warning(&format!("Skipped: {}", plan.skipped.join(", "))));
                }
                lines.push(self.info(&format!("{} request(s) planned", plan.requests.len())));
                Ok(lines.join("\n"))
            }
        }
    }

    /// Format an accepted submission.
    pub fn format_submission(&self, manifest: &SubmissionManifest) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(manifest)?),
            OutputFormat::Quiet => Ok(manifest.job_id.clone()),
            OutputFormat::Table => Ok(self.success(&format!(
                "Submitted {} request(s) from {} document(s) as {}",
                manifest.requests.len(),
                manifest.documents().len(),
                manifest.job_id
            ))),
        }
    }

    /// Format a sweep report.
    pub fn format_report(&self, report: &SweepReport) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
            OutputFormat::Quiet => Ok(report
                .materialized
                .iter()
                .map(|s| s.job_id.clone())
                .collect::<Vec<_>>()
                .join("\n")),
            OutputFormat::Table => {
                if report.is_idle() {
                    return Ok(self.info(&format!(
                        "Nothing to do ({} manifest(s) scanned, {} already materialized)",
                        report.manifests_scanned, report.already_materialized
                    )));
                }

                let mut builder = Builder::default();
                builder.push_record(["Job", "Project", "State", "Detail"]);
                for summary in &report.materialized {
                    builder.push_record([
                        summary.job_id.clone(),
                        summary.project.clone(),
                        "materialized".to_string(),
                        format!(
                            "{} record(s), {}/{} ok, {} unparsed",
                            summary.records, summary.succeeded, summary.processed, summary.parse_failures
                        ),
                    ]);
                }
                for entry in report.deferred.iter().chain(&report.terminal_failures) {
                    builder.push_record([
                        entry.job_id.clone(),
                        entry.project.clone(),
                        entry.status.to_string(),
                        String::new(),
                    ]);
                }
                for failure in report.unreachable.iter().chain(&report.errors) {
                    builder.push_record([
                        failure.job_id.clone(),
                        failure.project.clone(),
                        "error".to_string(),
                        failure.error.clone(),
                    ]);
                }

                let mut lines = vec![table(builder)];
                if report.registry_fallback {
                    lines.push(self.warning("Pending registry unavailable; scanned every manifest"));
                }
                if report.orphans_found > 0 {
                    lines.push(self.info(&format!("{} orphaned job(s) found", report.orphans_found)));
                }
                Ok(lines.join("\n"))
            }
        }
    }

    /// Format decoded correlation ids.
    pub fn format_decoded(&self, decoded: &[(String, Option<CorrelationId>)]) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                let values: Vec<serde_json::Value> = decoded
                    .iter()
                    .map(|(raw, id)| serde_json::json!({ "id": raw, "decoded": id }))
                    .collect();
                Ok(serde_json::to_string_pretty(&values)?)
            }
            OutputFormat::Quiet => Ok(decoded
                .iter()
                .map(|(raw, id)| match id {
                    Some(id) => format!("{}\t{}\t{}", id.project, id.stem, id.category),
                    None => format!("{}\t-", raw),
                })
                .collect::<Vec<_>>()
                .join("\n")),
            OutputFormat::Table => {
                let mut builder = Builder::default();
                builder.push_record(["Id", "Project", "Document", "Category", "Chunk"]);
                for (raw, id) in decoded {
                    match id {
                        Some(id) => builder.push_record([
                            raw.clone(),
                            id.project.clone(),
                            id.stem.clone(),
                            id.category.clone(),
                            id.ordinal.map(|o| format!("{:03}", o)).unwrap_or_default(),
                        ]),
                        None => builder.push_record([
                            raw.clone(),
                            self.colorize("unrecognized", "red"),
                            String::new(),
                            String::new(),
                            String::new(),
                        ]),
                    }
                }
                Ok(table(builder))
            }
        }
    }

    /// Format a success message.
    pub fn success(&self, message: &str) -> String {
        self.colorize(&format!("✓ {}", message), "green")
    }

    /// Format an error message.
    pub fn error(&self, message: &str) -> String {
        self.colorize(&format!("✗ {}", message), "red")
    }

    /// Format an info message.
    pub fn info(&self, message: &str) -> String {
        self.colorize(&format!("ℹ {}", message), "blue")
    }

    /// Format a warning message.
    pub fn warning(&self, message: &str) -> String {
        self.colorize(&format!("⚠ {}", message), "yellow")
    }

    /// Colorize text if color is enabled.
    fn colorize(&self, text: &str, color: &str) -> String {
        if !self.color_enabled {
            return text.to_string();
        }

        match color {
            "red" => text.red().to_string(),
            "green" => text.green().to_string(),
            "blue" => text.blue().to_string(),
            "yellow" => text.yellow().to_string(),
            _ => text.to_string(),
        }
    }
}

fn table(builder: Builder) -> String {
    let mut table = builder.build();
    table
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()));
    table.to_string()
}

/// First `max` characters of `text` on one line
fn preview(text: &str, max: usize) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max {
        return flat;
    }
    let cut: String = flat.chars().take(max).collect();
    format!("{}…", cut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_batch::{JobFailure, JobStatusEntry};
    use quarry_domain::JobStatus;

    #[test]
    fn test_preview() {
        assert_eq!(preview("a\n\nb  c", 10), "a b c");
        assert_eq!(preview("abcdefghij", 4), "abcd…");
    }

    #[test]
    fn test_report_table() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        let report = SweepReport {
            deferred: vec![JobStatusEntry {
                job_id: "batch_1".to_string(),
                project: "P1".to_string(),
                status: JobStatus::InProgress,
            }],
            errors: vec![JobFailure {
                job_id: "batch_2".to_string(),
                project: "P2".to_string(),
                error: "Storage error: disk full".to_string(),
            }],
            registry_fallback: true,
            ..Default::default()
        };

        let output = formatter.format_report(&report).unwrap();
        assert!(output.contains("batch_1"));
        assert!(output.contains("in_progress"));
        assert!(output.contains("disk full"));
        assert!(output.contains("scanned every manifest"));
    }

    #[test]
    fn test_idle_report() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        let output = formatter.format_report(&SweepReport::default()).unwrap();
        assert!(output.contains("Nothing to do"));
    }

    #[test]
    fn test_report_json() {
        let formatter = Formatter::new(OutputFormat::Json, false);
        let output = formatter.format_report(&SweepReport::default()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["manifests_scanned"], 0);
    }

    #[test]
    fn test_decoded_quiet() {
        let formatter = Formatter::new(OutputFormat::Quiet, false);
        let id = CorrelationId::new("P1", "ROP-1", "products", Some(2)).unwrap();
        let output = formatter
            .format_decoded(&[("P1_ROP-1_products_chunk_002".to_string(), Some(id)), ("junk".to_string(), None)])
            .unwrap();
        assert_eq!(output, "P1\tROP-1\tproducts\njunk\t-");
    }

    #[test]
    fn test_colorize_disabled() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        assert_eq!(formatter.success("test"), "✓ test");
    }
}
