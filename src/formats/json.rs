//! JSON output formatter for the dump parser
use crate::error::AnalysisError;
use crate::formats::traits::OutputFormatter;
use crate::reports::ReportTable;
use serde_json::{Map, Value};

#[derive(serde::Serialize)]
struct OutputWrapper<'a> {
    report: &'a str,
    title: &'a str,
    timestamp: String,
    count: usize,
    results: Vec<Map<String, Value>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    notes: Vec<String>,
}

/// JSON formatter that outputs data in JSON format with metadata
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn format_table(&self, report: &str, table: &ReportTable) -> Result<String, AnalysisError> {
        let wrapper = OutputWrapper {
            report,
            title: &table.title,
            timestamp: chrono::Utc::now().to_rfc3339(),
            count: table.len(),
            results: table.records(),
            notes: table.notes.clone(),
        };

        let json = serde_json::to_string_pretty(&wrapper)?;
        Ok(json)
    }

    fn extension(&self) -> &'static str {
        "json"
    }
}
