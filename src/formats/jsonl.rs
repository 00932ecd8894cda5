//! JSONL (JSON Lines) output formatter for the dump parser
use crate::error::AnalysisError;
use crate::formats::traits::OutputFormatter;
use crate::reports::ReportTable;

/// JSONL formatter that outputs data as JSON objects, one per line
pub struct JsonlFormatter;

impl OutputFormatter for JsonlFormatter {
    fn format_table(&self, _report: &str, table: &ReportTable) -> Result<String, AnalysisError> {
        let mut output = String::new();

        for record in table.records() {
            let line = serde_json::to_string(&record)?;
            output.push_str(&line);
            output.push('\n');
        }

        Ok(output)
    }

    fn extension(&self) -> &'static str {
        "jsonl"
    }
}
