//! Text (table) output formatter for the dump parser
use crate::error::AnalysisError;
use crate::formats::traits::OutputFormatter;
use crate::reports::ReportTable;
use prettytable::{Cell, Row, Table};

/// Text formatter that outputs data in a human-readable table format
pub struct TextFormatter;

impl OutputFormatter for TextFormatter {
    fn format_table(&self, _report: &str, table: &ReportTable) -> Result<String, AnalysisError> {
        let mut out = Table::new();
        out.set_format(*prettytable::format::consts::FORMAT_NO_LINESEP_WITH_TITLE);

        // Header
        out.set_titles(Row::new(
            table.columns.iter().map(|c| Cell::new(c).style_spec("c")).collect(),
        ));

        // Data rows
        for row in &table.rows {
            out.add_row(Row::new(row.iter().map(|v| Cell::new(v)).collect()));
        }

        let mut text = format!("{}\n{}", table.title, out);
        for note in &table.notes {
            text.push_str(note);
            text.push('\n');
        }
        Ok(text)
    }

    fn extension(&self) -> &'static str {
        "txt"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_has_title_header_and_notes() {
        let mut table = ReportTable::new("IRQ descriptors", &["IRQ_NUMBER", "CHIP_NAME"]);
        table.push_row(vec!["32".to_string(), "GIC".to_string()]);
        table.note("Bit masks for state_use_accessors");
        let out = TextFormatter.format_table("irq", &table).unwrap();

        assert!(out.starts_with("IRQ descriptors\n"));
        assert!(out.contains("IRQ_NUMBER"));
        assert!(out.contains("GIC"));
        assert!(out.ends_with("Bit masks for state_use_accessors\n"));
    }
}
