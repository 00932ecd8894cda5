//! CSV output formatter for the dump parser
use crate::error::AnalysisError;
use crate::formats::traits::OutputFormatter;
use crate::reports::ReportTable;
use csv::Writer;

/// CSV formatter that outputs data in comma-separated values format
pub struct CsvFormatter;

impl OutputFormatter for CsvFormatter {
    fn format_table(&self, _report: &str, table: &ReportTable) -> Result<String, AnalysisError> {
        let mut wtr = Writer::from_writer(vec![]);

        // Write header
        wtr.write_record(&table.columns)?;

        // Write data rows
        for row in &table.rows {
            wtr.write_record(row)?;
        }

        wtr.flush()?;
        let data = wtr
            .into_inner()
            .map_err(|e| AnalysisError::Report(e.to_string()))?;
        Ok(String::from_utf8(data)?)
    }

    fn extension(&self) -> &'static str {
        "csv"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_quotes_separators() {
        let mut table = ReportTable::new("Meminfo", &["FIELD", "PAGES"]);
        table.push_row(vec!["Buffers + Cached".to_string(), "10".to_string()]);
        table.push_row(vec!["a,b".to_string(), "1".to_string()]);
        let out = CsvFormatter.format_table("meminfo", &table).unwrap();
        assert_eq!(out, "FIELD,PAGES\nBuffers + Cached,10\n\"a,b\",1\n");
    }
}
