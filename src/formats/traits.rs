//! Output format traits for the dump parser
use crate::error::AnalysisError;
use crate::reports::ReportTable;
use std::path::PathBuf;

/// Trait for output formatters
pub trait OutputFormatter: Send + Sync {
    fn format_table(&self, report: &str, table: &ReportTable) -> Result<String, AnalysisError>;

    /// File extension used when writing into an output directory
    fn extension(&self) -> &'static str;
}

/// Enum for output format types
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Text,
    Csv,
    Json,
    Jsonl,
}

/// Enum for output destination
#[derive(Debug, Clone)]
pub enum OutputDestination {
    Stdout,
    File(PathBuf),
    /// One `<report>.<ext>` file per report
    Directory(PathBuf),
}

/// Output writer that combines format and destination
pub struct OutputWriter {
    formatter: Box<dyn OutputFormatter>,
    destination: OutputDestination,
}

impl OutputWriter {
    /// Create a new output writer
    pub fn new(format: OutputFormat, destination: OutputDestination) -> Self {
        let formatter: Box<dyn OutputFormatter> = match format {
            OutputFormat::Text => Box::new(crate::formats::text::TextFormatter),
            OutputFormat::Csv => Box::new(crate::formats::csv::CsvFormatter),
            OutputFormat::Json => Box::new(crate::formats::json::JsonFormatter),
            OutputFormat::Jsonl => Box::new(crate::formats::jsonl::JsonlFormatter),
        };

        Self {
            formatter,
            destination,
        }
    }

    /// Render `table` and write it to the configured destination.
    /// Returns the file written, if any.
    pub fn write_table(&self, report: &str, table: &ReportTable) -> Result<Option<PathBuf>, AnalysisError> {
        let content = self.formatter.format_table(report, table)?;

        match &self.destination {
            OutputDestination::Stdout => {
                println!("{}", content);
                Ok(None)
            }
            OutputDestination::File(path) => {
                std::fs::write(path, content)?;
                Ok(Some(path.clone()))
            }
            OutputDestination::Directory(dir) => {
                std::fs::create_dir_all(dir)?;
                let path = dir.join(format!("{}.{}", report, self.formatter.extension()));
                std::fs::write(&path, content)?;
                Ok(Some(path))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn table() -> ReportTable {
        let mut table = ReportTable::new("Vmstat", &["COUNTER", "VALUE"]);
        table.push_row(vec!["nr_free_pages".to_string(), "12".to_string()]);
        table
    }

    #[test]
    fn test_directory_destination_names_file_after_report() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let writer = OutputWriter::new(OutputFormat::Csv, OutputDestination::Directory(dir.path().join("out")));
        let path = writer.write_table("vmstat", &table())?;

        let expected = dir.path().join("out").join("vmstat.csv");
        assert_eq!(path.as_deref(), Some(expected.as_path()));
        assert_eq!(std::fs::read_to_string(expected)?, "COUNTER,VALUE\nnr_free_pages,12\n");
        Ok(())
    }

    #[test]
    fn test_file_destination() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let file = dir.path().join("report.jsonl");
        let writer = OutputWriter::new(OutputFormat::Jsonl, OutputDestination::File(file.clone()));
        writer.write_table("vmstat", &table())?;
        assert!(std::fs::read_to_string(file)?.contains("\"COUNTER\":\"nr_free_pages\""));
        Ok(())
    }
}
