//! Report trait and the shared analysis context
use crate::core::profile::KernelProfile;
use crate::error::AnalysisError;
use crate::kernel::walker::StructWalker;
use crate::memory::RawDump;
use crate::symbols::SymbolTable;
use crate::translation::AddressTranslator;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::Path;

/// Analysis context that provides access to all necessary components
pub struct AnalysisContext<'a> {
    pub dump: &'a RawDump,
    pub symbols: &'a SymbolTable,
    pub profile: &'a KernelProfile,
    pub translator: &'a AddressTranslator<'a>,
    pub walker: &'a StructWalker<'a>,
    /// Where side artifacts (kernel stacks, register dumps) go, if anywhere.
    pub output_dir: Option<&'a Path>,
}

impl<'a> AnalysisContext<'a> {
    /// Resolve a symbol needed by a report.
    pub fn symbol(&self, name: &str) -> Result<u32, AnalysisError> {
        Ok(self.symbols.resolve(name)?)
    }
}

/// Tabular result of one report.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReportTable {
    pub title: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// Free-form lines printed after the table.
    pub notes: Vec<String>,
}

impl ReportTable {
    pub fn new(title: &str, columns: &[&str]) -> Self {
        ReportTable {
            title: title.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
            notes: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn note(&mut self, line: impl Into<String>) {
        self.notes.push(line.into());
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Value of `column` in row `row`.
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row)?.get(idx).map(|s| s.as_str())
    }

    /// Rows as JSON objects keyed by column name.
    pub fn records(&self) -> Vec<Map<String, Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .zip(row)
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect()
            })
            .collect()
    }
}

/// Format a 32-bit value the way every report prints addresses.
pub fn hex(value: u32) -> String {
    format!("0x{:08x}", value)
}

/// Trait that all kernel reports must implement
pub trait KernelReport: Send + Sync {
    /// Get the name of the report
    fn name(&self) -> &str;

    /// Get a description of what the report shows
    fn description(&self) -> &str;

    /// Run the report with the provided analysis context
    fn run(&self, context: &AnalysisContext) -> Result<ReportTable, AnalysisError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_cells_and_records() {
        let mut table = ReportTable::new("demo", &["A", "B"]);
        table.push_row(vec!["1".to_string(), "2".to_string()]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.cell(0, "B"), Some("2"));
        assert_eq!(table.cell(0, "C"), None);
        assert_eq!(table.cell(1, "A"), None);

        let records = table.records();
        assert_eq!(records[0]["A"], Value::String("1".to_string()));
    }

    #[test]
    fn test_hex_is_zero_padded() {
        assert_eq!(hex(0x1c8), "0x000001c8");
    }
}
