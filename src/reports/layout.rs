//! Layout report - the kernel virtual memory map
use crate::error::AnalysisError;
use crate::kernel::layout::VirtualMemoryLayout;
use crate::reports::report_trait::{hex, AnalysisContext, KernelReport, ReportTable};

pub struct LayoutReport;

impl KernelReport for LayoutReport {
    fn name(&self) -> &str {
        "layout"
    }

    fn description(&self) -> &str {
        "Virtual memory regions from the boot log and System.map"
    }

    fn run(&self, context: &AnalysisContext) -> Result<ReportTable, AnalysisError> {
        let layout = VirtualMemoryLayout::discover(context.dump, context.symbols);
        if layout.is_empty() {
            return Err(AnalysisError::Report("no memory layout could be recovered".to_string()));
        }

        let mut table = ReportTable::new("Virtual kernel memory layout", &["REGION", "START", "END", "SIZE_KB"]);
        for region in layout.regions() {
            table.push_row(vec![
                region.name.clone(),
                hex(region.start),
                hex(region.end),
                (region.span() / 1024).to_string(),
            ]);
        }
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{with_context, DumpBuilder};

    #[test]
    fn test_layout_from_symbols_only() {
        let mut builder = DumpBuilder::new(0x1_0000);
        builder
            .add_symbol("_text", 0xc000_8000)
            .add_symbol("_etext", 0xc040_8000);
        let table = with_context(builder, None, |ctx| LayoutReport.run(ctx)).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.cell(0, "REGION"), Some(".text"));
        assert_eq!(table.cell(0, "SIZE_KB"), Some("4096"));
    }

    #[test]
    fn test_empty_layout_is_an_error() {
        let result = with_context(DumpBuilder::new(0x1000), None, |ctx| LayoutReport.run(ctx));
        assert!(matches!(result, Err(AnalysisError::Report(_))));
    }
}
