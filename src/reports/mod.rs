//! Report registry for the dump parser
pub mod irq;
pub mod layout;
pub mod meminfo;
pub mod pgtable;
pub mod probes;
pub mod report_trait;
pub mod slabinfo;
pub mod tasks;
pub mod zones;

pub use irq::IrqReport;
pub use layout::LayoutReport;
pub use meminfo::{MeminfoReport, VmstatReport};
pub use pgtable::PgtableReport;
pub use report_trait::{AnalysisContext, KernelReport, ReportTable};
pub use slabinfo::SlabinfoReport;
pub use tasks::TasksReport;
pub use zones::{BuddyinfoReport, NodeReport, PagetypeinfoReport, ZoneinfoReport};

/// Every report, in the order `all` runs them.
pub fn all_reports() -> Vec<Box<dyn KernelReport>> {
    vec![
        Box::new(TasksReport),
        Box::new(IrqReport),
        Box::new(MeminfoReport),
        Box::new(VmstatReport),
        Box::new(LayoutReport),
        Box::new(PgtableReport),
        Box::new(SlabinfoReport),
        Box::new(NodeReport),
        Box::new(ZoneinfoReport),
        Box::new(BuddyinfoReport),
        Box::new(PagetypeinfoReport),
    ]
}

pub fn find_report(name: &str) -> Option<Box<dyn KernelReport>> {
    all_reports().into_iter().find(|r| r.name() == name)
}

/// `(name, description)` of every report.
pub fn list_reports() -> Vec<(String, String)> {
    all_reports()
        .iter()
        .map(|r| (r.name().to_string(), r.description().to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_report_names_are_unique() {
        let names: HashSet<_> = list_reports().into_iter().map(|(name, _)| name).collect();
        assert_eq!(names.len(), all_reports().len());
    }

    #[test]
    fn test_find_report() {
        assert_eq!(find_report("slabinfo").map(|r| r.name().to_string()), Some("slabinfo".to_string()));
        assert!(find_report("pslist").is_none());
    }
}
