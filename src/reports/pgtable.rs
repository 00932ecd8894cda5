//! Page table report - translates every kernel symbol through swapper_pg_dir
use crate::error::AnalysisError;
use crate::reports::report_trait::{hex, AnalysisContext, KernelReport, ReportTable};
use crate::translation::{MemoryLayout, PageWalk};
use log::{debug, info, warn};

pub const WALK_COLUMNS: [&str; 13] = [
    "VA",
    "PGD",
    "FLD",
    "*FLD",
    "MEM_SECTION",
    "SLD",
    "*SLD",
    "PA",
    "STATUS",
    "SHAREABLE",
    "PERMISSION",
    "EXEC",
    "GLOBAL",
];

fn yes_no(value: bool) -> String {
    let text = if value { "YES" } else { "NO" };
    text.to_string()
}

fn or_na(value: Option<u32>) -> String {
    value.map(hex).unwrap_or_else(|| "NA".to_string())
}

/// How a walk result compares with `__pa()`, which only holds inside lowmem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkStatus {
    Ok,
    Mismatch,
    Unmapped,
}

impl WalkStatus {
    pub fn of(walk: &PageWalk, layout: &MemoryLayout) -> Self {
        match walk.physical() {
            Some(pa) if pa == layout.pa(walk.va) => WalkStatus::Ok,
            Some(_) => WalkStatus::Mismatch,
            None => WalkStatus::Unmapped,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            WalkStatus::Ok => "OK",
            WalkStatus::Mismatch => "ERROR",
            WalkStatus::Unmapped => "NA",
        }
    }
}

/// One table row for a completed walk, with its STATUS.
pub fn walk_row(walk: &PageWalk, layout: &MemoryLayout) -> (Vec<String>, WalkStatus) {
    let pa = walk.physical();
    let status = WalkStatus::of(walk, layout);

    let mut row = vec![
        hex(walk.va),
        hex(walk.table_base),
        hex(walk.l1_addr),
        hex(walk.l1_word),
        walk.descriptor.kind_label().to_string(),
        or_na(walk.l2_addr),
        or_na(walk.l2_word),
        or_na(pa),
        status.label().to_string(),
    ];
    match walk.descriptor.attributes() {
        Some(attrs) => row.extend([
            yes_no(attrs.shareable),
            attrs.access.label().to_string(),
            yes_no(attrs.executable),
            yes_no(attrs.global),
        ]),
        None => row.extend(std::iter::repeat("NA".to_string()).take(4)),
    }
    (row, status)
}

pub struct PgtableReport;

impl KernelReport for PgtableReport {
    fn name(&self) -> &str {
        "pgtable"
    }

    fn description(&self) -> &str {
        "Walk the page tables for every kernel symbol"
    }

    fn run(&self, context: &AnalysisContext) -> Result<ReportTable, AnalysisError> {
        let layout = context.translator.layout();
        let table_base = context.translator.table_base()?;
        debug!("walking symbols through the table at 0x{:08x}", table_base);
        let mut table = ReportTable::new("Symbol page table walk", &WALK_COLUMNS);
        let mut mismatches = 0usize;

        for entry in context.symbols.entries() {
            if entry.is_mapping_symbol() || !layout.is_kernel_address(entry.address) {
                continue;
            }
            match context.translator.walk(entry.address) {
                Ok(walk) => {
                    let (row, status) = walk_row(&walk, layout);
                    if status == WalkStatus::Mismatch {
                        mismatches += 1;
                    }
                    table.push_row(row);
                }
                Err(e) => warn!("failed to walk {} (0x{:08x}): {}", entry.name, entry.address, e),
            }
        }

        info!("walked {} symbols, {} mismatches", table.len(), mismatches);
        table.note(format!("{} symbols translated, {} mismatches", table.len(), mismatches));
        Ok(table)
    }
}
