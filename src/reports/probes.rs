//! Single-shot queries: translate, search, validate and classify
use crate::error::{AnalysisError, TranslateError};
use crate::kernel::layout::VirtualMemoryLayout;
use crate::memory::RawDump;
use crate::reports::pgtable::{walk_row, WALK_COLUMNS};
use crate::reports::report_trait::{hex, AnalysisContext, ReportTable};
use crate::translation::AddressTranslator;
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};

/// Sections checked word by word, with their bounding symbols.
const VALIDATED_SECTIONS: [(&str, &str, &str); 3] = [
    (".text", "_text", "_etext"),
    (".data", "_sdata", "_edata"),
    (".bss", "__bss_start", "__bss_stop"),
];

/// Every step of the page table walk for `va`, one field per row.
pub fn explain_translation(translator: &AddressTranslator, va: u32) -> Result<ReportTable, AnalysisError> {
    let walk = translator.walk(va)?;
    let mut table = ReportTable::new(&format!("Translation of 0x{:08x}", va), &["FIELD", "VALUE"]);
    let (row, _) = walk_row(&walk, translator.layout());
    for (field, value) in WALK_COLUMNS.iter().zip(row) {
        table.push_row(vec![field.to_string(), value]);
    }
    if let Some(non_secure) = walk.descriptor.attributes().and_then(|a| a.non_secure) {
        let label = if non_secure { "non-secure" } else { "secure" };
        table.push_row(vec!["NS".to_string(), label.to_string()]);
    }
    Ok(table)
}

/// Every word-aligned location holding `value`.
pub fn search_value(dump: &RawDump, translator: &AddressTranslator, value: u32) -> ReportTable {
    let mut table = ReportTable::new(&format!("Locations of 0x{:08x}", value), &["PHYSICAL", "LINEAR_VA"]);
    let hits = dump.find_u32(value);
    for phys in &hits {
        table.push_row(vec![hex(*phys), hex(translator.layout().va(*phys))]);
    }
    info!("found 0x{:08x} at {} locations", value, hits.len());
    table
}

fn progress_bar(total: u64, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        bar.set_style(style.progress_chars("#>-"));
    }
    bar
}

/// Compare the page tables with `__pa()` for every word of the image
/// sections. Only mismatches and unreadable entries get a row.
pub fn validate_sections(context: &AnalysisContext, show_progress: bool) -> Result<ReportTable, AnalysisError> {
    context.translator.table_base()?;
    let mut ranges = Vec::new();
    for (name, start_sym, end_sym) in VALIDATED_SECTIONS {
        match context.symbols.resolve_range(start_sym, end_sym) {
            Ok((start, end)) if start <= end => ranges.push((name, start, end)),
            Ok(_) => warn!("{} range is inverted, skipping", name),
            Err(e) => warn!("cannot validate {}: {}", name, e),
        }
    }
    if ranges.is_empty() {
        return Err(AnalysisError::Report("no section ranges in the symbol table".to_string()));
    }

    let total: u64 = ranges
        .iter()
        .map(|(_, start, end)| (*end as u64 - *start as u64) / 4 + 1)
        .sum();
    let bar = progress_bar(total, show_progress);

    let mut table = ReportTable::new("Section validation", &["SECTION", "VA", "EXPECTED", "ACTUAL", "ERROR"]);
    let mut checked = 0u64;
    for (name, start, end) in &ranges {
        bar.set_message(name.to_string());
        let mut va = *start as u64;
        while va <= *end as u64 {
            let addr = va as u32;
            match context.translator.translate_logical(addr) {
                Ok(_) => {}
                Err(TranslateError::Mismatch { expected, actual, .. }) => table.push_row(vec![
                    name.to_string(),
                    hex(addr),
                    hex(expected),
                    hex(actual),
                    "mismatch".to_string(),
                ]),
                Err(e) => table.push_row(vec![
                    name.to_string(),
                    hex(addr),
                    hex(context.translator.layout().pa(addr)),
                    "NA".to_string(),
                    e.to_string(),
                ]),
            }
            checked += 1;
            bar.inc(1);
            va += 4;
        }
    }
    bar.finish_and_clear();

    info!("validated {} words, {} problems", checked, table.len());
    table.note(format!("{} words checked, {} problems", checked, table.len()));
    Ok(table)
}

/// Where `value` falls in the kernel's virtual memory map.
pub fn classify_value(layout: &VirtualMemoryLayout, value: u32) -> ReportTable {
    let mut table = ReportTable::new("Classification", &["VALUE", "CLASS", "REGION"]);
    let region = layout
        .region_of(value)
        .map(|r| format!("{} 0x{:08x}-0x{:08x}", r.name, r.start, r.end))
        .unwrap_or_else(|| "-".to_string());
    table.push_row(vec![hex(value), layout.classify(value).to_string(), region]);
    table
}
