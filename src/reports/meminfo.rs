//! Memory counters from the global vm_stat array
use crate::error::AnalysisError;
use crate::kernel::pages_to_mib;
use crate::kernel::walker::AddressSpace;
use crate::reports::report_trait::{AnalysisContext, KernelReport, ReportTable};
use log::debug;

/// `enum zone_stat_item`, in kernel order.
pub const VM_STAT_ITEMS: [&str; 35] = [
    "nr_free_pages",
    "nr_inactive_anon",
    "nr_active_anon",
    "nr_inactive_file",
    "nr_active_file",
    "nr_unevictable",
    "nr_mlock",
    "nr_anon_pages",
    "nr_mapped",
    "nr_file_pages",
    "nr_dirty",
    "nr_writeback",
    "nr_slab_reclaimable",
    "nr_slab_unreclaimable",
    "nr_page_table_pages",
    "nr_kernel_stack",
    "nr_unstable",
    "nr_bounce",
    "nr_vmscan_write",
    "nr_writeback_temp",
    "nr_isolated_anon",
    "nr_isolated_file",
    "nr_shmem",
    "nr_dirtied",
    "nr_written",
    "nr_free_cma",
    "nr_cma_anon",
    "nr_cma_file",
    "nr_cma_inactive_anon",
    "nr_cma_active_anon",
    "nr_cma_inactive_file",
    "nr_cma_active_file",
    "nr_cma_unevictable",
    "nr_contig_pages",
    "nr_anon_transparent_hugepages",
];

/// Pages per kernel stack.
const KERNEL_STACK_PAGES: u64 = 2;

/// Snapshot of `vm_stat[]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmStat {
    counters: Vec<u32>,
}

impl VmStat {
    pub fn read(context: &AnalysisContext) -> Result<Self, AnalysisError> {
        let base = context.symbol("vm_stat")?;
        let bytes = context
            .walker
            .read_bytes(base, VM_STAT_ITEMS.len() * 4, AddressSpace::Linear)?;
        let counters: Vec<u32> = bytes
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        debug!("vm_stat at 0x{:08x}: {} counters", base, counters.len());
        Ok(VmStat { counters })
    }

    /// Counter by its `/proc/vmstat` name; unknown names read as zero.
    pub fn get(&self, item: &str) -> u64 {
        VM_STAT_ITEMS
            .iter()
            .position(|name| *name == item)
            .and_then(|i| self.counters.get(i))
            .map(|v| *v as u64)
            .unwrap_or(0)
    }

    fn sum(&self, items: &[&str]) -> u64 {
        items.iter().map(|item| self.get(item)).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, u32)> + '_ {
        VM_STAT_ITEMS.iter().copied().zip(self.counters.iter().copied())
    }
}

/// The `/proc/meminfo` style summary lines.
pub fn meminfo_lines(stat: &VmStat) -> Vec<(&'static str, u64)> {
    vec![
        ("MemFree", stat.get("nr_free_pages")),
        ("Buffers + Cached", stat.get("nr_file_pages")),
        ("Active", stat.sum(&["nr_active_anon", "nr_active_file"])),
        ("Inactive", stat.sum(&["nr_inactive_anon", "nr_inactive_file"])),
        ("Active(anon)", stat.get("nr_active_anon")),
        ("Inactive(anon)", stat.get("nr_inactive_anon")),
        ("Active(file)", stat.get("nr_active_file")),
        ("Inactive(file)", stat.get("nr_inactive_file")),
        ("Unevictable", stat.get("nr_unevictable")),
        ("Mlocked", stat.get("nr_mlock")),
        ("Dirty", stat.get("nr_dirty")),
        ("Writeback", stat.get("nr_writeback")),
        ("AnonPages", stat.get("nr_anon_pages")),
        ("Mapped", stat.get("nr_mapped")),
        ("Shmem", stat.get("nr_shmem")),
        ("Slab", stat.sum(&["nr_slab_reclaimable", "nr_slab_unreclaimable"])),
        ("SReclaimable", stat.get("nr_slab_reclaimable")),
        ("SUnreclaim", stat.get("nr_slab_unreclaimable")),
        ("KernelStack", stat.get("nr_kernel_stack") * KERNEL_STACK_PAGES),
        ("PageTables", stat.get("nr_page_table_pages")),
        ("Bounce", stat.get("nr_bounce")),
        ("WritebackTmp", stat.get("nr_writeback_temp")),
        ("CmaFree", stat.get("nr_free_cma")),
        ("CmaA(active)", stat.get("nr_cma_active_anon")),
        ("CmaA(inactive)", stat.get("nr_cma_inactive_anon")),
        ("CmaF(active)", stat.get("nr_cma_active_file")),
        ("CmaF(inactive)", stat.get("nr_cma_inactive_file")),
        ("CmaUnevictable", stat.get("nr_cma_unevictable")),
        ("ContigAlloc", stat.get("nr_contig_pages")),
    ]
}

pub struct MeminfoReport;

impl KernelReport for MeminfoReport {
    fn name(&self) -> &str {
        "meminfo"
    }

    fn description(&self) -> &str {
        "Summarise vm_stat like /proc/meminfo"
    }

    fn run(&self, context: &AnalysisContext) -> Result<ReportTable, AnalysisError> {
        let stat = VmStat::read(context)?;
        let mut table = ReportTable::new("Meminfo", &["FIELD", "PAGES", "MB"]);
        for (field, pages) in meminfo_lines(&stat) {
            table.push_row(vec![
                field.to_string(),
                pages.to_string(),
                format!("{:.2}", pages_to_mib(pages)),
            ]);
        }
        Ok(table)
    }
}

pub struct VmstatReport;

impl KernelReport for VmstatReport {
    fn name(&self) -> &str {
        "vmstat"
    }

    fn description(&self) -> &str {
        "Raw vm_stat counters"
    }

    fn run(&self, context: &AnalysisContext) -> Result<ReportTable, AnalysisError> {
        let stat = VmStat::read(context)?;
        let mut table = ReportTable::new("Vmstat", &["COUNTER", "VALUE"]);
        for (name, value) in stat.iter() {
            table.push_row(vec![name.to_string(), value.to_string()]);
        }
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{with_context, DumpBuilder};

    const VM_STAT: u32 = 0xc000_8000;

    fn vm_stat(values: &[(usize, u32)]) -> DumpBuilder {
        let mut builder = DumpBuilder::new(0x1_0000).with_identity_sections();
        builder.add_symbol("vm_stat", VM_STAT);
        for (index, value) in values {
            builder.put_u32_va(VM_STAT + 4 * *index as u32, *value);
        }
        builder
    }

    #[test]
    fn test_meminfo_derived_lines() {
        // free, active anon, active file, slab pair, kernel stacks
        let builder = vm_stat(&[(0, 2560), (2, 100), (4, 156), (12, 10), (13, 30), (15, 64)]);
        let table = with_context(builder, None, |ctx| MeminfoReport.run(ctx)).unwrap();

        assert_eq!(table.cell(0, "FIELD"), Some("MemFree"));
        assert_eq!(table.cell(0, "MB"), Some("10.00"));
        assert_eq!(table.cell(2, "FIELD"), Some("Active"));
        assert_eq!(table.cell(2, "PAGES"), Some("256"));
        assert_eq!(table.cell(2, "MB"), Some("1.00"));

        let slab = table.rows.iter().find(|r| r[0] == "Slab").unwrap();
        assert_eq!(slab[1], "40");
        assert_eq!(slab[2], "0.16");

        let stacks = table.rows.iter().find(|r| r[0] == "KernelStack").unwrap();
        assert_eq!(stacks[1], "128");
        assert_eq!(table.len(), 29);
    }

    #[test]
    fn test_vmstat_lists_every_counter() {
        let builder = vm_stat(&[(34, 7)]);
        let table = with_context(builder, None, |ctx| VmstatReport.run(ctx)).unwrap();
        assert_eq!(table.len(), VM_STAT_ITEMS.len());
        assert_eq!(table.cell(34, "COUNTER"), Some("nr_anon_transparent_hugepages"));
        assert_eq!(table.cell(34, "VALUE"), Some("7"));
    }

    #[test]
    fn test_unknown_counter_reads_zero() {
        let stat = VmStat { counters: vec![5] };
        assert_eq!(stat.get("nr_free_pages"), 5);
        assert_eq!(stat.get("nr_mlock"), 0);
        assert_eq!(stat.get("bogus"), 0);
    }
}
