//! Node and zone reports for the single UMA node (contig_page_data)
use crate::error::{AnalysisError, WalkError};
use crate::kernel::walker::{AddressSpace, StructWalker};
use crate::reports::report_trait::{hex, AnalysisContext, KernelReport, ReportTable};
use log::{debug, warn};

/// Buddy allocator orders.
pub const MAX_ORDER: u32 = 11;

/// Migrate types in `free_area.free_list[]` order.
pub const MIGRATE_TYPES: [&str; 6] = ["Unmovable", "Reclaimable", "Movable", "Reserve", "CMA", "Isolate"];

const ZONE_NAME_LEN: usize = 7;
const PAGE_SHIFT: u32 = 12;
/// Size of a `list_head`.
const LIST_HEAD_SIZE: u32 = 8;

const ZONE_FLAG_NAMES: [&str; 3] = ["ZONE_RECLAIM_LOCKED", "ZONE_OOM_LOCKED", "ZONE_CONGESTED"];

/// Names of the `zone_flags_t` bits set in `flags`.
pub fn zone_flags_label(flags: u32) -> String {
    let names: Vec<&str> = ZONE_FLAG_NAMES
        .iter()
        .enumerate()
        .filter(|(bit, _)| flags & (1 << bit) != 0)
        .map(|(_, name)| *name)
        .collect();
    if names.is_empty() {
        "-".to_string()
    } else {
        names.join("|")
    }
}

/// The node and its first zone.
struct NodeZone {
    node_id: u32,
    zone: u32,
    name: String,
}

fn node_base(context: &AnalysisContext) -> Result<u32, AnalysisError> {
    context.symbol("contig_page_data")
}

fn locate_zone(context: &AnalysisContext) -> Result<NodeZone, AnalysisError> {
    let walker = context.walker;
    let node = node_base(context)?;
    let node_id = walker.field(node, "pglist_data", "node_id")?;
    let zone = walker.field_addr(node, "pglist_data", "node_zones")?;

    let name_ptr = walker.field(zone, "zone", "name")?;
    let name = match walker.read_cstring(name_ptr, ZONE_NAME_LEN, AddressSpace::Paged) {
        Ok(name) => name,
        Err(e) => {
            warn!("failed to read zone name at 0x{:08x}: {}", name_ptr, e);
            "NA".to_string()
        }
    };
    debug!("node {} zone {} at 0x{:08x}", node_id, name, zone);
    Ok(NodeZone { node_id, zone, name })
}

fn field_table(title: &str) -> ReportTable {
    ReportTable::new(title, &["FIELD", "VALUE"])
}

fn push_field(table: &mut ReportTable, field: &str, value: impl ToString) {
    table.push_row(vec![field.to_string(), value.to_string()]);
}

pub struct NodeReport;

impl KernelReport for NodeReport {
    fn name(&self) -> &str {
        "node"
    }

    fn description(&self) -> &str {
        "UMA node summary from contig_page_data"
    }

    fn run(&self, context: &AnalysisContext) -> Result<ReportTable, AnalysisError> {
        let walker = context.walker;
        let node = node_base(context)?;
        let schema = walker.schema("pglist_data")?;
        let field = |name: &str| walker.read_field(node, schema, name);

        let mut table = field_table("UMA Node (contig_page_data)");
        push_field(&mut table, "nr_zones", field("nr_zones")?);
        let start_pfn = field("node_start_pfn")?;
        push_field(&mut table, "node_start_pfn", start_pfn);
        push_field(&mut table, "node_start_address", hex(start_pfn << PAGE_SHIFT));
        for name in [
            "node_present_pages",
            "node_spanned_pages",
            "node_id",
            "kswapd_max_order",
            "classzone_idx",
        ] {
            push_field(&mut table, name, field(name)?);
        }
        Ok(table)
    }
}

pub struct ZoneinfoReport;

impl KernelReport for ZoneinfoReport {
    fn name(&self) -> &str {
        "zoneinfo"
    }

    fn description(&self) -> &str {
        "Watermarks, reserves and counters of the first zone"
    }

    fn run(&self, context: &AnalysisContext) -> Result<ReportTable, AnalysisError> {
        let walker = context.walker;
        let NodeZone { node_id, zone, name } = locate_zone(context)?;
        let schema = walker.schema("zone")?;
        let field = |name: &str| walker.read_field(zone, schema, name);

        let mut table = field_table("Zoneinfo");
        push_field(&mut table, "node", node_id);
        push_field(&mut table, "zone", &name);
        push_field(&mut table, "WMARK_MIN", field("watermark_min")?);
        push_field(&mut table, "WMARK_LOW", field("watermark_low")?);
        push_field(&mut table, "WMARK_HIGH", field("watermark_high")?);
        push_field(&mut table, "percpu_drift_mark", field("percpu_drift_mark")?);

        let reserve = zone.wrapping_add(schema.offset("lowmem_reserve")?);
        for i in 0..2u32 {
            let value = walker.read_u32(reserve.wrapping_add(4 * i), AddressSpace::Linear)?;
            push_field(&mut table, &format!("lowmem_reserve[{}]", i), value);
        }
        push_field(&mut table, "all_unreclaimable", field("all_unreclaimable")?);
        push_field(&mut table, "min_cma_pages", field("min_cma_pages")?);

        let cma_free = zone.wrapping_add(schema.offset("nr_cma_free")?);
        for order in 0..MAX_ORDER {
            let value = walker.read_u32(cma_free.wrapping_add(4 * order), AddressSpace::Linear)?;
            push_field(&mut table, &format!("nr_cma_free[order={}]", order), value);
        }

        push_field(&mut table, "compact_considered", field("compact_considered")?);
        push_field(&mut table, "compact_defer_shift", field("compact_defer_shift")?);
        push_field(&mut table, "pages_scanned", field("pages_scanned")?);
        push_field(&mut table, "flags", zone_flags_label(field("flags")?));
        push_field(&mut table, "inactive_ratio", field("inactive_ratio")?);
        push_field(&mut table, "zone_pgdat", hex(field("zone_pgdat")?));
        let start_pfn = field("zone_start_pfn")?;
        push_field(&mut table, "zone_start_pfn", start_pfn);
        push_field(&mut table, "zone_start_address", hex(start_pfn << PAGE_SHIFT));
        push_field(&mut table, "spanned_pages", field("spanned_pages")?);
        push_field(&mut table, "present_pages", field("present_pages")?);
        Ok(table)
    }
}

/// Address of `zone->free_area[order]`.
fn free_area(walker: &StructWalker, zone: u32, order: u32) -> Result<u32, WalkError> {
    let base = walker.field_addr(zone, "zone", "free_area")?;
    let stride = walker.offsets().size("free_area")?;
    walker.element_addr(base, order, stride)
}

pub struct BuddyinfoReport;

impl KernelReport for BuddyinfoReport {
    fn name(&self) -> &str {
        "buddyinfo"
    }

    fn description(&self) -> &str {
        "Free blocks per order in the first zone"
    }

    fn run(&self, context: &AnalysisContext) -> Result<ReportTable, AnalysisError> {
        let walker = context.walker;
        let NodeZone { node_id, zone, name } = locate_zone(context)?;

        let mut table = ReportTable::new("Buddyinfo", &["NODE", "ZONE", "ORDER", "NR_FREE"]);
        for order in 0..MAX_ORDER {
            let area = free_area(walker, zone, order)?;
            let nr_free = walker.field(area, "free_area", "nr_free")?;
            table.push_row(vec![
                node_id.to_string(),
                name.clone(),
                order.to_string(),
                nr_free.to_string(),
            ]);
        }
        Ok(table)
    }
}

/// Entries on one `free_list`. An unset list head counts as empty.
fn free_list_len(walker: &StructWalker, head: u32) -> Result<usize, WalkError> {
    if walker.read_u32(head, AddressSpace::Linear)? == 0 {
        return Ok(0);
    }
    walker.count_list(head, AddressSpace::Linear)
}

pub struct PagetypeinfoReport;

impl KernelReport for PagetypeinfoReport {
    fn name(&self) -> &str {
        "pagetypeinfo"
    }

    fn description(&self) -> &str {
        "Free pages per migrate type and order"
    }

    fn run(&self, context: &AnalysisContext) -> Result<ReportTable, AnalysisError> {
        let walker = context.walker;
        let NodeZone { node_id, zone, name } = locate_zone(context)?;
        let free_list = walker.offsets().offset("free_area", "free_list")?;

        let orders: Vec<String> = (0..MAX_ORDER).map(|o| o.to_string()).collect();
        let mut columns = vec!["NODE", "ZONE", "TYPE"];
        columns.extend(orders.iter().map(|o| o.as_str()));
        let mut table = ReportTable::new("Free pages count per migrate type at order", &columns);

        for (migrate_type, type_name) in MIGRATE_TYPES.iter().enumerate() {
            let mut row = vec![node_id.to_string(), name.clone(), type_name.to_string()];
            for order in 0..MAX_ORDER {
                let head = free_area(walker, zone, order)?
                    .wrapping_add(free_list)
                    .wrapping_add(migrate_type as u32 * LIST_HEAD_SIZE);
                let cell = match free_list_len(walker, head) {
                    Ok(count) => count.to_string(),
                    Err(e) => {
                        warn!("failed to count {} order {} free list: {}", type_name, order, e);
                        "NA".to_string()
                    }
                };
                row.push(cell);
            }
            table.push_row(row);
        }
        Ok(table)
    }
}
