//! Slabinfo report - walks cache_chain and each cache's slab lists
use crate::error::{AnalysisError, WalkError};
use crate::kernel::walker::{AddressSpace, StructWalker, Visit};
use crate::reports::report_trait::{AnalysisContext, KernelReport, ReportTable};
use log::{debug, warn};
use serde::Serialize;

/// Bytes read for a cache name.
const CACHE_NAME_LEN: usize = 20;

/// Totals gathered from one cache's `kmem_list3`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SlabUsage {
    pub active_objs: u64,
    pub num_objs: u64,
    pub active_slabs: u64,
    pub num_slabs: u64,
    pub free_objects: u64,
    pub shared_avail: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlabCache {
    pub address: u32,
    pub name: String,
    pub num: u32,
    pub buffer_size: u32,
    pub limit: u32,
    pub batchcount: u32,
    pub shared: u32,
    /// None when the cache has no node lists yet.
    pub usage: Option<SlabUsage>,
}

/// Reads `kmem_cache` fields, which may live outside lowmem.
fn cache_field(walker: &StructWalker, cache: u32, field: &str) -> Result<u32, WalkError> {
    let schema = walker.schema("kmem_cache")?;
    walker.read_field_in(cache, schema, field, AddressSpace::Paged)
}

fn read_usage(walker: &StructWalker, l3: u32, num: u32) -> Result<SlabUsage, WalkError> {
    let list = |field: &str| walker.field_addr(l3, "kmem_list3", field);
    let inuse_offset = walker.offsets().offset("slab", "inuse")?;
    let link_offset = walker.offsets().offset("slab", "list")?;
    let mut usage = SlabUsage::default();

    walker.walk_list_head(list("slabs_full")?, AddressSpace::Paged, |_| {
        usage.active_objs += num as u64;
        usage.active_slabs += 1;
        Ok(Visit::Continue)
    })?;

    walker.walk_list_head(list("slabs_partial")?, AddressSpace::Paged, |node| {
        let slab = node.wrapping_sub(link_offset);
        let inuse = walker.read_u32(slab.wrapping_add(inuse_offset), AddressSpace::Paged)?;
        usage.active_objs += inuse as u64;
        usage.active_slabs += 1;
        Ok(Visit::Continue)
    })?;

    let free_slabs = walker.count_list(list("slabs_free")?, AddressSpace::Paged)?;
    usage.num_slabs = free_slabs as u64 + usage.active_slabs;
    usage.num_objs = usage.num_slabs * num as u64;

    let l3_schema = walker.schema("kmem_list3")?;
    usage.free_objects = walker.read_field_in(l3, l3_schema, "free_objects", AddressSpace::Paged)? as u64;
    let shared = walker.read_field_in(l3, l3_schema, "shared", AddressSpace::Paged)?;
    if shared != 0 {
        let avail = walker.field_addr(shared, "array_cache", "avail")?;
        usage.shared_avail = walker.read_u32(avail, AddressSpace::Paged)? as u64;
    }
    Ok(usage)
}

/// Decode one `kmem_cache`.
pub fn read_cache(walker: &StructWalker, cache: u32) -> Result<SlabCache, WalkError> {
    let name_ptr = cache_field(walker, cache, "name")?;
    let name = match walker.read_cstring(name_ptr, CACHE_NAME_LEN, AddressSpace::Paged) {
        Ok(name) => name,
        Err(e) => {
            warn!("failed to read name of kmem_cache 0x{:08x}: {}", cache, e);
            "NA".to_string()
        }
    };
    let num = cache_field(walker, cache, "num")?;

    let l3 = cache_field(walker, cache, "nodelists")?;
    let usage = if l3 == 0 {
        debug!("kmem_cache {} has no node lists", name);
        None
    } else {
        match read_usage(walker, l3, num) {
            Ok(usage) => Some(usage),
            Err(e) => {
                warn!("failed to walk slabs of {}, but continuing: {}", name, e);
                None
            }
        }
    };

    Ok(SlabCache {
        address: cache,
        name,
        num,
        buffer_size: cache_field(walker, cache, "buffer_size")?,
        limit: cache_field(walker, cache, "limit")?,
        batchcount: cache_field(walker, cache, "batchcount")?,
        shared: cache_field(walker, cache, "shared")?,
        usage,
    })
}

/// Every cache on `cache_chain`, in list order.
pub fn walk_cache_chain(walker: &StructWalker, head: u32) -> Result<Vec<SlabCache>, WalkError> {
    let link = walker.offsets().offset("kmem_cache", "next")?;
    let mut caches = Vec::new();
    walker.walk_list_head(head, AddressSpace::Linear, |node| {
        let cache = node.wrapping_sub(link);
        match read_cache(walker, cache) {
            Ok(record) => caches.push(record),
            Err(e) => warn!("failed to decode kmem_cache 0x{:08x}: {}", cache, e),
        }
        Ok(Visit::Continue)
    })?;
    Ok(caches)
}

pub struct SlabinfoReport;

impl KernelReport for SlabinfoReport {
    fn name(&self) -> &str {
        "slabinfo"
    }

    fn description(&self) -> &str {
        "Per-cache slab statistics from cache_chain"
    }

    fn run(&self, context: &AnalysisContext) -> Result<ReportTable, AnalysisError> {
        let head = context.symbol("cache_chain")?;
        let caches = walk_cache_chain(context.walker, head)?;

        let mut table = ReportTable::new(
            "Slabinfo",
            &[
                "NAME",
                "ACTIVE_OBJS",
                "NUM_OBJS",
                "OBJPERSLAB",
                "OBJSIZE",
                "LIMIT",
                "BATCHCOUNT",
                "SHAREDFACTOR",
                "ACTIVE_SLABS",
                "NUM_SLABS",
                "SHAREDAVAIL",
                "FREE_OBJECTS",
            ],
        );
        for cache in &caches {
            let [active_objs, num_objs, active_slabs, num_slabs, shared_avail, free_objects] =
                match &cache.usage {
                    Some(u) => [
                        u.active_objs,
                        u.num_objs,
                        u.active_slabs,
                        u.num_slabs,
                        u.shared_avail,
                        u.free_objects,
                    ]
                    .map(|v| v.to_string()),
                    None => std::array::from_fn(|_| "NA".to_string()),
                };
            let row = vec![
                cache.name.clone(),
                active_objs,
                num_objs,
                cache.num.to_string(),
                cache.buffer_size.to_string(),
                cache.limit.to_string(),
                cache.batchcount.to_string(),
                cache.shared.to_string(),
                active_slabs,
                num_slabs,
                shared_avail,
                free_objects,
            ];
            table.push_row(row);
        }
        table.note(format!("cache_chain at 0x{:08x}: {} caches", head, caches.len()));
        Ok(table)
    }
}
