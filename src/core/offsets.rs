//! Structure offset database for the ARM kernel build being analysed
use crate::error::SchemaError;
use std::collections::HashMap;

/// Field offsets (and optionally the size) of one kernel struct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructSchema {
    pub name: String,
    pub size: Option<u32>,
    fields: HashMap<String, u32>,
}

impl StructSchema {
    pub fn new(name: &str) -> Self {
        StructSchema {
            name: name.to_string(),
            size: None,
            fields: HashMap::new(),
        }
    }

    fn with_size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    fn with_fields(mut self, fields: &[(&str, u32)]) -> Self {
        for (field, offset) in fields {
            self.fields.insert(field.to_string(), *offset);
        }
        self
    }

    /// Byte offset of `field` from the start of the struct.
    pub fn offset(&self, field: &str) -> Result<u32, SchemaError> {
        self.fields
            .get(field)
            .copied()
            .ok_or_else(|| SchemaError::UnknownField {
                structure: self.name.clone(),
                field: field.to_string(),
            })
    }

    /// Struct size, required for arrays such as `irq_desc[]`.
    pub fn size(&self) -> Result<u32, SchemaError> {
        self.size.ok_or_else(|| SchemaError::UnknownField {
            structure: self.name.clone(),
            field: "<size>".to_string(),
        })
    }

    pub fn set_offset(&mut self, field: &str, offset: u32) {
        self.fields.insert(field.to_string(), offset);
    }
}

/// Per-struct layout tables used by every walker and report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelOffsets {
    structs: HashMap<String, StructSchema>,
}

impl Default for KernelOffsets {
    fn default() -> Self {
        Self::builtin()
    }
}

impl KernelOffsets {
    /// An empty database, useful when every offset comes from a profile.
    pub fn empty() -> Self {
        KernelOffsets {
            structs: HashMap::new(),
        }
    }

    /// Offsets of the 32-bit ARM kernel build the tool was written against.
    pub fn builtin() -> Self {
        let mut db = Self::empty();

        db.insert(StructSchema::new("task_struct").with_fields(&[
            ("state", 0x0),
            ("stack", 0x4),
            ("flags", 0xc),
            ("prio", 0x18),
            ("static_prio", 0x1c),
            ("normal_prio", 0x20),
            ("tasks", 0x1c8),
            ("mm", 0x1d0),
            ("pid", 0x1f8),
            ("tid", 0x1fc),
            ("thread_group", 0x250),
            ("min_flt", 0x298),
            ("maj_flt", 0x29c),
            ("comm", 0x2d4),
            ("signal", 0x30c),
        ]));
        db.insert(StructSchema::new("mm_struct").with_fields(&[("rss_stat", 0x13c)]));
        db.insert(StructSchema::new("signal_struct").with_fields(&[("oom_adj", 0x1e4)]));
        db.insert(
            StructSchema::new("thread_info")
                .with_size(0x2000)
                .with_fields(&[("preempt_count", 0x4), ("cpu_context", 0x1c)]),
        );

        db.insert(StructSchema::new("kmem_cache").with_fields(&[
            ("batchcount", 0x4),
            ("limit", 0x8),
            ("shared", 0xc),
            ("buffer_size", 0x10),
            ("num", 0x1c),
            ("name", 0x40),
            ("next", 0x44),
            ("nodelists", 0x4c),
        ]));
        db.insert(StructSchema::new("kmem_list3").with_fields(&[
            ("slabs_partial", 0x0),
            ("slabs_full", 0x8),
            ("slabs_free", 0x10),
            ("free_objects", 0x18),
            ("shared", 0x24),
        ]));
        db.insert(StructSchema::new("slab").with_fields(&[("list", 0x0), ("inuse", 0x10)]));
        db.insert(StructSchema::new("array_cache").with_fields(&[("avail", 0x0)]));

        db.insert(StructSchema::new("pglist_data").with_fields(&[
            ("node_zones", 0x0),
            ("nr_zones", 0x70c),
            ("node_start_pfn", 0x71c),
            ("node_present_pages", 0x720),
            ("node_spanned_pages", 0x724),
            ("node_id", 0x728),
            ("kswapd_max_order", 0x738),
            ("classzone_idx", 0x73c),
        ]));
        db.insert(StructSchema::new("zone").with_fields(&[
            ("watermark_min", 0x0),
            ("watermark_low", 0x4),
            ("watermark_high", 0x8),
            ("percpu_drift_mark", 0xc),
            ("lowmem_reserve", 0x10),
            ("all_unreclaimable", 0x1c),
            ("min_cma_pages", 0x20),
            ("nr_cma_free", 0x24),
            ("free_area", 0x50),
            ("compact_considered", 0x290),
            ("compact_defer_shift", 0x294),
            ("pages_scanned", 0x2cc),
            ("flags", 0x2d0),
            ("vm_stat", 0x2d4),
            ("inactive_ratio", 0x354),
            ("zone_pgdat", 0x364),
            ("zone_start_pfn", 0x368),
            ("spanned_pages", 0x36c),
            ("present_pages", 0x370),
            ("name", 0x374),
        ]));
        db.insert(
            StructSchema::new("free_area")
                .with_size(0x34)
                .with_fields(&[("free_list", 0x0), ("nr_free", 0x30)]),
        );

        db.insert(StructSchema::new("irq_desc").with_size(0x60).with_fields(&[
            ("irq", 0x0),
            ("state_use_accessors", 0x8),
            ("chip", 0xc),
            ("kstat_irqs", 0x20),
            ("action", 0x28),
        ]));
        db.insert(StructSchema::new("irqaction").with_fields(&[("handler", 0x0), ("name", 0x24)]));
        db.insert(StructSchema::new("irq_chip").with_fields(&[("name", 0x0)]));

        db
    }

    pub fn insert(&mut self, schema: StructSchema) {
        self.structs.insert(schema.name.clone(), schema);
    }

    pub fn schema(&self, struct_name: &str) -> Result<&StructSchema, SchemaError> {
        self.structs
            .get(struct_name)
            .ok_or_else(|| SchemaError::UnknownStruct(struct_name.to_string()))
    }

    /// Look up, creating an empty schema when the struct is new.
    pub fn schema_mut(&mut self, struct_name: &str) -> &mut StructSchema {
        self.structs
            .entry(struct_name.to_string())
            .or_insert_with(|| StructSchema::new(struct_name))
    }

    /// Get the offset of a field within a structure
    pub fn offset(&self, struct_name: &str, field: &str) -> Result<u32, SchemaError> {
        self.schema(struct_name)?.offset(field)
    }

    pub fn size(&self, struct_name: &str) -> Result<u32, SchemaError> {
        self.schema(struct_name)?.size()
    }
}
