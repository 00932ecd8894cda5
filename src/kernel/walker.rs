//! Offset-driven decoding of linked kernel objects
use crate::core::offsets::{KernelOffsets, StructSchema};
use crate::error::WalkError;
use crate::memory::RawDump;
use crate::translation::AddressTranslator;
use log::{debug, trace};

/// Node cap applied to every list walk.
pub const DEFAULT_WALK_LIMIT: usize = 100_000;

/// How a kernel virtual address is turned into a physical one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressSpace {
    /// `__pa()` arithmetic, for objects inside the kernel image and lowmem.
    Linear,
    /// Full page-table walk, for pointers that may lead outside lowmem.
    Paged,
}

/// Returned by list visitors to keep going or stop early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    Continue,
    Stop,
}

pub struct StructWalker<'a> {
    translator: &'a AddressTranslator<'a>,
    offsets: &'a KernelOffsets,
    limit: usize,
}

impl<'a> StructWalker<'a> {
    pub fn new(translator: &'a AddressTranslator<'a>, offsets: &'a KernelOffsets) -> Self {
        StructWalker {
            translator,
            offsets,
            limit: DEFAULT_WALK_LIMIT,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn offsets(&self) -> &'a KernelOffsets {
        self.offsets
    }

    pub fn translator(&self) -> &'a AddressTranslator<'a> {
        self.translator
    }

    pub fn dump(&self) -> &'a RawDump {
        self.translator.dump()
    }

    pub fn schema(&self, struct_name: &str) -> Result<&'a StructSchema, WalkError> {
        Ok(self.offsets.schema(struct_name)?)
    }

    pub fn to_physical(&self, va: u32, space: AddressSpace) -> Result<u32, WalkError> {
        match space {
            AddressSpace::Linear => Ok(self.translator.linear(va)),
            AddressSpace::Paged => Ok(self.translator.physical(va)?),
        }
    }

    pub fn read_u32(&self, va: u32, space: AddressSpace) -> Result<u32, WalkError> {
        let phys = self.to_physical(va, space)?;
        Ok(self.dump().read_u32(phys)?)
    }

    pub fn read_i32(&self, va: u32, space: AddressSpace) -> Result<i32, WalkError> {
        let phys = self.to_physical(va, space)?;
        Ok(self.dump().read_i32(phys)?)
    }

    pub fn read_bytes(&self, va: u32, len: usize, space: AddressSpace) -> Result<Vec<u8>, WalkError> {
        let phys = self.to_physical(va, space)?;
        Ok(self.dump().read_bytes(phys, len)?)
    }

    pub fn read_cstring(&self, va: u32, max_len: usize, space: AddressSpace) -> Result<String, WalkError> {
        let phys = self.to_physical(va, space)?;
        Ok(self.dump().read_cstring(phys, max_len)?)
    }

    /// `*(base + schema[field])` as a 32-bit word, using `__pa()`.
    pub fn read_field(&self, base: u32, schema: &StructSchema, field: &str) -> Result<u32, WalkError> {
        self.read_field_in(base, schema, field, AddressSpace::Linear)
    }

    pub fn read_field_in(
        &self,
        base: u32,
        schema: &StructSchema,
        field: &str,
        space: AddressSpace,
    ) -> Result<u32, WalkError> {
        let addr = base.wrapping_add(schema.offset(field)?);
        let value = self.read_u32(addr, space)?;
        trace!("{}@0x{:08x}.{} = 0x{:08x}", schema.name, base, field, value);
        Ok(value)
    }

    /// Shorthand for [`read_field`](Self::read_field) by struct name.
    pub fn field(&self, base: u32, struct_name: &str, field: &str) -> Result<u32, WalkError> {
        self.read_field(base, self.schema(struct_name)?, field)
    }

    /// Address of `field` inside the struct at `base`.
    pub fn field_addr(&self, base: u32, struct_name: &str, field: &str) -> Result<u32, WalkError> {
        Ok(base.wrapping_add(self.offsets.offset(struct_name, field)?))
    }

    /// Address of element `index` of an array of `stride` byte structs.
    pub fn element_addr(&self, base: u32, index: u32, stride: u32) -> Result<u32, WalkError> {
        index
            .checked_mul(stride)
            .and_then(|offset| base.checked_add(offset))
            .ok_or(WalkError::AddressOverflow { base, index, stride })
    }

    /// Walk a ring of structs linked through the `next` word at `link_offset`.
    ///
    /// `start` is a struct base. Each next base is `next - link_offset` and
    /// the walk ends when it comes back to `start`. Returns the number of
    /// nodes handed to `per_node`.
    pub fn walk_circular_list<F>(
        &self,
        start: u32,
        link_offset: u32,
        space: AddressSpace,
        mut per_node: F,
    ) -> Result<usize, WalkError>
    where
        F: FnMut(u32) -> Result<Visit, WalkError>,
    {
        let mut node = start;
        let mut count = 0usize;

        loop {
            if count >= self.limit {
                return Err(WalkError::CycleDetected {
                    start,
                    limit: self.limit,
                });
            }
            count += 1;

            if per_node(node)? == Visit::Stop {
                break;
            }

            let next = self.read_u32(node.wrapping_add(link_offset), space)?;
            if next == 0 {
                return Err(WalkError::BrokenLink { node });
            }
            node = next.wrapping_sub(link_offset);
            if node == start {
                break;
            }
        }

        debug!("ring at 0x{:08x} closed after {} nodes", start, count);
        Ok(count)
    }

    /// Walk a `list_head` from its sentinel. Nodes are the embedded
    /// `list_head` addresses, the sentinel itself is never visited.
    pub fn walk_list_head<F>(&self, head: u32, space: AddressSpace, mut per_node: F) -> Result<usize, WalkError>
    where
        F: FnMut(u32) -> Result<Visit, WalkError>,
    {
        let mut node = self.read_u32(head, space)?;
        let mut count = 0usize;

        while node != head {
            if node == 0 {
                return Err(WalkError::BrokenLink { node: head });
            }
            if count >= self.limit {
                return Err(WalkError::CycleDetected {
                    start: head,
                    limit: self.limit,
                });
            }
            count += 1;

            if per_node(node)? == Visit::Stop {
                break;
            }
            let next = self.read_u32(node, space)?;
            if next == 0 {
                return Err(WalkError::BrokenLink { node });
            }
            node = next;
        }

        Ok(count)
    }

    /// Number of entries on a `list_head`.
    pub fn count_list(&self, head: u32, space: AddressSpace) -> Result<usize, WalkError> {
        self.walk_list_head(head, space, |_| Ok(Visit::Continue))
    }
}
