//! Virtual to physical address translation for ARMv7 kernels
pub mod descriptor;

use crate::error::{SymbolError, TranslateError};
use crate::memory::{RawDump, DEFAULT_RAM_START};
use crate::symbols::SymbolTable;
use descriptor::{decode_level1, decode_level2, Level1, PageTableDescriptor};
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};

/// Kernel virtual base of the identity-mapped lowmem region.
pub const DEFAULT_PAGE_OFFSET: u32 = 0xC000_0000;

/// Fixed constants relating kernel virtual addresses to physical ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryLayout {
    /// Physical address of the first byte of the dump
    pub ram_start: u32,
    pub page_offset: u32,
    pub phys_offset: u32,
}

impl Default for MemoryLayout {
    fn default() -> Self {
        MemoryLayout {
            ram_start: DEFAULT_RAM_START,
            page_offset: DEFAULT_PAGE_OFFSET,
            phys_offset: DEFAULT_RAM_START,
        }
    }
}

impl MemoryLayout {
    /// `__pa()`: linear virtual to physical arithmetic, no table walk.
    pub fn pa(&self, va: u32) -> u32 {
        va.wrapping_sub(self.page_offset)
            .wrapping_add(self.phys_offset)
    }

    /// `__va()`
    pub fn va(&self, pa: u32) -> u32 {
        pa.wrapping_sub(self.phys_offset)
            .wrapping_add(self.page_offset)
    }

    pub fn is_kernel_address(&self, va: u32) -> bool {
        va >= self.page_offset
    }
}

/// Every intermediate value read while translating one address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageWalk {
    pub va: u32,
    pub table_base: u32,
    pub l1_addr: u32,
    pub l1_word: u32,
    pub l2_addr: Option<u32>,
    pub l2_word: Option<u32>,
    pub descriptor: PageTableDescriptor,
}

impl PageWalk {
    pub fn physical(&self) -> Option<u32> {
        self.descriptor.physical()
    }
}

/// Walks the kernel's `swapper_pg_dir` tables inside the dump.
///
/// Linear arithmetic works without the tables; only walks need them.
pub struct AddressTranslator<'a> {
    dump: &'a RawDump,
    layout: MemoryLayout,
    /// Physical address of the level 1 table
    table_base: Result<u32, SymbolError>,
}

impl<'a> AddressTranslator<'a> {
    /// `table_base` is physical and gets masked to 16 KiB alignment.
    pub fn new(dump: &'a RawDump, layout: MemoryLayout, table_base: u32) -> Self {
        AddressTranslator {
            dump,
            layout,
            table_base: Ok(table_base & 0xFFFF_C000),
        }
    }

    /// Locate the level 1 table through the `swapper_pg_dir` symbol. A map
    /// without it still gives a translator, whose walks fail with
    /// `TranslateError::NoPageTables`.
    pub fn from_symbols(dump: &'a RawDump, symbols: &SymbolTable, layout: MemoryLayout) -> Self {
        match symbols.resolve("swapper_pg_dir") {
            Ok(pgd_va) => {
                let translator = Self::new(dump, layout, layout.pa(pgd_va));
                debug!(
                    "swapper_pg_dir 0x{:08x} -> table base 0x{:08x}",
                    pgd_va,
                    layout.pa(pgd_va) & 0xFFFF_C000
                );
                translator
            }
            Err(e) => {
                warn!("{}, page table walks are disabled", e);
                AddressTranslator {
                    dump,
                    layout,
                    table_base: Err(e),
                }
            }
        }
    }

    pub fn dump(&self) -> &'a RawDump {
        self.dump
    }

    pub fn layout(&self) -> &MemoryLayout {
        &self.layout
    }

    /// Physical address of the level 1 table, if the symbols located one.
    pub fn table_base(&self) -> Result<u32, SymbolError> {
        self.table_base.clone()
    }

    /// Translate `va` and keep every descriptor read along the way.
    pub fn walk(&self, va: u32) -> Result<PageWalk, TranslateError> {
        let table_base = self.table_base()?;
        let l1_addr = descriptor::level1_entry_address(table_base, va);
        let l1_word = self.dump.read_u32(l1_addr)?;

        let (l2_addr, l2_word, descriptor) = match decode_level1(l1_word, va) {
            Level1::Mapped(descriptor) => (None, None, descriptor),
            Level1::Table { .. } => {
                let l2_addr = descriptor::level2_entry_address(l1_word, va);
                let l2_word = self.dump.read_u32(l2_addr)?;
                (Some(l2_addr), Some(l2_word), decode_level2(l2_word, va))
            }
        };

        Ok(PageWalk {
            va,
            table_base,
            l1_addr,
            l1_word,
            l2_addr,
            l2_word,
            descriptor,
        })
    }

    /// Decode the descriptor mapping `va`. Fault and Reserved entries are
    /// returned as descriptors, not errors.
    pub fn translate(&self, va: u32) -> Result<PageTableDescriptor, TranslateError> {
        Ok(self.walk(va)?.descriptor)
    }

    /// Physical address of `va`, failing on unmapped entries.
    pub fn physical(&self, va: u32) -> Result<u32, TranslateError> {
        match self.translate(va)? {
            PageTableDescriptor::Fault { raw } => Err(TranslateError::Fault {
                va,
                descriptor: raw,
            }),
            PageTableDescriptor::Reserved { raw } => Err(TranslateError::Reserved {
                va,
                descriptor: raw,
            }),
            mapped => mapped.physical().ok_or(TranslateError::Fault { va, descriptor: 0 }),
        }
    }

    /// Walk the tables for an identity-mapped address and check the result
    /// against `__pa()`.
    pub fn translate_logical(&self, va: u32) -> Result<u32, TranslateError> {
        let actual = self.physical(va)?;
        let expected = self.layout.pa(va);
        if actual != expected {
            error!(
                "page tables map 0x{:08x} to 0x{:08x}, expected 0x{:08x}",
                va, actual, expected
            );
            return Err(TranslateError::Mismatch {
                va,
                expected,
                actual,
            });
        }
        Ok(actual)
    }

    /// Linear translation for symbols inside the kernel image.
    pub fn linear(&self, va: u32) -> u32 {
        self.layout.pa(va)
    }
}
