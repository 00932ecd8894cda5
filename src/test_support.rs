//! Synthetic dump builder shared by the unit tests
use crate::memory::{RawDump, DEFAULT_RAM_START};
use crate::symbols::SymbolTable;
use crate::translation::MemoryLayout;

/// Virtual address of `swapper_pg_dir` in synthetic dumps.
pub const TEST_PGD_VA: u32 = 0xc000_4000;

/// Builds a small dump at the default RAM base.
///
/// The level 1 table sits at `pa(TEST_PGD_VA)`, so test data should live
/// at or above `0xc0008000`.
pub struct DumpBuilder {
    bytes: Vec<u8>,
    layout: MemoryLayout,
    symbols: SymbolTable,
}

impl DumpBuilder {
    pub fn new(size: usize) -> Self {
        let mut symbols = SymbolTable::new();
        symbols.add_symbol("swapper_pg_dir", TEST_PGD_VA);
        DumpBuilder {
            bytes: vec![0u8; size],
            layout: MemoryLayout::default(),
            symbols,
        }
    }

    /// Drop `swapper_pg_dir` from the symbols, leaving the tables unlocated.
    pub fn without_pgd_symbol(mut self) -> Self {
        let mut symbols = SymbolTable::new();
        for entry in self.symbols.entries() {
            if entry.name != "swapper_pg_dir" {
                symbols.push(entry.clone());
            }
        }
        self.symbols = symbols;
        self
    }

    /// Section-map every megabyte of the dump at its `__va()` address.
    pub fn with_identity_sections(mut self) -> Self {
        let table = self.layout.pa(TEST_PGD_VA);
        let megabytes = self.bytes.len().div_ceil(0x10_0000).max(1) as u32;
        for mb in 0..megabytes {
            let pa = DEFAULT_RAM_START + mb * 0x10_0000;
            let va = self.layout.va(pa);
            let entry = table | ((va & 0xFFF0_0000) >> 18);
            self.put_u32(entry, pa | (1 << 16) | (0b01 << 10) | 0b10);
        }
        self
    }

    pub fn layout(&self) -> MemoryLayout {
        self.layout
    }

    fn offset(&self, phys: u32) -> usize {
        (phys - DEFAULT_RAM_START) as usize
    }

    pub fn put_bytes(&mut self, phys: u32, data: &[u8]) -> &mut Self {
        let start = self.offset(phys);
        self.bytes[start..start + data.len()].copy_from_slice(data);
        self
    }

    pub fn put_u32(&mut self, phys: u32, value: u32) -> &mut Self {
        self.put_bytes(phys, &value.to_le_bytes())
    }

    pub fn put_u32_va(&mut self, va: u32, value: u32) -> &mut Self {
        let phys = self.layout.pa(va);
        self.put_u32(phys, value)
    }

    pub fn put_bytes_va(&mut self, va: u32, data: &[u8]) -> &mut Self {
        let phys = self.layout.pa(va);
        self.put_bytes(phys, data)
    }

    pub fn add_symbol(&mut self, name: &str, va: u32) -> &mut Self {
        self.symbols.add_symbol(name, va);
        self
    }

    pub fn symbols(&self) -> SymbolTable {
        let mut copy = SymbolTable::new();
        for entry in self.symbols.entries() {
            copy.push(entry.clone());
        }
        copy
    }

    pub fn build(self) -> RawDump {
        RawDump::from_bytes(DEFAULT_RAM_START, self.bytes)
    }
}

/// Run `f` against a full analysis context over the built dump.
pub fn with_context<R>(
    builder: DumpBuilder,
    output_dir: Option<&std::path::Path>,
    f: impl FnOnce(&crate::reports::AnalysisContext) -> R,
) -> R {
    with_profile_context(builder, crate::core::profile::KernelProfile::default(), output_dir, f)
}

/// Same as `with_context`, with a caller supplied profile.
pub fn with_profile_context<R>(
    builder: DumpBuilder,
    profile: crate::core::profile::KernelProfile,
    output_dir: Option<&std::path::Path>,
    f: impl FnOnce(&crate::reports::AnalysisContext) -> R,
) -> R {
    use crate::kernel::walker::StructWalker;
    use crate::translation::AddressTranslator;

    let symbols = builder.symbols();
    let dump = builder.build();
    let translator = AddressTranslator::from_symbols(&dump, &symbols, profile.layout);
    let walker = StructWalker::new(&translator, &profile.offsets);
    let context = crate::reports::AnalysisContext {
        dump: &dump,
        symbols: &symbols,
        profile: &profile,
        translator: &translator,
        walker: &walker,
        output_dir,
    };
    f(&context)
}
