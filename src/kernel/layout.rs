//! Kernel virtual memory layout and address classification
use crate::memory::RawDump;
use crate::symbols::SymbolTable;
use log::{debug, info, warn};
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

/// Banner the kernel prints before the layout table at boot.
pub const LAYOUT_BANNER: &str = "Virtual kernel memory layout:";

/// Bytes of log searched after the banner.
const BOOT_LOG_WINDOW: usize = 2048;

/// Image sections derivable from System.map alone.
const SYMBOL_SECTIONS: [(&str, &str, &str); 4] = [
    (".init", "__init_begin", "__init_end"),
    (".text", "_text", "_etext"),
    (".data", "_sdata", "_edata"),
    (".bss", "__bss_start", "__bss_stop"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VirtualMemoryRegion {
    pub name: String,
    pub start: u32,
    pub end: u32,
}

impl VirtualMemoryRegion {
    /// Both bounds are inclusive, as printed by the kernel.
    pub fn contains(&self, value: u32) -> bool {
        value >= self.start && value <= self.end
    }

    pub fn span(&self) -> u32 {
        self.end.wrapping_sub(self.start)
    }
}

/// What a value found in memory or a log most likely is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum AddressClass {
    /// Inside `.text`; worth symbolizing.
    Code(String),
    /// Inside `.data` or `.bss`.
    Data(String),
    /// A value or pointer into another named region.
    Other(String),
    Unknown,
}

impl fmt::Display for AddressClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressClass::Code(region) => write!(f, "code ({})", region),
            AddressClass::Data(region) => write!(f, "data ({})", region),
            AddressClass::Other(region) => write!(f, "value or pointer from {}", region),
            AddressClass::Unknown => write!(f, "unknown"),
        }
    }
}

/// Regions in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VirtualMemoryLayout {
    regions: Vec<VirtualMemoryRegion>,
}

impl VirtualMemoryLayout {
    pub fn regions(&self) -> &[VirtualMemoryRegion] {
        &self.regions
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    fn push(&mut self, region: VirtualMemoryRegion) {
        if self.regions.iter().any(|r| r.name == region.name) {
            return;
        }
        self.regions.push(region);
    }

    /// Image sections from well-known symbol pairs. Missing pairs are skipped.
    pub fn from_symbols(symbols: &SymbolTable) -> Self {
        let mut layout = VirtualMemoryLayout::default();
        for (name, start_sym, end_sym) in SYMBOL_SECTIONS {
            match symbols.resolve_range(start_sym, end_sym) {
                Ok((start, end)) => layout.push(VirtualMemoryRegion {
                    name: name.to_string(),
                    start,
                    end,
                }),
                Err(e) => warn!("no {} range in symbols: {}", name, e),
            }
        }
        layout
    }

    /// Parse the table that follows the layout banner in a kernel log.
    pub fn parse_log(text: &str) -> Self {
        let mut layout = VirtualMemoryLayout::default();
        let Some(pos) = text.find(LAYOUT_BANNER) else {
            return layout;
        };
        let body = &text[pos + LAYOUT_BANNER.len()..];

        let re = match Regex::new(
            r"(\S{1,9})\s*:\s*0x([0-9a-fA-F]{1,8})\s*-\s*0x([0-9a-fA-F]{1,8})\s*\(\s*\d+\s*[kMG]B\)",
        ) {
            Ok(re) => re,
            Err(e) => {
                warn!("layout pattern failed to compile: {}", e);
                return layout;
            }
        };

        let mut seen = HashSet::new();
        for caps in re.captures_iter(body) {
            let name = caps[1].to_string();
            if !seen.insert(name.clone()) {
                // A second copy of the table.
                break;
            }
            let (Ok(start), Ok(end)) = (
                u32::from_str_radix(&caps[2], 16),
                u32::from_str_radix(&caps[3], 16),
            ) else {
                continue;
            };
            debug!("boot log region {} 0x{:08x}-0x{:08x}", name, start, end);
            layout.push(VirtualMemoryRegion { name, start, end });
        }
        layout
    }

    /// Look for the layout table in the kernel log held in the dump.
    pub fn scan_boot_log(dump: &RawDump) -> Option<Self> {
        let phys = dump.find_bytes(LAYOUT_BANNER.as_bytes())?;
        let available = (dump.ram_end() - phys as u64) as usize;
        let bytes = dump.slice(phys, available.min(BOOT_LOG_WINDOW)).ok()?;
        let layout = Self::parse_log(&String::from_utf8_lossy(bytes));
        if layout.is_empty() {
            warn!("found layout banner at 0x{:08x} but no regions", phys);
            return None;
        }
        info!("found {} layout regions in boot log", layout.regions.len());
        Some(layout)
    }

    /// Boot log regions when present, then any image section they lack.
    pub fn discover(dump: &RawDump, symbols: &SymbolTable) -> Self {
        let mut layout = Self::scan_boot_log(dump).unwrap_or_default();
        for region in Self::from_symbols(symbols).regions {
            layout.push(region);
        }
        layout
    }

    /// The smallest region containing `value`.
    pub fn region_of(&self, value: u32) -> Option<&VirtualMemoryRegion> {
        self.regions
            .iter()
            .filter(|r| r.contains(value))
            .min_by_key(|r| r.span())
    }

    /// Classify `value` by the smallest region that contains it.
    pub fn classify(&self, value: u32) -> AddressClass {
        let Some(region) = self.region_of(value) else {
            return AddressClass::Unknown;
        };

        match region.name.as_str() {
            ".text" => AddressClass::Code(region.name.clone()),
            ".data" | ".bss" => AddressClass::Data(region.name.clone()),
            _ => AddressClass::Other(region.name.clone()),
        }
    }
}
