//! ARMv7 short-descriptor page table entry decoding
use serde::Serialize;

const SECTION_BASE_MASK: u32 = 0xFFF0_0000;
const SUPERSECTION_BASE_MASK: u32 = 0xFF00_0000;
const L1_TABLE_MASK: u32 = 0xFFFF_C000;
const L2_TABLE_MASK: u32 = 0xFFFF_FC00;
const SMALL_PAGE_MASK: u32 = 0xFFFF_F000;
const LARGE_PAGE_MASK: u32 = 0xFFFF_0000;

/// Access permissions from the APX:AP[1:0] bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AccessPermission {
    NoAccess,
    KernelRwUserNone,
    KernelRwUserRo,
    KernelRwUserRw,
    Reserved,
    KernelRoUserNone,
    KernelRoUserRo,
}

impl AccessPermission {
    /// APX=1 with AP=11 collapses onto the same read-only encoding as AP=10.
    pub fn decode(apx: bool, ap1: bool, ap0: bool) -> Self {
        match (apx, ap1, ap0) {
            (false, false, false) => AccessPermission::NoAccess,
            (false, false, true) => AccessPermission::KernelRwUserNone,
            (false, true, false) => AccessPermission::KernelRwUserRo,
            (false, true, true) => AccessPermission::KernelRwUserRw,
            (true, false, false) => AccessPermission::Reserved,
            (true, false, true) => AccessPermission::KernelRoUserNone,
            (true, true, _) => AccessPermission::KernelRoUserRo,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AccessPermission::NoAccess => "P:no access,U:no access",
            AccessPermission::KernelRwUserNone => "P:R/W,U:no access",
            AccessPermission::KernelRwUserRo => "P:R/W,U:RO",
            AccessPermission::KernelRwUserRw => "P:R/W,U:R/W",
            AccessPermission::Reserved => "RESERVED",
            AccessPermission::KernelRoUserNone => "P:RO,U:no access",
            AccessPermission::KernelRoUserRo => "P:RO,U:RO",
        }
    }
}

/// Decoded attribute bits of a mapping descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Attributes {
    pub shareable: bool,
    pub access: AccessPermission,
    pub executable: bool,
    /// False when the nG bit is set.
    pub global: bool,
    /// NS bit; only sections and supersections carry one.
    pub non_secure: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PageKind {
    Small,
    Large,
}

impl PageKind {
    pub fn size(&self) -> u32 {
        match self {
            PageKind::Small => 0x1000,
            PageKind::Large => 0x1_0000,
        }
    }
}

/// Outcome of translating one virtual address.
///
/// `phys` is the translated physical address: the descriptor's base with the
/// in-block bits of the virtual address OR-ed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PageTableDescriptor {
    Fault { raw: u32 },
    Reserved { raw: u32 },
    Section { phys: u32, attrs: Attributes },
    SuperSection { phys: u32, attrs: Attributes },
    Page {
        kind: PageKind,
        phys: u32,
        attrs: Attributes,
    },
}

impl PageTableDescriptor {
    pub fn physical(&self) -> Option<u32> {
        match self {
            PageTableDescriptor::Section { phys, .. }
            | PageTableDescriptor::SuperSection { phys, .. }
            | PageTableDescriptor::Page { phys, .. } => Some(*phys),
            _ => None,
        }
    }

    pub fn attributes(&self) -> Option<&Attributes> {
        match self {
            PageTableDescriptor::Section { attrs, .. }
            | PageTableDescriptor::SuperSection { attrs, .. }
            | PageTableDescriptor::Page { attrs, .. } => Some(attrs),
            _ => None,
        }
    }

    pub fn kind_label(&self) -> &'static str {
        match self {
            PageTableDescriptor::Fault { .. } => "FAULT",
            PageTableDescriptor::Reserved { .. } => "RESERVED",
            PageTableDescriptor::Section { .. } => "SECTION(1MB)",
            PageTableDescriptor::SuperSection { .. } => "SUPER SECTION(16MB)",
            PageTableDescriptor::Page {
                kind: PageKind::Small,
                ..
            } => "SMALL PAGE(4k)",
            PageTableDescriptor::Page {
                kind: PageKind::Large,
                ..
            } => "LARGE PAGE(64k)",
        }
    }
}

/// Result of decoding a level 1 word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level1 {
    Mapped(PageTableDescriptor),
    /// Points at a level 2 (coarse) table.
    Table { l2_base: u32 },
}

fn bit(word: u32, n: u32) -> bool {
    word & (1 << n) != 0
}

/// Physical address of the level 1 entry covering `va`.
pub fn level1_entry_address(table_base: u32, va: u32) -> u32 {
    (table_base & L1_TABLE_MASK) | ((va & 0xFFF0_0000) >> 18)
}

/// Physical address of the level 2 entry covering `va`.
pub fn level2_entry_address(level1: u32, va: u32) -> u32 {
    (level1 & L2_TABLE_MASK) | ((va & 0x000F_F000) >> 10)
}

fn section_attributes(word: u32) -> Attributes {
    Attributes {
        shareable: bit(word, 16),
        access: AccessPermission::decode(bit(word, 15), bit(word, 11), bit(word, 10)),
        executable: !bit(word, 4),
        global: !bit(word, 17),
        non_secure: Some(bit(word, 19)),
    }
}

pub fn decode_level1(word: u32, va: u32) -> Level1 {
    match word & 0b11 {
        0b00 => Level1::Mapped(PageTableDescriptor::Fault { raw: word }),
        0b11 => Level1::Mapped(PageTableDescriptor::Reserved { raw: word }),
        0b10 if bit(word, 18) => Level1::Mapped(PageTableDescriptor::SuperSection {
            phys: (word & SUPERSECTION_BASE_MASK) | (va & !SUPERSECTION_BASE_MASK),
            attrs: section_attributes(word),
        }),
        0b10 => Level1::Mapped(PageTableDescriptor::Section {
            phys: (word & SECTION_BASE_MASK) | (va & !SECTION_BASE_MASK),
            attrs: section_attributes(word),
        }),
        _ => Level1::Table {
            l2_base: word & L2_TABLE_MASK,
        },
    }
}

pub fn decode_level2(word: u32, va: u32) -> PageTableDescriptor {
    let (kind, mask, xn_bit) = if bit(word, 1) {
        (PageKind::Small, SMALL_PAGE_MASK, 1)
    } else {
        (PageKind::Large, LARGE_PAGE_MASK, 15)
    };

    PageTableDescriptor::Page {
        kind,
        phys: (word & mask) | (va & !mask),
        attrs: Attributes {
            shareable: bit(word, 10),
            access: AccessPermission::decode(bit(word, 9), bit(word, 5), bit(word, 4)),
            executable: !bit(word, xn_bit),
            global: !bit(word, 11),
            non_secure: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_with_full_access() {
        // [1:0]=10, AP=11, S=1, XN=0, nG=0
        let word = 0x8200_0000 | (1 << 16) | (0b11 << 10) | 0b10;
        let decoded = decode_level1(word, 0xc001_2345);
        assert_eq!(
            decoded,
            Level1::Mapped(PageTableDescriptor::Section {
                phys: 0x8201_2345,
                attrs: Attributes {
                    shareable: true,
                    access: AccessPermission::KernelRwUserRw,
                    executable: true,
                    global: true,
                    non_secure: Some(false),
                },
            })
        );
    }

    #[test]
    fn test_supersection_uses_16mb_granularity() {
        let word = 0x8300_0000 | (1 << 18) | (1 << 17) | (1 << 4) | 0b10;
        let Level1::Mapped(desc) = decode_level1(word, 0xc0ab_cdef) else {
            panic!("expected a mapping");
        };
        assert_eq!(desc.kind_label(), "SUPER SECTION(16MB)");
        assert_eq!(desc.physical(), Some(0x83ab_cdef));
        let attrs = desc.attributes().unwrap();
        assert!(!attrs.executable);
        assert!(!attrs.global);
        assert_eq!(attrs.access, AccessPermission::NoAccess);
    }

    #[test]
    fn test_fault_reserved_and_table_classification() {
        assert_eq!(
            decode_level1(0x1234_5000, 0),
            Level1::Mapped(PageTableDescriptor::Fault { raw: 0x1234_5000 })
        );
        assert_eq!(
            decode_level1(0x1234_5003, 0),
            Level1::Mapped(PageTableDescriptor::Reserved { raw: 0x1234_5003 })
        );
        assert_eq!(
            decode_level1(0x8200_8c01, 0),
            Level1::Table {
                l2_base: 0x8200_8c00
            }
        );
    }

    #[test]
    fn test_access_permission_truth_table() {
        use AccessPermission::*;
        let expected = [
            ((false, false, false), NoAccess),
            ((false, false, true), KernelRwUserNone),
            ((false, true, false), KernelRwUserRo),
            ((false, true, true), KernelRwUserRw),
            ((true, false, false), Reserved),
            ((true, false, true), KernelRoUserNone),
            ((true, true, false), KernelRoUserRo),
            ((true, true, true), KernelRoUserRo),
        ];
        for ((apx, ap1, ap0), access) in expected {
            assert_eq!(AccessPermission::decode(apx, ap1, ap0), access);
        }
    }

    #[test]
    fn test_level2_small_and_large_pages() {
        let small = decode_level2(0x8240_0000 | (1 << 10) | (0b01 << 4) | 0b10, 0xd000_0abc);
        assert_eq!(small.kind_label(), "SMALL PAGE(4k)");
        assert_eq!(small.physical(), Some(0x8240_0abc));
        let attrs = small.attributes().unwrap();
        assert!(attrs.shareable);
        assert_eq!(attrs.access, AccessPermission::KernelRwUserNone);
        assert_eq!(attrs.non_secure, None);
        assert!(!attrs.executable);

        let large = decode_level2(0x8250_0000 | (1 << 9) | (0b10 << 4) | 0b01, 0xd000_7abc);
        assert_eq!(large.kind_label(), "LARGE PAGE(64k)");
        assert_eq!(large.physical(), Some(0x8250_7abc));
        let attrs = large.attributes().unwrap();
        assert!(attrs.executable);
        assert_eq!(attrs.access, AccessPermission::KernelRoUserRo);
    }

    #[test]
    fn test_execute_never_bit_depends_on_page_kind() {
        let large_xn = decode_level2(0x8250_0000 | (1 << 15) | 0b01, 0xd000_7abc);
        assert_eq!(large_xn.kind_label(), "LARGE PAGE(64k)");
        assert!(!large_xn.attributes().unwrap().executable);

        // Bit 4 is an AP bit for pages, not XN.
        let large_ap = decode_level2(0x8250_0000 | (1 << 4) | 0b01, 0xd000_7abc);
        assert!(large_ap.attributes().unwrap().executable);

        // Small pages keep XN in bit 1, so bit 0 changes nothing.
        for low in [0b10, 0b11] {
            let small = decode_level2(0x8240_0000 | low, 0xd000_0abc);
            assert_eq!(small.kind_label(), "SMALL PAGE(4k)");
            assert!(!small.attributes().unwrap().executable);
        }

        let Level1::Mapped(section) = decode_level1(0x8200_0000 | (1 << 15) | 0b10, 0xc000_0000) else {
            panic!("expected a mapping");
        };
        assert!(section.attributes().unwrap().executable);
    }

    #[test]
    fn test_entry_addresses() {
        assert_eq!(level1_entry_address(0x8200_4000, 0xc000_0000), 0x8200_7000);
        assert_eq!(level1_entry_address(0x8200_5fff, 0xc010_0000), 0x8200_7004);
        assert_eq!(level2_entry_address(0x8200_8c01, 0xd001_2000), 0x8200_8c48);
    }
}
