//! Raw physical memory dump access
use crate::error::{AnalysisError, ReadFault};
use log::debug;
use memchr::memmem;
use memmap2::Mmap;
use std::fs::File;
use std::path::Path;

/// Physical address where RAM (and therefore byte 0 of the dump) starts.
pub const DEFAULT_RAM_START: u32 = 0x8200_0000;

enum Backing {
    Mapped { _file: File, map: Mmap },
    Owned(Vec<u8>),
}

/// Read-only view of a raw ramdump.
///
/// The dump has no header: byte `n` of the file holds physical address
/// `ram_start + n`. Every read names its absolute physical address and is
/// bounds checked here, so no other module touches the file directly.
pub struct RawDump {
    backing: Backing,
    ram_start: u32,
}

impl RawDump {
    /// Memory map a dump file.
    pub fn open<P: AsRef<Path>>(path: P, ram_start: u32) -> Result<Self, AnalysisError> {
        let file = File::open(path.as_ref())?;
        // The dump is opened read-only and never written while mapped.
        let map = unsafe { Mmap::map(&file)? };
        debug!(
            "mapped {} bytes of dump from {}",
            map.len(),
            path.as_ref().display()
        );
        Ok(RawDump {
            backing: Backing::Mapped { _file: file, map },
            ram_start,
        })
    }

    /// Wrap an in-memory buffer as a dump.
    pub fn from_bytes(ram_start: u32, bytes: Vec<u8>) -> Self {
        RawDump {
            backing: Backing::Owned(bytes),
            ram_start,
        }
    }

    fn data(&self) -> &[u8] {
        match &self.backing {
            Backing::Mapped { map, .. } => map,
            Backing::Owned(bytes) => bytes,
        }
    }

    pub fn ram_start(&self) -> u32 {
        self.ram_start
    }

    pub fn len(&self) -> usize {
        self.data().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data().is_empty()
    }

    /// One past the last physical address covered by the dump.
    pub fn ram_end(&self) -> u64 {
        self.ram_start as u64 + self.len() as u64
    }

    pub fn contains(&self, phys: u32) -> bool {
        (phys as u64) >= self.ram_start as u64 && (phys as u64) < self.ram_end()
    }

    fn out_of_range(&self, phys: u32) -> ReadFault {
        ReadFault::OutOfRange {
            addr: phys,
            start: self.ram_start,
            end: self.ram_end(),
        }
    }

    /// Borrow `len` bytes starting at physical address `phys`.
    pub fn slice(&self, phys: u32, len: usize) -> Result<&[u8], ReadFault> {
        let data = self.data();
        let offset = phys
            .checked_sub(self.ram_start)
            .map(|o| o as usize)
            .filter(|&o| o < data.len())
            .ok_or_else(|| self.out_of_range(phys))?;
        let available = data.len() - offset;
        if available < len {
            return Err(ReadFault::ShortRead {
                addr: phys,
                wanted: len,
                available,
            });
        }
        Ok(&data[offset..offset + len])
    }

    fn read_array<const N: usize>(&self, phys: u32) -> Result<[u8; N], ReadFault> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.slice(phys, N)?);
        Ok(buf)
    }

    pub fn read_u8(&self, phys: u32) -> Result<u8, ReadFault> {
        Ok(self.read_array::<1>(phys)?[0])
    }

    pub fn read_u16(&self, phys: u32) -> Result<u16, ReadFault> {
        Ok(u16::from_le_bytes(self.read_array(phys)?))
    }

    pub fn read_u32(&self, phys: u32) -> Result<u32, ReadFault> {
        Ok(u32::from_le_bytes(self.read_array(phys)?))
    }

    pub fn read_i32(&self, phys: u32) -> Result<i32, ReadFault> {
        Ok(i32::from_le_bytes(self.read_array(phys)?))
    }

    /// Copy `len` bytes out of the dump.
    pub fn read_bytes(&self, phys: u32, len: usize) -> Result<Vec<u8>, ReadFault> {
        Ok(self.slice(phys, len)?.to_vec())
    }

    /// Read a NUL terminated string of at most `max_len` bytes.
    pub fn read_cstring(&self, phys: u32, max_len: usize) -> Result<String, ReadFault> {
        let bytes = self.slice(phys, max_len)?;
        Ok(crate::kernel::decode_cstr(bytes))
    }

    /// Every 4-byte aligned physical address holding `value`.
    pub fn find_u32(&self, value: u32) -> Vec<u32> {
        let needle = value.to_le_bytes();
        self.data()
            .chunks_exact(4)
            .enumerate()
            .filter(|(_, word)| *word == needle)
            .map(|(i, _)| self.ram_start.wrapping_add((i * 4) as u32))
            .collect()
    }

    /// Physical address of the first occurrence of `pattern`.
    pub fn find_bytes(&self, pattern: &[u8]) -> Option<u32> {
        memmem::find(self.data(), pattern).map(|pos| self.ram_start.wrapping_add(pos as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn dump() -> RawDump {
        let mut bytes = vec![0u8; 64];
        bytes[0..4].copy_from_slice(&0xdeadbeefu32.to_le_bytes());
        bytes[8..12].copy_from_slice(&(-5i32).to_le_bytes());
        bytes[16..22].copy_from_slice(b"kswap\0");
        bytes[60..64].copy_from_slice(&0xdeadbeefu32.to_le_bytes());
        RawDump::from_bytes(DEFAULT_RAM_START, bytes)
    }

    #[test]
    fn test_reads_are_relative_to_ram_start() {
        let dump = dump();
        assert_eq!(dump.read_u32(DEFAULT_RAM_START).unwrap(), 0xdeadbeef);
        assert_eq!(dump.read_u16(DEFAULT_RAM_START).unwrap(), 0xbeef);
        assert_eq!(dump.read_u8(DEFAULT_RAM_START + 3).unwrap(), 0xde);
        assert_eq!(dump.read_i32(DEFAULT_RAM_START + 8).unwrap(), -5);
        assert_eq!(
            dump.read_cstring(DEFAULT_RAM_START + 16, 16).unwrap(),
            "kswap"
        );
    }

    #[test]
    fn test_addresses_outside_dump_are_out_of_range() {
        let dump = dump();
        for addr in [0u32, DEFAULT_RAM_START - 1, DEFAULT_RAM_START + 64, u32::MAX] {
            assert!(matches!(
                dump.read_u32(addr),
                Err(ReadFault::OutOfRange { .. })
            ));
            assert!(matches!(
                dump.read_bytes(addr, 1),
                Err(ReadFault::OutOfRange { .. })
            ));
        }
    }

    #[test]
    fn test_read_straddling_end_is_short() {
        let dump = dump();
        assert_eq!(
            dump.read_u32(DEFAULT_RAM_START + 62),
            Err(ReadFault::ShortRead {
                addr: DEFAULT_RAM_START + 62,
                wanted: 4,
                available: 2
            })
        );
    }

    #[test]
    fn test_find_u32_reports_aligned_hits() {
        let dump = dump();
        assert_eq!(
            dump.find_u32(0xdeadbeef),
            vec![DEFAULT_RAM_START, DEFAULT_RAM_START + 60]
        );
        assert_eq!(dump.find_bytes(b"kswap"), Some(DEFAULT_RAM_START + 16));
    }

    #[test]
    fn test_open_maps_file() -> Result<(), Box<dyn std::error::Error>> {
        let mut file = NamedTempFile::new()?;
        file.write_all(&[1, 2, 3, 4, 5, 6, 7, 8])?;
        file.flush()?;

        let dump = RawDump::open(file.path(), 0x1000)?;
        assert_eq!(dump.len(), 8);
        assert_eq!(dump.read_u32(0x1004)?, 0x08070605);
        assert!(dump.contains(0x1007));
        assert!(!dump.contains(0x1008));
        Ok(())
    }
}
