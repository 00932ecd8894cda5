//! Error types for the dump parser
use thiserror::Error;

/// A read against the raw dump that could not be satisfied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadFault {
    #[error("physical address 0x{addr:08x} is outside the dump [0x{start:08x}, 0x{end:08x})")]
    OutOfRange { addr: u32, start: u32, end: u64 },
    #[error("short read at 0x{addr:08x}: wanted {wanted} bytes, only {available} available")]
    ShortRead {
        addr: u32,
        wanted: usize,
        available: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SymbolError {
    #[error("symbol not found: {0}")]
    NotFound(String),
}

/// Failure to turn a virtual address into a physical one.
///
/// `Fault` and `Reserved` describe real page-table state and are only raised
/// by callers that need a usable physical address; `translate` itself reports
/// them as descriptor variants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslateError {
    #[error("level 1 descriptor 0x{descriptor:08x} for 0x{va:08x} is a fault entry")]
    Fault { va: u32, descriptor: u32 },
    #[error("level 1 descriptor 0x{descriptor:08x} for 0x{va:08x} is reserved")]
    Reserved { va: u32, descriptor: u32 },
    #[error("physical address mismatch for 0x{va:08x}: page tables give 0x{actual:08x}, identity mapping gives 0x{expected:08x}")]
    Mismatch { va: u32, expected: u32, actual: u32 },
    #[error("page table read failed: {0}")]
    IoError(#[from] ReadFault),
    #[error("kernel page tables unavailable: {0}")]
    NoPageTables(#[from] SymbolError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("no layout for struct {0}")]
    UnknownStruct(String),
    #[error("struct {structure} has no field {field}")]
    UnknownField { structure: String, field: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalkError {
    #[error("list walk from 0x{start:08x} exceeded {limit} nodes without closing")]
    CycleDetected { start: u32, limit: usize },
    #[error("null next pointer in list node 0x{node:08x}")]
    BrokenLink { node: u32 },
    #[error("element {index} of the array at 0x{base:08x} (stride 0x{stride:x}) is past the end of the address space")]
    AddressOverflow { base: u32, index: u32, stride: u32 },
    #[error(transparent)]
    Read(#[from] ReadFault),
    #[error(transparent)]
    Translate(#[from] TranslateError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Top level error for reports and the command line front end
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Read error: {0}")]
    Read(#[from] ReadFault),
    #[error("Symbol error: {0}")]
    Symbol(#[from] SymbolError),
    #[error("Translation error: {0}")]
    Translate(#[from] TranslateError),
    #[error("Walk error: {0}")]
    Walk(#[from] WalkError),
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),
    #[error("Profile error: {0}")]
    Profile(String),
    #[error("Report error: {0}")]
    Report(String),
    #[error("JSON error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("UTF-8 conversion error: {0}")]
    FromUtf8Error(#[from] std::string::FromUtf8Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_fault_converts_into_translate_error() {
        let fault = ReadFault::OutOfRange {
            addr: 0x1000,
            start: 0x82000000,
            end: 0x82010000,
        };
        let err: TranslateError = fault.clone().into();
        assert_eq!(err, TranslateError::IoError(fault));
    }

    #[test]
    fn test_walk_error_display() {
        let err = WalkError::CycleDetected {
            start: 0xc0001000,
            limit: 10,
        };
        assert_eq!(
            err.to_string(),
            "list walk from 0xc0001000 exceeded 10 nodes without closing"
        );
    }
}
