//! Library crate for the ARM RAM dump parser

// Allow clippy lints that would require significant refactoring
#![allow(clippy::new_without_default)]
#![allow(clippy::manual_range_contains)]
#![allow(clippy::collapsible_if)]
#![allow(clippy::redundant_closure)]
#![allow(clippy::useless_format)]
#![allow(clippy::unnecessary_cast)]
#![allow(clippy::needless_borrows_for_generic_args)]

pub mod error;
pub mod formats;
pub mod kernel;
pub mod memory;
pub mod reports;
pub mod symbols;
pub mod translation;

// Core modules
pub mod core {
    pub mod offsets;
    pub mod profile;
}

// CLI modules
pub mod cli {
    pub mod args;
}

#[cfg(test)]
mod test_support;
