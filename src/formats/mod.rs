//! Output format module for the dump parser
pub mod csv;
pub mod json;
pub mod jsonl;
pub mod text;
pub mod traits;
