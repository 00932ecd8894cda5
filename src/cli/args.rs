//! Command-line argument parsing for the dump parser
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Parse a 32-bit value written in hex, with or without `0x`.
pub fn parse_hex_u32(text: &str) -> Result<u32, String> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    u32::from_str_radix(digits, 16).map_err(|e| format!("invalid hex value '{}': {}", text, e))
}

#[derive(Parser)]
#[command(name = "armdumpparser")]
#[command(about = "Offline analysis of raw 32-bit ARM Linux RAM dumps", long_about = None)]
pub struct Cli {
    /// Path to the raw physical RAM dump
    #[arg(value_name = "RAM_DUMP", required_unless_present = "list_reports")]
    pub ram_dump: Option<PathBuf>,

    /// Path to the kernel's System.map
    #[arg(value_name = "SYSTEM_MAP", required_unless_present = "list_reports")]
    pub system_map: Option<PathBuf>,

    /// What to do (default: run every report)
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormatArg,

    /// Write one file per report (plus per-task artifacts) here instead of stdout
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// JSON kernel profile with layout constants and struct offsets
    #[arg(short, long, value_name = "FILE")]
    pub profile: Option<PathBuf>,

    /// Physical address of the first byte of the dump (hex)
    #[arg(long, value_name = "ADDR", value_parser = parse_hex_u32)]
    pub ram_start: Option<u32>,

    /// Kernel PAGE_OFFSET (hex)
    #[arg(long, value_name = "ADDR", value_parser = parse_hex_u32)]
    pub page_offset: Option<u32>,

    /// Kernel PHYS_OFFSET (hex)
    #[arg(long, value_name = "ADDR", value_parser = parse_hex_u32)]
    pub phys_offset: Option<u32>,

    /// Enable debug output
    #[arg(short, long)]
    pub debug: bool,

    /// Enable verbose output (warnings, status messages)
    #[arg(short, long)]
    pub verbose: bool,

    /// List available reports
    #[arg(short, long)]
    pub list_reports: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Explain the page table walk for one virtual address
    Translate {
        #[arg(value_parser = parse_hex_u32)]
        va: u32,
    },

    /// Find every word-aligned copy of a 32-bit value
    Search {
        #[arg(value_parser = parse_hex_u32)]
        value: u32,
    },

    /// Check the page tables against the linear map for .text, .data and .bss
    Validate,

    /// Say which memory region a value points into
    Classify {
        #[arg(value_parser = parse_hex_u32)]
        value: u32,
    },

    /// Run a single report
    Report {
        /// Report name (see --list-reports)
        name: String,

        /// Keep only rows whose first column matches this regex
        #[arg(long)]
        filter: Option<String>,
    },

    /// Run every report
    All,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum OutputFormatArg {
    Text,
    Csv,
    Json,
    Jsonl,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_u32() {
        assert_eq!(parse_hex_u32("0xc0008000"), Ok(0xc000_8000));
        assert_eq!(parse_hex_u32("C0008000"), Ok(0xc000_8000));
        assert!(parse_hex_u32("0x1_0000_0000").is_err());
        assert!(parse_hex_u32("zz").is_err());
    }

    #[test]
    fn test_subcommand_parsing() {
        let cli = Cli::try_parse_from([
            "armdumpparser",
            "ram.bin",
            "System.map",
            "--ram-start",
            "0x80000000",
            "translate",
            "0xc0008000",
        ])
        .unwrap();
        assert_eq!(cli.ram_start, Some(0x8000_0000));
        assert!(matches!(cli.command, Some(Command::Translate { va: 0xc000_8000 })));
        assert!(cli.format == OutputFormatArg::Text);
    }

    #[test]
    fn test_list_reports_needs_no_inputs() {
        let cli = Cli::try_parse_from(["armdumpparser", "--list-reports"]).unwrap();
        assert!(cli.list_reports);
        assert!(cli.ram_dump.is_none());
        assert!(Cli::try_parse_from(["armdumpparser"]).is_err());
    }
}
