//! Main entry point for the ARM RAM dump parser
use anyhow::{bail, Context, Result};
use armdumpparser::cli::args::{Cli, Command, OutputFormatArg};
use armdumpparser::core::profile::KernelProfile;
use armdumpparser::formats::traits::{OutputDestination, OutputFormat, OutputWriter};
use armdumpparser::kernel::layout::VirtualMemoryLayout;
use armdumpparser::kernel::walker::StructWalker;
use armdumpparser::memory::RawDump;
use armdumpparser::reports::{self, probes, AnalysisContext, KernelReport, ReportTable};
use armdumpparser::symbols::SymbolTable;
use armdumpparser::translation::AddressTranslator;
use clap::Parser;
use log::{error, info};
use regex::Regex;

fn init_logging(cli: &Cli) {
    let level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };
    // RUST_LOG, when set, overrides the flags.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn load_profile(cli: &Cli) -> Result<KernelProfile> {
    let mut profile = match &cli.profile {
        Some(path) => KernelProfile::load_from_file(path)
            .with_context(|| format!("failed to load profile {}", path.display()))?,
        None => KernelProfile::default(),
    };
    if let Some(ram_start) = cli.ram_start {
        profile.layout.ram_start = ram_start;
    }
    if let Some(page_offset) = cli.page_offset {
        profile.layout.page_offset = page_offset;
    }
    if let Some(phys_offset) = cli.phys_offset {
        profile.layout.phys_offset = phys_offset;
    }
    Ok(profile)
}

fn main() -> Result<()> {
    // Parse command-line arguments
    let cli = Cli::parse();
    init_logging(&cli);

    // Handle --list-reports
    if cli.list_reports {
        println!("Available reports:");
        for (name, description) in reports::list_reports() {
            println!("  {} - {}", name, description);
        }
        return Ok(());
    }

    let (Some(dump_path), Some(map_path)) = (&cli.ram_dump, &cli.system_map) else {
        bail!("a RAM dump and a System.map are required");
    };

    let profile = load_profile(&cli)?;
    info!(
        "layout: ram_start 0x{:08x}, page_offset 0x{:08x}, phys_offset 0x{:08x}",
        profile.layout.ram_start, profile.layout.page_offset, profile.layout.phys_offset
    );

    info!("Opening RAM dump: {}", dump_path.display());
    let dump = RawDump::open(dump_path, profile.layout.ram_start)
        .with_context(|| format!("failed to open RAM dump {}", dump_path.display()))?;
    info!("Loading symbols from: {}", map_path.display());
    let symbols = SymbolTable::load(map_path)
        .with_context(|| format!("failed to load System.map {}", map_path.display()))?;
    info!("{} bytes of RAM, {} symbols", dump.len(), symbols.len());

    // Without swapper_pg_dir only the reports that walk page tables fail.
    let translator = AddressTranslator::from_symbols(&dump, &symbols, profile.layout);
    let walker = StructWalker::new(&translator, &profile.offsets);

    // Create analysis context
    let context = AnalysisContext {
        dump: &dump,
        symbols: &symbols,
        profile: &profile,
        translator: &translator,
        walker: &walker,
        output_dir: cli.output_dir.as_deref(),
    };

    // Determine output format and destination
    let output_format = match cli.format {
        OutputFormatArg::Text => OutputFormat::Text,
        OutputFormatArg::Csv => OutputFormat::Csv,
        OutputFormatArg::Json => OutputFormat::Json,
        OutputFormatArg::Jsonl => OutputFormat::Jsonl,
    };
    let output_dest = match &cli.output_dir {
        Some(dir) => OutputDestination::Directory(dir.clone()),
        None => OutputDestination::Stdout,
    };
    let output_writer = OutputWriter::new(output_format, output_dest);

    match cli.command.as_ref().unwrap_or(&Command::All) {
        Command::Translate { va } => {
            let table = probes::explain_translation(&translator, *va)?;
            write(&output_writer, "translate", &table)?;
        }
        Command::Search { value } => {
            let table = probes::search_value(&dump, &translator, *value);
            write(&output_writer, "search", &table)?;
        }
        Command::Validate => {
            let table = probes::validate_sections(&context, true)?;
            write(&output_writer, "validate", &table)?;
        }
        Command::Classify { value } => {
            let layout = VirtualMemoryLayout::discover(&dump, &symbols);
            let table = probes::classify_value(&layout, *value);
            write(&output_writer, "classify", &table)?;
        }
        Command::Report { name, filter } => {
            let Some(report) = reports::find_report(name) else {
                bail!("unknown report '{}', see --list-reports", name);
            };
            let mut table = report.run(&context)?;
            if let Some(pattern) = filter {
                let re = Regex::new(pattern).context("invalid --filter pattern")?;
                table.rows.retain(|row| row.first().is_some_and(|cell| re.is_match(cell)));
            }
            write(&output_writer, report.name(), &table)?;
        }
        Command::All => run_all_reports(&context, &output_writer),
    }

    Ok(())
}

fn write(writer: &OutputWriter, name: &str, table: &ReportTable) -> Result<()> {
    if let Some(path) = writer.write_table(name, table)? {
        info!("wrote {} rows to {}", table.len(), path.display());
    }
    Ok(())
}

/// Run every report. A failing report is logged and skipped.
fn run_all_reports(context: &AnalysisContext, output_writer: &OutputWriter) {
    for report in reports::all_reports() {
        info!("=== Running report: {} ===", report.name());
        if let Err(e) = execute_report(report.as_ref(), context, output_writer) {
            error!("report {} failed: {:#}", report.name(), e);
        }
    }
}

fn execute_report(report: &dyn KernelReport, context: &AnalysisContext, output_writer: &OutputWriter) -> Result<()> {
    let table = report.run(context)?;
    write(output_writer, report.name(), &table)
}
