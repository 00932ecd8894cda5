//! End-to-end tests of the command line front end
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const RAM_START: u32 = 0x8200_0000;
const DUMP_SIZE: usize = 0x1_0000;

const SYSTEM_MAP: &str = "c0004000 D swapper_pg_dir\nc0008000 T _text\nc0008000 t $a\nc0008010 T _etext\n";

/// A 64 KiB dump whose first megabyte is section mapped at 0xc0000000.
fn fixture() -> Result<(TempDir, PathBuf, PathBuf), Box<dyn std::error::Error>> {
    fixture_with_map(SYSTEM_MAP)
}

fn fixture_with_map(symbols: &str) -> Result<(TempDir, PathBuf, PathBuf), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let mut ram = vec![0u8; DUMP_SIZE];

    let entry = (0x8200_4000 - RAM_START) as usize + (0xc00 << 2);
    let section = RAM_START | (1 << 16) | (0b01 << 10) | 0b10;
    ram[entry..entry + 4].copy_from_slice(&section.to_le_bytes());
    ram[0x9000..0x9004].copy_from_slice(&0xfeed_f00du32.to_le_bytes());

    let dump = dir.path().join("ram.bin");
    fs::write(&dump, ram)?;
    let map = dir.path().join("System.map");
    fs::write(&map, symbols)?;
    Ok((dir, dump, map))
}

fn cmd(dump: &Path, map: &Path) -> Command {
    let mut cmd = Command::cargo_bin("armdumpparser").expect("binary is built");
    cmd.arg(dump).arg(map);
    cmd
}

#[test]
fn test_list_reports() {
    Command::cargo_bin("armdumpparser")
        .unwrap()
        .arg("--list-reports")
        .assert()
        .success()
        .stdout(predicate::str::contains("slabinfo"))
        .stdout(predicate::str::contains("pagetypeinfo"));
}

#[test]
fn test_translate_section_address() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, dump, map) = fixture()?;
    cmd(&dump, &map)
        .args(["translate", "0xc0008abc"])
        .assert()
        .success()
        .stdout(predicate::str::contains("SECTION(1MB)"))
        .stdout(predicate::str::contains("0x82008abc"));
    Ok(())
}

#[test]
fn test_search_as_csv() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, dump, map) = fixture()?;
    cmd(&dump, &map)
        .args(["--format", "csv", "search", "feedf00d"])
        .assert()
        .success()
        .stdout(predicate::str::contains("PHYSICAL,LINEAR_VA"))
        .stdout(predicate::str::contains("0x82009000,0xc0009000"));
    Ok(())
}

#[test]
fn test_validate_clean_text_section() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, dump, map) = fixture()?;
    cmd(&dump, &map)
        .args(["--format", "json", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"count\": 0"))
        .stdout(predicate::str::contains("5 words checked, 0 problems"));
    Ok(())
}

#[test]
fn test_unknown_report_fails() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, dump, map) = fixture()?;
    cmd(&dump, &map)
        .args(["report", "pslist"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown report"));
    Ok(())
}

#[test]
fn test_all_reports_write_files_and_survive_failures() -> Result<(), Box<dyn std::error::Error>> {
    let (dir, dump, map) = fixture()?;
    let out = dir.path().join("out");
    cmd(&dump, &map)
        .arg("--output-dir")
        .arg(&out)
        .assert()
        .success()
        .stderr(predicate::str::contains("report tasks failed"));

    assert!(fs::read_to_string(out.join("layout.txt"))?.contains(".text"));
    let pgtable = fs::read_to_string(out.join("pgtable.txt"))?;
    assert!(pgtable.contains("0xc0008010"));
    assert!(!out.join("slabinfo.txt").exists());
    Ok(())
}

#[test]
fn test_missing_dump_is_reported() {
    Command::cargo_bin("armdumpparser")
        .unwrap()
        .args(["/nonexistent/ram.bin", "/nonexistent/System.map"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to open RAM dump"));
}

#[test]
fn test_map_without_page_tables_still_classifies() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, dump, map) = fixture_with_map("c0008000 T _text\nc0008010 T _etext\n")?;
    cmd(&dump, &map)
        .args(["classify", "0xc0008004"])
        .assert()
        .success()
        .stdout(predicate::str::contains("code (.text)"));
    cmd(&dump, &map)
        .args(["search", "0xfeedf00d"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0x82009000"));
    Ok(())
}

#[test]
fn test_all_without_page_tables_skips_only_walking_reports() -> Result<(), Box<dyn std::error::Error>> {
    let (dir, dump, map) = fixture_with_map("c0008000 T _text\nc0008010 T _etext\n")?;
    let out = dir.path().join("out");
    cmd(&dump, &map)
        .arg("--output-dir")
        .arg(&out)
        .assert()
        .success()
        .stderr(predicate::str::contains("report pgtable failed"))
        .stderr(predicate::str::contains("swapper_pg_dir"));

    assert!(fs::read_to_string(out.join("layout.txt"))?.contains(".text"));
    assert!(!out.join("pgtable.txt").exists());
    Ok(())
}
