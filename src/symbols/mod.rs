//! System.map symbol table
use crate::error::{AnalysisError, SymbolError};
use log::{debug, warn};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// One line of the symbol file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolEntry {
    pub name: String,
    pub address: u32,
    /// The `nm` type letter, when the line carries one.
    pub kind: Option<char>,
}

impl SymbolEntry {
    /// ARM mapping symbols (`$a`, `$d`, `$t`) mark code/data boundaries
    /// and do not name kernel objects.
    pub fn is_mapping_symbol(&self) -> bool {
        self.name.starts_with('$')
    }
}

/// Name to address index built from a System.map style file.
///
/// Lines are `<hex address> [<type>] <name>`. The name is the last
/// whitespace separated field and must match a query exactly, so `foo`
/// never resolves to `foobar`. When a name occurs on several lines the
/// first one wins.
#[derive(Debug, Default)]
pub struct SymbolTable {
    entries: Vec<SymbolEntry>,
    index: HashMap<String, usize>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a symbol file from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, AnalysisError> {
        let file = File::open(path.as_ref())?;
        let table = Self::parse(BufReader::new(file))?;
        debug!(
            "loaded {} symbols from {}",
            table.len(),
            path.as_ref().display()
        );
        Ok(table)
    }

    /// Parse symbol lines from any buffered reader.
    pub fn parse<R: BufRead>(reader: R) -> Result<Self, std::io::Error> {
        let lines = reader.lines().collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_lines(&lines))
    }

    /// Parse symbol lines held in a string.
    pub fn parse_str(text: &str) -> Self {
        Self::from_lines(text.lines())
    }

    /// Build a table from lines. Blank lines are ignored, anything else that
    /// is not a symbol is counted and logged once.
    fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut table = SymbolTable::new();
        let mut skipped = 0usize;

        for line in lines {
            let line = line.as_ref();
            match parse_line(line) {
                Some(entry) => table.push(entry),
                None if line.trim().is_empty() => {}
                None => skipped += 1,
            }
        }

        if skipped > 0 {
            warn!("skipped {} malformed symbol lines", skipped);
        }
        table
    }

    /// Append a symbol. An existing name keeps its first address.
    pub fn push(&mut self, entry: SymbolEntry) {
        let position = self.entries.len();
        self.index.entry(entry.name.clone()).or_insert(position);
        self.entries.push(entry);
    }

    pub fn add_symbol(&mut self, name: &str, address: u32) {
        self.push(SymbolEntry {
            name: name.to_string(),
            address,
            kind: None,
        });
    }

    /// Address of the first line whose name equals `name`.
    pub fn resolve(&self, name: &str) -> Result<u32, SymbolError> {
        self.index
            .get(name)
            .map(|&i| self.entries[i].address)
            .ok_or_else(|| SymbolError::NotFound(name.to_string()))
    }

    /// Resolve a `start`/`end` symbol pair.
    pub fn resolve_range(&self, start: &str, end: &str) -> Result<(u32, u32), SymbolError> {
        Ok((self.resolve(start)?, self.resolve(end)?))
    }

    /// All symbols in file order.
    pub fn entries(&self) -> &[SymbolEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_line(line: &str) -> Option<SymbolEntry> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 2 {
        return None;
    }

    let address = u32::from_str_radix(fields[0].trim_start_matches("0x"), 16).ok()?;
    let name = fields[fields.len() - 1];
    let kind = if fields.len() >= 3 && fields[1].chars().count() == 1 {
        fields[1].chars().next()
    } else {
        None
    };

    Some(SymbolEntry {
        name: name.to_string(),
        address,
        kind,
    })
}
