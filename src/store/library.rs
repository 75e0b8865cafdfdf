//! Library registry sidecar.
//!
//! A primary database can link external library trees, each indexed into its
//! own database. The links live in `GTAGSLIBPATH` inside the primary database
//! directory, one `<library root>\t<library database>` line per library.

use crate::error::{StoreError, StoreResult};
use crate::utils::has_text_prefix;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Sidecar file name inside the primary database directory.
pub const LIBRARY_REGISTRY_FILE: &str = "GTAGSLIBPATH";

/// One linked library: its source root and its own database directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryEntry {
    pub root: PathBuf,
    pub db_path: PathBuf,
}

impl LibraryEntry {
    pub fn new(root: impl Into<PathBuf>, db_path: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            db_path: db_path.into(),
        }
    }

    /// Parse one sidecar line, splitting on the first tab only.
    pub fn parse(line: &str, line_number: usize) -> StoreResult<Self> {
        match line.split_once('\t') {
            Some((root, db_path)) if !root.is_empty() && !db_path.is_empty() => {
                Ok(Self::new(root, db_path))
            }
            _ => Err(StoreError::MalformedRegistryRecord {
                line_number,
                line: line.to_string(),
            }),
        }
    }
}

/// Handle on the sidecar of one primary database.
#[derive(Debug, Clone)]
pub struct LibraryRegistry {
    path: PathBuf,
}

impl LibraryRegistry {
    /// Registry stored inside `db_location`.
    pub fn at(db_location: &Path) -> Self {
        Self {
            path: db_location.join(LIBRARY_REGISTRY_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrite the sidecar with `entries`, in order.
    ///
    /// The database directory is created if needed. Entries whose root does
    /// not exist are skipped. Returns the entries actually written.
    pub fn write(&self, entries: &[LibraryEntry]) -> StoreResult<Vec<LibraryEntry>> {
        if let Some(db_location) = self.path.parent() {
            std::fs::create_dir_all(db_location).map_err(|e| StoreError::fs(db_location, e))?;
        }

        let written: Vec<LibraryEntry> = entries
            .iter()
            .filter(|entry| {
                let exists = entry.root.exists();
                if !exists {
                    debug!(root = %entry.root.display(), "Skipping missing library root");
                }
                exists
            })
            .cloned()
            .collect();

        let file = File::create(&self.path).map_err(|e| StoreError::fs(&self.path, e))?;
        let mut writer = BufWriter::new(file);
        for entry in &written {
            writeln!(
                writer,
                "{}\t{}",
                entry.root.display(),
                entry.db_path.display()
            )
            .map_err(|e| StoreError::fs(&self.path, e))?;
        }
        writer.flush().map_err(|e| StoreError::fs(&self.path, e))?;

        Ok(written)
    }

    /// Lazily read entries line by line.
    ///
    /// Every call opens the sidecar afresh, so the sequence can be restarted.
    /// A missing sidecar reads as empty.
    pub fn read_all(&self) -> StoreResult<LibraryEntries> {
        let lines = match File::open(&self.path) {
            Ok(file) => Some(BufReader::new(file).lines()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(StoreError::fs(&self.path, e)),
        };
        Ok(LibraryEntries {
            lines,
            line_number: 0,
            path: self.path.clone(),
        })
    }

    /// First entry whose root textually prefixes `filename`, in file order.
    ///
    /// Malformed lines are logged and skipped.
    pub fn first_match(&self, filename: &Path) -> StoreResult<Option<LibraryEntry>> {
        for entry in self.read_all()? {
            match entry {
                Ok(entry) if has_text_prefix(filename, &entry.root) => return Ok(Some(entry)),
                Ok(_) => {}
                Err(e) => warn!(registry = %self.path.display(), error = %e, "Skipping registry line"),
            }
        }
        Ok(None)
    }

    /// All well-formed entries, skipping (and logging) malformed lines.
    pub fn valid_entries(&self) -> StoreResult<Vec<LibraryEntry>> {
        let mut entries = Vec::new();
        for entry in self.read_all()? {
            match entry {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(registry = %self.path.display(), error = %e, "Skipping registry line"),
            }
        }
        Ok(entries)
    }
}

/// Iterator over sidecar records; yields one result per non-blank line.
pub struct LibraryEntries {
    lines: Option<Lines<BufReader<File>>>,
    line_number: usize,
    path: PathBuf,
}

impl Iterator for LibraryEntries {
    type Item = StoreResult<LibraryEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        let lines = self.lines.as_mut()?;
        loop {
            let line = match lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(StoreError::fs(&self.path, e))),
            };
            self.line_number += 1;

            let line = line.trim_end();
            if line.is_empty() {
                continue;
            }
            return Some(LibraryEntry::parse(line, self.line_number));
        }
    }
}
