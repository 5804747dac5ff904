//! Listing an archive without touching the filesystem

use std::io::{BufRead, Write};
use std::path::Path;

use anyhow::Result;

use crate::archive::Entry;
use crate::decoder::{Decoder, RecordSink};

/// Collects the entries of a stream in archive order
#[derive(Debug, Default)]
pub struct Inventory {
    pub entries: Vec<Entry>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `reader` into its list of entries
    pub fn read<R: BufRead>(reader: R) -> Result<Self> {
        let mut inventory = Self::new();
        Decoder::new().decode(reader, &mut inventory)?;
        Ok(inventory)
    }

    /// Write one display line per entry.
    ///
    /// In verbose mode each line is prefixed with the recorded mode, or `-`
    /// for entries that have none.
    pub fn write_to<W: Write>(&self, mut out: W, verbose: bool) -> Result<()> {
        for entry in &self.entries {
            if verbose {
                out.write_all(entry.mode().unwrap_or("-").as_bytes())?;
                out.write_all(b" ")?;
            }
            entry.write_line(&mut out)?;
        }
        out.flush()?;
        Ok(())
    }
}

impl RecordSink for Inventory {
    fn begin_file(&mut self, path: &Path, lines: usize) -> Result<()> {
        self.entries.push(Entry::File {
            path: path.to_path_buf(),
            lines,
            mode: None,
        });
        Ok(())
    }

    fn directory(&mut self, path: &Path) -> Result<()> {
        self.entries.push(Entry::Directory {
            path: path.to_path_buf(),
            mode: None,
        });
        Ok(())
    }

    fn symlink(&mut self, path: &Path, target: &Path) -> Result<()> {
        self.entries.push(Entry::Symlink {
            path: path.to_path_buf(),
            target: target.to_path_buf(),
        });
        Ok(())
    }

    fn mode(&mut self, path: &Path, mode: &str) -> Result<()> {
        if let Some(last) = self.entries.last_mut() {
            if last.path() == path {
                last.set_mode(mode);
            }
        }
        Ok(())
    }
}

/// List `reader` to `out`, one line per entry
pub fn list<R: BufRead, W: Write>(reader: R, out: W, verbose: bool) -> Result<()> {
    Inventory::read(reader)?.write_to(out, verbose)
}
