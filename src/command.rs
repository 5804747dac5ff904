//! The three archive operations behind the command line

use std::fs;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::archive::ArchiveError;
use crate::encoder::Encoder;
use crate::extract::Extractor;
use crate::list::Inventory;

/// Archive path meaning stdin (list, extract) or stdout (create)
pub const STDIO_ARCHIVE: &str = "-";

/// Which pass to run over an archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    List,
    Extract,
}

/// Everything besides the archive path that an operation needs
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Directory filesystem operations are relative to. The archive path is
    /// not affected.
    pub directory: Option<PathBuf>,
    /// Inputs to archive; only valid for [`Operation::Create`]
    pub paths: Vec<PathBuf>,
    pub verbose: bool,
}

impl Options {
    fn base_dir(&self) -> PathBuf {
        self.directory.clone().unwrap_or_default()
    }
}

impl Operation {
    /// Run this operation. Listings and archives sent to stdout go to `out`.
    pub fn process<W: Write>(self, archive: &Path, options: &Options, out: W) -> Result<()> {
        match self {
            Operation::Create => create(archive, options, out),
            Operation::List => {
                reject_paths(options)?;
                Inventory::read(open_archive(archive)?)?.write_to(out, options.verbose)
            }
            Operation::Extract => {
                reject_paths(options)?;
                Extractor::new(options.base_dir())
                    .with_verbose(options.verbose)
                    .extract(open_archive(archive)?)
            }
        }
    }
}

fn create<W: Write>(archive: &Path, options: &Options, mut out: W) -> Result<()> {
    if options.paths.is_empty() {
        return Err(ArchiveError::Usage("create needs at least one path to archive".to_string()).into());
    }

    let encoder = Encoder::new()
        .with_base_dir(options.base_dir())
        .with_verbose(options.verbose);

    if archive == Path::new(STDIO_ARCHIVE) {
        let encoded = encoder.encode_to_vec(&options.paths)?;
        out.write_all(&encoded)?;
        out.flush()?;
        Ok(())
    } else {
        encoder.encode_to_file(&options.paths, archive)
    }
}

fn reject_paths(options: &Options) -> Result<()> {
    match options.paths.first() {
        Some(extra) => Err(ArchiveError::Usage(format!("unexpected argument '{}'", extra.display())).into()),
        None => Ok(()),
    }
}

fn open_archive(archive: &Path) -> Result<Box<dyn BufRead>> {
    if archive == Path::new(STDIO_ARCHIVE) {
        return Ok(Box::new(io::stdin().lock()));
    }

    match fs::File::open(archive) {
        Ok(file) => Ok(Box::new(BufReader::new(file))),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Err(ArchiveError::InputNotFound {
            path: archive.to_path_buf(),
            cwd: std::env::current_dir().unwrap_or_default(),
        }
        .into()),
        Err(err) => Err(err).with_context(|| format!("Failed to read: {}", archive.display())),
    }
}
