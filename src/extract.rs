//! Recreating a tree from a ttar stream

use std::fs;
use std::io::{self, BufRead, BufWriter, Write};
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

use crate::archive::decode_content_line;
use crate::decoder::{Decoder, RecordSink};
use crate::mode::{UnixModeAdapter, WriteMode};

/// Filesystem side of decoding: every record becomes a file, directory or
/// symlink under `base_dir`.
///
/// Nothing is rolled back on failure; whatever was extracted before the
/// error stays on disk.
pub struct Extractor<M = UnixModeAdapter> {
    base_dir: PathBuf,
    verbose: bool,
    modes: M,
    /// File whose content block is being written
    open_file: Option<BufWriter<fs::File>>,
}

impl Extractor {
    /// Extract relative paths into `base_dir`
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            verbose: false,
            modes: UnixModeAdapter,
            open_file: None,
        }
    }
}

impl<M: WriteMode> Extractor<M> {
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_modes<N: WriteMode>(self, modes: N) -> Extractor<N> {
        Extractor {
            base_dir: self.base_dir,
            verbose: self.verbose,
            modes,
            open_file: None,
        }
    }

    /// Decode `reader` and apply every record to the filesystem
    pub fn extract<R: BufRead>(mut self, reader: R) -> Result<()> {
        Decoder::new().decode(reader, &mut self)
    }

    fn target(&self, path: &Path) -> PathBuf {
        self.base_dir.join(path)
    }

    fn create_parent(target: &Path) -> Result<()> {
        if let Some(parent) = target.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
            }
        }
        Ok(())
    }
}

/// Remove whatever is at `target`, if anything
fn remove_existing(target: &Path) -> Result<()> {
    let metadata = match fs::symlink_metadata(target) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(err) => {
            return Err(err).with_context(|| format!("Failed to stat: {}", target.display()))
        }
    };

    let removed = if metadata.is_dir() {
        fs::remove_dir_all(target)
    } else {
        fs::remove_file(target)
    };
    removed.with_context(|| format!("Failed to remove: {}", target.display()))
}

impl<M: WriteMode> RecordSink for Extractor<M> {
    fn begin_path(&mut self, path: &Path) -> Result<()> {
        remove_existing(&self.target(path))
    }

    fn begin_file(&mut self, path: &Path, _lines: usize) -> Result<()> {
        let target = self.target(path);
        Self::create_parent(&target)?;
        let file = fs::File::create(&target)
            .with_context(|| format!("Failed to create file: {}", target.display()))?;
        self.open_file = Some(BufWriter::new(file));

        if self.verbose {
            eprintln!("{}", path.display());
        }
        Ok(())
    }

    fn content_line(&mut self, path: &Path, line: &[u8]) -> Result<()> {
        let file = self
            .open_file
            .as_mut()
            .ok_or_else(|| anyhow!("No open file for content of {}", path.display()))?;
        file.write_all(&decode_content_line(line))
            .with_context(|| format!("Failed to write: {}", path.display()))?;
        Ok(())
    }

    fn end_file(&mut self, path: &Path) -> Result<()> {
        if let Some(mut file) = self.open_file.take() {
            file.flush()
                .with_context(|| format!("Failed to write: {}", path.display()))?;
        }
        Ok(())
    }

    fn directory(&mut self, path: &Path) -> Result<()> {
        let target = self.target(path);
        if fs::symlink_metadata(&target).is_ok_and(|m| !m.is_dir()) {
            remove_existing(&target)?;
        }
        fs::create_dir_all(&target)
            .with_context(|| format!("Failed to create directory: {}", target.display()))?;

        if self.verbose {
            eprintln!("{}/", path.display());
        }
        Ok(())
    }

    fn symlink(&mut self, path: &Path, target: &Path) -> Result<()> {
        let link = self.target(path);
        Self::create_parent(&link)?;
        symlink(target, &link)
            .with_context(|| format!("Failed to create symlink: {}", link.display()))?;

        if self.verbose {
            eprintln!("{} -> {}", path.display(), target.display());
        }
        Ok(())
    }

    fn mode(&mut self, path: &Path, mode: &str) -> Result<()> {
        self.modes.write_mode(&self.target(path), mode)
    }
}

/// Extract `reader` into `base_dir`
pub fn extract<R: BufRead>(reader: R, base_dir: &Path, verbose: bool) -> Result<()> {
    Extractor::new(base_dir).with_verbose(verbose).extract(reader)
}
