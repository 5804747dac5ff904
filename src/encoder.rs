//! ttar archive encoder

use std::fs;
use std::io::{self, Write};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use walkdir::WalkDir;

use crate::archive::{
    count_lines, escape_content, find_reserved_token, needs_eof_marker, trim_trailing_slashes,
    write_divider, write_header, ArchiveError, DIRECTORY_PREFIX, EOF_TOKEN, LINES_PREFIX,
    MODE_PREFIX, PATH_PREFIX, SYMLINK_PREFIX,
};
use crate::mode::{ReadMode, UnixModeAdapter};

/// Walks filesystem paths and writes one record per entry
pub struct Encoder<M = UnixModeAdapter> {
    /// Directory relative input paths are resolved against
    base_dir: PathBuf,
    /// Echo each archived entry to stderr
    verbose: bool,
    modes: M,
}

impl Encoder {
    /// Create a new encoder
    pub fn new() -> Self {
        Self {
            base_dir: PathBuf::new(),
            verbose: false,
            modes: UnixModeAdapter,
        }
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: ReadMode> Encoder<M> {
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Resolve input paths against `dir` instead of the working directory.
    /// Record paths are still written exactly as given.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = dir.into();
        self
    }

    /// Use a different source of mode strings
    pub fn with_modes<N: ReadMode>(self, modes: N) -> Encoder<N> {
        Encoder {
            base_dir: self.base_dir,
            verbose: self.verbose,
            modes,
        }
    }

    /// Encode `paths`, in order, into `sink`
    pub fn encode<P, W>(&self, paths: &[P], mut sink: W) -> Result<()>
    where
        P: AsRef<Path>,
        W: Write,
    {
        for path in paths {
            self.encode_path(&mut sink, path.as_ref())?;
        }
        sink.flush()?;
        Ok(())
    }

    /// Encode into memory
    pub fn encode_to_vec<P: AsRef<Path>>(&self, paths: &[P]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        self.encode(paths, &mut output)?;
        Ok(output)
    }

    /// Encode into an archive file.
    ///
    /// The archive is only written once every path has been encoded, so a
    /// failed encode leaves no archive behind.
    pub fn encode_to_file<P: AsRef<Path>>(&self, paths: &[P], archive: &Path) -> Result<()> {
        let encoded = self.encode_to_vec(paths)?;
        fs::write(archive, encoded)
            .with_context(|| format!("Failed to write: {}", archive.display()))?;
        Ok(())
    }

    fn encode_path<W: Write>(&self, sink: &mut W, path: &Path) -> Result<()> {
        let fs_path = self.base_dir.join(path);
        let metadata = match fs::symlink_metadata(&fs_path) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                let cwd = std::env::current_dir().unwrap_or_default().join(&self.base_dir);
                return Err(ArchiveError::InputNotFound {
                    path: path.to_path_buf(),
                    cwd,
                }
                .into());
            }
            Err(err) => {
                return Err(err).with_context(|| format!("Failed to stat: {}", fs_path.display()))
            }
        };

        if !metadata.is_dir() {
            return self.encode_entry(sink, path, &fs_path, &metadata);
        }

        let record_path = trim_trailing_slashes(path);
        self.encode_directory(sink, record_path, &fs_path, &metadata)?;

        // Pre-order walk: every directory is yielded before its children
        let entries = WalkDir::new(&fs_path)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name();

        for entry in entries {
            let entry = entry.with_context(|| format!("Failed to walk: {}", fs_path.display()))?;
            let relative = entry.path().strip_prefix(&fs_path)?;
            let child = record_path.join(relative);
            let metadata = entry
                .metadata()
                .with_context(|| format!("Failed to stat: {}", entry.path().display()))?;

            self.encode_entry(sink, &child, entry.path(), &metadata)?;
        }

        Ok(())
    }

    /// Write the record for a single entry without descending into it
    fn encode_entry<W: Write>(
        &self,
        sink: &mut W,
        record_path: &Path,
        fs_path: &Path,
        metadata: &fs::Metadata,
    ) -> Result<()> {
        let file_type = metadata.file_type();
        if file_type.is_symlink() {
            self.encode_symlink(sink, record_path, fs_path)
        } else if file_type.is_dir() {
            self.encode_directory(sink, record_path, fs_path, metadata)
        } else if file_type.is_file() {
            self.encode_file(sink, record_path, fs_path, metadata)
        } else {
            Err(ArchiveError::UnsupportedFileType {
                path: record_path.to_path_buf(),
            }
            .into())
        }
    }

    fn encode_symlink<W: Write>(&self, sink: &mut W, record_path: &Path, fs_path: &Path) -> Result<()> {
        let target = fs::read_link(fs_path)
            .with_context(|| format!("Failed to read link: {}", fs_path.display()))?;

        write_header(sink, PATH_PREFIX, record_path.as_os_str().as_bytes())?;
        write_header(sink, SYMLINK_PREFIX, target.as_os_str().as_bytes())?;
        write_divider(sink)?;

        if self.verbose {
            eprintln!("{} -> {}", record_path.display(), target.display());
        }
        Ok(())
    }

    fn encode_directory<W: Write>(
        &self,
        sink: &mut W,
        record_path: &Path,
        fs_path: &Path,
        metadata: &fs::Metadata,
    ) -> Result<()> {
        let mode = self.modes.read_mode(fs_path, metadata)?;

        write_header(sink, DIRECTORY_PREFIX, record_path.as_os_str().as_bytes())?;
        write_header(sink, MODE_PREFIX, mode.as_bytes())?;
        write_divider(sink)?;

        if self.verbose {
            eprintln!("{} {}", mode, record_path.display());
        }
        Ok(())
    }

    fn encode_file<W: Write>(
        &self,
        sink: &mut W,
        record_path: &Path,
        fs_path: &Path,
        metadata: &fs::Metadata,
    ) -> Result<()> {
        let data = fs::read(fs_path)
            .with_context(|| format!("Failed to read file: {}", fs_path.display()))?;

        if let Some(token) = find_reserved_token(&data) {
            return Err(ArchiveError::UnsupportedContent {
                path: record_path.to_path_buf(),
                token,
            }
            .into());
        }

        let mode = self.modes.read_mode(fs_path, metadata)?;

        write_header(sink, PATH_PREFIX, record_path.as_os_str().as_bytes())?;
        write_header(sink, LINES_PREFIX, count_lines(&data).to_string().as_bytes())?;
        sink.write_all(&escape_content(&data))?;
        if needs_eof_marker(&data) {
            sink.write_all(EOF_TOKEN)?;
            sink.write_all(b"\n")?;
        }
        write_header(sink, MODE_PREFIX, mode.as_bytes())?;
        write_divider(sink)?;

        if self.verbose {
            eprintln!("{} {}", mode, record_path.display());
        }
        Ok(())
    }
}
