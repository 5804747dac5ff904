//! Permission strings at the filesystem boundary
//!
//! The archive stores whatever string [`ReadMode`] returns and hands it back
//! to [`WriteMode`] on extraction without interpreting it.

use std::fs;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::Path;

use anyhow::{Context, Result};

use crate::archive::ArchiveError;

pub trait ReadMode {
    fn read_mode(&self, path: &Path, metadata: &fs::Metadata) -> Result<String>;
}

pub trait WriteMode {
    fn write_mode(&self, path: &Path, mode: &str) -> Result<()>;
}

/// Octal permission bits, as `stat -c %a` prints them (`644`, `1777`).
///
/// On the way back any octal string is accepted, so BSD-style `100644` works
/// too: only the permission bits are applied.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnixModeAdapter;

impl ReadMode for UnixModeAdapter {
    fn read_mode(&self, _path: &Path, metadata: &fs::Metadata) -> Result<String> {
        Ok(format!("{:o}", metadata.mode() & 0o7777))
    }
}

impl WriteMode for UnixModeAdapter {
    fn write_mode(&self, path: &Path, mode: &str) -> Result<()> {
        let bits = u32::from_str_radix(mode.trim(), 8).map_err(|_| ArchiveError::InvalidMode {
            path: path.to_path_buf(),
            mode: mode.to_string(),
        })?;

        fs::set_permissions(path, fs::Permissions::from_mode(bits & 0o7777))
            .with_context(|| format!("Failed to set mode {} on {}", mode, path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_mode_is_octal() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("file");
        fs::write(&path, "x\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o640)).unwrap();

        let metadata = fs::symlink_metadata(&path).unwrap();
        assert_eq!(UnixModeAdapter.read_mode(&path, &metadata).unwrap(), "640");
    }

    #[test]
    fn test_write_mode_applies_bits() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("file");
        fs::write(&path, "x\n").unwrap();

        UnixModeAdapter.write_mode(&path, "600").unwrap();
        assert_eq!(fs::metadata(&path).unwrap().mode() & 0o7777, 0o600);

        UnixModeAdapter.write_mode(&path, "100755").unwrap();
        assert_eq!(fs::metadata(&path).unwrap().mode() & 0o7777, 0o755);
    }

    #[test]
    fn test_write_mode_rejects_symbolic() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("file");
        fs::write(&path, "x\n").unwrap();

        let err = UnixModeAdapter.write_mode(&path, "-rw-r--r--").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ArchiveError>(),
            Some(ArchiveError::InvalidMode { .. })
        ));
    }
}
