//! Startup configuration.
//!
//! [`FsConfig`] is built once before mounting and never changes afterwards.
//! [`BackingRoot`] owns the lifetime of the backing directory: an explicit
//! directory is left alone, an auto-created one is removed at teardown.

use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use thiserror::Error;

/// Default freespace overlay, in GiB.
pub const DEFAULT_FREESPACE_GIB: u64 = 128;

/// Prefix of auto-created backing directories.
pub const TEMP_PREFIX: &str = "fibfs.";

const GIB: u64 = 1024 * 1024 * 1024;

/// Configuration errors. Fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `--backing-dir` does not name an existing directory.
    #[error("backing dir {0:?} is not a dir")]
    NotADirectory(PathBuf),

    /// Freespace overlay does not fit in 64 bits of bytes.
    #[error("freespace of {0} GiB is too large")]
    FreespaceTooLarge(u64),

    /// Creating or inspecting the backing directory failed.
    #[error("backing dir: {0}")]
    Io(#[from] io::Error),
}

/// Extra free space reported by `statfs`, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Freespace(u64);

impl Freespace {
    /// Overlay of `gib` GiB.
    pub fn from_gib(gib: u64) -> Result<Self, ConfigError> {
        gib.checked_mul(GIB)
            .map(Self)
            .ok_or(ConfigError::FreespaceTooLarge(gib))
    }

    /// Overlay of an exact byte count.
    pub const fn from_bytes(bytes: u64) -> Self {
        Self(bytes)
    }

    /// Overlay size in bytes.
    pub const fn bytes(&self) -> u64 {
        self.0
    }
}

impl Default for Freespace {
    fn default() -> Self {
        Self(DEFAULT_FREESPACE_GIB * GIB)
    }
}

/// The directory all virtual paths resolve beneath.
#[derive(Debug)]
pub enum BackingRoot {
    /// A directory the user supplied. Never removed.
    Explicit(PathBuf),
    /// A temp directory created for this process, removed at teardown.
    Owned(TempDir),
}

impl BackingRoot {
    /// Use an existing directory.
    ///
    /// The path is canonicalized once here; later lookups join onto it
    /// without further normalization.
    pub fn explicit(dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(ConfigError::NotADirectory(dir.to_path_buf()));
        }
        Ok(Self::Explicit(dunce::canonicalize(dir)?))
    }

    /// Create a uniquely named directory under the system temp dir.
    pub fn temporary() -> Result<Self, ConfigError> {
        let dir = tempfile::Builder::new().prefix(TEMP_PREFIX).tempdir()?;
        Ok(Self::Owned(dir))
    }

    /// Explicit directory if given, otherwise an owned temp directory.
    pub fn from_option(dir: Option<&Path>) -> Result<Self, ConfigError> {
        match dir {
            Some(dir) => Self::explicit(dir),
            None => Self::temporary(),
        }
    }

    /// Path of the backing directory.
    pub fn path(&self) -> &Path {
        match self {
            Self::Explicit(path) => path,
            Self::Owned(dir) => dir.path(),
        }
    }

    /// Whether this process removes the directory at teardown.
    pub fn is_owned(&self) -> bool {
        matches!(self, Self::Owned(_))
    }

    /// Release the backing root. Owned directories are removed recursively.
    pub fn close(self) -> io::Result<()> {
        match self {
            Self::Explicit(_) => Ok(()),
            Self::Owned(dir) => {
                let path = dir.path().to_path_buf();
                dir.close()?;
                tracing::info!(path = %path.display(), "removed backing dir");
                Ok(())
            }
        }
    }
}

/// Immutable filesystem configuration shared by every component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsConfig {
    root: PathBuf,
    freespace: Freespace,
}

impl FsConfig {
    /// Create a configuration for the given backing root and overlay.
    pub fn new(root: impl Into<PathBuf>, freespace: Freespace) -> Self {
        Self {
            root: root.into(),
            freespace,
        }
    }

    /// Backing root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Freespace overlay.
    pub fn freespace(&self) -> Freespace {
        self.freespace
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_freespace_default_is_128_gib() {
        assert_eq!(Freespace::default().bytes(), 128 * 1024 * 1024 * 1024);
        assert_eq!(Freespace::from_gib(1).unwrap().bytes(), 1 << 30);
    }

    #[test]
    fn test_freespace_overflow() {
        assert!(matches!(
            Freespace::from_gib(u64::MAX),
            Err(ConfigError::FreespaceTooLarge(_))
        ));
    }

    #[test]
    fn test_explicit_must_be_dir() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("plain");
        std::fs::write(&file, b"x").unwrap();

        assert!(matches!(
            BackingRoot::explicit(&file),
            Err(ConfigError::NotADirectory(_))
        ));
        assert!(matches!(
            BackingRoot::explicit(dir.path().join("missing")),
            Err(ConfigError::NotADirectory(_))
        ));

        let root = BackingRoot::explicit(dir.path()).unwrap();
        assert!(!root.is_owned());
        root.close().unwrap();
        assert!(dir.path().exists());
    }

    #[test]
    fn test_temporary_removed_on_close() {
        let root = BackingRoot::from_option(None).unwrap();
        assert!(root.is_owned());

        let path = root.path().to_path_buf();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(TEMP_PREFIX));

        std::fs::create_dir(path.join("sub")).unwrap();
        std::fs::write(path.join("sub/file"), b"data").unwrap();

        root.close().unwrap();
        assert!(!path.exists());
    }
}
