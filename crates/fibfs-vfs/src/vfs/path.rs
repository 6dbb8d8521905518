//! Virtual path → backing path translation.

use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use super::error::{VfsError, VfsResult};

/// Maps slash-rooted virtual paths onto the backing root.
///
/// Exactly one leading slash is stripped and the remainder joined onto the
/// root. `..` and symlinks are left for the backing filesystem to resolve.
#[derive(Debug, Clone, Copy)]
pub struct PathResolver<'a> {
    root: &'a Path,
}

impl<'a> PathResolver<'a> {
    /// Create a resolver for the given backing root.
    pub fn new(root: &'a Path) -> Self {
        Self { root }
    }

    /// Resolve a virtual path to its backing path.
    pub fn resolve(&self, path: &Path) -> VfsResult<PathBuf> {
        let bytes = path.as_os_str().as_bytes();
        let rest = match bytes.split_first() {
            Some((b'/', rest)) => rest,
            _ => return Err(VfsError::invalid_path(path.display().to_string())),
        };

        // a second leading slash would make join() discard the root
        if rest.first() == Some(&b'/') {
            return Err(VfsError::invalid_path(path.display().to_string()));
        }

        if rest.is_empty() {
            return Ok(self.root.to_path_buf());
        }
        Ok(self.root.join(OsStr::from_bytes(rest)))
    }
}
