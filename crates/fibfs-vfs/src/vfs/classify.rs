//! Real vs. dummy classification.
//!
//! Backup metadata (`Manifest*`, `*.plist`) keeps its content. Every other
//! file only keeps its size.

use std::path::Path;

/// Basename prefix of files that keep real content.
pub const REAL_PREFIX: &str = "Manifest";

/// Basename suffix of files that keep real content.
pub const REAL_SUFFIX: &str = ".plist";

/// Whether a file keeps its written content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    /// Content is stored as written.
    Real,
    /// Content is discarded, apparent size is preserved.
    Dummy,
}

impl Classification {
    /// Classify a path by its final segment.
    ///
    /// A path without a final segment (e.g. `/`) is Dummy.
    pub fn of(path: &Path) -> Self {
        match path.file_name() {
            Some(name) => Self::of_name(&name.to_string_lossy()),
            None => Classification::Dummy,
        }
    }

    /// Classify a basename.
    pub fn of_name(name: &str) -> Self {
        if name.starts_with(REAL_PREFIX) || name.ends_with(REAL_SUFFIX) {
            Classification::Real
        } else {
            Classification::Dummy
        }
    }

    /// Returns true for Dummy.
    pub fn is_dummy(&self) -> bool {
        matches!(self, Classification::Dummy)
    }
}
