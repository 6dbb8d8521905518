//! Path-level operations against the backing directory.
//!
//! Everything except `open`/`create`/`truncate` is a straight passthrough to
//! the matching host primitive on the resolved path. Classification only
//! happens when a file handle is opened.

use std::fs;
use std::os::unix::fs::{DirBuilderExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::FsConfig;

use super::classify::Classification;
use super::dir::DirIter;
use super::error::VfsResult;
use super::handle::FileHandle;
use super::path::PathResolver;
use super::space::SpaceReporter;
use super::types::{FileAttr, OpenFlags, StatFs, Timestamp};

/// The backing filesystem as seen through virtual paths.
///
/// Holds a shared, read-only [`FsConfig`]. All paths passed in are virtual
/// (slash-rooted).
#[derive(Debug, Clone)]
pub struct BackingFs {
    config: Arc<FsConfig>,
}

impl BackingFs {
    /// Create a backing filesystem for the given configuration.
    pub fn new(config: Arc<FsConfig>) -> Self {
        Self { config }
    }

    /// The shared configuration.
    pub fn config(&self) -> &FsConfig {
        &self.config
    }

    /// Resolve a virtual path to its backing path.
    pub fn resolve(&self, path: &Path) -> VfsResult<PathBuf> {
        PathResolver::new(self.config.root()).resolve(path)
    }

    // ========================================================================
    // Handles
    // ========================================================================

    /// Open a file handle.
    pub fn open(&self, path: &Path, flags: OpenFlags) -> VfsResult<FileHandle> {
        let full_path = self.resolve(path)?;
        FileHandle::open(&full_path, Classification::of(path), flags, None)
    }

    /// Create (if needed) and open a file handle with permission bits `mode`.
    pub fn create(&self, path: &Path, flags: OpenFlags, mode: u32) -> VfsResult<FileHandle> {
        let full_path = self.resolve(path)?;
        let flags = OpenFlags {
            create: true,
            ..flags
        };
        FileHandle::open(&full_path, Classification::of(path), flags, Some(mode))
    }

    /// Truncate a file without an open handle.
    ///
    /// Opens for writing, truncates through the handle, then releases, so
    /// Dummy files end up with the requested apparent size.
    pub fn truncate(&self, path: &Path, size: u64) -> VfsResult<()> {
        let mut handle = self.open(path, OpenFlags::write_only())?;
        handle.ftruncate(size)?;
        handle.release()
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Attributes of `path`, not following a final symlink.
    pub fn getattr(&self, path: &Path) -> VfsResult<FileAttr> {
        let full_path = self.resolve(path)?;
        let meta = fs::symlink_metadata(&full_path)?;
        Ok(FileAttr::from_metadata(&meta))
    }

    /// List a directory.
    pub fn readdir(&self, path: &Path) -> VfsResult<DirIter> {
        let full_path = self.resolve(path)?;
        DirIter::open(&full_path)
    }

    /// Volume statistics with the freespace overlay applied.
    pub fn statfs(&self) -> VfsResult<StatFs> {
        SpaceReporter::new(self.config.root(), self.config.freespace()).statfs()
    }

    /// Target of a symbolic link.
    pub fn readlink(&self, path: &Path) -> VfsResult<PathBuf> {
        let full_path = self.resolve(path)?;
        Ok(fs::read_link(&full_path)?)
    }

    /// Check access with an `access(2)` mask (`R_OK | W_OK | X_OK` or `F_OK`).
    pub fn access(&self, path: &Path, mask: i32) -> VfsResult<()> {
        use rustix::fs::Access;

        let full_path = self.resolve(path)?;
        rustix::fs::access(full_path.as_path(), Access::from_bits_retain(mask as _))?;
        Ok(())
    }

    // ========================================================================
    // Metadata mutators
    // ========================================================================

    /// Create a directory.
    pub fn mkdir(&self, path: &Path, mode: u32) -> VfsResult<()> {
        let full_path = self.resolve(path)?;
        fs::DirBuilder::new().mode(mode).create(&full_path)?;
        Ok(())
    }

    /// Remove an empty directory.
    pub fn rmdir(&self, path: &Path) -> VfsResult<()> {
        let full_path = self.resolve(path)?;
        fs::remove_dir(&full_path)?;
        Ok(())
    }

    /// Create a hard link at `to` for the file at `from`.
    pub fn link(&self, from: &Path, to: &Path) -> VfsResult<()> {
        let from_path = self.resolve(from)?;
        let to_path = self.resolve(to)?;
        fs::hard_link(&from_path, &to_path)?;
        Ok(())
    }

    /// Create a symbolic link at `path` pointing to `target`.
    ///
    /// `target` is stored verbatim, it is not resolved.
    pub fn symlink(&self, target: &Path, path: &Path) -> VfsResult<()> {
        let full_path = self.resolve(path)?;
        std::os::unix::fs::symlink(target, &full_path)?;
        Ok(())
    }

    /// Remove a file.
    pub fn unlink(&self, path: &Path) -> VfsResult<()> {
        let full_path = self.resolve(path)?;
        fs::remove_file(&full_path)?;
        Ok(())
    }

    /// Rename a file or directory.
    pub fn rename(&self, from: &Path, to: &Path) -> VfsResult<()> {
        let from_path = self.resolve(from)?;
        let to_path = self.resolve(to)?;
        fs::rename(&from_path, &to_path)?;
        Ok(())
    }

    /// Change permission bits.
    pub fn chmod(&self, path: &Path, mode: u32) -> VfsResult<()> {
        let full_path = self.resolve(path)?;
        fs::set_permissions(&full_path, fs::Permissions::from_mode(mode))?;
        Ok(())
    }

    /// Change owner and/or group. `None` leaves that id unchanged.
    pub fn chown(&self, path: &Path, uid: Option<u32>, gid: Option<u32>) -> VfsResult<()> {
        let full_path = self.resolve(path)?;
        std::os::unix::fs::chown(&full_path, uid, gid)?;
        Ok(())
    }

    /// Set access and modification times. `None` keeps the current value.
    pub fn utime(
        &self,
        path: &Path,
        atime: Option<Timestamp>,
        mtime: Option<Timestamp>,
    ) -> VfsResult<()> {
        use rustix::fs::{AtFlags, Timestamps, CWD};

        let full_path = self.resolve(path)?;
        let (atime, mtime) = match (atime, mtime) {
            (Some(a), Some(m)) => (a.resolve(), m.resolve()),
            (a, m) => {
                let current = FileAttr::from_metadata(&fs::metadata(&full_path)?);
                (
                    a.map_or(current.atime, Timestamp::resolve),
                    m.map_or(current.mtime, Timestamp::resolve),
                )
            }
        };

        let times = Timestamps {
            last_access: to_timespec(atime),
            last_modification: to_timespec(mtime),
        };
        rustix::fs::utimensat(CWD, full_path.as_path(), &times, AtFlags::empty())?;
        Ok(())
    }
}

impl Timestamp {
    fn resolve(self) -> SystemTime {
        match self {
            Timestamp::Now => SystemTime::now(),
            Timestamp::At(t) => t,
        }
    }
}

fn to_timespec(t: SystemTime) -> rustix::fs::Timespec {
    let (secs, nanos) = match t.duration_since(UNIX_EPOCH) {
        Ok(d) => (d.as_secs() as i64, i64::from(d.subsec_nanos())),
        Err(e) => {
            let d = e.duration();
            let mut secs = -(d.as_secs() as i64);
            let mut nanos = i64::from(d.subsec_nanos());
            if nanos > 0 {
                secs -= 1;
                nanos = 1_000_000_000 - nanos;
            }
            (secs, nanos)
        }
    };
    rustix::fs::Timespec {
        tv_sec: secs as _,
        tv_nsec: nanos as _,
    }
}
