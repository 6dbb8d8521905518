//! Per-open-file state.
//!
//! A [`FileHandle`] tracks an apparent size (`max_size`) separately from the
//! physical size of its backing file. For Dummy files the backing file is
//! truncated at open, writes are dropped, and release writes one zero byte at
//! `max_size - 1` so the sparse file reports the right size while occupying
//! almost nothing on disk.
//!
//! Lifecycle is `open` → (`read` | `write` | `ftruncate` | `fgetattr`)* →
//! `release`. `release` consumes the handle, so a released handle cannot be
//! used again.

use std::fs::{self, File};
use std::io;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

use super::classify::Classification;
use super::error::{VfsError, VfsResult};
use super::types::{FileAttr, OpenFlags};

/// An open backing file plus its apparent size.
#[derive(Debug)]
pub struct FileHandle {
    file: File,
    path: PathBuf,
    class: Classification,
    writable: bool,
    max_size: u64,
}

impl FileHandle {
    /// Open `path` with the given classification.
    ///
    /// Writable Dummy opens force truncation. Their `max_size` starts at the
    /// size the file had before that truncation (zero if the caller asked
    /// for truncation itself), so release restores the apparent size.
    pub fn open(
        path: &Path,
        class: Classification,
        flags: OpenFlags,
        mode: Option<u32>,
    ) -> VfsResult<Self> {
        let writable = flags.is_writable();

        let (file, max_size) = if class.is_dummy() && writable {
            let prior = if flags.truncate {
                0
            } else {
                fs::metadata(path).map(|m| m.len()).unwrap_or(0)
            };
            let file = flags.with_truncate().to_options(mode).open(path)?;
            (file, prior)
        } else {
            let file = flags.to_options(mode).open(path)?;
            let size = file.metadata()?.len();
            (file, size)
        };

        tracing::debug!(
            path = %path.display(),
            ?class,
            writable,
            max_size,
            "opened handle"
        );

        Ok(Self {
            file,
            path: path.to_path_buf(),
            class,
            writable,
            max_size,
        })
    }

    /// Classification decided at open.
    pub fn classification(&self) -> Classification {
        self.class
    }

    /// Apparent size of the file.
    pub fn max_size(&self) -> u64 {
        self.max_size
    }


    /// Read up to `size` bytes at `offset`.
    ///
    /// Real handles read the backing file. Dummy handles return zeros up to
    /// `max_size`, which is what the sparse backing file holds after release.
    pub fn read(&self, offset: u64, size: u32) -> VfsResult<Vec<u8>> {
        if self.class.is_dummy() {
            let len = self.max_size.saturating_sub(offset).min(u64::from(size));
            return Ok(vec![0u8; len as usize]);
        }

        let mut buffer = vec![0u8; size as usize];
        let mut filled = 0;
        while filled < buffer.len() {
            match self.file.read_at(&mut buffer[filled..], offset + filled as u64) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        buffer.truncate(filled);
        Ok(buffer)
    }

    /// Write `data` at `offset`, returning the number of bytes accepted.
    ///
    /// `max_size` grows to cover the write whether or not the data lands on
    /// disk. Dummy handles accept everything and write nothing.
    pub fn write(&mut self, offset: u64, data: &[u8]) -> VfsResult<u32> {
        if !self.writable {
            return Err(io::Error::from_raw_os_error(libc::EBADF).into());
        }

        let end = offset.saturating_add(data.len() as u64);
        self.max_size = self.max_size.max(end);

        if self.class.is_dummy() {
            return Ok(data.len() as u32);
        }

        let written = self.file.write_at(data, offset)?;
        Ok(written as u32)
    }

    /// Set the apparent and physical size to `size`.
    pub fn ftruncate(&mut self, size: u64) -> VfsResult<()> {
        self.max_size = size;
        self.file.set_len(size)?;
        Ok(())
    }

    /// Physical attributes of the backing file.
    ///
    /// For a Dummy handle with pending writes, the size lags behind
    /// `max_size` until release.
    pub fn fgetattr(&self) -> VfsResult<FileAttr> {
        let meta = self.file.metadata()?;
        Ok(FileAttr::from_metadata(&meta))
    }

    /// Flush backing data to stable storage.
    pub fn fsync(&self, datasync: bool) -> VfsResult<()> {
        if datasync {
            self.file.sync_data()?;
        } else {
            self.file.sync_all()?;
        }
        Ok(())
    }

    /// Close the handle. Dummy files get their sentinel byte first.
    pub fn release(self) -> VfsResult<()> {
        if self.class.is_dummy() && self.writable && self.max_size > 0 {
            self.file
                .write_at(&[0u8], self.max_size - 1)
                .map_err(VfsError::from)?;
            tracing::debug!(
                path = %self.path.display(),
                size = self.max_size,
                "wrote sentinel byte"
            );
        }
        drop(self.file);
        Ok(())
    }
}
