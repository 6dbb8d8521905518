//! Core VFS types.
//!
//! These mirror what the host filesystem interface needs to answer a request,
//! without tying the core to any particular binding.

use std::fs::{Metadata, OpenOptions};
use std::os::unix::fs::{FileTypeExt, MetadataExt, OpenOptionsExt};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// File type enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// Regular file.
    File,
    /// Directory.
    Directory,
    /// Symbolic link.
    Symlink,
    /// Block device.
    BlockDevice,
    /// Character device.
    CharDevice,
    /// Named pipe.
    NamedPipe,
    /// Unix socket.
    Socket,
}

impl FileType {
    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        matches!(self, FileType::File)
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, FileType::Directory)
    }

    /// Returns true if this is a symbolic link.
    pub fn is_symlink(&self) -> bool {
        matches!(self, FileType::Symlink)
    }

    fn from_std(ft: std::fs::FileType) -> Self {
        if ft.is_dir() {
            FileType::Directory
        } else if ft.is_symlink() {
            FileType::Symlink
        } else if ft.is_block_device() {
            FileType::BlockDevice
        } else if ft.is_char_device() {
            FileType::CharDevice
        } else if ft.is_fifo() {
            FileType::NamedPipe
        } else if ft.is_socket() {
            FileType::Socket
        } else {
            FileType::File
        }
    }
}

/// File attributes, taken verbatim from a backing `lstat`/`fstat`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAttr {
    /// Backing inode number.
    pub ino: u64,
    /// Size in bytes.
    pub size: u64,
    /// Allocated 512-byte blocks.
    pub blocks: u64,
    /// Last access time.
    pub atime: SystemTime,
    /// Last modification time.
    pub mtime: SystemTime,
    /// Last status change time.
    pub ctime: SystemTime,
    /// File type.
    pub kind: FileType,
    /// Permission bits, including setuid/setgid/sticky.
    pub perm: u16,
    /// Number of hard links.
    pub nlink: u32,
    /// Owner user ID.
    pub uid: u32,
    /// Owner group ID.
    pub gid: u32,
    /// Device ID for special files.
    pub rdev: u32,
    /// Preferred I/O block size.
    pub blksize: u32,
}

impl FileAttr {
    /// Convert backing metadata to FileAttr.
    pub fn from_metadata(meta: &Metadata) -> Self {
        Self {
            ino: meta.ino(),
            size: meta.size(),
            blocks: meta.blocks(),
            atime: unix_time(meta.atime(), meta.atime_nsec()),
            mtime: unix_time(meta.mtime(), meta.mtime_nsec()),
            ctime: unix_time(meta.ctime(), meta.ctime_nsec()),
            kind: FileType::from_std(meta.file_type()),
            perm: (meta.mode() & 0o7777) as u16,
            nlink: meta.nlink() as u32,
            uid: meta.uid(),
            gid: meta.gid(),
            rdev: meta.rdev() as u32,
            blksize: meta.blksize() as u32,
        }
    }

    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }

    /// Returns true if this is a symbolic link.
    pub fn is_symlink(&self) -> bool {
        self.kind.is_symlink()
    }
}

fn unix_time(secs: i64, nsecs: i64) -> SystemTime {
    let nanos = Duration::from_nanos(nsecs.clamp(0, 999_999_999) as u64);
    if secs >= 0 {
        UNIX_EPOCH + Duration::from_secs(secs as u64) + nanos
    } else {
        UNIX_EPOCH - Duration::from_secs(secs.unsigned_abs()) + nanos
    }
}

/// Directory entry.
///
/// Only two kinds are ever reported by a listing: directories, and
/// everything else as a regular file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Entry name (not full path).
    pub name: String,
    /// Entry type.
    pub kind: FileType,
}

impl DirEntry {
    /// Create a new directory entry.
    pub fn new(name: impl Into<String>, kind: FileType) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// Create a file entry.
    pub fn file(name: impl Into<String>) -> Self {
        Self::new(name, FileType::File)
    }

    /// Create a directory entry.
    pub fn directory(name: impl Into<String>) -> Self {
        Self::new(name, FileType::Directory)
    }

}

/// Filesystem statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatFs {
    /// Total blocks.
    pub blocks: u64,
    /// Free blocks.
    pub bfree: u64,
    /// Available blocks (to non-root).
    pub bavail: u64,
    /// Total inodes.
    pub files: u64,
    /// Free inodes.
    pub ffree: u64,
    /// Available inodes (to non-root).
    pub favail: u64,
    /// Block size.
    pub bsize: u32,
    /// Maximum name length.
    pub namelen: u32,
    /// Fragment size.
    pub frsize: u32,
}

/// A timestamp to apply in `utime`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timestamp {
    /// The current time of the backing filesystem.
    Now,
    /// A specific point in time.
    At(SystemTime),
}

/// Open file flags, decoded from the raw `open(2)` flag word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenFlags {
    /// Read access requested.
    pub read: bool,
    /// Write access requested.
    pub write: bool,
    /// Append mode.
    pub append: bool,
    /// Create if not exists.
    pub create: bool,
    /// Truncate on open.
    pub truncate: bool,
    /// Exclusive create (fail if exists).
    pub exclusive: bool,
    /// Remaining flag bits, passed through untouched.
    pub custom: i32,
}

impl Default for OpenFlags {
    fn default() -> Self {
        Self {
            read: true,
            write: false,
            append: false,
            create: false,
            truncate: false,
            exclusive: false,
            custom: 0,
        }
    }
}

impl OpenFlags {
    /// Read-only access.
    pub fn read() -> Self {
        Self::default()
    }

    /// Write-only access.
    pub fn write_only() -> Self {
        Self {
            read: false,
            write: true,
            ..Default::default()
        }
    }

    /// Read/write access.
    pub fn read_write() -> Self {
        Self {
            read: true,
            write: true,
            ..Default::default()
        }
    }

    /// Create and truncate with read/write access.
    pub fn create_truncate() -> Self {
        Self {
            create: true,
            truncate: true,
            ..Self::read_write()
        }
    }

    /// Decode a raw `open(2)` flag word.
    pub fn from_raw(flags: i32) -> Self {
        let (read, write) = match flags & libc::O_ACCMODE {
            libc::O_WRONLY => (false, true),
            libc::O_RDWR => (true, true),
            _ => (true, false),
        };
        let known = libc::O_ACCMODE
            | libc::O_APPEND
            | libc::O_CREAT
            | libc::O_TRUNC
            | libc::O_EXCL;
        Self {
            read,
            write,
            append: flags & libc::O_APPEND != 0,
            create: flags & libc::O_CREAT != 0,
            truncate: flags & libc::O_TRUNC != 0,
            exclusive: flags & libc::O_EXCL != 0,
            custom: flags & !known,
        }
    }

    /// Returns these flags with truncation forced on.
    pub fn with_truncate(self) -> Self {
        Self {
            truncate: true,
            ..self
        }
    }

    /// Whether the resulting descriptor accepts writes.
    pub fn is_writable(&self) -> bool {
        self.write
    }

    /// Build `OpenOptions` for the backing `open`.
    ///
    /// `mode` only matters when the file gets created.
    pub fn to_options(&self, mode: Option<u32>) -> OpenOptions {
        let mut options = OpenOptions::new();
        options.read(self.read).write(self.write);

        // std rejects append with truncate, and create or truncate without
        // write access. open(2) takes all of them, so those bits go raw.
        let mut custom = self.custom;
        if self.append {
            custom |= libc::O_APPEND;
        }
        if self.write {
            options.truncate(self.truncate);
            if self.create && self.exclusive {
                options.create_new(true);
            } else {
                options.create(self.create);
            }
        } else {
            if self.truncate {
                custom |= libc::O_TRUNC;
            }
            if self.create {
                custom |= libc::O_CREAT;
                if self.exclusive {
                    custom |= libc::O_EXCL;
                }
            }
        }

        if let Some(mode) = mode {
            options.mode(mode);
        }
        options.custom_flags(custom);
        options
    }
}
