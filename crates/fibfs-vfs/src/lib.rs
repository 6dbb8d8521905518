//! # fibfs-vfs
//!
//! Core of fibfs, a filesystem that stores the shape of a device backup
//! without its data.
//!
//! Files named `Manifest*` or `*.plist` are stored as written. Every other
//! file keeps its size but not its content: writes are dropped and reads
//! return zeros. `statfs` reports extra free space on top of the backing
//! volume's.

pub mod config;
pub mod vfs;

pub use config::{BackingRoot, ConfigError, Freespace, FsConfig};
pub use vfs::{
    BackingFs, Classification, DirEntry, DirIter, FileAttr, FileHandle, FileType, OpenFlags,
    StatFs, Timestamp, VfsError, VfsResult,
};
