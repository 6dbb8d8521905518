//! # fibfs
//!
//! Mount adapter for [`fibfs_vfs`]: command-line handling, the inode table,
//! and the [`fuser::Filesystem`] implementation that serves kernel requests
//! from a [`fibfs_vfs::BackingFs`].

pub mod cli;
pub mod error;
pub mod fuse;
pub mod inodes;

pub use cli::Args;
pub use error::StartupError;
pub use fuse::FibFuse;
pub use inodes::InodeTable;
