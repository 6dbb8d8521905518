//! Fake-content filesystem core.
//!
//! Key components:
//!
//! - [`BackingFs`] - Path-level operations against the backing directory
//! - [`FileHandle`] - Per-open-file state with an apparent size
//! - [`Classification`] - Which files keep their content
//! - [`DirIter`] - Lazy directory listing
//! - [`SpaceReporter`] - Volume statistics with the freespace overlay
//!
//! ## Design Decisions
//!
//! - **Path-based, no inodes**: Operations take slash-rooted virtual paths.
//!   The host-interface adapter handles inode ↔ path mapping.
//! - **Classification at open only**: metadata operations never look at it.
//! - **Single-worker dispatch**: nothing here locks. Handles on the same
//!   backing path must not be driven concurrently; the truncate-on-open and
//!   sentinel-on-release steps would race.

mod backing;
mod classify;
mod dir;
mod error;
mod handle;
mod path;
mod space;
mod types;

pub use backing::BackingFs;
pub use classify::{Classification, REAL_PREFIX, REAL_SUFFIX};
pub use dir::DirIter;
pub use error::{VfsError, VfsResult};
pub use handle::FileHandle;
pub use path::PathResolver;
pub use space::{inflate, SpaceReporter};
pub use types::{DirEntry, FileAttr, FileType, OpenFlags, StatFs, Timestamp};
