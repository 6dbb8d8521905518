//! Startup errors.

use std::io;

use fibfs_vfs::ConfigError;
use thiserror::Error;

/// Anything that stops fibfs from mounting.
#[derive(Debug, Error)]
pub enum StartupError {
    /// Invalid arguments or backing directory.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Mount or unmount failed.
    #[error("mount failed: {0}")]
    Io(#[from] io::Error),
}
