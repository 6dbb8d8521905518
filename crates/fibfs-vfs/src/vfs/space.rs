//! Inflated volume statistics.

use std::path::Path;

use crate::config::Freespace;

use super::error::VfsResult;
use super::types::StatFs;

/// Reports the backing volume's statistics plus the freespace overlay.
#[derive(Debug, Clone, Copy)]
pub struct SpaceReporter<'a> {
    root: &'a Path,
    freespace: Freespace,
}

impl<'a> SpaceReporter<'a> {
    /// Create a reporter for the volume holding `root`.
    pub fn new(root: &'a Path, freespace: Freespace) -> Self {
        Self { root, freespace }
    }

    /// Real statistics with the overlay added.
    pub fn statfs(&self) -> VfsResult<StatFs> {
        let real = real_statfs(self.root)?;
        Ok(inflate(real, self.freespace))
    }
}

/// Add `floor(freespace / bsize)` blocks to the free, available and total
/// counts. Everything else passes through.
pub fn inflate(real: StatFs, freespace: Freespace) -> StatFs {
    let extra = match real.bsize {
        0 => 0,
        bsize => freespace.bytes() / u64::from(bsize),
    };
    StatFs {
        blocks: real.blocks.saturating_add(extra),
        bfree: real.bfree.saturating_add(extra),
        bavail: real.bavail.saturating_add(extra),
        ..real
    }
}

fn real_statfs(root: &Path) -> VfsResult<StatFs> {
    use rustix::fs::statvfs;

    let stat = statvfs(root)?;

    Ok(StatFs {
        blocks: stat.f_blocks,
        bfree: stat.f_bfree,
        bavail: stat.f_bavail,
        files: stat.f_files,
        ffree: stat.f_ffree,
        favail: stat.f_favail,
        bsize: stat.f_bsize as u32,
        namelen: stat.f_namemax as u32,
        frsize: stat.f_frsize as u32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> StatFs {
        StatFs {
            blocks: 1000,
            bfree: 400,
            bavail: 300,
            files: 50,
            ffree: 20,
            favail: 20,
            bsize: 4096,
            namelen: 255,
            frsize: 4096,
        }
    }

    #[test]
    fn test_one_gib_at_4k() {
        let out = inflate(sample(), Freespace::from_gib(1).unwrap());
        assert_eq!(out.bfree, 400 + 262_144);
        assert_eq!(out.bavail, 300 + 262_144);
        assert_eq!(out.blocks, 1000 + 262_144);
        assert_eq!(out.files, 50);
        assert_eq!(out.ffree, 20);
        assert_eq!(out.bsize, 4096);
        assert_eq!(out.namelen, 255);
    }

    #[test]
    fn test_floor_division() {
        let out = inflate(sample(), Freespace::from_bytes(4096 * 3 + 4095));
        assert_eq!(out.bfree, 403);
    }

    #[test]
    fn test_zero_block_size() {
        let real = StatFs {
            bsize: 0,
            ..sample()
        };
        assert_eq!(inflate(real, Freespace::default()), real);
    }

    #[test]
    fn test_against_backing_volume() {
        let dir = TempDir::new().unwrap();
        let freespace = Freespace::from_gib(2).unwrap();

        let real = real_statfs(dir.path()).unwrap();
        let reported = SpaceReporter::new(dir.path(), freespace).statfs().unwrap();
        let extra = freespace.bytes() / u64::from(real.bsize);

        assert_eq!(reported.bsize, real.bsize);
        assert_eq!(reported.blocks, real.blocks + extra);
        // free counts move with other activity on the volume
        assert!(reported.bfree >= extra);
        assert!(reported.bavail >= extra);
    }
}
