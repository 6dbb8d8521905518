//! Directory listing.

use std::fs;
use std::path::Path;

use super::error::VfsResult;
use super::types::DirEntry;

/// Lazy listing of one backing directory.
///
/// Yields `.` and `..`, then the backing entries in whatever order the
/// backing filesystem returns them. Entries that are directories (following
/// symlinks) are tagged as directories. Everything else is tagged as a
/// regular file, including symlinks to files, devices and fifos.
///
/// Entry kinds come from the directory stream itself; only symlinks cost an
/// extra stat. `nth` (and so `skip`) passes over entries without tagging them.
#[derive(Debug)]
pub struct DirIter {
    dots: u8,
    inner: fs::ReadDir,
}

impl DirIter {
    /// Start listing `dir`.
    ///
    /// Fails up front if the directory cannot be opened.
    pub fn open(dir: &Path) -> VfsResult<Self> {
        let inner = fs::read_dir(dir)?;
        Ok(Self { dots: 0, inner })
    }
}

fn tag(entry: &fs::DirEntry) -> DirEntry {
    let is_dir = match entry.file_type() {
        Ok(ft) if !ft.is_symlink() => ft.is_dir(),
        _ => fs::metadata(entry.path()).map(|m| m.is_dir()).unwrap_or(false),
    };
    let name = entry.file_name().to_string_lossy().into_owned();
    if is_dir {
        DirEntry::directory(name)
    } else {
        DirEntry::file(name)
    }
}

impl Iterator for DirIter {
    type Item = VfsResult<DirEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.dots {
            0 => {
                self.dots = 1;
                return Some(Ok(DirEntry::directory(".")));
            }
            1 => {
                self.dots = 2;
                return Some(Ok(DirEntry::directory("..")));
            }
            _ => {}
        }

        Some(match self.inner.next()? {
            Ok(entry) => Ok(tag(&entry)),
            Err(e) => Err(e.into()),
        })
    }

    fn nth(&mut self, mut n: usize) -> Option<Self::Item> {
        while n > 0 && self.dots < 2 {
            self.dots += 1;
            n -= 1;
        }
        while n > 0 {
            self.inner.next()?;
            n -= 1;
        }
        self.next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::types::FileType;
    use std::collections::HashSet;
    use tempfile::TempDir;

    #[test]
    fn test_dots_first() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a"), b"").unwrap();

        let entries: Vec<_> = DirIter::open(dir.path())
            .unwrap()
            .collect::<VfsResult<_>>()
            .unwrap();
        assert_eq!(entries[0], DirEntry::directory("."));
        assert_eq!(entries[1], DirEntry::directory(".."));
        assert_eq!(entries.len(), 3);
    }

    #[test]
    fn test_complete_without_duplicates() {
        let dir = TempDir::new().unwrap();
        let mut expected = HashSet::new();
        for i in 0..40 {
            let name = format!("{i:02x}");
            fs::create_dir(dir.path().join(&name)).unwrap();
            expected.insert(name);
        }
        fs::write(dir.path().join("Manifest.db"), b"").unwrap();
        expected.insert("Manifest.db".to_string());

        let names: Vec<String> = DirIter::open(dir.path())
            .unwrap()
            .skip(2)
            .map(|e| e.unwrap().name)
            .collect();
        let unique: HashSet<String> = names.iter().cloned().collect();
        assert_eq!(names.len(), unique.len());
        assert_eq!(unique, expected);
    }

    #[test]
    fn test_kinds() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("file"), b"x").unwrap();
        std::os::unix::fs::symlink("file", dir.path().join("link")).unwrap();
        std::os::unix::fs::symlink("sub", dir.path().join("dirlink")).unwrap();

        for entry in DirIter::open(dir.path()).unwrap().skip(2) {
            let entry = entry.unwrap();
            let expected = match entry.name.as_str() {
                "sub" | "dirlink" => FileType::Directory,
                _ => FileType::File,
            };
            assert_eq!(entry.kind, expected, "{}", entry.name);
        }
    }

    #[test]
    fn test_skip_matches_full_listing() {
        let dir = TempDir::new().unwrap();
        for i in 0..10 {
            fs::write(dir.path().join(format!("f{i}")), b"").unwrap();
        }
        fs::create_dir(dir.path().join("sub")).unwrap();

        let full: Vec<DirEntry> = DirIter::open(dir.path())
            .unwrap()
            .collect::<VfsResult<_>>()
            .unwrap();
        for skip in [0, 1, 2, 5, full.len() - 1, full.len(), full.len() + 3] {
            let tail: Vec<DirEntry> = DirIter::open(dir.path())
                .unwrap()
                .skip(skip)
                .collect::<VfsResult<_>>()
                .unwrap();
            assert_eq!(tail, full[skip.min(full.len())..], "skip {skip}");
        }

        let mut iter = DirIter::open(dir.path()).unwrap().enumerate();
        let (i, entry) = iter.nth(3).unwrap();
        assert_eq!(i, 3);
        assert_eq!(entry.unwrap(), full[3]);
    }

    #[test]
    fn test_missing_dir() {
        let dir = TempDir::new().unwrap();
        let err = DirIter::open(&dir.path().join("missing")).unwrap_err();
        assert_eq!(err.errno(), libc::ENOENT);
    }
}
