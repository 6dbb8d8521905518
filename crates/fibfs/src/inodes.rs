//! Inode number ↔ virtual path mapping.
//!
//! The filesystem core addresses everything by slash-rooted path; the kernel
//! addresses everything by inode number. A number is handed out on the first
//! lookup of a path and counts every lookup reply the kernel receives. When
//! the kernel forgets all of them the entry is dropped. Numbers are never
//! reused, so a stale number resolves to nothing and answers `ENOENT`.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use fuser::FUSE_ROOT_ID;

#[derive(Debug)]
struct Node {
    path: PathBuf,
    lookups: u64,
}

#[derive(Debug)]
pub struct InodeTable {
    nodes: HashMap<u64, Node>,
    inos: HashMap<PathBuf, u64>,
    next: u64,
}

impl Default for InodeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl InodeTable {
    pub fn new() -> Self {
        let root = PathBuf::from("/");
        let mut nodes = HashMap::new();
        let mut inos = HashMap::new();
        inos.insert(root.clone(), FUSE_ROOT_ID);
        nodes.insert(
            FUSE_ROOT_ID,
            Node {
                path: root,
                lookups: 0,
            },
        );
        Self {
            nodes,
            inos,
            next: FUSE_ROOT_ID + 1,
        }
    }

    /// Virtual path of `ino`, if the kernel still holds it.
    pub fn path(&self, ino: u64) -> Option<&Path> {
        self.nodes.get(&ino).map(|node| node.path.as_path())
    }

    /// Inode number already assigned to `path`, without counting a lookup.
    pub fn ino(&self, path: &Path) -> Option<u64> {
        self.inos.get(path).copied()
    }

    /// Virtual path of `name` inside directory `parent`.
    pub fn child(&self, parent: u64, name: &OsStr) -> Option<PathBuf> {
        self.path(parent).map(|dir| dir.join(name))
    }

    /// Inode number for `path`, allocating one on first sight. Counts one
    /// kernel lookup, so call it only right before replying with an entry.
    pub fn lookup(&mut self, path: &Path) -> u64 {
        let ino = match self.inos.get(path) {
            Some(&ino) => ino,
            None => {
                let ino = self.next;
                self.next += 1;
                self.inos.insert(path.to_path_buf(), ino);
                self.nodes.insert(
                    ino,
                    Node {
                        path: path.to_path_buf(),
                        lookups: 0,
                    },
                );
                ino
            }
        };
        if let Some(node) = self.nodes.get_mut(&ino) {
            node.lookups += 1;
        }
        ino
    }

    /// The kernel dropped `nlookup` references to `ino`. The root is pinned.
    pub fn forget(&mut self, ino: u64, nlookup: u64) {
        if ino == FUSE_ROOT_ID {
            return;
        }
        let Some(node) = self.nodes.get_mut(&ino) else {
            return;
        };
        node.lookups = node.lookups.saturating_sub(nlookup);
        if node.lookups > 0 {
            return;
        }
        if let Some(node) = self.nodes.remove(&ino) {
            if self.inos.get(&node.path) == Some(&ino) {
                self.inos.remove(&node.path);
            }
        }
    }

    /// Follow a rename: `from` and everything below it move under `to`.
    ///
    /// Whatever `to` pointed at before is forgotten, since the rename
    /// replaced it.
    pub fn rename(&mut self, from: &Path, to: &Path) {
        let replaced: Vec<PathBuf> = self
            .inos
            .keys()
            .filter(|p| p.starts_with(to))
            .cloned()
            .collect();
        for path in replaced {
            if let Some(ino) = self.inos.remove(&path) {
                self.nodes.remove(&ino);
            }
        }

        let moved: Vec<(PathBuf, u64)> = self
            .inos
            .iter()
            .filter(|(p, _)| p.starts_with(from))
            .map(|(p, &ino)| (p.clone(), ino))
            .collect();
        for (old, ino) in moved {
            let Ok(rest) = old.strip_prefix(from) else {
                continue;
            };
            let new = if rest.as_os_str().is_empty() {
                to.to_path_buf()
            } else {
                to.join(rest)
            };
            self.inos.remove(&old);
            self.inos.insert(new.clone(), ino);
            if let Some(node) = self.nodes.get_mut(&ino) {
                node.path = new;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_is_preassigned() {
        let table = InodeTable::new();
        assert_eq!(table.path(FUSE_ROOT_ID), Some(Path::new("/")));
        assert_eq!(table.ino(Path::new("/")), Some(FUSE_ROOT_ID));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_stable_numbers() {
        let mut table = InodeTable::new();
        let a = table.lookup(Path::new("/a"));
        let b = table.lookup(Path::new("/a/b"));
        assert_ne!(a, b);
        assert_ne!(a, FUSE_ROOT_ID);
        assert_eq!(table.lookup(Path::new("/a")), a);
        assert_eq!(table.path(b), Some(Path::new("/a/b")));
        assert_eq!(table.ino(Path::new("/a/b")), Some(b));
        assert_eq!(table.ino(Path::new("/missing")), None);
    }

    #[test]
    fn test_child_of_unknown_parent() {
        let table = InodeTable::new();
        assert!(table.child(42, OsStr::new("x")).is_none());
        assert_eq!(
            table.child(FUSE_ROOT_ID, OsStr::new("Manifest.db")),
            Some(PathBuf::from("/Manifest.db"))
        );
    }

    #[test]
    fn test_forget_drops_after_last_lookup() {
        let mut table = InodeTable::new();
        let ino = table.lookup(Path::new("/f"));
        table.lookup(Path::new("/f"));
        table.lookup(Path::new("/f"));

        table.forget(ino, 2);
        assert_eq!(table.path(ino), Some(Path::new("/f")));

        table.forget(ino, 1);
        assert!(table.path(ino).is_none());
        assert!(table.ino(Path::new("/f")).is_none());
        assert_eq!(table.len(), 1);

        // a fresh lookup gets a fresh number
        assert_ne!(table.lookup(Path::new("/f")), ino);
    }

    #[test]
    fn test_forget_root_and_unknown_are_ignored() {
        let mut table = InodeTable::new();
        table.forget(FUSE_ROOT_ID, 10);
        table.forget(999, 1);
        assert_eq!(table.path(FUSE_ROOT_ID), Some(Path::new("/")));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_rename_moves_subtree() {
        let mut table = InodeTable::new();
        let dir = table.lookup(Path::new("/a"));
        let file = table.lookup(Path::new("/a/f"));
        let sibling = table.lookup(Path::new("/ab"));

        table.rename(Path::new("/a"), Path::new("/z"));

        assert_eq!(table.path(dir), Some(Path::new("/z")));
        assert_eq!(table.path(file), Some(Path::new("/z/f")));
        assert_eq!(table.path(sibling), Some(Path::new("/ab")));
        assert_eq!(table.ino(Path::new("/z/f")), Some(file));

        // lookup counts travel with the entry
        table.forget(file, 1);
        assert!(table.path(file).is_none());
    }

    #[test]
    fn test_rename_over_existing() {
        let mut table = InodeTable::new();
        let src = table.lookup(Path::new("/src"));
        let dst = table.lookup(Path::new("/dst"));

        table.rename(Path::new("/src"), Path::new("/dst"));

        assert_eq!(table.path(src), Some(Path::new("/dst")));
        assert!(table.path(dst).is_none());
        assert_eq!(table.len(), 2);
    }
}
