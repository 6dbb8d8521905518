//! Kernel-facing adapter.
//!
//! [`FibFuse`] translates inode-addressed requests into path-addressed calls
//! on [`BackingFs`], keeps the table of open [`FileHandle`]s, and converts
//! every failure into an errno. Requests are served one at a time by the
//! session loop, which is what the core relies on for handle consistency.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use fibfs_vfs::{
    BackingFs, FileAttr, FileHandle, FileType, OpenFlags, Timestamp, VfsError, VfsResult,
};
use fuser::{
    Filesystem, KernelConfig, ReplyAttr, ReplyCreate, ReplyData, ReplyDirectory, ReplyEmpty,
    ReplyEntry, ReplyOpen, ReplyStatfs, ReplyWrite, Request, TimeOrNow,
};
use tracing::{debug, info, warn};

use crate::inodes::InodeTable;

/// How long the kernel may cache attributes and entries.
const TTL: Duration = Duration::from_secs(1);

/// Listed entries the kernel has not looked up yet have no number of their
/// own. Plain readdir replies do not take a lookup reference.
const UNKNOWN_INO: u64 = 0xffff_ffff;

pub struct FibFuse {
    fs: BackingFs,
    inodes: InodeTable,
    handles: HashMap<u64, FileHandle>,
    next_fh: u64,
}

impl FibFuse {
    pub fn new(fs: BackingFs) -> Self {
        Self {
            fs,
            inodes: InodeTable::new(),
            handles: HashMap::new(),
            next_fh: 1,
        }
    }

    /// Number of files currently open through the mount.
    pub fn open_handles(&self) -> usize {
        self.handles.len()
    }

    fn path(&self, ino: u64) -> VfsResult<PathBuf> {
        self.inodes
            .path(ino)
            .map(Path::to_path_buf)
            .ok_or_else(|| VfsError::not_found(format!("inode {ino}")))
    }

    fn child(&self, parent: u64, name: &OsStr) -> VfsResult<PathBuf> {
        self.inodes
            .child(parent, name)
            .ok_or_else(|| VfsError::not_found(format!("inode {parent}")))
    }

    fn handle(&self, fh: u64) -> VfsResult<&FileHandle> {
        self.handles.get(&fh).ok_or(VfsError::BadHandle(fh))
    }

    fn handle_mut(&mut self, fh: u64) -> VfsResult<&mut FileHandle> {
        self.handles.get_mut(&fh).ok_or(VfsError::BadHandle(fh))
    }

    fn insert_handle(&mut self, handle: FileHandle) -> u64 {
        let fh = self.next_fh;
        self.next_fh += 1;
        self.handles.insert(fh, handle);
        fh
    }

    /// Attributes of `path` under its mount inode number. Counts a kernel
    /// lookup, so the caller must reply with an entry.
    fn entry(&mut self, path: &Path) -> VfsResult<fuser::FileAttr> {
        let attr = self.fs.getattr(path)?;
        let ino = self.inodes.lookup(path);
        Ok(to_fuse_attr(ino, &attr))
    }

    #[allow(clippy::too_many_arguments)]
    fn do_setattr(
        &mut self,
        ino: u64,
        mode: Option<u32>,
        uid: Option<u32>,
        gid: Option<u32>,
        size: Option<u64>,
        atime: Option<TimeOrNow>,
        mtime: Option<TimeOrNow>,
        fh: Option<u64>,
    ) -> VfsResult<fuser::FileAttr> {
        let path = self.path(ino)?;

        if let Some(mode) = mode {
            self.fs.chmod(&path, mode)?;
        }
        if uid.is_some() || gid.is_some() {
            self.fs.chown(&path, uid, gid)?;
        }
        if let Some(size) = size {
            match fh {
                Some(fh) => self.handle_mut(fh)?.ftruncate(size)?,
                None => self.fs.truncate(&path, size)?,
            }
        }
        if atime.is_some() || mtime.is_some() {
            self.fs
                .utime(&path, atime.map(to_timestamp), mtime.map(to_timestamp))?;
        }

        let attr = self.fs.getattr(&path)?;
        Ok(to_fuse_attr(ino, &attr))
    }

    /// Re-lists the directory on every call and skips the first `skip`
    /// entries, so offsets stay valid as long as the directory is unchanged.
    /// Skipped entries are not stat'ed.
    fn do_readdir(&self, ino: u64, skip: usize, reply: &mut ReplyDirectory) -> VfsResult<()> {
        let path = self.path(ino)?;
        let parent = path.parent().unwrap_or(&path).to_path_buf();

        for (i, entry) in self.fs.readdir(&path)?.enumerate().skip(skip) {
            let entry = entry?;
            let entry_ino = match entry.name.as_str() {
                "." => ino,
                ".." => self.inodes.ino(&parent).unwrap_or(UNKNOWN_INO),
                name => self.inodes.ino(&path.join(name)).unwrap_or(UNKNOWN_INO),
            };
            // true means the reply buffer is full
            if reply.add(entry_ino, (i + 1) as i64, to_fuse_kind(entry.kind), &entry.name) {
                break;
            }
        }
        Ok(())
    }
}

impl Filesystem for FibFuse {
    fn init(&mut self, _req: &Request<'_>, _config: &mut KernelConfig) -> Result<(), libc::c_int> {
        info!(root = %self.fs.config().root().display(), "filesystem initialized");
        Ok(())
    }

    fn destroy(&mut self) {
        // Sentinels of handles the kernel never released still need writing.
        for (fh, handle) in self.handles.drain() {
            if let Err(e) = handle.release() {
                warn!(fh, error = %e, "release at teardown failed");
            }
        }
        info!(inodes = self.inodes.len(), "filesystem destroyed");
    }

    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        debug!(parent, ?name, "lookup");
        let result = self.child(parent, name).and_then(|path| self.entry(&path));
        match result {
            Ok(attr) => reply.entry(&TTL, &attr, 0),
            Err(e) => reply.error(fail("lookup", &e)),
        }
    }

    fn forget(&mut self, _req: &Request<'_>, ino: u64, nlookup: u64) {
        debug!(ino, nlookup, "forget");
        self.inodes.forget(ino, nlookup);
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyAttr) {
        debug!(ino, "getattr");
        let result = self.path(ino).and_then(|path| self.fs.getattr(&path));
        match result {
            Ok(attr) => reply.attr(&TTL, &to_fuse_attr(ino, &attr)),
            Err(e) => reply.error(fail("getattr", &e)),
        }
    }

    fn setattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        mode: Option<u32>,
        uid: Option<u32>,
        gid: Option<u32>,
        size: Option<u64>,
        atime: Option<TimeOrNow>,
        mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        debug!(ino, ?mode, ?uid, ?gid, ?size, ?fh, "setattr");
        match self.do_setattr(ino, mode, uid, gid, size, atime, mtime, fh) {
            Ok(attr) => reply.attr(&TTL, &attr),
            Err(e) => reply.error(fail("setattr", &e)),
        }
    }

    fn readlink(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyData) {
        debug!(ino, "readlink");
        let result = self.path(ino).and_then(|path| self.fs.readlink(&path));
        match result {
            Ok(target) => reply.data(target.as_os_str().as_bytes()),
            Err(e) => reply.error(fail("readlink", &e)),
        }
    }

    fn mkdir(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        debug!(parent, ?name, mode = format_args!("{mode:o}"), "mkdir");
        let result = self.child(parent, name).and_then(|path| {
            self.fs.mkdir(&path, mode)?;
            self.entry(&path)
        });
        match result {
            Ok(attr) => reply.entry(&TTL, &attr, 0),
            Err(e) => reply.error(fail("mkdir", &e)),
        }
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        debug!(parent, ?name, "unlink");
        let result = self
            .child(parent, name)
            .and_then(|path| self.fs.unlink(&path));
        match result {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(fail("unlink", &e)),
        }
    }

    fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        debug!(parent, ?name, "rmdir");
        let result = self
            .child(parent, name)
            .and_then(|path| self.fs.rmdir(&path));
        match result {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(fail("rmdir", &e)),
        }
    }

    fn symlink(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        link_name: &OsStr,
        target: &Path,
        reply: ReplyEntry,
    ) {
        debug!(parent, ?link_name, ?target, "symlink");
        let result = self.child(parent, link_name).and_then(|path| {
            self.fs.symlink(target, &path)?;
            self.entry(&path)
        });
        match result {
            Ok(attr) => reply.entry(&TTL, &attr, 0),
            Err(e) => reply.error(fail("symlink", &e)),
        }
    }

    fn rename(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
        flags: u32,
        reply: ReplyEmpty,
    ) {
        debug!(parent, ?name, newparent, ?newname, flags, "rename");
        if flags != 0 {
            // RENAME_NOREPLACE / RENAME_EXCHANGE are not supported
            reply.error(libc::EINVAL);
            return;
        }
        let result = self.child(parent, name).and_then(|from| {
            let to = self.child(newparent, newname)?;
            self.fs.rename(&from, &to)?;
            self.inodes.rename(&from, &to);
            Ok(())
        });
        match result {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(fail("rename", &e)),
        }
    }

    fn link(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        newparent: u64,
        newname: &OsStr,
        reply: ReplyEntry,
    ) {
        debug!(ino, newparent, ?newname, "link");
        let result = self.path(ino).and_then(|from| {
            let to = self.child(newparent, newname)?;
            self.fs.link(&from, &to)?;
            self.entry(&to)
        });
        match result {
            Ok(attr) => reply.entry(&TTL, &attr, 0),
            Err(e) => reply.error(fail("link", &e)),
        }
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        debug!(ino, flags = format_args!("{flags:#x}"), "open");
        let result = self
            .path(ino)
            .and_then(|path| self.fs.open(&path, OpenFlags::from_raw(flags)));
        match result {
            Ok(handle) => {
                let fh = self.insert_handle(handle);
                reply.opened(fh, 0);
            }
            Err(e) => reply.error(fail("open", &e)),
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        debug!(fh, offset, size, "read");
        let Ok(offset) = u64::try_from(offset) else {
            reply.error(libc::EINVAL);
            return;
        };
        match self.handle(fh).and_then(|handle| handle.read(offset, size)) {
            Ok(data) => reply.data(&data),
            Err(e) => reply.error(fail("read", &e)),
        }
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        debug!(fh, offset, len = data.len(), "write");
        let Ok(offset) = u64::try_from(offset) else {
            reply.error(libc::EINVAL);
            return;
        };
        let result = self
            .handle_mut(fh)
            .and_then(|handle| handle.write(offset, data));
        match result {
            Ok(written) => reply.written(written),
            Err(e) => reply.error(fail("write", &e)),
        }
    }

    fn flush(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        _lock_owner: u64,
        reply: ReplyEmpty,
    ) {
        debug!(fh, "flush");
        reply.ok();
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        debug!(fh, "release");
        let result = self
            .handles
            .remove(&fh)
            .ok_or(VfsError::BadHandle(fh))
            .and_then(FileHandle::release);
        match result {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(fail("release", &e)),
        }
    }

    fn fsync(&mut self, _req: &Request<'_>, _ino: u64, fh: u64, datasync: bool, reply: ReplyEmpty) {
        debug!(fh, datasync, "fsync");
        match self.handle(fh).and_then(|handle| handle.fsync(datasync)) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(fail("fsync", &e)),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        debug!(ino, offset, "readdir");
        let Ok(skip) = usize::try_from(offset) else {
            reply.error(libc::EINVAL);
            return;
        };
        match self.do_readdir(ino, skip, &mut reply) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(fail("readdir", &e)),
        }
    }

    fn statfs(&mut self, _req: &Request<'_>, _ino: u64, reply: ReplyStatfs) {
        debug!("statfs");
        match self.fs.statfs() {
            Ok(st) => reply.statfs(
                st.blocks, st.bfree, st.bavail, st.files, st.ffree, st.bsize, st.namelen,
                st.frsize,
            ),
            Err(e) => reply.error(fail("statfs", &e)),
        }
    }

    fn access(&mut self, _req: &Request<'_>, ino: u64, mask: i32, reply: ReplyEmpty) {
        debug!(ino, mask, "access");
        let result = self.path(ino).and_then(|path| self.fs.access(&path, mask));
        match result {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(fail("access", &e)),
        }
    }

    fn create(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        flags: i32,
        reply: ReplyCreate,
    ) {
        debug!(
            parent,
            ?name,
            mode = format_args!("{mode:o}"),
            flags = format_args!("{flags:#x}"),
            "create"
        );
        let result = self.child(parent, name).and_then(|path| {
            let handle = self.fs.create(&path, OpenFlags::from_raw(flags), mode)?;
            let attr = handle.fgetattr()?;
            let ino = self.inodes.lookup(&path);
            Ok((to_fuse_attr(ino, &attr), handle))
        });
        match result {
            Ok((attr, handle)) => {
                let fh = self.insert_handle(handle);
                reply.created(&TTL, &attr, 0, fh, 0);
            }
            Err(e) => reply.error(fail("create", &e)),
        }
    }
}

/// Log a failed request and pick its errno.
fn fail(op: &'static str, err: &VfsError) -> libc::c_int {
    debug!(op, error = %err, "request failed");
    err.errno()
}

fn to_timestamp(time: TimeOrNow) -> Timestamp {
    match time {
        TimeOrNow::Now => Timestamp::Now,
        TimeOrNow::SpecificTime(t) => Timestamp::At(t),
    }
}

fn to_fuse_kind(kind: FileType) -> fuser::FileType {
    match kind {
        FileType::File => fuser::FileType::RegularFile,
        FileType::Directory => fuser::FileType::Directory,
        FileType::Symlink => fuser::FileType::Symlink,
        FileType::BlockDevice => fuser::FileType::BlockDevice,
        FileType::CharDevice => fuser::FileType::CharDevice,
        FileType::NamedPipe => fuser::FileType::NamedPipe,
        FileType::Socket => fuser::FileType::Socket,
    }
}

/// Backing attributes under the mount's inode number.
fn to_fuse_attr(ino: u64, attr: &FileAttr) -> fuser::FileAttr {
    fuser::FileAttr {
        ino,
        size: attr.size,
        blocks: attr.blocks,
        atime: attr.atime,
        mtime: attr.mtime,
        ctime: attr.ctime,
        crtime: attr.ctime,
        kind: to_fuse_kind(attr.kind),
        perm: attr.perm,
        nlink: attr.nlink,
        uid: attr.uid,
        gid: attr.gid,
        rdev: attr.rdev,
        blksize: attr.blksize,
        flags: 0,
    }
}
