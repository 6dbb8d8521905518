//! End-to-end scenarios through the public `BackingFs` API.
//!
//! These drive the same calls the mount adapter makes, in the same order,
//! without needing a kernel mount.

use std::path::Path;
use std::sync::Arc;

use fibfs_vfs::vfs::inflate;
use fibfs_vfs::{BackingFs, Classification, Freespace, FsConfig, OpenFlags, StatFs};
use tempfile::TempDir;

// ============================================================================
// Shared test setup
// ============================================================================

fn setup() -> (BackingFs, TempDir) {
    let dir = TempDir::new().unwrap();
    let config = FsConfig::new(dir.path(), Freespace::default());
    let fs = BackingFs::new(Arc::new(config));
    fs.mkdir(Path::new("/a"), 0o755).unwrap();
    (fs, dir)
}

fn write_and_release(fs: &BackingFs, path: &str, data: &[u8]) {
    let mut handle = fs
        .create(Path::new(path), OpenFlags::create_truncate(), 0o644)
        .unwrap();
    assert_eq!(handle.write(0, data).unwrap(), data.len() as u32);
    handle.release().unwrap();
}

fn reopen_and_read(fs: &BackingFs, path: &str, size: u32) -> Vec<u8> {
    let handle = fs.open(Path::new(path), OpenFlags::read()).unwrap();
    let data = handle.read(0, size).unwrap();
    handle.release().unwrap();
    data
}

// ============================================================================
// Concrete scenarios
// ============================================================================

#[test]
fn real_file_round_trips() {
    let (fs, _dir) = setup();

    write_and_release(&fs, "/a/Manifest.mbdb", b"abcdefghij");
    assert_eq!(reopen_and_read(&fs, "/a/Manifest.mbdb", 10), b"abcdefghij");
}

#[test]
fn dummy_file_reads_zeros() {
    let (fs, _dir) = setup();

    write_and_release(&fs, "/a/video.mov", b"abcdefghij");
    assert_eq!(reopen_and_read(&fs, "/a/video.mov", 10), vec![0u8; 10]);
}

#[test]
fn dummy_size_appears_after_release() {
    let (fs, _dir) = setup();
    let path = Path::new("/a/0a1b2c3d");

    let mut handle = fs
        .create(path, OpenFlags::create_truncate(), 0o644)
        .unwrap();
    handle.write(0, &[0x55; 100]).unwrap();
    assert!(handle.fgetattr().unwrap().size <= 100);
    handle.release().unwrap();

    assert_eq!(fs.getattr(path).unwrap().size, 100);
}

#[test]
fn dummy_truncate_to_zero() {
    let (fs, _dir) = setup();
    let path = Path::new("/a/clip.mov");

    write_and_release(&fs, "/a/clip.mov", &[1u8; 50]);
    assert_eq!(fs.getattr(path).unwrap().size, 50);

    fs.truncate(path, 0).unwrap();
    let handle = fs.open(path, OpenFlags::read()).unwrap();
    handle.release().unwrap();
    assert_eq!(fs.getattr(path).unwrap().size, 0);
}

#[test]
fn freespace_one_gib_at_4k_blocks() {
    let real = StatFs {
        blocks: 10_000,
        bfree: 2_000,
        bavail: 1_500,
        files: 100,
        ffree: 10,
        favail: 10,
        bsize: 4096,
        namelen: 255,
        frsize: 4096,
    };
    let reported = inflate(real, Freespace::from_gib(1).unwrap());
    assert_eq!(reported.bfree, 2_000 + 262_144);
    assert_eq!(reported.bavail, 1_500 + 262_144);
    assert_eq!(reported.blocks, 10_000 + 262_144);
}

// ============================================================================
// Properties
// ============================================================================

#[test]
fn real_content_at_offsets() {
    let (fs, _dir) = setup();
    let path = Path::new("/a/Status.plist");

    let mut handle = fs
        .create(path, OpenFlags::create_truncate(), 0o644)
        .unwrap();
    handle.write(4, b"tail").unwrap();
    handle.write(0, b"head").unwrap();
    handle.release().unwrap();

    let handle = fs.open(path, OpenFlags::read()).unwrap();
    assert_eq!(handle.read(0, 8).unwrap(), b"headtail");
    assert_eq!(handle.read(4, 100).unwrap(), b"tail");
    handle.release().unwrap();
}

#[test]
fn size_fidelity_after_mixed_sequence() {
    let (fs, _dir) = setup();

    for name in ["/a/Manifest.db", "/a/deadbeef"] {
        let path = Path::new(name);
        let mut handle = fs
            .create(path, OpenFlags::create_truncate(), 0o644)
            .unwrap();
        handle.write(0, &[3u8; 300]).unwrap();
        handle.ftruncate(120).unwrap();
        assert_eq!(handle.fgetattr().unwrap().size, 120);
        handle.write(200, &[3u8; 56]).unwrap();
        let expected = handle.max_size();
        handle.release().unwrap();

        assert_eq!(expected, 256, "{name}");
        assert_eq!(fs.getattr(path).unwrap().size, expected, "{name}");
    }
}

#[test]
fn dummy_disk_footprint_is_tiny() {
    use std::os::unix::fs::MetadataExt;

    let (fs, dir) = setup();
    let path = Path::new("/a/huge.bin");

    let mut handle = fs
        .create(path, OpenFlags::create_truncate(), 0o644)
        .unwrap();
    let chunk = vec![0xFFu8; 128 * 1024];
    for i in 0..80u64 {
        handle.write(i * chunk.len() as u64, &chunk).unwrap();
    }
    handle.release().unwrap();

    let meta = std::fs::metadata(dir.path().join("a/huge.bin")).unwrap();
    assert_eq!(meta.len(), 80 * 128 * 1024);
    assert!(meta.blocks() * 512 < meta.len() / 10);
}

#[test]
fn listing_matches_backing_directory() {
    let (fs, dir) = setup();

    for name in ["Manifest.db", "Info.plist", "Status.plist"] {
        std::fs::write(dir.path().join(name), b"").unwrap();
    }
    std::fs::create_dir(dir.path().join("ff")).unwrap();

    let entries: Vec<_> = fs
        .readdir(Path::new("/"))
        .unwrap()
        .map(|e| e.unwrap())
        .collect();
    assert_eq!(entries[0].name, ".");
    assert_eq!(entries[1].name, "..");

    let mut names: Vec<_> = entries[2..].iter().map(|e| e.name.clone()).collect();
    names.sort();
    assert_eq!(
        names,
        vec!["Info.plist", "Manifest.db", "Status.plist", "a", "ff"]
    );
    for entry in &entries[2..] {
        assert_eq!(
            entry.kind.is_dir(),
            dir.path().join(&entry.name).is_dir(),
            "{}",
            entry.name
        );
    }
}

#[test]
fn classification_ignores_directory() {
    assert_eq!(
        Classification::of(Path::new("/Manifest.db")),
        Classification::of(Path::new("/x/y/Manifest.db"))
    );
    assert_eq!(
        Classification::of(Path::new("/Manifest/100.data")),
        Classification::Dummy
    );
}
