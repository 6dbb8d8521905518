//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;
use fibfs_vfs::config::DEFAULT_FREESPACE_GIB;
use fuser::MountOption;

/// Fake iOS backup filesystem.
///
/// Mounts a directory that keeps the structure, sizes and metadata of
/// everything written to it, but only stores the content of `Manifest*` and
/// `*.plist` files.
#[derive(Parser, Debug)]
#[command(name = "fibfs")]
#[command(about = "Fake iOS backup filesystem: keeps structure and sizes, drops file contents")]
pub struct Args {
    /// Directory where data is stored (default: a temp dir removed at unmount)
    #[arg(long, value_name = "DIR", env = "FIBFS_BACKING_DIR")]
    pub backing_dir: Option<PathBuf>,

    /// Amount of free disk space (in GiB) to report on top of the real free space
    #[arg(long, value_name = "SIZE", env = "FIBFS_FREESPACE", default_value_t = DEFAULT_FREESPACE_GIB)]
    pub freespace: u64,

    /// Filesystem name shown in the mount table
    #[arg(long, default_value = "fibfs")]
    pub fsname: String,

    /// Allow other users to access the mount
    #[arg(long)]
    pub allow_other: bool,

    /// Unmount automatically when the process exits
    #[arg(long)]
    pub auto_unmount: bool,

    /// Mount read-only
    #[arg(long)]
    pub read_only: bool,

    /// Extra mount options, comma separated (e.g. `-o noatime,default_permissions`)
    #[arg(short = 'o', value_name = "OPT", value_delimiter = ',')]
    pub options: Vec<String>,

    /// Where to mount the filesystem
    pub mountpoint: Option<PathBuf>,
}

impl Args {
    /// Mount options for the host interface.
    pub fn mount_options(&self) -> Vec<MountOption> {
        let mut opts = vec![MountOption::FSName(self.fsname.clone())];

        if self.read_only {
            opts.push(MountOption::RO);
        }
        if self.allow_other {
            opts.push(MountOption::AllowOther);
        }
        if self.auto_unmount {
            opts.push(MountOption::AutoUnmount);
        }
        opts.extend(
            self.options
                .iter()
                .filter(|o| !o.is_empty())
                .map(|o| parse_mount_option(o)),
        );

        opts
    }
}

fn parse_mount_option(opt: &str) -> MountOption {
    match opt {
        "ro" => MountOption::RO,
        "rw" => MountOption::RW,
        "allow_other" => MountOption::AllowOther,
        "allow_root" => MountOption::AllowRoot,
        "auto_unmount" => MountOption::AutoUnmount,
        "default_permissions" => MountOption::DefaultPermissions,
        "dev" => MountOption::Dev,
        "nodev" => MountOption::NoDev,
        "suid" => MountOption::Suid,
        "nosuid" => MountOption::NoSuid,
        "exec" => MountOption::Exec,
        "noexec" => MountOption::NoExec,
        "atime" => MountOption::Atime,
        "noatime" => MountOption::NoAtime,
        "sync" => MountOption::Sync,
        "async" => MountOption::Async,
        "dirsync" => MountOption::DirSync,
        other => MountOption::CUSTOM(other.to_string()),
    }
}
