//! fibfs binary: validate arguments, mount, serve until unmounted.
//!
//! Usage:
//!   fibfs [--backing-dir DIR] [--freespace GIB] MOUNTPOINT
//!
//! Set RUST_LOG=debug to log every filesystem request.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;

use clap::{CommandFactory, Parser};
use fibfs::{Args, FibFuse, StartupError};
use fibfs_vfs::{BackingFs, BackingRoot, Freespace, FsConfig};
use fuser::{Session, SessionUnmounter};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> ExitCode {
    // Logs go to stderr; stdout is left to the help text.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let Some(mountpoint) = args.mountpoint.clone() else {
        // Nothing to mount: show usage and leave quietly.
        if let Err(e) = Args::command().print_help() {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
        return ExitCode::SUCCESS;
    };

    match run(&args, &mountpoint) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args, mountpoint: &Path) -> Result<(), StartupError> {
    let freespace = Freespace::from_gib(args.freespace)?;
    let root = BackingRoot::from_option(args.backing_dir.as_deref())?;
    let config = Arc::new(FsConfig::new(root.path(), freespace));

    tracing::info!(
        mountpoint = %mountpoint.display(),
        backing_dir = %root.path().display(),
        owned = root.is_owned(),
        freespace_bytes = freespace.bytes(),
        "mounting"
    );

    let fs = FibFuse::new(BackingFs::new(config));
    let served = serve(fs, mountpoint, args);

    // The backing root outlives the session, and an owned one goes with it.
    let closed = root.close();
    served?;
    closed?;

    tracing::info!("unmounted");
    Ok(())
}

/// Mount and run the session loop on this thread until unmounted.
fn serve(fs: FibFuse, mountpoint: &Path, args: &Args) -> Result<(), StartupError> {
    let mut session = Session::new(fs, mountpoint, &args.mount_options())?;
    let unmounter = session.unmount_callable();

    // Detached: if the kernel side unmounts first, the process exits under it.
    thread::Builder::new()
        .name("fibfs-signals".into())
        .spawn(move || unmount_on_signal(unmounter))?;

    session.run()?;
    Ok(())
}

/// Block until SIGINT or SIGTERM, then unmount so the session loop returns.
fn unmount_on_signal(mut unmounter: SessionUnmounter) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            tracing::warn!(error = %e, "no signal handling, unmount with fusermount -u");
            return;
        }
    };

    let received: std::io::Result<&str> = runtime.block_on(async {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate())?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => res.map(|()| "SIGINT"),
            _ = term.recv() => Ok("SIGTERM"),
        }
    });

    match received {
        Ok(name) => {
            tracing::info!(signal = name, "unmounting");
            if let Err(e) = unmounter.unmount() {
                tracing::warn!(error = %e, "unmount failed");
            }
        }
        Err(e) => tracing::warn!(error = %e, "signal handler setup failed"),
    }
}
