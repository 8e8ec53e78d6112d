//! Mount lifecycle: detach, mount, wait for a signal, unmount.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;

use daemonize::Daemonize;
use fuser::MountOption;
use object_store::{ObjectStoreError, Storage};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

use crate::config::{Config, APP_NAME};
use crate::fs::BucketFs;
use crate::fuse::S3Fuse;

pub const PID_FILE: &str = "s3fs.pid";
pub const LOG_FILE: &str = "s3fs.log";

#[derive(Debug, thiserror::Error)]
pub enum MountError {
    #[error("object store error: {0}")]
    Store(#[from] ObjectStoreError),
    #[error("failed to build async runtime: {0}")]
    Runtime(#[source] std::io::Error),
    #[error("failed to open log file {path}: {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to daemonize: {0}")]
    Daemonize(#[from] daemonize::Error),
    #[error("failed to mount at {path}: {source}")]
    Mount {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to install signal handler: {0}")]
    Signal(#[source] std::io::Error),
}

/// Detach from the terminal.
///
/// Must run before any runtime or logging thread is started, since only the
/// calling thread survives the fork.
pub fn daemonize() -> Result<(), MountError> {
    let open_log = || {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(LOG_FILE)
            .map_err(|source| MountError::LogFile {
                path: PathBuf::from(LOG_FILE),
                source,
            })
    };

    Daemonize::new()
        .pid_file(PID_FILE)
        .working_directory("./")
        .umask(0o027)
        .stdout(open_log()?)
        .stderr(open_log()?)
        .start()?;
    Ok(())
}

/// Mount the configured bucket and block until SIGINT or SIGTERM.
pub fn run(config: Config) -> Result<(), MountError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(MountError::Runtime)?;

    let store = Storage::new(&config.store)?;
    info!(
        bucket = store.bucket(),
        mount_point = %config.mount_point.display(),
        flush_mode = ?config.flush_mode,
        "mounting bucket"
    );

    let fs = BucketFs::new(Arc::new(store), config.flush_mode);
    let filesystem = S3Fuse::new(fs, runtime.handle().clone());

    let options = mount_options(config.allow_other);
    let session = fuser::spawn_mount2(filesystem, &config.mount_point, &options).map_err(
        |source| {
            error!(mount_point = %config.mount_point.display(), error = %source, "mount failed");
            MountError::Mount {
                path: config.mount_point.clone(),
                source,
            }
        },
    )?;
    info!(mount_point = %config.mount_point.display(), "mounted");

    runtime.block_on(wait_for_shutdown())?;

    // dropping the session unmounts
    drop(session);
    info!("exited");
    Ok(())
}

/// `AutoUnmount` is only asked for alongside `AllowOther`: fusermount
/// refuses it otherwise unless `user_allow_other` is set in
/// `/etc/fuse.conf`. Without it the mount is still removed when the session
/// is dropped on shutdown.
fn mount_options(allow_other: bool) -> Vec<MountOption> {
    let mut options = vec![MountOption::FSName(APP_NAME.to_string())];
    if allow_other {
        options.push(MountOption::AllowOther);
        options.push(MountOption::AutoUnmount);
    }
    options
}

async fn wait_for_shutdown() -> Result<(), MountError> {
    let mut sigterm = signal(SignalKind::terminate()).map_err(MountError::Signal)?;
    let mut sigint = signal(SignalKind::interrupt()).map_err(MountError::Signal)?;

    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM, unmounting"),
        _ = sigint.recv() => info!("received SIGINT, unmounting"),
    }
    Ok(())
}
