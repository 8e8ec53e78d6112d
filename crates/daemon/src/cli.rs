use std::path::PathBuf;

use clap::Parser;
use s3fs_daemon::{ConfigFile, FlushMode};

/// Mount an S3-compatible bucket as a local filesystem
#[derive(Parser, Debug, Clone)]
#[command(name = "s3fs", version, about)]
pub struct Cli {
    /// S3 endpoint URL
    #[arg(short = 'e', long, env = "S3FS_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Access key id
    #[arg(short = 'a', long = "ak", env = "S3FS_ACCESS_KEY")]
    pub access_key: Option<String>,

    /// Secret access key
    #[arg(short = 's', long = "sk", env = "S3FS_SECRET_KEY", hide_env_values = true)]
    pub secret_key: Option<String>,

    /// Bucket to mount
    #[arg(short = 'b', long, env = "S3FS_BUCKET")]
    pub bucket: Option<String>,

    /// Directory to mount the bucket on
    #[arg(short = 'm', long = "mountpoint")]
    pub mount_point: Option<PathBuf>,

    /// Detach and run in the background
    #[arg(short = 'd', long = "daemon")]
    pub daemon: bool,

    /// Config file (default: <config dir>/s3fs/config.toml)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Bucket region
    #[arg(long, env = "S3FS_REGION")]
    pub region: Option<String>,

    /// How buffered writes are committed
    #[arg(long, value_enum)]
    pub flush_mode: Option<FlushMode>,

    /// Let other users access the mount and unmount automatically if the
    /// process dies. Needs `user_allow_other` in /etc/fuse.conf when not
    /// running as root.
    #[arg(long)]
    pub allow_other: bool,
}

impl Cli {
    /// Flags as a config layer. Unset switches leave the file value alone.
    pub fn overrides(&self) -> ConfigFile {
        ConfigFile {
            endpoint: self.endpoint.clone(),
            access_key: self.access_key.clone(),
            secret_key: self.secret_key.clone(),
            bucket: self.bucket.clone(),
            region: self.region.clone(),
            mount_point: self.mount_point.clone(),
            daemonize: self.daemon.then_some(true),
            flush_mode: self.flush_mode,
            allow_other: self.allow_other.then_some(true),
        }
    }
}
