//! Mount configuration.
//!
//! Settings come from an optional TOML file and from command-line flags;
//! a flag always wins over the file. The merged result must name an
//! endpoint, credentials, a bucket and a mount point.

use std::path::{Path, PathBuf};

use object_store::ObjectStoreConfig;
use serde::{Deserialize, Serialize};

use crate::fs::FlushMode;

pub const APP_NAME: &str = "s3fs";
pub const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("missing required setting: {0}")]
    Missing(&'static str),
}

/// One layer of settings. Every field is optional so that layers can be
/// stacked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub bucket: Option<String>,
    pub region: Option<String>,
    pub mount_point: Option<PathBuf>,
    pub daemonize: Option<bool>,
    pub flush_mode: Option<FlushMode>,
    pub allow_other: Option<bool>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load the file at `path`, or the default location when `path` is
    /// `None`. A missing default file yields an empty layer; a missing
    /// explicit file is an error.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => match default_config_path() {
                Some(path) if path.exists() => {
                    tracing::debug!(path = %path.display(), "loading default config file");
                    Self::load(&path)
                }
                _ => Ok(Self::default()),
            },
        }
    }

    /// Lay `overrides` on top of `self`.
    pub fn merge(self, overrides: ConfigFile) -> Self {
        Self {
            endpoint: overrides.endpoint.or(self.endpoint),
            access_key: overrides.access_key.or(self.access_key),
            secret_key: overrides.secret_key.or(self.secret_key),
            bucket: overrides.bucket.or(self.bucket),
            region: overrides.region.or(self.region),
            mount_point: overrides.mount_point.or(self.mount_point),
            daemonize: overrides.daemonize.or(self.daemonize),
            flush_mode: overrides.flush_mode.or(self.flush_mode),
            allow_other: overrides.allow_other.or(self.allow_other),
        }
    }

    pub fn resolve(self) -> Result<Config, ConfigError> {
        // empty strings count as unset
        fn required<T: AsRef<str>>(
            value: Option<T>,
            name: &'static str,
        ) -> Result<T, ConfigError> {
            value
                .filter(|v| !v.as_ref().is_empty())
                .ok_or(ConfigError::Missing(name))
        }

        let endpoint = required(self.endpoint, "endpoint")?;
        let access_key = required(self.access_key, "access_key")?;
        let secret_key = required(self.secret_key, "secret_key")?;
        let bucket = required(self.bucket, "bucket")?;
        let mount_point = self
            .mount_point
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or(ConfigError::Missing("mount_point"))?;

        Ok(Config {
            store: ObjectStoreConfig::S3 {
                endpoint,
                access_key,
                secret_key,
                bucket,
                region: self.region,
            },
            mount_point,
            daemonize: self.daemonize.unwrap_or(false),
            flush_mode: self.flush_mode.unwrap_or_default(),
            allow_other: self.allow_other.unwrap_or(false),
        })
    }
}

/// Fully resolved mount settings.
#[derive(Debug, Clone)]
pub struct Config {
    pub store: ObjectStoreConfig,
    pub mount_point: PathBuf,
    pub daemonize: bool,
    pub flush_mode: FlushMode,
    pub allow_other: bool,
}

/// `<platform config dir>/s3fs/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME)
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}
