use crate::archive::ArchiveFormat;
use crate::cli::BackupArgs;
use crate::error::ConfigError;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "rdb-backup.toml";
pub const DEFAULT_SNAPSHOT_PATH: &str = "/var/lib/redis/dump.rdb";
pub const DEFAULT_BACKUP_DIR: &str = "./backups";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 6379;
pub const DEFAULT_POLL_INTERVAL_US: u64 = 500;
pub const DEFAULT_SAVE_TIMEOUT_SECS: u64 = 30 * 60;
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 6;
pub const DEFAULT_REGION: &str = "us-east-1";
/// Presigned S3 URLs cannot outlive seven days.
pub const MAX_URL_EXPIRY_SECS: u64 = 7 * 24 * 3600;

/// Which save command, if any, is sent to the store before copying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SaveMode {
    /// Copy the snapshot as it is on disk
    #[default]
    Disabled,
    /// SAVE: the store blocks until the snapshot is written
    Save,
    /// BGSAVE: the store forks and keeps serving
    Bgsave,
}

impl SaveMode {
    pub fn command(self) -> Option<&'static str> {
        match self {
            SaveMode::Disabled => None,
            SaveMode::Save => Some("SAVE"),
            SaveMode::Bgsave => Some("BGSAVE"),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub snapshot: SnapshotSection,
    pub store: StoreSection,
    pub backup: BackupSection,
    pub storage: StorageSection,
    pub logging: LoggingSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SnapshotSection {
    pub path: Option<PathBuf>,
    pub save_mode: Option<SaveMode>,
    pub poll_interval_us: Option<u64>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreSection {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackupSection {
    pub dir: Option<PathBuf>,
    pub compress: Option<bool>,
    pub format: Option<ArchiveFormat>,
    pub compression_level: Option<i32>,
    pub cleanup: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageSection {
    pub upload: Option<bool>,
    pub bucket: Option<String>,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub url_expiry_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSection {
    pub level: Option<String>,
}

impl FileConfig {
    pub fn parse(path: &Path, content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Malformed {
            path: path.to_path_buf(),
            source,
        })
    }

    /// An explicit path must exist; otherwise `rdb-backup.toml` in the working
    /// directory is read when present and an empty config is used when not.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !fallback.is_file() {
                    return Ok(Self::default());
                }
                fallback
            }
        };

        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Unreadable {
            path: path.clone(),
            source,
        })?;
        Self::parse(&path, &content)
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct StoreEndpoint {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
}

impl StoreEndpoint {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Debug for StoreEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreEndpoint")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotSettings {
    pub path: PathBuf,
    pub mode: SaveMode,
    pub endpoint: StoreEndpoint,
    pub poll_interval: Duration,
    /// `None` waits for as long as the store takes.
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Compression {
    pub format: ArchiveFormat,
    pub level: i32,
}

#[derive(Clone, PartialEq, Eq)]
pub struct RemoteSettings {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key: String,
    pub secret_key: String,
    pub url_expiry: Duration,
}

impl fmt::Debug for RemoteSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteSettings")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("access_key", &"<redacted>")
            .field("secret_key", &"<redacted>")
            .field("url_expiry", &self.url_expiry)
            .finish()
    }
}

/// Fully resolved options. Built once, then only borrowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub snapshot: SnapshotSettings,
    pub backup_dir: PathBuf,
    /// `None` leaves the copy uncompressed.
    pub compression: Option<Compression>,
    pub cleanup: bool,
    /// `None` skips the upload stage.
    pub remote: Option<RemoteSettings>,
}

impl Config {
    /// Merges flags (which clap already merged with the environment) over the
    /// config file over built-in defaults.
    pub fn resolve(args: &BackupArgs, file: &FileConfig) -> Result<Self, ConfigError> {
        let port = args
            .port
            .or(file.store.port)
            .unwrap_or(DEFAULT_PORT);
        if port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "port",
                reason: "must be between 1 and 65535".to_string(),
            });
        }

        let timeout_secs = args
            .save_timeout_secs
            .or(file.snapshot.timeout_secs)
            .unwrap_or(DEFAULT_SAVE_TIMEOUT_SECS);

        let snapshot = SnapshotSettings {
            path: args
                .snapshot
                .clone()
                .or_else(|| file.snapshot.path.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SNAPSHOT_PATH)),
            mode: args
                .save_mode
                .or(file.snapshot.save_mode)
                .unwrap_or_default(),
            endpoint: StoreEndpoint {
                host: args
                    .host
                    .clone()
                    .or_else(|| file.store.host.clone())
                    .unwrap_or_else(|| DEFAULT_HOST.to_string()),
                port,
                password: args
                    .password
                    .clone()
                    .or_else(|| file.store.password.clone())
                    .filter(|p| !p.is_empty()),
            },
            poll_interval: Duration::from_micros(
                args.poll_interval_us
                    .or(file.snapshot.poll_interval_us)
                    .unwrap_or(DEFAULT_POLL_INTERVAL_US),
            ),
            timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
        };

        let compress = args.compress.or(file.backup.compress).unwrap_or(false);
        let compression = compress.then(|| Compression {
            format: args.format.or(file.backup.format).unwrap_or_default(),
            level: args
                .compression_level
                .or(file.backup.compression_level)
                .unwrap_or(DEFAULT_COMPRESSION_LEVEL),
        });

        let upload = args.upload.or(file.storage.upload).unwrap_or(false);
        let remote = if upload {
            Some(resolve_remote(args, &file.storage)?)
        } else {
            None
        };

        Ok(Self {
            snapshot,
            backup_dir: args
                .backup_dir
                .clone()
                .or_else(|| file.backup.dir.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_BACKUP_DIR)),
            compression,
            cleanup: args.cleanup.or(file.backup.cleanup).unwrap_or(false),
            remote,
        })
    }
}

fn resolve_remote(args: &BackupArgs, file: &StorageSection) -> Result<RemoteSettings, ConfigError> {
    let required = |flag: &Option<String>, from_file: &Option<String>, name: &'static str| {
        flag.clone()
            .or_else(|| from_file.clone())
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::MissingRemoteSetting(name))
    };

    let bucket = required(&args.bucket, &file.bucket, "bucket")?;
    let access_key = required(&args.access_key, &file.access_key, "access_key")?;
    let secret_key = required(&args.secret_key, &file.secret_key, "secret_key")?;

    let expiry_secs = args
        .url_expiry_secs
        .or(file.url_expiry_secs)
        .unwrap_or(MAX_URL_EXPIRY_SECS);
    if expiry_secs == 0 || expiry_secs > MAX_URL_EXPIRY_SECS {
        return Err(ConfigError::InvalidValue {
            field: "url_expiry_secs",
            reason: format!("must be between 1 and {}", MAX_URL_EXPIRY_SECS),
        });
    }

    Ok(RemoteSettings {
        bucket,
        region: args
            .region
            .clone()
            .or_else(|| file.region.clone())
            .unwrap_or_else(|| DEFAULT_REGION.to_string()),
        endpoint: args
            .endpoint
            .clone()
            .or_else(|| file.endpoint.clone())
            .filter(|e| !e.is_empty()),
        access_key,
        secret_key,
        url_expiry: Duration::from_secs(expiry_secs),
    })
}

pub const EXAMPLE_CONFIG: &str = r#"# rdb-backup configuration
# Every value can also be given as a flag or an RDB_BACKUP_* environment
# variable; flags and environment win over this file.

[snapshot]
# Snapshot file written by the store (dir + dbfilename in redis.conf)
path = "/var/lib/redis/dump.rdb"

# disabled: copy the file as it is
# save:     send SAVE (store blocks until written)
# bgsave:   send BGSAVE (store forks and keeps serving)
save_mode = "bgsave"

# Delay between checks of the snapshot's modification time
poll_interval_us = 500

# Give up when the snapshot was not rewritten in time (0 = wait forever)
timeout_secs = 1800

[store]
host = "127.0.0.1"
port = 6379
# password = "your-password"

[backup]
dir = "./backups"

# Pack the copy into an archive: zip, tar.zst or tar.gz
compress = true
format = "zip"
compression_level = 6

# Delete the intermediate file once compression or upload succeeded
cleanup = true

[storage]
upload = false
bucket = "your-bucket-name"
region = "us-east-1"
# endpoint = "https://s3.example.com"  # Leave unset for AWS, set for S3-compatible
access_key = "your-access-key"
secret_key = "your-secret-key"
# Lifetime of the printed download URL (max 604800)
url_expiry_secs = 604800

[logging]
level = "info"
"#;

pub fn write_example_config(output_path: &Path) -> anyhow::Result<()> {
    use anyhow::Context;

    fs::write(output_path, EXAMPLE_CONFIG)
        .with_context(|| format!("Failed to write config file: {}", output_path.display()))?;

    println!("✅ Example configuration file generated: {}", output_path.display());
    println!("📝 Please edit it with your actual paths and credentials");

    Ok(())
}
