use crate::archive::ArchiveFormat;
use crate::config::SaveMode;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "rdb-backup")]
#[command(about = "Trigger a Redis snapshot, then copy, compress and upload it")]
#[command(version)]
pub struct Cli {
    /// Path to configuration file (defaults to ./rdb-backup.toml when present)
    #[arg(short, long, global = true, env = "RDB_BACKUP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, env = "RDB_BACKUP_LOG_LEVEL")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one backup: trigger a save, copy, compress, upload
    Backup(BackupArgs),
    /// Generate an example configuration file
    GenerateConfig {
        /// Output path for the config file
        #[arg(short, long, default_value = "rdb-backup.toml.example")]
        output: PathBuf,
    },
}

/// Every option here overrides the config file; unset options fall through to
/// the file and then to built-in defaults.
#[derive(Args, Debug, Default, Clone)]
pub struct BackupArgs {
    /// Snapshot file written by the store
    #[arg(short, long, env = "RDB_BACKUP_SNAPSHOT")]
    pub snapshot: Option<PathBuf>,

    /// Directory receiving the backup artifacts
    #[arg(short = 'd', long, env = "RDB_BACKUP_DIR")]
    pub backup_dir: Option<PathBuf>,

    /// Save command to issue before copying
    #[arg(short = 'm', long, value_enum, env = "RDB_BACKUP_SAVE_MODE")]
    pub save_mode: Option<SaveMode>,

    /// Store host
    #[arg(long, env = "RDB_BACKUP_HOST")]
    pub host: Option<String>,

    /// Store port
    #[arg(short, long, env = "RDB_BACKUP_PORT")]
    pub port: Option<u16>,

    /// Store password
    #[arg(long, env = "RDB_BACKUP_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Delay between snapshot checks, in microseconds
    #[arg(long, env = "RDB_BACKUP_POLL_INTERVAL_US")]
    pub poll_interval_us: Option<u64>,

    /// Give up waiting for the save after this many seconds (0 waits forever)
    #[arg(long, env = "RDB_BACKUP_SAVE_TIMEOUT_SECS")]
    pub save_timeout_secs: Option<u64>,

    /// Pack the copy into an archive
    #[arg(long, env = "RDB_BACKUP_COMPRESS", num_args = 0..=1, default_missing_value = "true", value_name = "BOOL")]
    pub compress: Option<bool>,

    /// Archive format used when compressing
    #[arg(long, value_enum, env = "RDB_BACKUP_FORMAT")]
    pub format: Option<ArchiveFormat>,

    /// Compression level, clamped to the range of the chosen format
    #[arg(long, env = "RDB_BACKUP_COMPRESSION_LEVEL")]
    pub compression_level: Option<i32>,

    /// Delete intermediate files once the next stage succeeded
    #[arg(long, env = "RDB_BACKUP_CLEANUP", num_args = 0..=1, default_missing_value = "true", value_name = "BOOL")]
    pub cleanup: Option<bool>,

    /// Upload the artifact to the bucket
    #[arg(long, env = "RDB_BACKUP_UPLOAD", num_args = 0..=1, default_missing_value = "true", value_name = "BOOL")]
    pub upload: Option<bool>,

    /// Bucket name
    #[arg(short, long, env = "RDB_BACKUP_BUCKET")]
    pub bucket: Option<String>,

    /// Bucket region
    #[arg(short, long, env = "RDB_BACKUP_REGION")]
    pub region: Option<String>,

    /// Endpoint URL (for S3-compatible providers)
    #[arg(short, long, env = "RDB_BACKUP_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Access key
    #[arg(short, long, env = "RDB_BACKUP_ACCESS_KEY", hide_env_values = true)]
    pub access_key: Option<String>,

    /// Secret key
    #[arg(long, env = "RDB_BACKUP_SECRET_KEY", hide_env_values = true)]
    pub secret_key: Option<String>,

    /// Lifetime of the printed download URL, in seconds
    #[arg(long, env = "RDB_BACKUP_URL_EXPIRY_SECS")]
    pub url_expiry_secs: Option<u64>,
}
