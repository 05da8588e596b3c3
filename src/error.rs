use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Problems detected while resolving or validating configuration, before any
/// store interaction.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Snapshot file not found: {}", .0.display())]
    SnapshotMissing(PathBuf),

    #[error("Snapshot path is not a regular file: {}", .0.display())]
    SnapshotNotAFile(PathBuf),

    #[error("Snapshot file is not readable: {}", .path.display())]
    SnapshotUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Backup path exists but is not a directory: {}", .0.display())]
    BackupDirNotDirectory(PathBuf),

    #[error("Backup directory is not writable: {}", .path.display())]
    BackupDirNotWritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Remote upload requested but `{0}` is not set")]
    MissingRemoteSetting(&'static str),

    #[error("Invalid value for `{field}`: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("Failed to read config file: {}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {}", .path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Failures talking to the key-value store. Refused connections and rejected
/// credentials are reported identically.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Cannot reach store at {endpoint}: {reason}")]
    Unreachable { endpoint: String, reason: String },

    #[error("Connection to {endpoint} failed while sending {command}: {reason}")]
    CommandFailed {
        endpoint: String,
        command: &'static str,
        reason: String,
    },
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Failed to stat snapshot file {}", .path.display())]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Snapshot {} was not rewritten within {:?}", .path.display(), .waited)]
    TimedOut { path: PathBuf, waited: Duration },
}

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Bucket not found: {0}")]
    BucketNotFound(String),

    #[error("Permission denied on bucket: {0}")]
    PermissionDenied(String),

    #[error("Cannot reach bucket {bucket}: {reason}")]
    Unreachable { bucket: String, reason: String },

    #[error("Failed to upload {key} to bucket {bucket}: {reason}")]
    Upload {
        bucket: String,
        key: String,
        reason: String,
    },

    #[error("Failed to create a download URL for {key}: {reason}")]
    Presign { key: String, reason: String },
}
