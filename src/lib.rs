//! Point-in-time backups of a Redis snapshot file.
//!
//! A run asks the store to save ([`snapshot`]), waits until the snapshot file
//! on disk has been rewritten, then copies it into the backup directory,
//! optionally packs it into an archive and uploads it to an S3 bucket
//! ([`pipeline`]). [`manager::BackupManager`] ties the steps together.

pub mod archive;
pub mod cli;
pub mod config;
pub mod error;
pub mod manager;
pub mod pipeline;
pub mod providers;
pub mod snapshot;
pub mod store;

pub use config::Config;
pub use manager::{BackupManager, BackupSummary};
