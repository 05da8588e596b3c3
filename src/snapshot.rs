//! Save-completion detection.
//!
//! The store never reports when a snapshot has reached disk: `BGSAVE` replies
//! before the fork even starts writing, and a `SAVE` reply says nothing about
//! when the rename becomes visible to other processes. Completion is therefore
//! detected by watching the snapshot file itself: its modification time is
//! captured right before the command goes out, and the wait ends on the first
//! observation of a different one.
//!
//! Times are compared at full precision rather than whole seconds, so a save
//! finishing within the same second as the previous one is still seen. On
//! filesystems that only keep second-granular times that case stays
//! undetectable; the wait then runs until the timeout.

use crate::config::SnapshotSettings;
use crate::error::SnapshotError;
use crate::store::StoreConnector;
use std::fs;
use std::io;
use std::path::Path;
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, info};

/// What the wait loop looks at on each poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotStamp {
    pub modified: SystemTime,
    pub len: u64,
}

impl SnapshotStamp {
    pub fn differs_from(&self, baseline: &SnapshotStamp) -> bool {
        self.modified != baseline.modified
    }
}

/// Source of snapshot metadata.
pub trait MtimeSource: Send + Sync {
    fn stamp(&self, path: &Path) -> io::Result<SnapshotStamp>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FsMtimeSource;

impl MtimeSource for FsMtimeSource {
    fn stamp(&self, path: &Path) -> io::Result<SnapshotStamp> {
        let metadata = fs::metadata(path)?;
        Ok(SnapshotStamp {
            modified: metadata.modified()?,
            len: metadata.len(),
        })
    }
}

/// Outcome of a completed save.
#[derive(Debug, Clone, Copy)]
pub struct SaveCompletion {
    pub baseline: SnapshotStamp,
    pub rewritten: SnapshotStamp,
    pub waited: Duration,
}

/// Triggers a save according to `settings.mode` and returns once the snapshot
/// file has been rewritten. Returns `Ok(None)` without touching the store when
/// saving is disabled.
pub async fn trigger_and_wait(
    settings: &SnapshotSettings,
    connector: &dyn StoreConnector,
    mtime: &dyn MtimeSource,
) -> Result<Option<SaveCompletion>, SnapshotError> {
    let Some(command) = settings.mode.command() else {
        debug!("Save trigger disabled, using snapshot as found on disk");
        return Ok(None);
    };

    let mut control = connector.connect(&settings.endpoint).await?;

    let baseline = stat(mtime, &settings.path)?;
    let started = Instant::now();
    control.request_save(settings.mode).await?;

    info!("Waiting for {} to rewrite {}...", command, settings.path.display());
    let poll = wait_for_rewrite(mtime, &settings.path, &baseline, settings.poll_interval);
    let rewritten = match settings.timeout {
        Some(limit) => tokio::time::timeout(limit, poll)
            .await
            .map_err(|_| SnapshotError::TimedOut {
                path: settings.path.clone(),
                waited: limit,
            })??,
        None => poll.await?,
    };

    let waited = started.elapsed();
    info!(
        "Snapshot rewritten after {:.2?} ({:.2} MB)",
        waited,
        rewritten.len as f64 / 1_048_576.0
    );

    Ok(Some(SaveCompletion {
        baseline,
        rewritten,
        waited,
    }))
}

/// Polls `path` until its modification time differs from `baseline`, sleeping
/// `interval` between checks. A missing file counts as not yet rewritten.
pub async fn wait_for_rewrite(
    mtime: &dyn MtimeSource,
    path: &Path,
    baseline: &SnapshotStamp,
    interval: Duration,
) -> Result<SnapshotStamp, SnapshotError> {
    let mut polls: u64 = 0;
    loop {
        polls += 1;
        match mtime.stamp(path) {
            Ok(current) if current.differs_from(baseline) => {
                debug!("Snapshot change observed after {} polls", polls);
                return Ok(current);
            }
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(SnapshotError::Stat {
                    path: path.to_path_buf(),
                    source,
                })
            }
        }

        if interval.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(interval).await;
        }
    }
}

fn stat(mtime: &dyn MtimeSource, path: &Path) -> Result<SnapshotStamp, SnapshotError> {
    mtime.stamp(path).map_err(|source| SnapshotError::Stat {
        path: path.to_path_buf(),
        source,
    })
}
