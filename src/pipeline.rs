use crate::archive;
use crate::config::Compression;
use crate::providers::RemoteStore;
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::info;

pub const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Copy,
    Compress,
    Upload,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Stage::Copy => "copy",
            Stage::Compress => "compress",
            Stage::Upload => "upload",
        })
    }
}

/// Timing and size of one stage, for the operator.
#[derive(Debug, Clone)]
pub struct StageReport {
    pub stage: Stage,
    pub elapsed: Duration,
    pub artifact: PathBuf,
    pub size: u64,
}

impl StageReport {
    fn log(&self) {
        info!(
            "{} finished in {:.2?}: {} ({:.2} MB)",
            self.stage,
            self.elapsed,
            self.artifact.display(),
            self.size as f64 / 1_048_576.0
        );
    }
}

/// `<YYYYMMDD-HHMMSS>-dump.<ext>`, taking the extension from the snapshot.
pub fn artifact_name(snapshot: &Path, captured_at: &DateTime<Local>) -> String {
    let ext = snapshot
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .unwrap_or("rdb");
    format!("{}-dump.{}", captured_at.format(TIMESTAMP_FORMAT), ext)
}

pub fn copy_snapshot(snapshot: &Path, backup_dir: &Path, captured_at: &DateTime<Local>) -> Result<StageReport> {
    let started = Instant::now();
    let dest = backup_dir.join(artifact_name(snapshot, captured_at));

    info!("Copying {} to {}", snapshot.display(), dest.display());
    let size = copy_new(snapshot, &dest).with_context(|| {
        format!("Failed to copy {} to {}", snapshot.display(), dest.display())
    })?;

    let report = StageReport {
        stage: Stage::Copy,
        elapsed: started.elapsed(),
        artifact: dest,
        size,
    };
    report.log();
    Ok(report)
}

/// Packs `artifact` into `<artifact>.<format ext>` next to it. With `cleanup`
/// the uncompressed input is removed once the archive is complete.
pub fn compress_artifact(artifact: &Path, compression: &Compression, cleanup: bool) -> Result<StageReport> {
    let started = Instant::now();
    let file_name = artifact
        .file_name()
        .and_then(|n| n.to_str())
        .context("Invalid artifact file name")?;
    let dest = artifact.with_file_name(format!("{}.{}", file_name, compression.format.extension()));

    info!("Compressing {} ({})", artifact.display(), compression.format.extension());
    archive::write_single_entry(artifact, &dest, compression.format, compression.level)
        .with_context(|| format!("Failed to compress {}", artifact.display()))?;

    if cleanup {
        remove_intermediate(artifact)?;
    }

    let size = fs::metadata(&dest)
        .with_context(|| format!("Failed to stat archive: {}", dest.display()))?
        .len();
    let report = StageReport {
        stage: Stage::Compress,
        elapsed: started.elapsed(),
        artifact: dest,
        size,
    };
    report.log();
    Ok(report)
}

#[derive(Debug, Clone)]
pub struct UploadReport {
    pub stage: StageReport,
    pub key: String,
    /// Download URL with the access key id redacted.
    pub url: String,
}

/// Uploads `artifact` under its file name. With `cleanup` the local file is
/// removed after the upload succeeded.
pub async fn upload_artifact(remote: &dyn RemoteStore, artifact: &Path, cleanup: bool) -> Result<UploadReport> {
    let started = Instant::now();
    let key = artifact
        .file_name()
        .and_then(|n| n.to_str())
        .context("Invalid artifact file name")?
        .to_string();
    let size = fs::metadata(artifact)
        .with_context(|| format!("Failed to stat artifact: {}", artifact.display()))?
        .len();

    info!("Uploading {} to bucket {}...", key, remote.bucket());
    remote.upload(&key, artifact).await?;
    let url = remote.object_url(&key).await?;

    if cleanup {
        remove_intermediate(artifact)?;
    }

    let stage = StageReport {
        stage: Stage::Upload,
        elapsed: started.elapsed(),
        artifact: artifact.to_path_buf(),
        size,
    };
    stage.log();
    info!("Download URL: {}", url);
    Ok(UploadReport { stage, key, url })
}

/// Copies into a file that must not exist yet.
fn copy_new(source: &Path, dest: &Path) -> io::Result<u64> {
    let mut reader = fs::File::open(source)?;
    let mut writer = fs::OpenOptions::new().write(true).create_new(true).open(dest)?;
    let size = io::copy(&mut reader, &mut writer)?;
    writer.sync_all()?;
    Ok(size)
}

fn remove_intermediate(path: &Path) -> Result<()> {
    fs::remove_file(path).with_context(|| format!("Failed to delete: {}", path.display()))?;
    info!("Deleted: {}", path.display());
    Ok(())
}
