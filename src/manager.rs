use crate::config::Config;
use crate::error::ConfigError;
use crate::pipeline::{self, StageReport, UploadReport};
use crate::providers::{RemoteStore, S3Provider};
use crate::snapshot::{self, FsMtimeSource, MtimeSource, SaveCompletion};
use crate::store::{RedisConnector, StoreConnector};
use anyhow::Result;
use chrono::Local;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// What one run produced.
#[derive(Debug)]
pub struct BackupSummary {
    pub save: Option<SaveCompletion>,
    pub stages: Vec<StageReport>,
    pub upload: Option<UploadReport>,
    /// The last artifact still on local disk, if cleanup left one.
    pub local_artifact: Option<PathBuf>,
    pub elapsed: Duration,
}

pub struct BackupManager {
    config: Config,
    connector: Arc<dyn StoreConnector>,
    mtime: Arc<dyn MtimeSource>,
    remote: Option<Arc<dyn RemoteStore>>,
}

impl BackupManager {
    pub fn new(config: Config) -> Self {
        let remote = config
            .remote
            .as_ref()
            .map(|settings| Arc::new(S3Provider::new(settings)) as Arc<dyn RemoteStore>);

        Self {
            config,
            connector: Arc::new(RedisConnector),
            mtime: Arc::new(FsMtimeSource),
            remote,
        }
    }

    pub fn with_connector(mut self, connector: Arc<dyn StoreConnector>) -> Self {
        self.connector = connector;
        self
    }

    pub fn with_mtime_source(mut self, mtime: Arc<dyn MtimeSource>) -> Self {
        self.mtime = mtime;
        self
    }

    /// Replaces the remote store. Only used when the config enables uploads.
    pub fn with_remote(mut self, remote: Arc<dyn RemoteStore>) -> Self {
        if self.config.remote.is_some() {
            self.remote = Some(remote);
        }
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Checks everything that can be checked without touching the store or
    /// writing an artifact.
    pub async fn preflight(&self) -> Result<()> {
        check_snapshot(&self.config.snapshot.path)?;
        prepare_backup_dir(&self.config.backup_dir)?;

        if let Some(ref remote) = self.remote {
            remote.check_bucket().await?;
        }
        Ok(())
    }

    pub async fn run(&self) -> Result<BackupSummary> {
        let started = Instant::now();
        self.preflight().await?;

        let save = snapshot::trigger_and_wait(
            &self.config.snapshot,
            self.connector.as_ref(),
            self.mtime.as_ref(),
        )
        .await?;

        let mut stages = Vec::new();

        let copy = pipeline::copy_snapshot(&self.config.snapshot.path, &self.config.backup_dir, &Local::now())?;
        let mut artifact = copy.artifact.clone();
        stages.push(copy);

        if let Some(ref compression) = self.config.compression {
            let compressed = pipeline::compress_artifact(&artifact, compression, self.config.cleanup)?;
            artifact = compressed.artifact.clone();
            stages.push(compressed);
        }

        let upload = match self.remote {
            Some(ref remote) => {
                let report = pipeline::upload_artifact(remote.as_ref(), &artifact, self.config.cleanup).await?;
                stages.push(report.stage.clone());
                Some(report)
            }
            None => None,
        };

        let local_artifact = artifact.exists().then_some(artifact);
        let elapsed = started.elapsed();
        info!("Backup completed in {:.2?}", elapsed);

        Ok(BackupSummary {
            save,
            stages,
            upload,
            local_artifact,
            elapsed,
        })
    }
}

/// The snapshot must be an existing regular file this process can open.
fn check_snapshot(path: &Path) -> Result<(), ConfigError> {
    let unreadable = |source| ConfigError::SnapshotUnreadable {
        path: path.to_path_buf(),
        source,
    };

    match fs::metadata(path) {
        Ok(meta) if meta.is_file() => {}
        Ok(_) => return Err(ConfigError::SnapshotNotAFile(path.to_path_buf())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ConfigError::SnapshotMissing(path.to_path_buf()))
        }
        Err(e) => return Err(unreadable(e)),
    }
    fs::File::open(path).map_err(unreadable)?;
    Ok(())
}

/// Creates the directory when missing, then checks it is writable with a
/// probe file.
fn prepare_backup_dir(dir: &Path) -> Result<(), ConfigError> {
    if dir.exists() && !dir.is_dir() {
        return Err(ConfigError::BackupDirNotDirectory(dir.to_path_buf()));
    }
    let probe = dir.join(format!(".rdb-backup-probe-{}", std::process::id()));
    fs::create_dir_all(dir)
        .and_then(|_| fs::write(&probe, b""))
        .and_then(|_| fs::remove_file(&probe))
        .map_err(|source| ConfigError::BackupDirNotWritable {
            path: dir.to_path_buf(),
            source,
        })?;
    Ok(())
}
