// Fakes shared by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use rdb_backup::cli::BackupArgs;
use rdb_backup::config::{SaveMode, StoreEndpoint};
use rdb_backup::error::{RemoteError, StoreError};
use rdb_backup::providers::{redact_access_key, RemoteStore};
use rdb_backup::snapshot::{MtimeSource, SnapshotStamp};
use rdb_backup::store::{StoreConnector, StoreControl};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

pub const TEST_ACCESS_KEY: &str = "AKIDTESTKEY000000000";

/// Options for a run against `snapshot` and `backup_dir` with everything else
/// at its default.
pub fn args_for(snapshot: &Path, backup_dir: &Path) -> BackupArgs {
    BackupArgs {
        snapshot: Some(snapshot.to_path_buf()),
        backup_dir: Some(backup_dir.to_path_buf()),
        poll_interval_us: Some(200),
        ..BackupArgs::default()
    }
}

pub fn with_upload(mut args: BackupArgs) -> BackupArgs {
    args.upload = Some(true);
    args.bucket = Some("backups".to_string());
    args.access_key = Some(TEST_ACCESS_KEY.to_string());
    args.secret_key = Some("secret".to_string());
    args
}

pub fn files_in(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .collect();
    files.sort();
    files
}

/// Records every connection and save request; the save itself does nothing.
#[derive(Default)]
pub struct RecordingConnector {
    pub connects: AtomicUsize,
    pub requests: Arc<Mutex<Vec<SaveMode>>>,
}

impl RecordingConnector {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<SaveMode> {
        self.requests.lock().unwrap().clone()
    }
}

struct RecordingControl {
    requests: Arc<Mutex<Vec<SaveMode>>>,
}

#[async_trait]
impl StoreConnector for RecordingConnector {
    async fn connect(&self, _endpoint: &StoreEndpoint) -> Result<Box<dyn StoreControl>, StoreError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(RecordingControl {
            requests: Arc::clone(&self.requests),
        }))
    }
}

#[async_trait]
impl StoreControl for RecordingControl {
    async fn request_save(&mut self, mode: SaveMode) -> Result<(), StoreError> {
        self.requests.lock().unwrap().push(mode);
        Ok(())
    }
}

/// A store that is never reachable.
pub struct DownConnector;

#[async_trait]
impl StoreConnector for DownConnector {
    async fn connect(&self, endpoint: &StoreEndpoint) -> Result<Box<dyn StoreControl>, StoreError> {
        Err(StoreError::Unreachable {
            endpoint: endpoint.address(),
            reason: "connection refused".to_string(),
        })
    }
}

/// Accepts the connection but drops it when the save command is sent.
pub struct DroppingConnector;

struct DroppingControl;

#[async_trait]
impl StoreConnector for DroppingConnector {
    async fn connect(&self, _endpoint: &StoreEndpoint) -> Result<Box<dyn StoreControl>, StoreError> {
        Ok(Box::new(DroppingControl))
    }
}

#[async_trait]
impl StoreControl for DroppingControl {
    async fn request_save(&mut self, mode: SaveMode) -> Result<(), StoreError> {
        Err(StoreError::CommandFailed {
            endpoint: "127.0.0.1:6379".to_string(),
            command: mode.command().unwrap_or("NONE"),
            reason: "connection reset by peer".to_string(),
        })
    }
}

/// Behaves like a store doing a background save: the request returns at
/// once, and `delay` later the snapshot is replaced by a new file holding
/// `contents`, written next to it and renamed into place.
pub struct RewritingConnector {
    pub path: PathBuf,
    pub delay: Duration,
    pub contents: Vec<u8>,
    pub connects: AtomicUsize,
}

struct RewritingControl {
    path: PathBuf,
    delay: Duration,
    contents: Vec<u8>,
}

#[async_trait]
impl StoreConnector for RewritingConnector {
    async fn connect(&self, _endpoint: &StoreEndpoint) -> Result<Box<dyn StoreControl>, StoreError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(RewritingControl {
            path: self.path.clone(),
            delay: self.delay,
            contents: self.contents.clone(),
        }))
    }
}

#[async_trait]
impl StoreControl for RewritingControl {
    async fn request_save(&mut self, _mode: SaveMode) -> Result<(), StoreError> {
        let path = self.path.clone();
        let delay = self.delay;
        let contents = self.contents.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let temp = path.with_extension("tmp");
            fs::write(&temp, &contents).unwrap();
            fs::rename(&temp, &path).unwrap();
        });
        Ok(())
    }
}

/// Sets the snapshot's modification time an hour into the past so a rewrite
/// is always distinguishable.
pub fn age_file(path: &Path) {
    let file = fs::File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() - Duration::from_secs(3600))
        .unwrap();
}

/// Reports `baseline` for the first `unchanged_reads` reads and a later time
/// afterwards.
pub struct ScriptedMtime {
    pub baseline: SystemTime,
    pub unchanged_reads: usize,
    pub reads: AtomicUsize,
}

impl ScriptedMtime {
    pub fn new(unchanged_reads: usize) -> Self {
        Self {
            baseline: SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000),
            unchanged_reads,
            reads: AtomicUsize::new(0),
        }
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn baseline_stamp(&self) -> SnapshotStamp {
        SnapshotStamp {
            modified: self.baseline,
            len: 1024,
        }
    }
}

impl MtimeSource for ScriptedMtime {
    fn stamp(&self, _path: &Path) -> io::Result<SnapshotStamp> {
        let read = self.reads.fetch_add(1, Ordering::SeqCst) + 1;
        if read <= self.unchanged_reads {
            Ok(self.baseline_stamp())
        } else {
            Ok(SnapshotStamp {
                modified: self.baseline + Duration::from_millis(1),
                len: 2048,
            })
        }
    }
}

/// Modification time that only changes when a test calls [`FakeClock::touch`].
pub struct FakeClock {
    pub stamp: Mutex<SnapshotStamp>,
    pub reads: AtomicUsize,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            stamp: Mutex::new(SnapshotStamp {
                modified: SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000),
                len: 1024,
            }),
            reads: AtomicUsize::new(0),
        }
    }

    pub fn touch(&self) {
        let mut stamp = self.stamp.lock().unwrap();
        stamp.modified += Duration::from_secs(1);
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl MtimeSource for FakeClock {
    fn stamp(&self, _path: &Path) -> io::Result<SnapshotStamp> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(*self.stamp.lock().unwrap())
    }
}

/// Fails every read with `kind` for the first `failing_reads` reads, then
/// reports a changed time.
pub struct FailingMtime {
    pub kind: io::ErrorKind,
    pub failing_reads: usize,
    pub reads: AtomicUsize,
}

impl MtimeSource for FailingMtime {
    fn stamp(&self, _path: &Path) -> io::Result<SnapshotStamp> {
        let read = self.reads.fetch_add(1, Ordering::SeqCst) + 1;
        if read <= self.failing_reads {
            Err(io::Error::new(self.kind, "scripted failure"))
        } else {
            Ok(SnapshotStamp {
                modified: SystemTime::now(),
                len: 1,
            })
        }
    }
}

pub struct FakeRemote {
    pub bucket: String,
    pub exists: bool,
    pub uploads: Mutex<Vec<(String, Vec<u8>)>>,
    pub checks: AtomicUsize,
}

impl FakeRemote {
    pub fn new(exists: bool) -> Self {
        Self {
            bucket: "backups".to_string(),
            exists,
            uploads: Mutex::new(Vec::new()),
            checks: AtomicUsize::new(0),
        }
    }

    pub fn uploads(&self) -> Vec<(String, Vec<u8>)> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteStore for FakeRemote {
    async fn check_bucket(&self) -> Result<(), RemoteError> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        if self.exists {
            Ok(())
        } else {
            Err(RemoteError::BucketNotFound(self.bucket.clone()))
        }
    }

    async fn upload(&self, key: &str, file_path: &Path) -> Result<(), RemoteError> {
        let bytes = fs::read(file_path).map_err(|e| RemoteError::Upload {
            bucket: self.bucket.clone(),
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        self.uploads.lock().unwrap().push((key.to_string(), bytes));
        Ok(())
    }

    async fn object_url(&self, key: &str) -> Result<String, RemoteError> {
        let raw = format!(
            "https://s3.test/{}/{}?X-Amz-Credential={}%2F20240101%2Fus-east-1%2Fs3%2Faws4_request&X-Amz-Signature=feed",
            self.bucket, key, TEST_ACCESS_KEY
        );
        Ok(redact_access_key(&raw, TEST_ACCESS_KEY))
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}
