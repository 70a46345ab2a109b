//! Filesystem storage backend for logtree.
//!
//! Layout: one directory per session under the configured root, one file per
//! record inside it. Record files are named `<seq>-<kind>.<ext>` where the
//! kind tag and extension come from the record's resolved props, so a session
//! directory is browsable without any index. Durability is configurable: with
//! `fsync` enabled, `finalize` syncs file contents before the record is
//! considered logged.

use async_trait::async_trait;
use logtree_engine::{Props, RecordSink, SessionHandle, StorageError, Store};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

/// Configuration for the filesystem store.
#[derive(Debug, Clone)]
pub struct FsConfig {
    /// Directory that holds one subdirectory per session.
    pub root: PathBuf,
    /// Fsync record files on finalize (default: true). Disabling trades
    /// durability for latency; the OS flushes on its own schedule.
    pub fsync: bool,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("logs"),
            fsync: true,
        }
    }
}

impl FsConfig {
    /// Validates the configuration, returning an error if invalid.
    fn validate(&self) -> Result<(), StorageError> {
        if self.root.as_os_str().is_empty() {
            return Err(StorageError::InvalidConfig(
                "root directory must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Filesystem-backed [`Store`].
///
/// # Example
///
/// ```no_run
/// use logtree_engine::{Log, Props, SessionKind};
/// use logtree_fs::{FsConfig, FsStore};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FsStore::open(FsConfig::default()).await?;
///     let log = Log::new(store);
///     let session = log.open_session(Props::for_session(SessionKind::AppRun)).await?;
///     session.write("hello", None).await?;
///     session.close().await?;
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FsStore {
    config: FsConfig,
    session_seq: AtomicU64,
    /// Next record sequence number per session directory.
    record_seqs: Mutex<HashMap<String, u64>>,
}

impl FsStore {
    /// Opens a store, creating the root directory if needed.
    pub async fn open(config: FsConfig) -> Result<Arc<Self>, StorageError> {
        config.validate()?;
        tokio::fs::create_dir_all(&config.root).await?;
        Ok(Arc::new(FsStore {
            config,
            session_seq: AtomicU64::new(0),
            record_seqs: Mutex::new(HashMap::new()),
        }))
    }

    pub fn config(&self) -> &FsConfig {
        &self.config
    }
}

#[async_trait]
impl Store for FsStore {
    async fn open_session(
        &self,
        _parent_uri: Option<&str>,
        props: &Props,
    ) -> Result<SessionHandle, StorageError> {
        // Wall clock plus a process-local counter keeps ids unique and the
        // directory listing roughly chronological.
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| StorageError::Backend(e.to_string()))?
            .as_millis();
        let seq = self.session_seq.fetch_add(1, Ordering::SeqCst);
        let id = format!("{}_{}", millis, seq);

        let dir = self.config.root.join(&id);
        tokio::fs::create_dir_all(&dir).await?;
        tracing::debug!(session = %id, kind = ?props.session_kind(), dir = %dir.display(), "session directory created");

        Ok(SessionHandle {
            uri: dir.to_string_lossy().into_owned(),
            id,
        })
    }

    async fn allocate(
        &self,
        session_uri: &str,
        props: &Props,
    ) -> Result<Box<dyn RecordSink>, StorageError> {
        let seq = {
            let mut seqs = self.record_seqs.lock();
            let seq = seqs.entry(session_uri.to_string()).or_insert(0);
            *seq += 1;
            *seq
        };

        let name = format!(
            "{}-{}.{}",
            seq,
            props.record_kind().storage_tag(),
            props.data_kind().extension()
        );
        let path = Path::new(session_uri).join(name);
        let file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&path)
            .await?;

        Ok(Box::new(FsSink {
            uri: path.to_string_lossy().into_owned(),
            file: Some(file),
            fsync: self.config.fsync,
        }))
    }
}

struct FsSink {
    uri: String,
    file: Option<File>,
    fsync: bool,
}

#[async_trait]
impl RecordSink for FsSink {
    fn uri(&self) -> &str {
        &self.uri
    }

    async fn append(&mut self, chunk: &[u8]) -> Result<(), StorageError> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| StorageError::Backend("record already finalized".to_string()))?;
        file.write_all(chunk).await?;
        Ok(())
    }

    async fn finalize(&mut self) -> Result<(), StorageError> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| StorageError::Backend("record already finalized".to_string()))?;
        file.flush().await?;
        if self.fsync {
            file.sync_all().await?;
        }
        // Released only after a successful commit so a failed finalize can
        // be retried.
        self.file = None;
        Ok(())
    }
}
