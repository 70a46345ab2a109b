//! Storage port: the minimal backend contract the engine requires.
//!
//! Defines the `Store`/`RecordSink` traits that allow pluggable backends:
//! - Filesystem storage for production (logtree-fs crate)
//! - In-memory storage for unit testing (`MemStore` below, with fault
//!   injection so tests can drive storage failures through every pipeline
//!   stage)
//!
//! The engine is agnostic to whether storage is filesystem-based, in-memory,
//! or networked, as long as these operations hold their ordering guarantees:
//! appends on one sink are visible in call order, and `finalize` makes every
//! prior append durable before it returns.

use crate::labels::Props;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Identity a store assigns to a newly opened session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    pub id: String,
    pub uri: String,
}

/// Backend contract for session and record storage.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Establishes storage for a session and assigns its identity. `props`
    /// may drive layout decisions (e.g. directory naming by session kind).
    async fn open_session(
        &self,
        parent_uri: Option<&str>,
        props: &Props,
    ) -> Result<SessionHandle, StorageError>;

    /// Allocates backing storage for one record under a session location.
    /// The returned sink is exclusively owned by that record for its lifetime.
    async fn allocate(
        &self,
        session_uri: &str,
        props: &Props,
    ) -> Result<Box<dyn RecordSink>, StorageError>;
}

/// Exclusive handle to one record's backing storage.
#[async_trait]
pub trait RecordSink: Send {
    fn uri(&self) -> &str;

    /// Appends bytes to the record object.
    async fn append(&mut self, chunk: &[u8]) -> Result<(), StorageError>;

    /// Flushes and durably commits the record object.
    async fn finalize(&mut self) -> Result<(), StorageError>;
}

#[derive(Default)]
struct MemObject {
    data: Vec<u8>,
    finalized: bool,
}

#[derive(Default)]
struct MemState {
    sessions: u64,
    records: u64,
    objects: HashMap<String, MemObject>,
    fail_next_allocate: bool,
    fail_next_append: bool,
    fail_next_finalize: bool,
}

/// In-memory store for tests and embedded use.
///
/// Fault toggles make the next matching operation fail once, so tests can
/// observe error propagation from any pipeline stage.
#[derive(Default)]
pub struct MemStore {
    state: Arc<Mutex<MemState>>,
}

impl MemStore {
    pub fn new() -> Arc<Self> {
        Arc::new(MemStore::default())
    }

    /// Bytes appended to the object at `uri`, if it exists.
    pub fn contents(&self, uri: &str) -> Option<Vec<u8>> {
        self.state.lock().objects.get(uri).map(|o| o.data.clone())
    }

    pub fn is_finalized(&self, uri: &str) -> bool {
        self.state
            .lock()
            .objects
            .get(uri)
            .map(|o| o.finalized)
            .unwrap_or(false)
    }

    pub fn object_count(&self) -> usize {
        self.state.lock().objects.len()
    }

    pub fn fail_next_allocate(&self) {
        self.state.lock().fail_next_allocate = true;
    }

    pub fn fail_next_append(&self) {
        self.state.lock().fail_next_append = true;
    }

    pub fn fail_next_finalize(&self) {
        self.state.lock().fail_next_finalize = true;
    }
}

#[async_trait]
impl Store for MemStore {
    async fn open_session(
        &self,
        parent_uri: Option<&str>,
        _props: &Props,
    ) -> Result<SessionHandle, StorageError> {
        let _ = parent_uri;
        let mut state = self.state.lock();
        state.sessions += 1;
        let id = format!("s{}", state.sessions);
        Ok(SessionHandle {
            uri: format!("mem://{}", id),
            id,
        })
    }

    async fn allocate(
        &self,
        session_uri: &str,
        props: &Props,
    ) -> Result<Box<dyn RecordSink>, StorageError> {
        let mut state = self.state.lock();
        if std::mem::take(&mut state.fail_next_allocate) {
            return Err(StorageError::Backend("injected allocate failure".into()));
        }
        state.records += 1;
        let uri = format!(
            "{}/{}-{}.{}",
            session_uri,
            state.records,
            props.record_kind().storage_tag(),
            props.data_kind().extension()
        );
        state.objects.insert(uri.clone(), MemObject::default());
        Ok(Box::new(MemSink {
            uri,
            state: Arc::clone(&self.state),
        }))
    }
}

struct MemSink {
    uri: String,
    state: Arc<Mutex<MemState>>,
}

#[async_trait]
impl RecordSink for MemSink {
    fn uri(&self) -> &str {
        &self.uri
    }

    async fn append(&mut self, chunk: &[u8]) -> Result<(), StorageError> {
        let mut state = self.state.lock();
        if std::mem::take(&mut state.fail_next_append) {
            return Err(StorageError::Backend("injected append failure".into()));
        }
        let object = state
            .objects
            .get_mut(&self.uri)
            .ok_or_else(|| StorageError::Backend(format!("missing object: {}", self.uri)))?;
        if object.finalized {
            return Err(StorageError::Backend("append after finalize".into()));
        }
        object.data.extend_from_slice(chunk);
        Ok(())
    }

    async fn finalize(&mut self) -> Result<(), StorageError> {
        let mut state = self.state.lock();
        if std::mem::take(&mut state.fail_next_finalize) {
            return Err(StorageError::Backend("injected finalize failure".into()));
        }
        let object = state
            .objects
            .get_mut(&self.uri)
            .ok_or_else(|| StorageError::Backend(format!("missing object: {}", self.uri)))?;
        object.finalized = true;
        Ok(())
    }
}
