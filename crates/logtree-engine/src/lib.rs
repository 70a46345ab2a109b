//! logtree-engine: session/record structured logging engine.
//!
//! Organizes log output into sessions (a tree of logical scopes, e.g. one per
//! process run or one per inbound request) and records (typed entries
//! persisted as discrete storage objects). Implements:
//! - A closed label registry resolving symbolic names into typed props
//! - Payload normalization into the canonical form for each data kind
//! - An async open→write→close record lifecycle with per-record ordering
//! - Session-tree composition and draining close semantics
//! - A pluggable storage port (filesystem backend in logtree-fs)
//! - Lifecycle observability via logtree-observe
//!
//! # Architecture
//!
//! ```text
//! write(payload, labels)
//!      │
//!      ▼
//! ┌───────────────┐   ┌──────────────┐   ┌───────────────────────────┐
//! │ label resolve │ → │  normalize   │ → │ open → write → close      │
//! │ (labels.rs)   │   │ (normalize)  │   │ (session.rs / record.rs)  │
//! └───────────────┘   └──────────────┘   └─────────────┬─────────────┘
//!   fails fast,         fails before         allocate/append/finalize
//!   no I/O              any record             via the Store port
//! ```
//!
//! Independent writes on one session interleave freely; each produces its own
//! record. Ordering guarantees hold per record only: its writes land in issue
//! order, and its close never completes ahead of them. The logged list is
//! ordered by close completion.
//!
//! # Example
//!
//! ```no_run
//! use logtree_engine::{Log, MemStore, Props, SessionKind};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let log = Log::new(MemStore::new());
//!     let session = log.open_session(Props::for_session(SessionKind::AppRun)).await?;
//!
//!     let record = session.write("hello", None).await?;
//!     println!("logged {}", record.uri());
//!
//!     session.close().await?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod labels;
pub mod log;
pub mod normalize;
pub mod record;
pub mod session;
pub mod storage;

pub use error::{Error, Result};
pub use labels::{parse_labels, resolve, resolve_names, DataKind, Label, Props, RecordKind, SessionKind};
pub use log::{Log, LogBuilder};
pub use normalize::{Fault, Normalizer, Payload};
pub use record::{Record, RecordState};
pub use session::Session;
pub use storage::{MemStore, RecordSink, SessionHandle, StorageError, Store};

// Re-export key types from dependencies
pub use bytes::Bytes;
pub use logtree_observe::{
    EventBus, EventStream, LifecycleEvent, NoopNotifier, Notifier, RecordEvt, RecordEvtKind,
    SessionEvt, SessionEvtKind,
};
