//! Record state machine: Open → Closing → Closed.
//!
//! A record owns its storage sink exclusively. All I/O goes through one async
//! mutex, which gives the two ordering guarantees callers rely on: writes on
//! one record complete in issue order, and `close` cannot finish ahead of any
//! write that entered the queue before it.

use crate::error::{Error, Result};
use crate::labels::Props;
use crate::session::Session;
use crate::storage::RecordSink;
use std::sync::{Arc, Weak};
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    Open,
    /// Close begun; writes are rejected. A record stays here if finalization
    /// fails, remaining in its session's open set as an outstanding record.
    Closing,
    Closed,
}

/// A single persisted log entry with a declared kind and data type.
///
/// Created by [`Session::open_record`]; belongs to that session for its
/// entire lifetime.
pub struct Record {
    props: Props,
    uri: String,
    session_id: String,
    session: Weak<Session>,
    state: parking_lot::Mutex<RecordState>,
    io: Mutex<Option<Box<dyn RecordSink>>>,
}

impl Record {
    pub(crate) fn new(
        props: Props,
        sink: Box<dyn RecordSink>,
        session_id: String,
        session: Weak<Session>,
    ) -> Arc<Record> {
        Arc::new(Record {
            props,
            uri: sink.uri().to_string(),
            session_id,
            session,
            state: parking_lot::Mutex::new(RecordState::Open),
            io: Mutex::new(Some(sink)),
        })
    }

    /// Resolved creation properties. Fixed at open time.
    pub fn props(&self) -> &Props {
        &self.props
    }

    /// Storage location of this record's object.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Identity of the owning session.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Current lifecycle state. Never blocks.
    pub fn state(&self) -> RecordState {
        *self.state.lock()
    }

    /// Appends a chunk to the record's storage.
    ///
    /// Fails with `RecordClosed` once close has begun. Sequential calls are
    /// durably ordered; concurrent calls are serialized in arrival order.
    pub async fn write(&self, chunk: &[u8]) -> Result<()> {
        let mut io = self.io.lock().await;
        if *self.state.lock() != RecordState::Open {
            return Err(Error::RecordClosed);
        }
        let sink = io.as_mut().ok_or(Error::RecordClosed)?;
        sink.append(chunk).await?;
        Ok(())
    }

    /// Flushes pending writes, finalizes storage, and transitions to Closed.
    ///
    /// Idempotent: closing an already-Closed record is an Ok no-op. Waits for
    /// in-flight writes (they hold the I/O lock). On finalize failure the
    /// record stays Closing and outstanding; a later retry may complete it.
    pub async fn close(self: &Arc<Self>) -> Result<()> {
        let mut io = self.io.lock().await;
        {
            let mut state = self.state.lock();
            if *state == RecordState::Closed {
                return Ok(());
            }
            *state = RecordState::Closing;
        }

        let sink = io.as_mut().ok_or(Error::RecordClosed)?;
        sink.finalize().await?;
        *io = None;
        *self.state.lock() = RecordState::Closed;
        drop(io);

        if let Some(session) = self.session.upgrade() {
            session.record_closed(self);
        }
        Ok(())
    }
}

impl std::fmt::Debug for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Record")
            .field("uri", &self.uri)
            .field("session", &self.session_id)
            .field("state", &self.state())
            .finish()
    }
}
