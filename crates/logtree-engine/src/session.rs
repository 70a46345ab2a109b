//! Session: a node in the logging scope tree.
//!
//! A session creates records, tracks which are open vs. logged, and exposes
//! its own close lifecycle. Independent writes against one session may
//! interleave freely; each produces its own record, so the logged list is
//! ordered by close completion, not by call order. Collections are mutated
//! only by the session itself in response to record lifecycle transitions.

use crate::error::{Error, Result};
use crate::labels::{self, Label, Props};
use crate::log::Log;
use crate::normalize::{normalize, Payload};
use crate::record::Record;
use crate::storage::SessionHandle;
use logtree_observe::{LifecycleEvent, RecordEvt, RecordEvtKind, SessionEvt, SessionEvtKind};
use std::sync::Arc;
use tokio::sync::{watch, Notify};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Active,
    Closing,
    Closed,
}

struct SessionState {
    phase: Phase,
    /// `open_record` calls admitted but not yet registered (storage
    /// allocation in flight). Close waits for these too.
    pending_opens: usize,
    open: Vec<Arc<Record>>,
    logged: Vec<Arc<Record>>,
    children: Vec<watch::Receiver<bool>>,
}

/// A logical scope of logging activity (a process run, a request, ...) that
/// owns records and may have child sessions.
pub struct Session {
    log: Log,
    id: String,
    parent_id: Option<String>,
    props: Props,
    uri: String,
    state: parking_lot::Mutex<SessionState>,
    /// Signaled whenever the open set or the pending-open count shrinks.
    drained: Notify,
    closed_tx: watch::Sender<bool>,
    closed_rx: watch::Receiver<bool>,
}

impl Session {
    pub(crate) fn new(
        log: Log,
        handle: SessionHandle,
        parent_id: Option<String>,
        props: Props,
    ) -> Arc<Session> {
        let (closed_tx, closed_rx) = watch::channel(false);
        Arc::new(Session {
            log,
            id: handle.id,
            parent_id,
            props,
            uri: handle.uri,
            state: parking_lot::Mutex::new(SessionState {
                phase: Phase::Active,
                pending_opens: 0,
                open: Vec::new(),
                logged: Vec::new(),
                children: Vec::new(),
            }),
            drained: Notify::new(),
            closed_tx,
            closed_rx,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }

    pub fn props(&self) -> &Props {
        &self.props
    }

    /// Resolved storage location for this session's records.
    pub fn storage_uri(&self) -> &str {
        &self.uri
    }

    /// Snapshot of records created but not yet closed. Never blocks.
    pub fn open_records(&self) -> Vec<Arc<Record>> {
        self.state.lock().open.clone()
    }

    /// Snapshot of completed records, in the order their closes finished.
    /// Never blocks.
    pub fn logged_records(&self) -> Vec<Arc<Record>> {
        self.state.lock().logged.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().phase == Phase::Closed
    }

    pub(crate) fn subscribe_closed(&self) -> watch::Receiver<bool> {
        self.closed_rx.clone()
    }

    pub(crate) fn register_child(&self, child: &Session) -> Result<()> {
        let mut state = self.state.lock();
        if state.phase != Phase::Active {
            return Err(Error::SessionClosed);
        }
        state.children.push(child.subscribe_closed());
        Ok(())
    }

    /// Allocates a new record scoped to this session's storage location.
    ///
    /// Fails with `SessionClosed` once close has begun.
    pub async fn open_record(self: &Arc<Self>, props: Props) -> Result<Arc<Record>> {
        {
            let mut state = self.state.lock();
            if state.phase != Phase::Active {
                return Err(Error::SessionClosed);
            }
            state.pending_opens += 1;
        }

        let allocated = self.log.store().allocate(&self.uri, &props).await;

        let record = {
            let mut state = self.state.lock();
            state.pending_opens -= 1;
            match allocated {
                Ok(sink) => {
                    let record =
                        Record::new(props, sink, self.id.clone(), Arc::downgrade(self));
                    state.open.push(Arc::clone(&record));
                    record
                }
                Err(err) => {
                    drop(state);
                    self.drained.notify_waiters();
                    return Err(err.into());
                }
            }
        };

        tracing::debug!(session = %self.id, record = %record.uri(), "record opened");
        self.log.notifier().emit(LifecycleEvent::Record(RecordEvt {
            session: self.id.clone(),
            record: record.uri().to_string(),
            kind: RecordEvtKind::Opened,
        }));
        Ok(record)
    }

    /// Moves a record from the open set to the logged list. Called by the
    /// record itself, exactly once, on reaching Closed.
    pub(crate) fn record_closed(&self, record: &Arc<Record>) {
        {
            let mut state = self.state.lock();
            let Some(pos) = state.open.iter().position(|r| Arc::ptr_eq(r, record)) else {
                return;
            };
            let record = state.open.remove(pos);
            state.logged.push(record);
        }

        tracing::debug!(session = %self.id, record = %record.uri(), "record logged");
        self.log.notifier().emit(LifecycleEvent::Record(RecordEvt {
            session: self.id.clone(),
            record: record.uri().to_string(),
            kind: RecordEvtKind::Closed,
        }));
        self.drained.notify_waiters();
    }

    /// The one-shot write pipeline: resolve labels, normalize the payload,
    /// open a record, write it, close it.
    ///
    /// With no explicit labels the payload's shape picks the defaults (text →
    /// `DATA_TEXT`, bytes → `DATA_BINARY`, structured → `DATA_JSON`). The
    /// first failing stage short-circuits the rest; the caller always gets
    /// exactly one outcome. A close failure after a successful write surfaces
    /// the error and leaves the record outstanding in the open set.
    pub async fn write(
        self: &Arc<Self>,
        payload: impl Into<Payload>,
        explicit: Option<&[Label]>,
    ) -> Result<Arc<Record>> {
        let payload = payload.into();
        let defaults;
        let explicit = match explicit {
            Some(labels) => labels,
            None => {
                defaults = payload.default_labels();
                &defaults
            }
        };

        let props = labels::resolve(explicit, self.log.record_defaults());
        let data = normalize(&payload, &props, self.log.normalizers())?;

        let record = self.open_record(props).await?;
        match record.write(&data).await {
            Ok(()) => {
                record.close().await?;
                Ok(record)
            }
            Err(err) => {
                // Best-effort close; the write error is the one the caller sees.
                if let Err(close_err) = record.close().await {
                    tracing::warn!(
                        record = %record.uri(),
                        error = %close_err,
                        "failed to close record after write error"
                    );
                }
                Err(err)
            }
        }
    }

    /// Opens a child session nested under this one.
    ///
    /// The child's lifecycle is not owned by this session: closing the parent
    /// waits for children but never force-closes them.
    pub async fn open_child(self: &Arc<Self>, props: Props) -> Result<Arc<Session>> {
        if self.state.lock().phase != Phase::Active {
            return Err(Error::SessionClosed);
        }
        self.log.open_session_under(props, Some(self)).await
    }

    /// Waits until the session has no open records and no in-flight opens,
    /// without closing it. New records may be opened afterwards.
    pub async fn wait_idle(&self) {
        loop {
            let drained = self.drained.notified();
            {
                let state = self.state.lock();
                if state.open.is_empty() && state.pending_opens == 0 {
                    return;
                }
            }
            drained.await;
        }
    }

    /// Marks the session as closing, waits for every open record (including
    /// in-flight opens) and every child session to close, then resolves.
    ///
    /// Idempotent: later and concurrent calls await the same completion.
    pub async fn close(self: &Arc<Self>) -> Result<()> {
        let initiator = {
            let mut state = self.state.lock();
            match state.phase {
                Phase::Active => {
                    state.phase = Phase::Closing;
                    true
                }
                _ => false,
            }
        };

        if !initiator {
            let mut closed = self.closed_rx.clone();
            // The sender lives in `self`, so this only resolves on close.
            let _ = closed.wait_for(|done| *done).await;
            return Ok(());
        }

        tracing::debug!(session = %self.id, "session closing");
        self.log.notifier().emit(LifecycleEvent::Session(SessionEvt {
            session: self.id.clone(),
            kind: SessionEvtKind::Closing,
        }));

        self.wait_idle().await;

        // Wait for children; never force them closed.
        let children = self.state.lock().children.clone();
        for mut child in children {
            // A dropped sender means the child is gone, which is as closed
            // as it will ever be.
            let _ = child.wait_for(|done| *done).await;
        }

        self.state.lock().phase = Phase::Closed;
        let _ = self.closed_tx.send(true);

        tracing::debug!(session = %self.id, "session closed");
        self.log.notifier().emit(LifecycleEvent::Session(SessionEvt {
            session: self.id.clone(),
            kind: SessionEvtKind::Closed,
        }));
        Ok(())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("parent_id", &self.parent_id)
            .field("open", &state.open.len())
            .field("logged", &state.logged.len())
            .finish()
    }
}
