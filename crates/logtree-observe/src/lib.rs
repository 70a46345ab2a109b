//! logtree-observe: vendor-neutral lifecycle notification ABI.
//!
//! The engine publishes session and record lifecycle transitions through the
//! `Notifier` trait. Core crates depend only on this trait and the event
//! types; concrete backends (metrics exporters, test buses) live elsewhere.

use std::sync::Arc;
use tokio::sync::mpsc;

/// Receives lifecycle events from the engine.
///
/// Implementations must not block: `emit` is called from the engine's own
/// task context on every transition.
pub trait Notifier: Send + Sync + 'static {
    fn emit(&self, evt: LifecycleEvent);
}

/// A do-nothing notifier for callers who don't observe lifecycle events.
#[derive(Clone, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn emit(&self, _evt: LifecycleEvent) {}
}

/// Typed lifecycle events (payload bytes are never included).
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LifecycleEvent {
    Session(SessionEvt),
    Record(RecordEvt),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionEvt {
    pub session: String,
    pub kind: SessionEvtKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvtKind {
    Opened { parent: Option<String> },
    Closing,
    Closed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordEvt {
    pub session: String,
    pub record: String,
    pub kind: RecordEvtKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordEvtKind {
    Opened,
    Closed,
}

/// Channel-backed notifier for tests and in-process monitoring.
///
/// Events arrive on the paired [`EventStream`] in emission order, which for
/// record-close events is completion order, not open order.
pub struct EventBus {
    tx: mpsc::UnboundedSender<LifecycleEvent>,
}

impl EventBus {
    /// Creates a bus and the stream that receives its events.
    pub fn channel() -> (Arc<EventBus>, EventStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(EventBus { tx }), EventStream { rx })
    }
}

impl Notifier for EventBus {
    fn emit(&self, evt: LifecycleEvent) {
        // Receiver may be gone; monitoring is best-effort.
        let _ = self.tx.send(evt);
    }
}

/// Receiving side of an [`EventBus`].
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<LifecycleEvent>,
}

impl EventStream {
    /// Next event, or `None` once every bus handle is dropped.
    pub async fn next(&mut self) -> Option<LifecycleEvent> {
        self.rx.recv().await
    }

    /// Waits until `count` records have closed, returning their identities in
    /// the order the closes completed. Other events are skipped.
    pub async fn wait_for_closed_records(&mut self, count: usize) -> Vec<String> {
        let mut closed = Vec::with_capacity(count);
        while closed.len() < count {
            match self.rx.recv().await {
                Some(LifecycleEvent::Record(evt)) if evt.kind == RecordEvtKind::Closed => {
                    closed.push(evt.record);
                }
                Some(_) => {}
                None => break,
            }
        }
        closed
    }

    /// Waits until the named session reports `Closed`.
    pub async fn wait_for_session_closed(&mut self, session: &str) {
        while let Some(evt) = self.rx.recv().await {
            if let LifecycleEvent::Session(evt) = evt {
                if evt.session == session && evt.kind == SessionEvtKind::Closed {
                    return;
                }
            }
        }
    }
}
