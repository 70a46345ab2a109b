//! The process-wide logging root.
//!
//! A `Log` owns the storage backend, the lifecycle notifier, the normalizer
//! registry, and the default record props. It is a cheap clonable handle;
//! sessions keep one and reach through it for shared services.

use crate::error::Result;
use crate::labels::Props;
use crate::normalize::Normalizer;
use crate::session::Session;
use crate::storage::Store;
use logtree_observe::{LifecycleEvent, NoopNotifier, Notifier, SessionEvt, SessionEvtKind};
use std::sync::Arc;

struct LogInner {
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
    normalizers: Vec<Arc<dyn Normalizer>>,
    record_defaults: Props,
}

/// Handle to a logging root.
#[derive(Clone)]
pub struct Log {
    inner: Arc<LogInner>,
}

/// Builder for a [`Log`]. Normalizers and the notifier are fixed at build
/// time; collaborators register their normalizers here.
pub struct LogBuilder {
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
    normalizers: Vec<Arc<dyn Normalizer>>,
    record_defaults: Props,
}

impl LogBuilder {
    /// Replaces the no-op notifier.
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Registers a normalizer for custom payload shapes. Consulted in
    /// registration order.
    pub fn normalizer(mut self, normalizer: Arc<dyn Normalizer>) -> Self {
        self.normalizers.push(normalizer);
        self
    }

    /// Overrides the default props merged under every record's labels.
    pub fn record_defaults(mut self, props: Props) -> Self {
        self.record_defaults = props;
        self
    }

    pub fn build(self) -> Log {
        Log {
            inner: Arc::new(LogInner {
                store: self.store,
                notifier: self.notifier,
                normalizers: self.normalizers,
                record_defaults: self.record_defaults,
            }),
        }
    }
}

impl Log {
    pub fn builder(store: Arc<dyn Store>) -> LogBuilder {
        LogBuilder {
            store,
            notifier: Arc::new(NoopNotifier),
            normalizers: Vec::new(),
            record_defaults: Props::record_defaults(),
        }
    }

    /// A log with default settings over the given store.
    pub fn new(store: Arc<dyn Store>) -> Log {
        Log::builder(store).build()
    }

    /// Opens a root session. Resolves once the session's storage identity is
    /// established.
    pub async fn open_session(&self, props: Props) -> Result<Arc<Session>> {
        self.open_session_under(props, None).await
    }

    pub(crate) async fn open_session_under(
        &self,
        props: Props,
        parent: Option<&Arc<Session>>,
    ) -> Result<Arc<Session>> {
        let handle = self
            .inner
            .store
            .open_session(parent.map(|p| p.storage_uri()), &props)
            .await?;
        let parent_id = parent.map(|p| p.id().to_string());
        let session = Session::new(self.clone(), handle, parent_id.clone(), props);

        if let Some(parent) = parent {
            // Re-checked under the parent's lock: a parent that began closing
            // while we were allocating takes no new children.
            parent.register_child(&session)?;
        }

        tracing::debug!(session = %session.id(), parent = ?parent_id, "session opened");
        self.inner.notifier.emit(LifecycleEvent::Session(SessionEvt {
            session: session.id().to_string(),
            kind: SessionEvtKind::Opened { parent: parent_id },
        }));
        Ok(session)
    }

    pub(crate) fn store(&self) -> &Arc<dyn Store> {
        &self.inner.store
    }

    pub(crate) fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.inner.notifier
    }

    pub(crate) fn normalizers(&self) -> &[Arc<dyn Normalizer>] {
        &self.inner.normalizers
    }

    pub(crate) fn record_defaults(&self) -> &Props {
        &self.inner.record_defaults
    }
}
