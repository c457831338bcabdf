//! Template dependency tracking.
//!
//! Every time the compiler resolves a nested template reference (an include,
//! a base template, or a macro import), it records one [`DependencyEvent`]
//! here. The log is append-only and strictly ordered: for a single compile
//! invocation, events appear in the exact order the compiler resolved the
//! references (a parent's edge before the edges of the file it pulled in,
//! siblings in textual order). Across different source files no ordering is
//! guaranteed.
//!
//! Events are never deduplicated, batched, or reordered. A child included from
//! three parents shows up as three edges. Consumers such as watch-mode
//! rebuilders subscribe with [`DependencyTracker::subscribe`] and receive each
//! event synchronously at the moment it is recorded.

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// One resolved inclusion edge: `parent` pulled in `child` during compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyEvent {
    /// Path of the template that contained the include directive.
    pub parent: PathBuf,
    /// Resolved path of the included template.
    pub child: PathBuf,
}

impl fmt::Display for DependencyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.parent.display(), self.child.display())
    }
}

type Listener = Arc<dyn Fn(&DependencyEvent) + Send + Sync>;

#[derive(Default)]
struct TrackerInner {
    events: Vec<DependencyEvent>,
    listeners: Vec<Listener>,
}

/// Shared, append-only log of template inclusion edges.
///
/// Cloning is cheap; all clones observe the same log. The tracker is handed to
/// each transform instance by the bundler so that every compile in a build
/// feeds one log.
#[derive(Clone, Default)]
pub struct DependencyTracker {
    inner: Arc<Mutex<TrackerInner>>,
}

impl DependencyTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one inclusion edge and deliver it to every subscriber before
    /// returning.
    ///
    /// The event is appended to the log first and listeners run with the lock
    /// released, so a listener is free to call back into the tracker (for
    /// example [`events`](Self::events) or [`len`](Self::len)) and will see
    /// the event it is being handed.
    pub fn record(&self, parent: impl Into<PathBuf>, child: impl Into<PathBuf>) {
        let event = DependencyEvent {
            parent: parent.into(),
            child: child.into(),
        };
        tracing::debug!("template dependency: {}", event);

        // A poisoned lock means a listener panicked; the log itself is still
        // consistent, so keep appending.
        let listeners = {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            inner.events.push(event.clone());
            inner.listeners.clone()
        };
        for listener in &listeners {
            listener(&event);
        }
    }

    /// Register a listener invoked synchronously for every subsequently
    /// recorded event. Events recorded before subscription are not replayed;
    /// use [`events`](Self::events) to read the backlog.
    pub fn subscribe(&self, listener: impl Fn(&DependencyEvent) + Send + Sync + 'static) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.listeners.push(Arc::new(listener));
    }

    /// Snapshot of all events recorded so far, in recording order.
    #[must_use]
    pub fn events(&self) -> Vec<DependencyEvent> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.events.clone()
    }

    /// Number of events recorded so far.
    #[must_use]
    pub fn len(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.events.len()
    }

    /// Whether no events have been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for DependencyTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        f.debug_struct("DependencyTracker")
            .field("events", &inner.events)
            .field("listeners", &inner.listeners.len())
            .finish()
    }
}
