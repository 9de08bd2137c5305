//! Process-wide lifecycle state
//!
//! One explicit, injectable object owning every field the restart machinery
//! coordinates through: the dirty and restarted flags, the application
//! identity, the asset search path, and the active code context. A single
//! `reset()` re-establishes initial values; it runs at construction and on
//! demand (test isolation).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use hearth_kernel::{CodeContext, RestartEvent};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::debug;

use crate::identity::{AppIdentity, IdentitySource};

/// The cached asset search path.
///
/// A derived value (defaulted from the application package) is cleared on
/// restart so it can be re-derived; an explicitly assigned one overrides
/// the default permanently.
#[derive(Debug, Default)]
struct SearchPath {
    value: Option<Vec<String>>,
    explicit: bool,
}

/// Shared lifecycle state for one host process.
pub struct LifecycleState {
    dirty: AtomicBool,
    restarted: AtomicBool,
    identity: Mutex<AppIdentity>,
    identity_source: Box<dyn IdentitySource>,
    // Dedicated lock, never taken together with the restart lock's critical
    // sections' collaborator calls.
    search_path: Mutex<SearchPath>,
    default_context: Arc<dyn CodeContext>,
    active_context: Mutex<Arc<dyn CodeContext>>,
    event_tx: broadcast::Sender<RestartEvent>,
}

impl LifecycleState {
    /// Create lifecycle state in its initial configuration: clean, not
    /// restarted, identity unresolved, `default_context` active.
    pub fn new(
        default_context: Arc<dyn CodeContext>,
        identity_source: impl IdentitySource + 'static,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(1024);

        Self {
            dirty: AtomicBool::new(false),
            restarted: AtomicBool::new(false),
            identity: Mutex::new(AppIdentity::default()),
            identity_source: Box::new(identity_source),
            search_path: Mutex::new(SearchPath::default()),
            active_context: Mutex::new(default_context.clone()),
            default_context,
            event_tx,
        }
    }

    /// Subscribe to restart lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<RestartEvent> {
        self.event_tx.subscribe()
    }

    /// Broadcast an event; send failures (no subscribers) are ignored.
    pub(crate) fn emit(&self, event: RestartEvent) {
        let _ = self.event_tx.send(event);
    }

    // --- dirty flag ---

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    /// Set the dirty flag. Returns `true` only on the clean-to-dirty
    /// transition.
    pub(crate) fn mark_dirty(&self) -> bool {
        !self.dirty.swap(true, Ordering::SeqCst)
    }

    pub(crate) fn clear_dirty(&self) {
        self.dirty.store(false, Ordering::SeqCst);
    }

    // --- restarted flag ---

    pub fn has_restarted(&self) -> bool {
        self.restarted.load(Ordering::SeqCst)
    }

    /// Mark that a restart attempt has begun; permanently freezes identity
    /// inference.
    pub(crate) fn mark_restarted(&self) {
        self.restarted.store(true, Ordering::SeqCst);
        self.identity.lock().freeze();
    }

    // --- identity ---

    /// Resolve identity from the injected source unless already resolved or
    /// frozen. Idempotent; called before any read of identity or the
    /// search path.
    pub fn resolve_if_needed(&self) {
        let newly_resolved = {
            let mut identity = self.identity.lock();
            if !identity.resolve_with(self.identity_source.as_ref()) {
                return;
            }
            (
                identity.entry_name().map(String::from),
                identity.package().map(String::from),
            )
        };

        self.emit(RestartEvent::IdentityResolved {
            entry: newly_resolved.0,
            package: newly_resolved.1,
        });
    }

    /// Snapshot of the current identity.
    pub fn identity(&self) -> AppIdentity {
        self.identity.lock().clone()
    }

    pub fn entry_name(&self) -> Option<String> {
        self.identity.lock().entry_name().map(String::from)
    }

    // --- search path ---

    /// The asset search path. Triggers identity resolution, then defaults
    /// to `[package]` if never explicitly set; an unresolved package yields
    /// an empty path and leaves the default un-cached so a later read may
    /// still derive it.
    pub fn path(&self) -> Vec<String> {
        self.resolve_if_needed();

        let mut path = self.search_path.lock();
        if path.value.is_none() {
            if let Some(package) = self.identity.lock().package().map(String::from) {
                debug!(package = %package, "Defaulting search path to application package");
                path.value = Some(vec![package]);
            }
        }

        path.value.clone().unwrap_or_default()
    }

    /// Unconditionally overwrite the search path. Future reads never apply
    /// the package-derived default again.
    pub fn set_path<I, S>(&self, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut path = self.search_path.lock();
        path.value = Some(paths.into_iter().map(Into::into).collect());
        path.explicit = true;
    }

    /// Drop the cached derived path so the next read re-derives it. An
    /// explicitly assigned path is kept.
    pub(crate) fn clear_derived_path(&self) {
        let mut path = self.search_path.lock();
        if !path.explicit {
            path.value = None;
        }
    }

    // --- active code context ---

    pub fn active_context(&self) -> Arc<dyn CodeContext> {
        self.active_context.lock().clone()
    }

    pub fn default_context(&self) -> Arc<dyn CodeContext> {
        self.default_context.clone()
    }

    /// Replace the active context wholesale. The previous context is
    /// abandoned and reclaimed once its last handle drops.
    pub(crate) fn install_context(&self, context: Arc<dyn CodeContext>) {
        debug!(context = context.id(), "Installing new active code context");
        *self.active_context.lock() = context;
    }

    // --- reset ---

    /// Return every field to its initial state: identity unresolved, flags
    /// clear, search path unset, default context active. Safe to call
    /// repeatedly.
    pub fn reset(&self) {
        self.identity.lock().reset();
        self.restarted.store(false, Ordering::SeqCst);
        self.dirty.store(false, Ordering::SeqCst);
        *self.search_path.lock() = SearchPath::default();
        *self.active_context.lock() = self.default_context.clone();
    }
}
