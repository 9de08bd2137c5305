//! Change tracker
//!
//! The single shared "dirty" signal. Watchers (filesystem or host-driven)
//! call [`ChangeTracker::notify_change`]; the flag is cleared only by a
//! completed restart pass.

use std::sync::Arc;

use hearth_kernel::RestartEvent;
use tracing::info;

use crate::lifecycle::LifecycleState;

/// Cloneable handle for flagging detected code/resource changes.
#[derive(Clone)]
pub struct ChangeTracker {
    state: Arc<LifecycleState>,
}

impl ChangeTracker {
    pub fn new(state: Arc<LifecycleState>) -> Self {
        Self { state }
    }

    /// Flag that application code or resources changed.
    ///
    /// Idempotent: only the clean-to-dirty transition logs and broadcasts
    /// [`RestartEvent::ChangesDetected`]; calling while already dirty is a
    /// pure no-op.
    pub fn notify_change(&self) {
        if !self.state.mark_dirty() {
            return;
        }

        info!("Detected application code or resource changes");
        self.state.emit(RestartEvent::ChangesDetected);
    }

    pub fn is_dirty(&self) -> bool {
        self.state.is_dirty()
    }
}
