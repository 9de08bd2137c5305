//! Restart lifecycle events
//!
//! Broadcast by the restart machinery so hosts can observe dirty-flagging
//! and restart progress without polling.

use std::time::Duration;

/// Restart lifecycle event
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum RestartEvent {
    /// Code or resource changes were detected; emitted exactly once per
    /// clean-to-dirty transition.
    ChangesDetected,
    /// Application identity was resolved.
    IdentityResolved {
        entry: Option<String>,
        package: Option<String>,
    },
    /// A restart procedure has begun.
    RestartStarted,
    /// The application was reloaded and its entry point re-invoked.
    RestartCompleted { duration: Duration },
    /// The restart procedure aborted; the previous application code keeps
    /// running and a new change notification is required to retry.
    RestartFailed { error: String },
}
