//! Hot-restart support for the hearth application host
//!
//! Tracks whether the running application's code or resources have become
//! stale and, when so, tears the application down and reloads it inside a
//! fresh isolated code context, re-invoking its entry point with the
//! original process arguments:
//! - Change tracking with idempotent dirty-flagging
//! - Single-writer restart under a dedicated lock
//! - Lazy one-shot application identity resolution, frozen after the first
//!   restart
//! - File watching that feeds the change tracker
//! - Dynamic entry-point loading from shared libraries

mod coordinator;
mod host;
mod identity;
mod lifecycle;
mod tracker;
mod watcher;

pub use coordinator::{
    DriverHandle, ReloadCoordinator, ReloadError, RestartOutcome, RestartReport,
};
pub use host::{DylibCodeContext, DylibCodeHost, ENTRY_SYMBOL};
pub use identity::{
    AppIdentity, IdentitySource, IdentityState, ProcessIdentitySource, StaticIdentitySource,
};
pub use lifecycle::LifecycleState;
pub use tracker::ChangeTracker;
pub use watcher::{ChangeWatcher, WatchConfig, WatchError};

// Re-export the kernel contracts the coordinator is wired with.
pub use hearth_kernel::{
    CodeContext, CodeError, CodeHost, ConfigSource, ContextScanner, EntryPoint, RestartEvent,
    Setup, SetupRegistry, Subsystem,
};
