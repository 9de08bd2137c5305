//! Reload coordinator
//!
//! The restart state machine. Under a dedicated lock it resets the
//! configuration, subsystem, and setup collaborators, installs a fresh
//! isolated code context, and re-invokes the application entry point with
//! the originally captured arguments.

use std::sync::Arc;
use std::time::{Duration, Instant};

use hearth_kernel::config::ConfigError;
use hearth_kernel::{
    CodeError, CodeHost, ConfigSource, ContextScanner, RestartEvent, SetupError, SetupRegistry,
    Subsystem, SubsystemError,
};
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::lifecycle::LifecycleState;
use crate::tracker::ChangeTracker;

/// Restart error types
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ReloadError {
    /// Usage error: restart was requested before the application entry
    /// point could be resolved. The dirty flag is left untouched.
    #[error("Cannot restart, the application entry point is unknown")]
    EntryUnknown,

    #[error("Configuration reload failed: {0}")]
    Config(#[from] ConfigError),

    #[error("Subsystem reset failed: {0}")]
    Subsystem(#[from] SubsystemError),

    #[error("Setup reload failed: {0}")]
    Setup(#[from] SetupError),

    #[error("Code host error: {0}")]
    Code(#[from] CodeError),
}

/// Outcome of a [`ReloadCoordinator::restart_if_dirty`] pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartOutcome {
    /// Nothing to do: the dirty flag was clear (possibly because a
    /// concurrent caller already handled the restart).
    Clean,
    /// A full restart ran and the entry point was re-invoked.
    Restarted,
    /// A restart ran but the entry point was missing from the new context;
    /// the previous application code keeps running. The dirty flag is
    /// cleared regardless, so a new change notification is required before
    /// another attempt.
    Failed,
}

/// Report of one restart procedure.
#[derive(Debug)]
pub struct RestartReport {
    /// Whether the entry point was loaded and re-invoked.
    pub success: bool,
    /// Error message if the entry point was missing.
    pub error: Option<String>,
    /// Restart duration.
    pub duration: Duration,
}

/// The restart state machine.
///
/// At most one restart executes at a time; `restart_if_dirty` checks the
/// dirty flag without the lock first so the clean case stays cheap under
/// high-frequency polling.
pub struct ReloadCoordinator {
    state: Arc<LifecycleState>,
    config: Arc<dyn ConfigSource>,
    setups: Arc<dyn SetupRegistry>,
    code_host: Arc<dyn CodeHost>,
    subsystems: Vec<Arc<dyn Subsystem>>,
    scanners: Vec<Arc<dyn ContextScanner>>,
    // Dedicated to restart and default-setup initialization; unrelated
    // lifecycle reads never contend on it.
    restart_lock: Mutex<()>,
}

impl ReloadCoordinator {
    /// Wire up a coordinator and bring all lifecycle state to its initial
    /// configuration (the process-boot reset).
    pub fn new(
        state: Arc<LifecycleState>,
        config: Arc<dyn ConfigSource>,
        setups: Arc<dyn SetupRegistry>,
        code_host: Arc<dyn CodeHost>,
    ) -> Self {
        let coordinator = Self {
            state,
            config,
            setups,
            code_host,
            subsystems: Vec::new(),
            scanners: Vec::new(),
            restart_lock: Mutex::new(()),
        };
        coordinator.reset_all();
        coordinator
    }

    /// Register a resettable subsystem (resource lookup, templating,
    /// codecs, ...). Reset order is registration order.
    pub fn with_subsystem(mut self, subsystem: Arc<dyn Subsystem>) -> Self {
        self.subsystems.push(subsystem);
        self
    }

    /// Register a context scanner to be repointed at each new context.
    pub fn with_scanner(mut self, scanner: Arc<dyn ContextScanner>) -> Self {
        self.scanners.push(scanner);
        self
    }

    /// Subscribe to restart lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<RestartEvent> {
        self.state.subscribe()
    }

    /// A change-tracker handle for watchers.
    pub fn tracker(&self) -> ChangeTracker {
        ChangeTracker::new(self.state.clone())
    }

    /// The shared lifecycle state.
    pub fn state(&self) -> Arc<LifecycleState> {
        self.state.clone()
    }

    /// The asset search path (see [`LifecycleState::path`]).
    pub fn path(&self) -> Vec<String> {
        self.state.path()
    }

    /// Overwrite the asset search path permanently.
    pub fn set_path<I, S>(&self, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state.set_path(paths);
    }

    /// The externally triggered check: restart when dirty, otherwise do
    /// nothing.
    ///
    /// Callers blocked behind an in-flight restart re-check the flag once
    /// the lock is released and typically find it already cleared. The
    /// dirty flag transitions back to clean only after the restart
    /// procedure completes, on success and on the handled entry-missing
    /// failure alike; a propagated error leaves it set.
    pub fn restart_if_dirty(&self) -> Result<RestartOutcome, ReloadError> {
        // Fast path, no lock.
        if !self.state.is_dirty() {
            return Ok(RestartOutcome::Clean);
        }

        let _guard = self.restart_lock.lock();

        // Double-checked: another caller may have restarted meanwhile.
        if !self.state.is_dirty() {
            debug!("Restart already handled by a concurrent caller");
            return Ok(RestartOutcome::Clean);
        }

        let report = self.restart_locked()?;
        self.state.clear_dirty();

        Ok(if report.success {
            RestartOutcome::Restarted
        } else {
            RestartOutcome::Failed
        })
    }

    /// Run the restart procedure unconditionally.
    ///
    /// Precondition: the application entry name must be resolvable; if not,
    /// this fails fast with [`ReloadError::EntryUnknown`] and mutates
    /// nothing. A missing entry point in the new context is reported
    /// through the returned [`RestartReport`] rather than an error; the
    /// freshly created (empty) context stays installed in that case and
    /// the previous application code keeps running.
    pub fn restart(&self) -> Result<RestartReport, ReloadError> {
        let _guard = self.restart_lock.lock();
        self.restart_locked()
    }

    fn restart_locked(&self) -> Result<RestartReport, ReloadError> {
        self.state.resolve_if_needed();
        let entry_name = self.state.entry_name().ok_or(ReloadError::EntryUnknown)?;

        info!("Restarting the application");
        self.state.emit(RestartEvent::RestartStarted);
        let start = Instant::now();

        // From here on identity inference is permanently disabled; the
        // derived search path is re-derived from the frozen identity.
        self.state.mark_restarted();
        self.state.clear_derived_path();

        self.config.reload()?;
        for subsystem in &self.subsystems {
            debug!("Resetting subsystem: {}", subsystem.name());
            subsystem.reset()?;
        }

        for setup in self.setups.instances() {
            debug!("Reloading setup: {}", setup.name());
            setup.reload()?;
        }
        self.setups.init_defaults();

        let context = self.code_host.create_isolated_context()?;
        self.state.install_context(context.clone());
        for scanner in &self.scanners {
            scanner.set_default_context(context.clone());
        }

        let entry = match context.load_entry(&entry_name) {
            Ok(entry) => entry,
            Err(CodeError::EntryNotFound(_)) => {
                let message = format!(
                    "Cannot restart the application, the entry point '{}' is missing",
                    entry_name
                );
                error!("{}", message);
                self.state.emit(RestartEvent::RestartFailed {
                    error: message.clone(),
                });
                return Ok(RestartReport {
                    success: false,
                    error: Some(message),
                    duration: start.elapsed(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        entry.invoke(&self.config.args())?;

        let duration = start.elapsed();
        info!(?duration, "Successfully restarted the application");
        self.state.emit(RestartEvent::RestartCompleted { duration });

        Ok(RestartReport {
            success: true,
            error: None,
            duration,
        })
    }

    /// Reset every lifecycle field to its initial state and reinitialize
    /// the default setups. Used at process boot and for test isolation;
    /// safe to call repeatedly.
    pub fn reset_all(&self) {
        let _guard = self.restart_lock.lock();
        self.state.reset();
        self.setups.init_defaults();
    }

    /// Spawn the periodic host-driven check: a task invoking
    /// [`Self::restart_if_dirty`] every `interval`.
    pub fn spawn_driver(self: Arc<Self>, interval: Duration) -> DriverHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let coordinator = self;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = coordinator.restart_if_dirty() {
                            error!("Restart failed: {}", e);
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Restart driver shutting down");
                        return;
                    }
                }
            }
        });

        DriverHandle { shutdown_tx, task }
    }
}

/// Handle to a spawned restart driver task.
pub struct DriverHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl DriverHandle {
    /// Signal shutdown and wait for the driver to exit.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(()).await;
        let _ = self.task.await;
    }
}
