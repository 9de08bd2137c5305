//! File system watcher feeding the change tracker
//!
//! Monitors application artifact and resource directories; any relevant
//! create/modify/remove event flags the shared dirty signal via
//! [`ChangeTracker::notify_change`]. The tracker stays directly callable,
//! so hosts with their own watchers do not need this front-end.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::tracker::ChangeTracker;

/// Watch error types
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum WatchError {
    #[error("Watch error: {0}")]
    Notify(#[from] notify::Error),

    #[error("Watcher already started")]
    AlreadyStarted,
}

/// Watch configuration
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Debounce duration for rapid file changes
    pub debounce_duration: Duration,
    /// File extensions considered application code or resources
    pub extensions: Vec<String>,
    /// Whether to watch subdirectories
    pub recursive: bool,
    /// Ignore patterns (simple `*` prefix/suffix globs)
    pub ignore_patterns: Vec<String>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_duration: Duration::from_millis(500),
            extensions: vec![
                "so".to_string(),
                "dylib".to_string(),
                "dll".to_string(),
                "html".to_string(),
                "yaml".to_string(),
                "yml".to_string(),
                "toml".to_string(),
                "json".to_string(),
            ],
            recursive: true,
            ignore_patterns: vec!["*.tmp".to_string(), "*.swp".to_string(), "*~".to_string()],
        }
    }
}

impl WatchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set debounce duration
    pub fn with_debounce(mut self, duration: Duration) -> Self {
        self.debounce_duration = duration;
        self
    }

    /// Add a file extension to watch
    pub fn with_extension(mut self, ext: &str) -> Self {
        self.extensions.push(ext.to_string());
        self
    }

    /// Set recursive mode
    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Add an ignore pattern
    pub fn with_ignore(mut self, pattern: &str) -> Self {
        self.ignore_patterns.push(pattern.to_string());
        self
    }

    /// Check whether a changed path is relevant
    pub fn should_watch(&self, path: &Path) -> bool {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if !self.extensions.is_empty() && !self.extensions.iter().any(|e| e == ext) {
            return false;
        }

        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        for pattern in &self.ignore_patterns {
            if pattern.starts_with('*') && file_name.ends_with(&pattern[1..]) {
                return false;
            }
            if pattern.ends_with('*') && file_name.starts_with(&pattern[..pattern.len() - 1]) {
                return false;
            }
            if file_name == pattern {
                return false;
            }
        }

        true
    }
}

/// Filesystem watcher that marks the lifecycle dirty on relevant changes.
pub struct ChangeWatcher {
    config: WatchConfig,
    tracker: ChangeTracker,
    watch_paths: Vec<PathBuf>,
    watcher: Option<RecommendedWatcher>,
    shutdown_tx: Option<mpsc::Sender<()>>,
}

impl ChangeWatcher {
    pub fn new(config: WatchConfig, tracker: ChangeTracker) -> Self {
        Self {
            config,
            tracker,
            watch_paths: Vec::new(),
            watcher: None,
            shutdown_tx: None,
        }
    }

    /// Add a directory to watch. May be called before or after `start`.
    pub fn watch<P: AsRef<Path>>(&mut self, path: P) -> Result<(), WatchError> {
        let path = path.as_ref().to_path_buf();

        if !path.exists() {
            debug!("Watch path does not exist yet: {:?}", path);
        }

        info!("Adding watch path: {:?}", path);

        if !self.watch_paths.contains(&path) {
            self.watch_paths.push(path.clone());
        }

        let mode = self.mode();
        if let Some(ref mut watcher) = self.watcher {
            watcher.watch(&path, mode)?;
        }

        Ok(())
    }

    /// Remove a directory from watching.
    pub fn unwatch<P: AsRef<Path>>(&mut self, path: P) -> Result<(), WatchError> {
        let path = path.as_ref().to_path_buf();
        self.watch_paths.retain(|p| p != &path);

        if let Some(ref mut watcher) = self.watcher {
            watcher.unwatch(&path)?;
        }

        Ok(())
    }

    fn mode(&self) -> RecursiveMode {
        if self.config.recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        }
    }

    /// Start watching. Relevant events are debounced per path, then marked
    /// on the change tracker.
    pub fn start(&mut self) -> Result<(), WatchError> {
        if self.watcher.is_some() {
            return Err(WatchError::AlreadyStarted);
        }

        info!("Starting change watcher");

        let (tx, mut rx) = mpsc::channel::<Event>(1024);
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        self.shutdown_tx = Some(shutdown_tx);

        let watcher_config = Config::default().with_poll_interval(Duration::from_millis(100));
        let mut watcher = RecommendedWatcher::new(
            move |result: Result<Event, notify::Error>| {
                if let Ok(event) = result {
                    let _ = tx.blocking_send(event);
                }
            },
            watcher_config,
        )?;

        let mode = self.mode();
        for path in &self.watch_paths {
            if path.exists() {
                watcher.watch(path, mode)?;
            }
        }
        self.watcher = Some(watcher);

        let config = self.config.clone();
        let tracker = self.tracker.clone();

        tokio::spawn(async move {
            let mut last_events: HashMap<PathBuf, std::time::Instant> = HashMap::new();

            loop {
                tokio::select! {
                    Some(event) = rx.recv() => {
                        if !matches!(
                            event.kind,
                            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                        ) {
                            continue;
                        }

                        for path in event.paths {
                            if !config.should_watch(&path) {
                                continue;
                            }

                            let now = std::time::Instant::now();
                            if let Some(last) = last_events.get(&path) {
                                if now.duration_since(*last) < config.debounce_duration {
                                    debug!("Debounced change for {:?}", path);
                                    continue;
                                }
                            }
                            last_events.insert(path.clone(), now);

                            debug!("Relevant change: {:?}", path);
                            tracker.notify_change();
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Change watcher shutting down");
                        return;
                    }
                }
            }
        });

        Ok(())
    }

    /// Stop watching.
    pub async fn stop(&mut self) {
        info!("Stopping change watcher");

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
        self.watcher = None;
    }

    /// Currently watched paths.
    pub fn watched_paths(&self) -> &[PathBuf] {
        &self.watch_paths
    }

    pub fn config(&self) -> &WatchConfig {
        &self.config
    }
}
