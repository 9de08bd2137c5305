//! End-to-end restart coordination tests

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use hearth_kernel::config::ConfigResult;
use hearth_kernel::{
    CodeContext, CodeError, CodeHost, ConfigSource, EntryPoint, MemorySetupRegistry,
    StaticConfigSource,
};
use hearth_reload::{LifecycleState, ReloadCoordinator, RestartOutcome, StaticIdentitySource};

struct CountingEntryPoint {
    invocations: Arc<AtomicUsize>,
}

impl EntryPoint for CountingEntryPoint {
    fn invoke(&self, _args: &[String]) -> Result<(), CodeError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct CountingContext {
    id: String,
    entry: String,
    invocations: Arc<AtomicUsize>,
}

impl CodeContext for CountingContext {
    fn id(&self) -> &str {
        &self.id
    }

    fn load_entry(&self, name: &str) -> Result<Box<dyn EntryPoint>, CodeError> {
        if name != self.entry {
            return Err(CodeError::EntryNotFound(name.to_string()));
        }
        Ok(Box::new(CountingEntryPoint {
            invocations: self.invocations.clone(),
        }))
    }
}

struct CountingHost {
    entry: String,
    created: AtomicUsize,
    invocations: Arc<AtomicUsize>,
    default_context: Arc<dyn CodeContext>,
}

impl CountingHost {
    fn new(entry: &str) -> Self {
        let invocations = Arc::new(AtomicUsize::new(0));
        Self {
            entry: entry.to_string(),
            created: AtomicUsize::new(0),
            default_context: Arc::new(CountingContext {
                id: "default".to_string(),
                entry: String::new(),
                invocations: invocations.clone(),
            }),
            invocations,
        }
    }
}

impl CodeHost for CountingHost {
    fn default_context(&self) -> Arc<dyn CodeContext> {
        self.default_context.clone()
    }

    fn create_isolated_context(&self) -> Result<Arc<dyn CodeContext>, CodeError> {
        // A restart is deliberately slow enough for callers to pile up
        // behind the restart lock.
        std::thread::sleep(Duration::from_millis(25));
        let seq = self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(CountingContext {
            id: format!("isolated-{}", seq),
            entry: self.entry.clone(),
            invocations: self.invocations.clone(),
        }))
    }
}

/// Configuration source that counts reloads.
struct CountingConfig {
    reloads: AtomicUsize,
    inner: StaticConfigSource,
}

impl CountingConfig {
    fn new(args: Vec<String>) -> Self {
        Self {
            reloads: AtomicUsize::new(0),
            inner: StaticConfigSource::new(args),
        }
    }
}

impl ConfigSource for CountingConfig {
    fn reload(&self) -> ConfigResult<()> {
        self.reloads.fetch_add(1, Ordering::SeqCst);
        self.inner.reload()
    }

    fn args(&self) -> Vec<String> {
        self.inner.args()
    }
}

fn coordinator(entry: &str) -> (Arc<ReloadCoordinator>, Arc<CountingHost>) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("hearth_reload=debug")
        .with_test_writer()
        .try_init();

    let host = Arc::new(CountingHost::new(entry));
    let state = Arc::new(LifecycleState::new(
        host.default_context(),
        StaticIdentitySource::new("demo-app", "demo"),
    ));
    let config = Arc::new(CountingConfig::new(vec!["demo-app".to_string()]));
    let setups = Arc::new(MemorySetupRegistry::new());

    let coordinator = Arc::new(ReloadCoordinator::new(state, config, setups, host.clone()));
    (coordinator, host)
}

#[test]
fn concurrent_checks_run_exactly_one_restart() {
    let (coordinator, host) = coordinator("demo-app");
    coordinator.tracker().notify_change();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let coordinator = coordinator.clone();
        handles.push(std::thread::spawn(move || {
            coordinator.restart_if_dirty().unwrap()
        }));
    }

    let outcomes: Vec<RestartOutcome> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    // Every caller returns normally; exactly one of them performed the
    // restart, the rest found the flag already cleared.
    let restarted = outcomes
        .iter()
        .filter(|o| **o == RestartOutcome::Restarted)
        .count();
    assert_eq!(restarted, 1);
    assert!(
        outcomes
            .iter()
            .all(|o| matches!(o, RestartOutcome::Restarted | RestartOutcome::Clean))
    );

    assert_eq!(host.created.load(Ordering::SeqCst), 1);
    assert_eq!(host.invocations.load(Ordering::SeqCst), 1);
    assert!(!coordinator.state().is_dirty());
}

#[test]
fn repeated_change_and_restart_cycles() {
    let (coordinator, host) = coordinator("demo-app");

    for round in 1..=3 {
        coordinator.tracker().notify_change();
        coordinator.tracker().notify_change();

        assert_eq!(
            coordinator.restart_if_dirty().unwrap(),
            RestartOutcome::Restarted
        );
        assert_eq!(host.invocations.load(Ordering::SeqCst), round);
        assert_eq!(
            coordinator.restart_if_dirty().unwrap(),
            RestartOutcome::Clean
        );
    }

    assert_eq!(host.created.load(Ordering::SeqCst), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn driver_restarts_after_change_notification() {
    let (coordinator, host) = coordinator("demo-app");
    let driver = coordinator.clone().spawn_driver(Duration::from_millis(10));

    coordinator.tracker().notify_change();

    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while host.invocations.load(Ordering::SeqCst) == 0 {
        assert!(
            std::time::Instant::now() < deadline,
            "driver never picked up the change"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    driver.stop().await;
    assert_eq!(host.invocations.load(Ordering::SeqCst), 1);
    assert!(!coordinator.state().is_dirty());
}

#[test]
fn restart_survives_missing_entry_and_recovers_on_next_change() {
    // Entry name resolves to "demo-app" but the host only serves "other":
    // every restart fails recoverably.
    let (coordinator, host) = coordinator("other");

    coordinator.tracker().notify_change();
    assert_eq!(
        coordinator.restart_if_dirty().unwrap(),
        RestartOutcome::Failed
    );
    assert_eq!(host.invocations.load(Ordering::SeqCst), 0);
    // The unpopulated replacement context is live.
    assert_eq!(host.created.load(Ordering::SeqCst), 1);

    // A new notification triggers a new attempt.
    coordinator.tracker().notify_change();
    assert_eq!(
        coordinator.restart_if_dirty().unwrap(),
        RestartOutcome::Failed
    );
    assert_eq!(host.created.load(Ordering::SeqCst), 2);
}
