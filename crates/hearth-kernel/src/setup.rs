//! Setup collaborators
//!
//! A [`Setup`] represents one configurable subsystem of the host (a server
//! setup, an admin setup, ...). The restart coordinator does not own
//! setups; during a restart it enumerates the registry in insertion order,
//! signals `reload()` on each instance, then asks the registry to
//! reinitialize its defaults.

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info};

/// Setup error types
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SetupError {
    #[error("Setup '{setup}' failed to reload: {reason}")]
    ReloadFailed { setup: String, reason: String },
}

/// One configurable subsystem of the host.
pub trait Setup: Send + Sync {
    /// The setup's name (logging and error reporting).
    fn name(&self) -> &str;

    /// Re-apply this setup's registrations after a code/resource change.
    /// Assumed idempotent; invoked on every restart.
    fn reload(&self) -> Result<(), SetupError>;
}

/// The registry of live setups, enumerated and signalled during restart.
pub trait SetupRegistry: Send + Sync {
    /// All registered setups, in insertion order. Implementations return a
    /// snapshot so reload hooks never observe concurrent mutation.
    fn instances(&self) -> Vec<Arc<dyn Setup>>;

    /// Reinitialize the default setups, discarding ad-hoc registrations.
    fn init_defaults(&self);
}

/// In-memory, insertion-ordered setup registry.
///
/// `init_defaults` resets the registry back to the default set it was
/// constructed with.
pub struct MemorySetupRegistry {
    defaults: Vec<Arc<dyn Setup>>,
    instances: RwLock<Vec<Arc<dyn Setup>>>,
}

impl MemorySetupRegistry {
    pub fn new() -> Self {
        Self::with_defaults(Vec::new())
    }

    /// Create a registry whose `init_defaults` restores the given set.
    pub fn with_defaults(defaults: Vec<Arc<dyn Setup>>) -> Self {
        let instances = RwLock::new(defaults.clone());
        Self {
            defaults,
            instances,
        }
    }

    /// Register an additional setup, preserving insertion order.
    pub fn register(&self, setup: Arc<dyn Setup>) {
        info!("Registering setup: {}", setup.name());
        self.instances.write().push(setup);
    }
}

impl Default for MemorySetupRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SetupRegistry for MemorySetupRegistry {
    fn instances(&self) -> Vec<Arc<dyn Setup>> {
        self.instances.read().clone()
    }

    fn init_defaults(&self) {
        debug!("Reinitializing default setups");
        *self.instances.write() = self.defaults.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NamedSetup(&'static str);

    impl Setup for NamedSetup {
        fn name(&self) -> &str {
            self.0
        }

        fn reload(&self) -> Result<(), SetupError> {
            Ok(())
        }
    }

    #[test]
    fn test_registry_preserves_insertion_order() {
        let registry = MemorySetupRegistry::new();
        registry.register(Arc::new(NamedSetup("server")));
        registry.register(Arc::new(NamedSetup("admin")));
        registry.register(Arc::new(NamedSetup("dev")));

        let instances = registry.instances();
        let names: Vec<&str> = instances.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["server", "admin", "dev"]);
    }

    #[test]
    fn test_init_defaults_restores_default_set() {
        let registry =
            MemorySetupRegistry::with_defaults(vec![Arc::new(NamedSetup("server")) as _]);
        registry.register(Arc::new(NamedSetup("extra")));
        assert_eq!(registry.instances().len(), 2);

        registry.init_defaults();
        let instances = registry.instances();
        let names: Vec<&str> = instances.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["server"]);
    }

    #[test]
    fn test_init_defaults_is_repeatable() {
        let registry = MemorySetupRegistry::new();
        registry.register(Arc::new(NamedSetup("extra")));
        registry.init_defaults();
        registry.init_defaults();
        assert!(registry.instances().is_empty());
    }
}
