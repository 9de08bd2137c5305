//! Application identity resolution
//!
//! Determines, once, which entry point and package own the running
//! process. Resolution happens lazily before any read of identity or the
//! search path and is permanently frozen after the first restart attempt:
//! the model trusts the first answer forever.

use tracing::info;

/// Identity resolution state.
///
/// `Unresolved` may transition to `Resolved` (a source supplied at least
/// one field) and either may transition to `Frozen` (a restart occurred;
/// re-inference is disabled for the rest of the process lifetime).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdentityState {
    #[default]
    Unresolved,
    Resolved,
    Frozen,
}

impl std::fmt::Display for IdentityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdentityState::Unresolved => write!(f, "Unresolved"),
            IdentityState::Resolved => write!(f, "Resolved"),
            IdentityState::Frozen => write!(f, "Frozen"),
        }
    }
}

/// Supplies the application's entry name and package.
///
/// Implementations decide where identity comes from: the running process,
/// a static configuration, or anything else the host embeds.
pub trait IdentitySource: Send + Sync {
    /// Name of the entity declaring the process entry point.
    fn entry_name(&self) -> Option<String>;

    /// Namespace owning the application's assets.
    fn package(&self) -> Option<String>;
}

/// Derives both identity fields from the running executable's file stem.
pub struct ProcessIdentitySource;

impl IdentitySource for ProcessIdentitySource {
    fn entry_name(&self) -> Option<String> {
        exe_stem()
    }

    fn package(&self) -> Option<String> {
        exe_stem()
    }
}

fn exe_stem() -> Option<String> {
    std::env::current_exe()
        .ok()?
        .file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string())
}

/// Fixed identity for hosts that know their entry point up front, and for
/// tests.
pub struct StaticIdentitySource {
    entry_name: Option<String>,
    package: Option<String>,
}

impl StaticIdentitySource {
    pub fn new(entry_name: &str, package: &str) -> Self {
        Self {
            entry_name: Some(entry_name.to_string()),
            package: Some(package.to_string()),
        }
    }

    /// A source that resolves nothing; identity stays unresolved.
    pub fn unknown() -> Self {
        Self {
            entry_name: None,
            package: None,
        }
    }
}

impl IdentitySource for StaticIdentitySource {
    fn entry_name(&self) -> Option<String> {
        self.entry_name.clone()
    }

    fn package(&self) -> Option<String> {
        self.package.clone()
    }
}

/// The resolved (or not yet resolved) application identity.
#[derive(Debug, Clone, Default)]
pub struct AppIdentity {
    entry_name: Option<String>,
    package: Option<String>,
    state: IdentityState,
}

impl AppIdentity {
    pub fn state(&self) -> IdentityState {
        self.state
    }

    pub fn entry_name(&self) -> Option<&str> {
        self.entry_name.as_deref()
    }

    pub fn package(&self) -> Option<&str> {
        self.package.as_deref()
    }

    /// Query `source` unless identity is already resolved or frozen.
    ///
    /// Returns `true` when this call newly resolved at least one field. A
    /// source that supplies nothing leaves the state `Unresolved`, so a
    /// later call may try again; this is not an error.
    pub fn resolve_with(&mut self, source: &dyn IdentitySource) -> bool {
        if self.state != IdentityState::Unresolved {
            return false;
        }

        let entry_name = source.entry_name();
        let package = source.package();

        if entry_name.is_none() && package.is_none() {
            return false;
        }

        self.entry_name = entry_name;
        self.package = package;
        self.state = IdentityState::Resolved;

        info!(
            entry = self.entry_name.as_deref().unwrap_or("<unknown>"),
            package = self.package.as_deref().unwrap_or("<unknown>"),
            "Inferred application root"
        );
        true
    }

    /// Permanently disable re-inference. Resolved fields are kept.
    pub fn freeze(&mut self) {
        self.state = IdentityState::Frozen;
    }

    /// Return to the initial, unresolved state.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
