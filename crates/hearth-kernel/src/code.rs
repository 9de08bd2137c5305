//! Code-loading contracts
//!
//! An application lives inside a *code context*: an isolated namespace for
//! loading application code, allowing old and new versions to coexist
//! without symbol collision. The host owns exactly one active context at a
//! time; a restart replaces it wholesale and the previous one is reclaimed
//! when its last handle is dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Code loading error types
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CodeError {
    /// The named entry point does not exist in the context. Recoverable:
    /// the coordinator logs it and keeps the old application running.
    #[error("Entry point not found: {0}")]
    EntryNotFound(String),

    #[error("Failed to load library: {0}")]
    LibraryLoad(String),

    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    #[error("Entry point invocation failed: {0}")]
    InvokeFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A loaded, invocable application entry point.
///
/// Holding the value keeps the backing code alive; invocation replays the
/// originally captured process arguments.
pub trait EntryPoint: Send + Sync {
    /// Invoke the entry function with the given arguments.
    fn invoke(&self, args: &[String]) -> Result<(), CodeError>;
}

/// An isolated code-loading context.
pub trait CodeContext: Send + Sync {
    /// Stable identifier for this context (logging and diagnostics).
    fn id(&self) -> &str;

    /// Resolve the named application entry point inside this context.
    ///
    /// Returns [`CodeError::EntryNotFound`] when the context holds no such
    /// entry.
    fn load_entry(&self, name: &str) -> Result<Box<dyn EntryPoint>, CodeError>;
}

/// Factory for code contexts.
pub trait CodeHost: Send + Sync {
    /// The host's own default context, active before any restart.
    fn default_context(&self) -> Arc<dyn CodeContext>;

    /// Construct a brand-new isolated context.
    fn create_isolated_context(&self) -> Result<Arc<dyn CodeContext>, CodeError>;
}

/// A collaborator that scans code contexts (asset discovery, annotation
/// scanning and the like) and must be told when the active context changes.
pub trait ContextScanner: Send + Sync {
    /// Make `context` the scanner's new default context.
    fn set_default_context(&self, context: Arc<dyn CodeContext>);
}

static NULL_CONTEXT_SEQ: AtomicU64 = AtomicU64::new(0);

/// A context that never resolves any entry point.
pub struct NullCodeContext {
    id: String,
}

impl NullCodeContext {
    pub fn new() -> Self {
        let seq = NULL_CONTEXT_SEQ.fetch_add(1, Ordering::Relaxed);
        Self {
            id: format!("null-context-{}", seq),
        }
    }
}

impl Default for NullCodeContext {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeContext for NullCodeContext {
    fn id(&self) -> &str {
        &self.id
    }

    fn load_entry(&self, name: &str) -> Result<Box<dyn EntryPoint>, CodeError> {
        Err(CodeError::EntryNotFound(name.to_string()))
    }
}

/// A code host whose contexts hold no loadable entries.
///
/// Useful as the host-default context provider in minimal embeddings and as
/// a stand-in in tests.
pub struct NullCodeHost {
    default_context: Arc<dyn CodeContext>,
}

impl NullCodeHost {
    pub fn new() -> Self {
        Self {
            default_context: Arc::new(NullCodeContext::new()),
        }
    }
}

impl Default for NullCodeHost {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeHost for NullCodeHost {
    fn default_context(&self) -> Arc<dyn CodeContext> {
        self.default_context.clone()
    }

    fn create_isolated_context(&self) -> Result<Arc<dyn CodeContext>, CodeError> {
        Ok(Arc::new(NullCodeContext::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_context_has_no_entries() {
        let context = NullCodeContext::new();
        let result = context.load_entry("app");
        assert!(matches!(result, Err(CodeError::EntryNotFound(name)) if name == "app"));
    }

    #[test]
    fn test_null_host_creates_distinct_contexts() {
        let host = NullCodeHost::new();
        let a = host.create_isolated_context().unwrap();
        let b = host.create_isolated_context().unwrap();
        assert_ne!(a.id(), b.id());
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_default_context_is_stable() {
        let host = NullCodeHost::new();
        assert!(Arc::ptr_eq(&host.default_context(), &host.default_context()));
    }
}
