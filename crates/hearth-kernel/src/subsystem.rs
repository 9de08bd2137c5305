//! Resettable subsystem collaborators
//!
//! Resource lookup, templating, and codec subsystems are opaque to the
//! restart coordinator; all it needs is a named `reset()` hook returning
//! each of them to its defaults.

/// Subsystem error types
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SubsystemError {
    #[error("Subsystem '{subsystem}' failed to reset: {reason}")]
    ResetFailed { subsystem: String, reason: String },
}

/// A host subsystem that can be returned to its default state.
pub trait Subsystem: Send + Sync {
    /// The subsystem's name (logging and error reporting).
    fn name(&self) -> &str;

    /// Reset the subsystem to its defaults. Assumed idempotent.
    fn reset(&self) -> Result<(), SubsystemError>;
}

/// A [`Subsystem`] backed by a closure, for hosts that reset with a single
/// call and for tests.
pub struct CallbackSubsystem<F> {
    name: String,
    reset_fn: F,
}

impl<F> CallbackSubsystem<F>
where
    F: Fn() -> Result<(), SubsystemError> + Send + Sync,
{
    pub fn new(name: &str, reset_fn: F) -> Self {
        Self {
            name: name.to_string(),
            reset_fn,
        }
    }
}

impl<F> Subsystem for CallbackSubsystem<F>
where
    F: Fn() -> Result<(), SubsystemError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn reset(&self) -> Result<(), SubsystemError> {
        (self.reset_fn)()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_callback_subsystem_resets() {
        static RESETS: AtomicUsize = AtomicUsize::new(0);

        let subsystem = CallbackSubsystem::new("templates", || {
            RESETS.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert_eq!(subsystem.name(), "templates");
        subsystem.reset().unwrap();
        subsystem.reset().unwrap();
        assert_eq!(RESETS.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_callback_subsystem_propagates_failure() {
        let subsystem = CallbackSubsystem::new("codec", || {
            Err(SubsystemError::ResetFailed {
                subsystem: "codec".to_string(),
                reason: "poisoned cache".to_string(),
            })
        });

        let err = subsystem.reset().unwrap_err();
        assert!(err.to_string().contains("codec"));
        assert!(err.to_string().contains("poisoned cache"));
    }
}
