//! Crate-level error types for `hearth-kernel`.
//!
//! Provides a unified [`KernelError`] that composes errors from every
//! collaborator contract (config, code loading, setups, subsystems) so
//! hosts can funnel them through one type when convenient.

use thiserror::Error;

/// Crate-level error type for `hearth-kernel`.
///
/// Wraps each collaborator's typed error via `#[from]` so that the `?`
/// operator converts them automatically.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KernelError {
    /// A configuration-related error.
    #[error("Config error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// A code-loading error.
    #[error("Code error: {0}")]
    Code(#[from] crate::code::CodeError),

    /// A setup collaborator error.
    #[error("Setup error: {0}")]
    Setup(#[from] crate::setup::SetupError),

    /// A subsystem collaborator error.
    #[error("Subsystem error: {0}")]
    Subsystem(#[from] crate::subsystem::SubsystemError),

    /// A low-level I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An internal / untyped error described by a message string.
    #[error("{0}")]
    Internal(String),
}

/// Convenience result alias for kernel-level operations.
pub type KernelResult<T> = Result<T, KernelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_converts_via_from() {
        let cfg_err = crate::config::ConfigError::UnsupportedFormat("xml".to_string());
        let kernel_err: KernelError = cfg_err.into();

        assert!(matches!(kernel_err, KernelError::Config(_)));
        assert!(kernel_err.to_string().contains("xml"));
    }

    #[test]
    fn code_error_converts_via_from() {
        let code_err = crate::code::CodeError::EntryNotFound("app".to_string());
        let kernel_err: KernelError = code_err.into();

        assert!(matches!(kernel_err, KernelError::Code(_)));
        assert!(kernel_err.to_string().contains("app"));
    }

    #[test]
    fn io_error_converts_via_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let kernel_err: KernelError = io_err.into();

        assert!(matches!(kernel_err, KernelError::Io(_)));
        assert!(kernel_err.to_string().contains("file missing"));
    }

    #[test]
    fn internal_error_display() {
        let err = KernelError::Internal("something broke".into());
        assert_eq!(err.to_string(), "something broke");
    }
}
