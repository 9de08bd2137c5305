//! Collaborator contracts for the hearth application host.
//!
//! The restart machinery in `hearth-reload` never implements configuration
//! loading, resource resets, setup registration, or code loading itself; it
//! drives them through the traits defined here. Hosts plug their own
//! implementations in, tests plug mocks in.

// code loading module
pub mod code;
pub use code::*;

// config module
pub mod config;
pub use config::{ConfigError, ConfigSource, FileConfigSource, StaticConfigSource};

// setup module
pub mod setup;
pub use setup::*;

// subsystem module
pub mod subsystem;
pub use subsystem::*;

// event module
pub mod event;
pub use event::RestartEvent;

// error module
pub mod error;
pub use error::{KernelError, KernelResult};
