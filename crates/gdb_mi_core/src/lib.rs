//! GDB/MI Core
//!
//! An async controller for a GDB subprocess speaking the Machine Interface.
//! Commands are correlated with their result records by token, stop events
//! are queued for later draining, and every failure is a structured
//! [`MiError`].

pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod mi;
pub mod ops;
pub mod state;
pub mod types;

mod dispatcher;
mod process;
mod reader;
mod session;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use config::MiConfig;
pub use controller::GdbController;
pub use dispatcher::CommandReply;
pub use error::{ErrorPayload, MiError};
pub use events::StopEvent;
pub use state::{Breakpoint, BreakpointKind, SessionState};

/// Result type alias using MiError
pub type Result<T> = std::result::Result<T, MiError>;
