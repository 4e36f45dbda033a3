//! Layer editor - canvas design editing over pluggable layer types.
//!
//! This crate wires the pieces together:
//! - Plugin registration
//! - The editor store (pages, selection, history)
//! - The stage that keeps the scene in sync with the store
//! - Options panel editing and on-canvas manipulation

pub mod config;
pub mod session;

pub use config::EditorConfig;
pub use session::EditorSession;

/// Editor version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
