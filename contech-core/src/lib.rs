//! Contech Core - Shared data structures for the session core
//!
//! Defines the user/role model, the error system, configuration and logging
//! used by the identity, session and CLI crates.

pub mod async_utils;
pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use async_utils::*;
pub use config::*;
pub use error::*;
pub use logging::*;
pub use types::*;

// Re-export commonly used external types
pub use async_trait::async_trait;
pub use tracing;
