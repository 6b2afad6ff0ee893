//! LearnMore Core - Shared data structures and infrastructure
//!
//! This crate holds what every LearnMore component needs: the role model,
//! configuration, the unified error type and logging setup.

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
pub use tokio;
pub use tracing;
