//! Bookrelay Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error handling and logging for the Bookrelay workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`RelayError`] and the [`Result`] alias used for
//!   configuration and other startup concerns
//! - **Logging**: environment-driven `tracing` subscriber setup
//!
//! # Example
//!
//! ```no_run
//! use bookrelay_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = LogConfig::from_env()?;
//!     let _guard = init_logging(&config)?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{RelayError, Result};
