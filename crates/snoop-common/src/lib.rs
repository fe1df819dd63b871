//! Module Snooper Common Library
//!
//! Shared error handling and logging for the module snooper workspace.
//!
//! # Overview
//!
//! - **Error Handling**: the recoverable error taxonomy used by every pipeline stage
//! - **Logging**: `tracing` subscriber setup driven by environment variables
//!
//! # Example
//!
//! ```no_run
//! use snoop_common::logging::{init_logging, LogConfig};
//! use snoop_common::{Result, SnoopError};
//!
//! fn check(job_id: &str) -> Result<()> {
//!     Err(SnoopError::scheduler_query(job_id, "qstat exited with status 35"))
//! }
//!
//! fn main() -> anyhow::Result<()> {
//!     let _guard = init_logging(&LogConfig::from_env()?)?;
//!     let _ = check("999.pbs");
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{Result, SnoopError};

/// Sentinel written for any field that could not be resolved from a log file.
pub const NOT_APPLICABLE: &str = "N/A";
