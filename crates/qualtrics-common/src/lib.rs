//! Qualtrics Tap Common Library
//!
//! Shared utilities for the Qualtrics survey-response tap.
//!
//! # Overview
//!
//! - **Error Handling**: [`CommonError`] and its result alias
//! - **Logging**: `tracing` subscriber setup driven by `LOG_*` variables
//! - **Timestamps**: the UTC `YYYY-MM-DDTHH:MM:SSZ` format the export API expects
//!
//! # Example
//!
//! ```no_run
//! use qualtrics_common::timestamp;
//!
//! fn window_start(raw: &str) -> qualtrics_common::Result<String> {
//!     let parsed = timestamp::parse_utc(raw)?;
//!     Ok(timestamp::format_export(&parsed))
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod error;
pub mod logging;
pub mod timestamp;

// Re-export commonly used types
pub use error::{CommonError, Result};
