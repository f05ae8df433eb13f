//! Export API client module
//!
//! HTTP client for the survey platform's asynchronous response-export API.

pub mod client;
pub mod endpoints;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{ExportClient, RetryPolicy};
pub use types::*;
