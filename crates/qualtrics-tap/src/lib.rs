//! Qualtrics survey response tap
//!
//! Incrementally extracts survey responses through the asynchronous
//! response-export API and emits them as JSON records.
//!
//! # Example
//!
//! ```no_run
//! use qualtrics_tap::config::TapConfig;
//! use qualtrics_tap::stream::{JsonFileStateStore, JsonLinesSink, StreamDriver, StreamSchema};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = TapConfig::from_file("config.json")?;
//!     let driver = StreamDriver::new(config, StreamSchema::survey_responses())?;
//!
//!     let store = JsonFileStateStore::new("state.json");
//!     let mut sink = JsonLinesSink::new(std::io::stdout().lock());
//!     let summary = driver.run_cycle(&store, &mut sink).await?;
//!     eprintln!("emitted {} records", summary.records_emitted);
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod api;
pub mod config;
pub mod error;
pub mod export;
pub mod normalize;
pub mod stream;

pub use config::TapConfig;
pub use error::{Result, RowError, TapError};
pub use stream::{CycleSummary, StreamDriver, StreamSchema};
