//! Asynchronous export protocol
//!
//! Submit → poll → fetch. Each stage runs to completion before the next
//! begins, and each maps its failures onto the matching [`TapError`]
//! variant.
//!
//! [`TapError`]: crate::error::TapError

pub mod fetcher;
pub mod job;
pub mod poller;
pub mod submit;

pub use fetcher::{fetch_export, ExtractedTable};
pub use job::{ExportJob, ExportStatus};
pub use poller::{ExportPoller, PollPolicy};
pub use submit::submit_export;
