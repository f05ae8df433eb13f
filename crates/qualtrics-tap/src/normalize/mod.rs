//! Wide-table normalization
//!
//! Turns the exported CSV into [`NormalizedRecord`]s: fixed columns stay at
//! the top level, question columns are nested under `Questions`.

pub mod batches;
pub mod layout;
pub mod record;
pub mod sanitize;

pub use batches::{NormalizeStats, RecordBatches, TableNormalizer, METADATA_ROWS};
pub use layout::{Column, ColumnKind, ColumnLayout};
pub use record::NormalizedRecord;
pub use sanitize::sanitize_column_name;
