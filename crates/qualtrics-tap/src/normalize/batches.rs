//! Batched CSV reading
//!
//! The export table is read in fixed-size batches so peak memory does not
//! grow with the survey. Row-level problems are logged and skipped; only
//! I/O failures and a bad header end the read.

use crate::error::{Result, RowError, TapError};
use crate::normalize::{ColumnLayout, NormalizedRecord};
use crate::stream::StreamSchema;
use csv::StringRecord;
use std::collections::HashSet;
use std::io::Read;
use tracing::{debug, info, warn};

/// Rows between the header and the first response (question text, import ids)
pub const METADATA_ROWS: usize = 2;

/// Counters for one table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeStats {
    pub rows_read: u64,
    pub rows_emitted: u64,
    pub rows_skipped: u64,
}

/// Reads export tables for one stream
#[derive(Debug, Clone)]
pub struct TableNormalizer {
    identifier: String,
    question_prefix: String,
    chunk_size: usize,
}

impl TableNormalizer {
    pub fn new(schema: &StreamSchema, chunk_size: usize) -> Self {
        Self {
            identifier: schema.identifier_field.to_string(),
            question_prefix: schema.question_prefix.to_string(),
            chunk_size: chunk_size.max(1),
        }
    }

    /// Read the header and metadata rows and return the batch iterator
    pub fn open<R: Read>(&self, reader: R) -> Result<RecordBatches<R>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_reader(reader);

        let headers = reader
            .headers()
            .map_err(|e| TapError::Normalization(format!("cannot read header row: {}", e)))?
            .clone();
        if headers.is_empty() {
            return Err(TapError::Normalization("export table has no header row".to_string()));
        }

        let layout = ColumnLayout::from_headers(headers.iter(), &self.identifier, &self.question_prefix)?;
        info!(
            columns = layout.columns().len(),
            questions = layout.question_count(),
            duplicates = layout.dropped().len(),
            "Export table header read"
        );

        let mut row = StringRecord::new();
        for _ in 0..METADATA_ROWS {
            match reader.read_record(&mut row) {
                Ok(true) => {},
                Ok(false) => break,
                Err(e) if e.is_io_error() => return Err(TapError::Normalization(e.to_string())),
                Err(e) => warn!(error = %e, "Unreadable metadata row"),
            }
        }

        Ok(RecordBatches {
            reader,
            layout,
            chunk_size: self.chunk_size,
            row,
            seen: HashSet::new(),
            stats: NormalizeStats::default(),
            finished: false,
        })
    }
}

/// Iterator over batches of at most `chunk_size` records, in file order.
///
/// Every emitted identifier is remembered to drop later duplicates, so this
/// set grows with the number of responses in the export, not with their width.
pub struct RecordBatches<R> {
    reader: csv::Reader<R>,
    layout: ColumnLayout,
    chunk_size: usize,
    row: StringRecord,
    seen: HashSet<String>,
    stats: NormalizeStats,
    finished: bool,
}

impl<R: Read> RecordBatches<R> {
    pub fn layout(&self) -> &ColumnLayout {
        &self.layout
    }

    pub fn stats(&self) -> &NormalizeStats {
        &self.stats
    }

    fn next_record(&mut self) -> Option<Result<std::result::Result<NormalizedRecord, RowError>>> {
        match self.reader.read_record(&mut self.row) {
            Ok(false) => None,
            Ok(true) => {
                self.stats.rows_read += 1;
                let line = self.row.position().map(|p| p.line()).unwrap_or_default();
                Some(Ok(self.layout.to_record(&self.row, line).and_then(|record| {
                    let id = self.layout.identifier_of(&self.row, line)?;
                    if self.seen.insert(id.to_string()) {
                        Ok(record)
                    } else {
                        Err(RowError::DuplicateIdentifier {
                            line,
                            id: id.to_string(),
                        })
                    }
                })))
            },
            Err(e) if e.is_io_error() => Some(Err(TapError::Normalization(e.to_string()))),
            Err(e) => {
                self.stats.rows_read += 1;
                let line = e.position().map(|p| p.line()).unwrap_or_default();
                Some(Ok(Err(RowError::Malformed { line, source: e })))
            },
        }
    }
}

impl<R: Read> Iterator for RecordBatches<R> {
    type Item = Result<Vec<NormalizedRecord>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let mut batch = Vec::with_capacity(self.chunk_size.min(1024));
        while batch.len() < self.chunk_size {
            match self.next_record() {
                None => {
                    self.finished = true;
                    break;
                },
                Some(Err(fatal)) => {
                    self.finished = true;
                    return Some(Err(fatal));
                },
                Some(Ok(Ok(record))) => {
                    self.stats.rows_emitted += 1;
                    batch.push(record);
                },
                Some(Ok(Err(row_error))) => {
                    self.stats.rows_skipped += 1;
                    warn!(error = %row_error, "Skipping row");
                },
            }
        }

        if batch.is_empty() && self.finished {
            return None;
        }

        debug!(rows = batch.len(), "Normalized batch");
        Some(Ok(batch))
    }
}
