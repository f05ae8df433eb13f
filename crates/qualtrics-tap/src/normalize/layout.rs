//! Column layout of an export table
//!
//! Built once from the header row: sanitized names, first-seen
//! deduplication, and the flat/question partition.

use crate::error::{Result, RowError, TapError};
use crate::normalize::{sanitize_column_name, NormalizedRecord};
use csv::StringRecord;
use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;

const BYTE_ORDER_MARK: char = '\u{feff}';

/// Cell contents read as missing
const MISSING_TOKENS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN", "<NA>",
    "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Where a column lands in the record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Top-level field
    Flat,
    /// Nested under `Questions`
    Question,
}

/// A kept column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Position in the raw row
    pub index: usize,
    /// Sanitized header
    pub name: String,
    pub kind: ColumnKind,
}

/// Mapping from raw rows to records
#[derive(Debug, Clone)]
pub struct ColumnLayout {
    columns: Vec<Column>,
    dropped: Vec<Column>,
    identifier: String,
    identifier_index: usize,
}

impl ColumnLayout {
    /// Build the layout from raw headers.
    ///
    /// Fails when no column sanitizes to `identifier`.
    pub fn from_headers<'h, I>(headers: I, identifier: &str, question_prefix: &str) -> Result<Self>
    where
        I: IntoIterator<Item = &'h str>,
    {
        let mut seen = HashSet::new();
        let mut columns = Vec::new();
        let mut dropped = Vec::new();

        for (index, raw) in headers.into_iter().enumerate() {
            let raw = if index == 0 {
                raw.trim_start_matches(BYTE_ORDER_MARK)
            } else {
                raw
            };
            let name = sanitize_column_name(raw);
            let kind = if name.starts_with(question_prefix) {
                ColumnKind::Question
            } else {
                ColumnKind::Flat
            };
            let column = Column { index, name, kind };

            if seen.insert(column.name.clone()) {
                columns.push(column);
            } else {
                debug!(column = %column.name, index, "Dropping duplicate column");
                dropped.push(column);
            }
        }

        let identifier_index = columns
            .iter()
            .find(|c| c.name == identifier)
            .map(|c| c.index)
            .ok_or_else(|| TapError::MissingIdentifierColumn(identifier.to_string()))?;

        Ok(Self {
            columns,
            dropped,
            identifier: identifier.to_string(),
            identifier_index,
        })
    }

    /// Kept columns in file order
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Columns dropped as later duplicates of a kept name
    pub fn dropped(&self) -> &[Column] {
        &self.dropped
    }

    pub fn question_count(&self) -> usize {
        self.columns
            .iter()
            .filter(|c| c.kind == ColumnKind::Question)
            .count()
    }

    /// Non-empty identifier value of a row
    pub fn identifier_of<'r>(&self, row: &'r StringRecord, line: u64) -> std::result::Result<&'r str, RowError> {
        match row.get(self.identifier_index).map(str::trim) {
            Some(id) if !id.is_empty() => Ok(id),
            _ => Err(RowError::MissingIdentifier {
                line,
                field: self.identifier.clone(),
            }),
        }
    }

    /// Reshape one row.
    ///
    /// Every kept column appears in the record; missing cells become `null`.
    pub fn to_record(&self, row: &StringRecord, line: u64) -> std::result::Result<NormalizedRecord, RowError> {
        self.identifier_of(row, line)?;

        let mut record = NormalizedRecord::default();
        for column in &self.columns {
            let value = cell_value(row.get(column.index).unwrap_or(""));
            match column.kind {
                ColumnKind::Flat => record.fields.insert(column.name.clone(), value),
                ColumnKind::Question => record.questions.insert(column.name.clone(), value),
            };
        }

        Ok(record)
    }
}

fn cell_value(cell: &str) -> Value {
    if MISSING_TOKENS.contains(&cell) {
        Value::Null
    } else {
        Value::String(cell.to_string())
    }
}
