//! Export API request and response types

use serde::{Deserialize, Serialize};

/// Export file format requested from the platform
pub const EXPORT_FORMAT: &str = "csv";

/// Body of the export start request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
    pub format: String,

    /// `YYYY-MM-DDTHH:MM:SSZ`
    pub start_date: String,

    /// Export choice labels instead of recode values
    pub use_labels: bool,
}

impl ExportRequest {
    /// CSV export with labels, starting at `start_date`
    pub fn csv_since(start_date: impl Into<String>) -> Self {
        Self {
            format: EXPORT_FORMAT.to_string(),
            start_date: start_date.into(),
            use_labels: true,
        }
    }
}

/// Standard API response wrapper
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    pub result: T,
    #[serde(default)]
    pub meta: Option<ResponseMeta>,
}

/// Request metadata echoed by the platform
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMeta {
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub http_status: Option<String>,
}

/// Result of starting an export
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartExportResult {
    pub progress_id: String,
}

/// Result of one export status check
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportProgress {
    pub status: String,
    #[serde(default)]
    pub percent_complete: f64,
    /// Present once the export file is ready
    #[serde(default)]
    pub file_id: Option<String>,
}
