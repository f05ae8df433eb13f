//! Export job snapshot and status state machine

use crate::api::ExportProgress;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Server-side export status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportStatus {
    InProgress,
    Complete,
    Failed,
}

impl ExportStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ExportStatus::InProgress => "in_progress",
            ExportStatus::Complete => "complete",
            ExportStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExportStatus::InProgress)
    }
}

impl From<&str> for ExportStatus {
    fn from(s: &str) -> Self {
        match s {
            "complete" => ExportStatus::Complete,
            "failed" => ExportStatus::Failed,
            "inProgress" | "in_progress" | "queued" => ExportStatus::InProgress,
            other => {
                warn!(status = other, "Unknown export status, treating as in progress");
                ExportStatus::InProgress
            },
        }
    }
}

/// Latest known state of one export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportJob {
    pub progress_id: String,
    pub status: ExportStatus,
    pub percent_complete: f64,
    pub file_id: Option<String>,
}

impl ExportJob {
    /// A freshly submitted export
    pub fn submitted(progress_id: impl Into<String>) -> Self {
        Self {
            progress_id: progress_id.into(),
            status: ExportStatus::InProgress,
            percent_complete: 0.0,
            file_id: None,
        }
    }

    /// Replace this snapshot with a status check result.
    ///
    /// `complete` is only accepted together with a file identifier; until the
    /// identifier shows up the job stays in progress.
    pub fn apply(&mut self, progress: ExportProgress) {
        let reported = ExportStatus::from(progress.status.as_str());
        let file_id = progress.file_id.filter(|id| !id.is_empty());

        self.percent_complete = progress.percent_complete;
        self.status = match reported {
            ExportStatus::Complete if file_id.is_none() => ExportStatus::InProgress,
            status => status,
        };
        self.file_id = file_id;
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// The file identifier of a completed export
    pub fn completed_file_id(&self) -> Option<&str> {
        match self.status {
            ExportStatus::Complete => self.file_id.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(status: &str, file_id: Option<&str>) -> ExportProgress {
        ExportProgress {
            status: status.to_string(),
            percent_complete: 50.0,
            file_id: file_id.map(str::to_string),
        }
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(ExportStatus::from("inProgress"), ExportStatus::InProgress);
        assert_eq!(ExportStatus::from("complete"), ExportStatus::Complete);
        assert_eq!(ExportStatus::from("failed"), ExportStatus::Failed);
        assert_eq!(ExportStatus::from("mystery"), ExportStatus::InProgress);
    }

    #[test]
    fn test_complete_requires_file_id() {
        let mut job = ExportJob::submitted("ES_1");

        job.apply(progress("complete", None));
        assert_eq!(job.status, ExportStatus::InProgress);
        assert!(job.completed_file_id().is_none());

        job.apply(progress("complete", Some("")));
        assert_eq!(job.status, ExportStatus::InProgress);

        job.apply(progress("complete", Some("f1")));
        assert_eq!(job.status, ExportStatus::Complete);
        assert_eq!(job.completed_file_id(), Some("f1"));
    }

    #[test]
    fn test_failed_is_terminal() {
        let mut job = ExportJob::submitted("ES_1");
        job.apply(progress("inProgress", None));
        assert!(!job.is_terminal());
        assert_eq!(job.percent_complete, 50.0);

        job.apply(progress("failed", None));
        assert!(job.is_terminal());
        assert!(job.completed_file_id().is_none());
    }
}
