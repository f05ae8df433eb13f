//! Export job submission

use crate::api::{ExportClient, ExportRequest};
use crate::error::{Result, TapError};
use crate::export::ExportJob;
use chrono::{DateTime, Utc};
use qualtrics_common::timestamp;
use tracing::{info, instrument};

/// Start a CSV export of responses recorded since `start`.
///
/// Failure here is fatal to the cycle; transport retries have already been
/// spent by the client.
#[instrument(skip(client), fields(start = %timestamp::format_export(start)))]
pub async fn submit_export(client: &ExportClient, start: &DateTime<Utc>) -> Result<ExportJob> {
    let request = ExportRequest::csv_since(timestamp::format_export(start));

    let started = client
        .start_export(&request)
        .await
        .map_err(TapError::Submission)?;

    if started.progress_id.trim().is_empty() {
        return Err(TapError::Submission(crate::error::RequestError::Body(
            "export started without a progressId".to_string(),
        )));
    }

    info!(progress_id = %started.progress_id, "Export submitted");
    Ok(ExportJob::submitted(started.progress_id))
}
