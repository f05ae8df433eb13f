//! Replication cycle orchestration
//!
//! submit → poll → fetch → normalize, strictly in sequence. The export
//! timestamp is captured once per cycle, stamped on every record and
//! committed as the new bookmark only after the sink has been flushed.

use crate::api::ExportClient;
use crate::config::TapConfig;
use crate::error::{RequestError, Result, TapError};
use crate::export::{fetch_export, submit_export, ExportPoller, PollPolicy};
use crate::normalize::TableNormalizer;
use crate::stream::{Clock, RecordSink, ReplicationState, StateStore, StreamSchema, SystemClock};
use qualtrics_common::timestamp;
use std::io::BufReader;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

/// Outcome of a successful cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleSummary {
    pub progress_id: String,
    pub file_id: String,
    pub records_emitted: u64,
    pub rows_skipped: u64,
    /// Bookmark committed at the end of the cycle
    pub replication_key_value: String,
}

/// Runs replication cycles for one survey stream
pub struct StreamDriver {
    config: TapConfig,
    schema: StreamSchema,
    client: ExportClient,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
}

impl StreamDriver {
    pub fn new(config: TapConfig, schema: StreamSchema) -> Result<Self> {
        config.validate()?;
        let client = ExportClient::new(&config, &schema.export_path(&config.survey_id))?;

        Ok(Self {
            config,
            schema,
            client,
            clock: Arc::new(SystemClock),
            cancel: CancellationToken::new(),
        })
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Token that aborts polling and emission when cancelled
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn schema(&self) -> &StreamSchema {
        &self.schema
    }

    /// Run one full cycle.
    ///
    /// Any error leaves the stored state untouched, so the next cycle
    /// exports from the same start point.
    #[instrument(skip_all, fields(survey_id = %self.config.survey_id, stream = self.schema.name))]
    pub async fn run_cycle<S, K>(&self, store: &S, sink: &mut K) -> Result<CycleSummary>
    where
        S: StateStore + ?Sized,
        K: RecordSink + ?Sized,
    {
        let state = store.load()?;
        let fallback = timestamp::parse_date(&self.config.start_date)?;
        let start = state.effective_start(fallback)?;

        let export_date = self.clock.now();
        let stamp = timestamp::format_export(&export_date);
        info!(
            start = %timestamp::format_export(&start),
            export_date = %stamp,
            "Starting replication cycle"
        );

        let job = submit_export(&self.client, &start).await?;
        let poller = ExportPoller::new(
            &self.client,
            PollPolicy::from_config(&self.config),
            self.cancel.clone(),
        );
        let job = poller.wait(job).await?;

        let file_id = job
            .completed_file_id()
            .ok_or_else(|| TapError::Download {
                file_id: String::new(),
                source: RequestError::Body("completed export has no fileId".to_string()),
            })?
            .to_string();

        let table = fetch_export(&self.client, &file_id).await?;
        let normalizer = TableNormalizer::new(&self.schema, self.config.chunk_size);
        let mut batches = normalizer.open(BufReader::new(table.open()?))?;

        let mut emitted = 0u64;
        for batch in &mut batches {
            if self.cancel.is_cancelled() {
                return Err(TapError::Cancelled {
                    progress_id: job.progress_id,
                });
            }

            for mut record in batch? {
                self.schema.conform(&mut record);
                record.attach_export_metadata(&stamp, &self.config.survey);
                sink.write(&record)?;
                emitted += 1;
            }
        }
        sink.flush()?;

        let rows_skipped = batches.stats().rows_skipped;
        store.save(&ReplicationState::at(&export_date))?;

        info!(
            progress_id = %job.progress_id,
            records = emitted,
            skipped = rows_skipped,
            bookmark = %stamp,
            "Replication cycle complete"
        );

        Ok(CycleSummary {
            progress_id: job.progress_id,
            file_id,
            records_emitted: emitted,
            rows_skipped,
            replication_key_value: stamp,
        })
    }
}
