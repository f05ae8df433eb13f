//! End-to-end tests for a full replication cycle
//!
//! These tests drive `StreamDriver::run_cycle` against a mock export API:
//! - Submission, polling and download request shapes
//! - Record shape after normalization
//! - Failed exports never reach the download endpoint
//! - Replication state only advances after every record is emitted

use chrono::{TimeZone, Utc};
use qualtrics_tap::error::TapError;
use qualtrics_tap::normalize::NormalizedRecord;
use qualtrics_tap::stream::{
    FixedClock, JsonFileStateStore, MemoryStateStore, RecordSink, ReplicationState, StateStore,
    StreamDriver, StreamSchema, VecSink,
};
use qualtrics_tap::TapConfig;
use serde_json::json;
use std::io::{Cursor, Write};
use wiremock::{
    matchers::{body_partial_json, header, method, path},
    Mock, MockServer, ResponseTemplate,
};
use zip::write::SimpleFileOptions;

const EXPORT_PATH: &str = "/API/v3/surveys/SV_1/export-responses/";
const PROGRESS_PATH: &str = "/API/v3/surveys/SV_1/export-responses/ES_1";
const FILE_PATH: &str = "/API/v3/surveys/SV_1/export-responses/f1/file";

const METADATA: &str = "Start Date,Question one,Question one copy,Response ID\n\
    {\"ImportId\":\"startDate\"},{\"ImportId\":\"QID1\"},{\"ImportId\":\"QID1\"},{\"ImportId\":\"_recordId\"}\n";

fn config_for(server: &MockServer) -> TapConfig {
    TapConfig::builder("secret", "iad1", "SV_1", "Pulse Survey", "2024-01-01")
        .base_url(server.uri())
        .poll_interval_secs(0)
        .max_poll_attempts(10)
        .max_retries(1)
        .build()
}

fn driver_for(server: &MockServer) -> StreamDriver {
    StreamDriver::new(config_for(server), StreamSchema::survey_responses())
        .expect("Failed to build driver")
        .with_clock(FixedClock(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()))
}

/// Zip archive holding one CSV export
fn export_archive(csv: &str) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file("Pulse Survey.csv", SimpleFileOptions::default())
        .unwrap();
    writer.write_all(csv.as_bytes()).unwrap();
    writer.finish().unwrap().into_inner()
}

fn csv_with_rows(rows: usize) -> String {
    let mut csv = format!("StartDate,Q1,Q1,ResponseId\n{}", METADATA);
    for i in 0..rows {
        csv.push_str(&format!("2024-04-01 10:00:00,answer {},shadow,R_{}\n", i, i));
    }
    csv
}

fn envelope(result: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "result": result, "meta": {"httpStatus": "200 - OK"} }))
}

async fn mount_submission(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(EXPORT_PATH))
        .and(header("x-api-token", "secret"))
        .and(body_partial_json(json!({"format": "csv", "useLabels": true})))
        .respond_with(envelope(json!({"progressId": "ES_1"})))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_completion(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(PROGRESS_PATH))
        .respond_with(envelope(json!({
            "status": "complete",
            "percentComplete": 100.0,
            "fileId": "f1"
        })))
        .mount(server)
        .await;
}

async fn mount_download(server: &MockServer, csv: &str, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path(FILE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(export_archive(csv)))
        .expect(expected_calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_duplicate_question_column_keeps_first() {
    let server = MockServer::start().await;
    mount_submission(&server).await;
    mount_completion(&server).await;
    mount_download(&server, &csv_with_rows(3), 1).await;

    let store = MemoryStateStore::default();
    let mut sink = VecSink::default();
    let summary = driver_for(&server)
        .run_cycle(&store, &mut sink)
        .await
        .expect("Cycle should succeed");

    assert_eq!(summary.records_emitted, 3);
    assert_eq!(summary.file_id, "f1");
    assert_eq!(sink.records.len(), 3);

    for (i, record) in sink.records.iter().enumerate() {
        assert_eq!(
            serde_json::to_value(record).unwrap(),
            json!({
                "StartDate": "2024-04-01 10:00:00",
                "ResponseId": format!("R_{}", i),
                "Questions": {"Q1": format!("answer {}", i)},
                "survey_export_date": "2024-05-01T12:00:00Z",
                "SurveyName": "Pulse Survey"
            })
        );
    }
}

#[tokio::test]
async fn test_in_progress_then_complete_fetches_once() {
    let server = MockServer::start().await;
    mount_submission(&server).await;
    Mock::given(method("GET"))
        .and(path(PROGRESS_PATH))
        .respond_with(envelope(json!({"status": "inProgress", "percentComplete": 40.0})))
        .up_to_n_times(3)
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(PROGRESS_PATH))
        .respond_with(envelope(json!({
            "status": "complete",
            "percentComplete": 100.0,
            "fileId": "f1"
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_download(&server, &csv_with_rows(2), 1).await;

    let store = MemoryStateStore::default();
    let mut sink = VecSink::default();
    let summary = driver_for(&server).run_cycle(&store, &mut sink).await.unwrap();

    assert_eq!(summary.progress_id, "ES_1");
    assert_eq!(summary.file_id, "f1");
    assert_eq!(sink.records.len(), 2);
}

#[tokio::test]
async fn test_failed_export_is_never_downloaded() {
    let server = MockServer::start().await;
    mount_submission(&server).await;
    Mock::given(method("GET"))
        .and(path(PROGRESS_PATH))
        .respond_with(envelope(json!({"status": "failed", "percentComplete": 0.0})))
        .expect(1)
        .mount(&server)
        .await;
    mount_download(&server, &csv_with_rows(1), 0).await;

    let store = MemoryStateStore::default();
    let mut sink = VecSink::default();
    let err = driver_for(&server).run_cycle(&store, &mut sink).await.unwrap_err();

    assert!(matches!(err, TapError::ExportFailed { .. }));
    assert!(sink.records.is_empty());
    assert_eq!(store.snapshot(), ReplicationState::default());
}

#[tokio::test]
async fn test_submission_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EXPORT_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid token"))
        .expect(1)
        .mount(&server)
        .await;

    let store = MemoryStateStore::default();
    let mut sink = VecSink::default();
    let err = driver_for(&server).run_cycle(&store, &mut sink).await.unwrap_err();
    assert!(matches!(err, TapError::Submission(_)));
}

/// Accepts a fixed number of records, then fails every write
struct FailingSink {
    accepted: usize,
    limit: usize,
}

impl RecordSink for FailingSink {
    fn write(&mut self, _record: &NormalizedRecord) -> qualtrics_tap::Result<()> {
        if self.accepted == self.limit {
            return Err(TapError::Sink(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "downstream closed",
            )));
        }
        self.accepted += 1;
        Ok(())
    }

    fn flush(&mut self) -> qualtrics_tap::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_failure_mid_stream_keeps_prior_state() {
    let server = MockServer::start().await;
    mount_submission(&server).await;
    mount_completion(&server).await;
    mount_download(&server, &csv_with_rows(10_000), 1).await;

    let prior = ReplicationState {
        replication_key_value: Some("2024-04-01T00:00:00Z".to_string()),
    };
    let store = MemoryStateStore::new(prior.clone());
    let mut sink = FailingSink {
        accepted: 0,
        limit: 500,
    };

    let err = driver_for(&server).run_cycle(&store, &mut sink).await.unwrap_err();

    assert!(matches!(err, TapError::Sink(_)));
    assert_eq!(sink.accepted, 500);
    assert_eq!(store.snapshot(), prior);
}

#[tokio::test]
async fn test_successful_cycle_advances_state_file() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EXPORT_PATH))
        .and(body_partial_json(json!({"startDate": "2024-04-01T08:00:00Z"})))
        .respond_with(envelope(json!({"progressId": "ES_1"})))
        .expect(1)
        .mount(&server)
        .await;
    mount_completion(&server).await;
    mount_download(&server, &csv_with_rows(4), 1).await;

    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStateStore::new(dir.path().join("state.json"));
    store
        .save(&ReplicationState {
            replication_key_value: Some("2024-04-01T10:00:00+02:00".to_string()),
        })
        .unwrap();

    let mut sink = VecSink::default();
    let summary = driver_for(&server).run_cycle(&store, &mut sink).await.unwrap();

    assert_eq!(summary.replication_key_value, "2024-05-01T12:00:00Z");
    assert_eq!(
        store.load().unwrap().replication_key_value.as_deref(),
        Some("2024-05-01T12:00:00Z")
    );
    assert_eq!(sink.flushes, 1);
}

#[tokio::test]
async fn test_first_run_starts_at_configured_date() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EXPORT_PATH))
        .and(body_partial_json(json!({"startDate": "2024-01-01T00:00:00Z"})))
        .respond_with(envelope(json!({"progressId": "ES_1"})))
        .expect(1)
        .mount(&server)
        .await;
    mount_completion(&server).await;
    mount_download(&server, &csv_with_rows(1), 1).await;

    let store = MemoryStateStore::default();
    let mut sink = VecSink::default();
    driver_for(&server).run_cycle(&store, &mut sink).await.unwrap();
    assert_eq!(sink.records.len(), 1);
}

#[tokio::test]
async fn test_finished_flag_is_boolean() {
    let server = MockServer::start().await;
    mount_submission(&server).await;
    mount_completion(&server).await;
    let csv = "ResponseId,Finished,Q1\nResponse ID,Finished,Q\n{},{},{}\nR_1,True,a\nR_2,False,\n";
    mount_download(&server, csv, 1).await;

    let store = MemoryStateStore::default();
    let mut sink = VecSink::default();
    driver_for(&server).run_cycle(&store, &mut sink).await.unwrap();

    assert_eq!(sink.records[0].fields["Finished"], json!(true));
    assert_eq!(sink.records[1].fields["Finished"], json!(false));
    assert_eq!(sink.records[1].questions["Q1"], serde_json::Value::Null);
}
