//! Export archive download and extraction
//!
//! The archive is streamed to an anonymous temp file, then its first file
//! entry is extracted to a named temp file owned by [`ExtractedTable`].
//! Dropping the table deletes the file, whichever way the cycle ends.

use crate::api::ExportClient;
use crate::error::{RequestError, Result, TapError};
use futures::StreamExt;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument, warn};

/// The tabular file extracted from an export archive
#[derive(Debug)]
pub struct ExtractedTable {
    file: NamedTempFile,
    entry_name: String,
    size: u64,
}

impl ExtractedTable {
    /// Extract the first file entry of a zip archive.
    ///
    /// Directory entries are skipped. An archive without any file entry is an
    /// [`TapError::EmptyArtifact`].
    pub fn from_archive<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut archive = zip::ZipArchive::new(reader)?;
        let total = archive.len();
        if total == 0 {
            return Err(TapError::EmptyArtifact);
        }

        for index in 0..total {
            let mut entry = archive.by_index(index)?;
            if entry.is_dir() {
                continue;
            }

            if total > 1 {
                warn!(
                    entries = total,
                    entry = entry.name(),
                    "Archive has several entries, using the first file"
                );
            }

            let entry_name = entry.name().to_string();
            let mut file = tempfile::Builder::new()
                .prefix("qualtrics-export-")
                .suffix(".csv")
                .tempfile()?;
            let size = std::io::copy(&mut entry, &mut file)?;
            file.flush()?;

            debug!(entry = %entry_name, bytes = size, "Extracted export table");
            return Ok(Self {
                file,
                entry_name,
                size,
            });
        }

        Err(TapError::EmptyArtifact)
    }

    /// Location of the extracted file; valid while `self` is alive
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Name of the entry inside the archive
    pub fn entry_name(&self) -> &str {
        &self.entry_name
    }

    /// Uncompressed size in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Open a fresh read handle positioned at the start
    pub fn open(&self) -> Result<File> {
        Ok(self.file.reopen()?)
    }
}

/// Download a completed export and extract its table.
///
/// Opening the download already runs under the client's retry policy; a body
/// stream that breaks halfway restarts the whole download, up to the same
/// number of attempts.
#[instrument(skip(client))]
pub async fn fetch_export(client: &ExportClient, file_id: &str) -> Result<ExtractedTable> {
    let policy = client.retry_policy();
    let mut attempt = 1;

    let mut archive = loop {
        let response = client
            .download_export(file_id)
            .await
            .map_err(|source| download_error(file_id, source))?;

        match spool(response, file_id).await {
            Ok(archive) => break archive,
            Err(err @ TapError::Download { .. }) if attempt < policy.max_attempts => {
                let wait = policy.backoff(attempt);
                warn!(attempt, error = %err, "Export download interrupted, retrying in {:?}", wait);
                tokio::time::sleep(wait).await;
                attempt += 1;
            },
            Err(err) => return Err(err),
        }
    };

    archive.seek(SeekFrom::Start(0))?;
    let table = ExtractedTable::from_archive(archive)?;
    info!(entry = table.entry_name(), bytes = table.size(), "Export downloaded");
    Ok(table)
}

async fn spool(response: reqwest::Response, file_id: &str) -> Result<File> {
    let mut archive = tempfile::tempfile()?;
    let mut downloaded = 0u64;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| download_error(file_id, RequestError::Interrupted(e)))?;
        archive.write_all(&chunk)?;
        downloaded += chunk.len() as u64;
    }

    archive.flush()?;
    debug!(bytes = downloaded, "Archive spooled");
    Ok(archive)
}

fn download_error(file_id: &str, source: RequestError) -> TapError {
    TapError::Download {
        file_id: file_id.to_string(),
        source,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::api::testing::{Reply, ScriptedServer};
    use crate::config::TapConfig;
    use std::io::Cursor;
    use zip::write::SimpleFileOptions;

    fn client_at(uri: &str, max_retries: u32) -> ExportClient {
        let config = TapConfig::builder("secret", "iad1", "SV_1", "Survey", "2024-01-01")
            .base_url(uri)
            .max_retries(max_retries)
            .retry_backoff_secs(0)
            .build();
        ExportClient::new(&config, "/API/v3/surveys/SV_1/export-responses/").unwrap()
    }

    fn archive(entries: &[(&str, Option<&str>)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in entries {
            match content {
                Some(body) => {
                    writer.start_file(*name, SimpleFileOptions::default()).unwrap();
                    writer.write_all(body.as_bytes()).unwrap();
                },
                None => writer.add_directory(*name, SimpleFileOptions::default()).unwrap(),
            }
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_extracts_first_file() {
        let bytes = archive(&[
            ("export/", None),
            ("export/Survey.csv", Some("a,b\n1,2\n")),
            ("export/Other.csv", Some("x\n")),
        ]);

        let table = ExtractedTable::from_archive(Cursor::new(bytes)).unwrap();
        assert_eq!(table.entry_name(), "export/Survey.csv");
        assert_eq!(table.size(), 8);

        let mut content = String::new();
        table.open().unwrap().read_to_string(&mut content).unwrap();
        assert_eq!(content, "a,b\n1,2\n");
    }

    #[test]
    fn test_empty_archive() {
        let err = ExtractedTable::from_archive(Cursor::new(archive(&[]))).unwrap_err();
        assert!(matches!(err, TapError::EmptyArtifact));

        let dirs_only = archive(&[("only/", None)]);
        let err = ExtractedTable::from_archive(Cursor::new(dirs_only)).unwrap_err();
        assert!(matches!(err, TapError::EmptyArtifact));
    }

    #[test]
    fn test_not_an_archive() {
        let err = ExtractedTable::from_archive(Cursor::new(b"definitely not zip".to_vec()))
            .unwrap_err();
        assert!(matches!(err, TapError::ArchiveFormat(_)));
    }

    #[test]
    fn test_drop_deletes_temp_file() {
        let table =
            ExtractedTable::from_archive(Cursor::new(archive(&[("r.csv", Some("x\n"))]))).unwrap();
        let path = table.path().to_path_buf();
        assert!(path.exists());

        drop(table);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_download_cut_off_restarts() {
        let bytes = archive(&[("Survey.csv", Some("ResponseId\nR_1\n"))]);
        let server = ScriptedServer::start(vec![
            Reply::Truncated(bytes[..10].to_vec()),
            Reply::Full(bytes),
        ])
        .await;

        let client = client_at(server.uri(), 3);
        let table = fetch_export(&client, "f1").await.unwrap();

        assert_eq!(table.entry_name(), "Survey.csv");
        let mut content = String::new();
        table.open().unwrap().read_to_string(&mut content).unwrap();
        assert_eq!(content, "ResponseId\nR_1\n");
        assert_eq!(server.hits(), 2);
    }

    #[tokio::test]
    async fn test_download_cut_off_every_time() {
        let bytes = archive(&[("Survey.csv", Some("ResponseId\nR_1\n"))]);
        let server = ScriptedServer::start(vec![Reply::Truncated(bytes[..10].to_vec())]).await;

        let client = client_at(server.uri(), 2);
        let err = fetch_export(&client, "f1").await.unwrap_err();

        assert!(matches!(
            err,
            TapError::Download { ref file_id, source: RequestError::Interrupted(_) } if file_id == "f1"
        ));
        assert_eq!(server.hits(), 2);
    }
}
