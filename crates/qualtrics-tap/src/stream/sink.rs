//! Record sinks

use crate::error::{Result, TapError};
use crate::normalize::NormalizedRecord;
use serde_jsonlines::JsonLinesWriter;
use std::io::Write;

/// Destination for emitted records.
///
/// A record counts as emitted once `flush` has returned successfully.
pub trait RecordSink {
    fn write(&mut self, record: &NormalizedRecord) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
}

/// One JSON object per line
pub struct JsonLinesSink<W: Write> {
    writer: JsonLinesWriter<W>,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: JsonLinesWriter::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: Write> RecordSink for JsonLinesSink<W> {
    fn write(&mut self, record: &NormalizedRecord) -> Result<()> {
        self.writer.write(record).map_err(TapError::Sink)
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush().map_err(TapError::Sink)
    }
}

/// Collects records in memory
#[derive(Debug, Default)]
pub struct VecSink {
    pub records: Vec<NormalizedRecord>,
    pub flushes: usize,
}

impl RecordSink for VecSink {
    fn write(&mut self, record: &NormalizedRecord) -> Result<()> {
        self.records.push(record.clone());
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.flushes += 1;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_lines_output() {
        let mut sink = JsonLinesSink::new(Vec::new());
        for id in ["R_1", "R_2"] {
            let mut record = NormalizedRecord::default();
            record.fields.insert("ResponseId".into(), json!(id));
            sink.write(&record).unwrap();
        }
        sink.flush().unwrap();

        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(
            out,
            "{\"ResponseId\":\"R_1\",\"Questions\":{}}\n{\"ResponseId\":\"R_2\",\"Questions\":{}}\n"
        );
    }
}
