// src/record.rs - Per-frame joint records and the JSON record sink

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local};
use serde::Serialize;

/// Wall clock behind the timestamp-derived file names. Injected so sink
/// lifecycle tests can run against a fixed time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Concatenated timestamp used for every output file name.
pub fn timestamp_name(clock: &dyn Clock) -> String {
    clock.now().format("%Y%m%d%H%M%S").to_string()
}

/// Joint values keyed by joint code or topology index, in record order.
pub type JointMap = BTreeMap<String, Vec<f64>>;

/// One frame's worth of joint data. Serializes as an object carrying the
/// session-relative frame id plus one map per subject.
#[derive(Debug, Clone, Serialize)]
pub struct FrameRecord {
    #[serde(rename = "FrameId")]
    pub frame_id: i64,
    #[serde(flatten)]
    pub bodies: BTreeMap<String, JointMap>,
}

/// Subject key for single-subject records.
pub const SINGLE_BODY_KEY: &str = "body";

/// Subject key for records carrying the sensor's body id.
pub fn body_key(id: u8) -> String {
    format!("body-{id}")
}

impl FrameRecord {
    pub fn new(frame_id: i64) -> Self {
        Self {
            frame_id,
            bodies: BTreeMap::new(),
        }
    }

    pub fn insert_joint(&mut self, body: &str, joint: String, values: Vec<f64>) {
        self.bodies
            .entry(body.to_string())
            .or_default()
            .insert(joint, values);
    }
}

struct OpenRecordFile {
    file: File,
    path: PathBuf,
    records: Vec<FrameRecord>,
}

/// Buffers frame records while a session runs and writes them out as one
/// JSON array when the session ends. Each open creates a fresh
/// timestamp-named file; close on a closed sink is a no-op.
pub struct RecordSink {
    output_dir: PathBuf,
    clock: Arc<dyn Clock>,
    open: Option<OpenRecordFile>,
}

impl RecordSink {
    pub fn new(output_dir: impl AsRef<Path>, clock: Arc<dyn Clock>) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            clock,
            open: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    /// Appends a record, opening a new file first if none is open. Open
    /// failures are logged and the record is dropped; capture carries on.
    pub fn write(&mut self, record: FrameRecord) {
        if self.open.is_none() {
            let path = self
                .output_dir
                .join(format!("{}.json", timestamp_name(self.clock.as_ref())));
            if let Err(error) = fs::create_dir_all(&self.output_dir) {
                tracing::warn!(%error, dir = %self.output_dir.display(), "cannot create output directory");
                return;
            }
            match File::create(&path) {
                Ok(file) => {
                    tracing::info!(path = %path.display(), "created joint record file");
                    self.open = Some(OpenRecordFile {
                        file,
                        path,
                        records: Vec::new(),
                    });
                }
                Err(error) => {
                    tracing::warn!(%error, path = %path.display(), "cannot create joint record file");
                    return;
                }
            }
        }
        if let Some(open) = self.open.as_mut() {
            open.records.push(record);
        }
    }

    /// Serializes the buffered records and closes the file. Safe to call on
    /// an already-closed sink.
    pub fn close(&mut self) -> bool {
        let Some(open) = self.open.take() else {
            return false;
        };
        if let Err(error) = serde_json::to_writer_pretty(&open.file, &open.records) {
            tracing::warn!(%error, path = %open.path.display(), "failed to flush joint records");
        }
        true
    }
}

impl Drop for RecordSink {
    fn drop(&mut self) {
        self.close();
    }
}


#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::test_clock::TickingClock;
    use super::*;

    fn record_with_joint(frame_id: i64) -> FrameRecord {
        let mut record = FrameRecord::new(frame_id);
        record.insert_joint(SINGLE_BODY_KEY, "1".to_string(), vec![10.0, 20.0, 850.0, 0.9]);
        record
    }

    #[test]
    fn test_record_serializes_with_flattened_bodies() {
        let mut record = FrameRecord::new(3);
        record.insert_joint(&body_key(2), "18".to_string(), vec![1.0, 2.0, 3.0, 2.0]);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["FrameId"], 3);
        assert_eq!(json["body-2"]["18"][2], 3.0);
    }

    #[test]
    fn test_sink_buffers_and_flushes_one_array() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = RecordSink::new(dir.path(), Arc::new(TickingClock::new()));

        for frame_id in 0..3 {
            sink.write(record_with_joint(frame_id));
        }
        assert!(sink.is_open());
        assert!(sink.close());

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(entries.len(), 1);
        let parsed: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&entries[0]).unwrap()).unwrap();
        let frames = parsed.as_array().unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0]["FrameId"], 0);
        assert_eq!(frames[2]["FrameId"], 2);
    }

    #[test]
    fn test_close_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = RecordSink::new(dir.path(), Arc::new(TickingClock::new()));
        sink.write(record_with_joint(0));
        assert!(sink.close());
        assert!(!sink.close());
        assert!(!sink.close());
    }

    #[test]
    fn test_reopen_creates_a_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = RecordSink::new(dir.path(), Arc::new(TickingClock::new()));

        sink.write(record_with_joint(0));
        sink.close();
        sink.write(record_with_joint(0));
        sink.close();

        let count = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_timestamp_name_is_concatenated() {
        let clock = TickingClock::new();
        assert_eq!(timestamp_name(&clock), "20240301120000");
    }
}
