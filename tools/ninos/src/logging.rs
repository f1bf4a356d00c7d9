use crate::errors::NinosError;
use crate::record::CallRecord;
use serde::Serialize;
use serde_json::{json, Value};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 4096;

/// String values longer than this inside a logged call record are replaced by
/// a digest.
const LARGE_VALUE_THRESHOLD: usize = 1024;

#[derive(Debug, Clone)]
pub struct JsonlLogger {
    pub path: PathBuf,
    pub max_payload_bytes: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogEvent<'a> {
    pub level: &'a str,
    pub event_type: &'a str,
    pub payload: Value,
}

impl JsonlLogger {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
        }
    }

    pub fn append(&self, event: &LogEvent<'_>) -> Result<(), NinosError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| NinosError::Io(e.to_string()))?;
        }
        let truncated = truncate_json(event.payload.clone(), self.max_payload_bytes);
        let line = serde_json::to_string(&LogEvent {
            level: event.level,
            event_type: event.event_type,
            payload: truncated,
        })
        .map_err(|e| NinosError::Io(e.to_string()))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| NinosError::Io(e.to_string()))?;
        file.write_all(line.as_bytes())
            .map_err(|e| NinosError::Io(e.to_string()))?;
        file.write_all(b"\n")
            .map_err(|e| NinosError::Io(e.to_string()))
    }

    /// Appends an `info` event. Write failures are ignored.
    pub fn info(&self, event_type: &str, payload: Value) {
        let _ = self.append(&LogEvent {
            level: "info",
            event_type,
            payload,
        });
    }
}

/// JSON form of a call record for the log, with oversized strings digested.
pub fn call_record_payload(stub: &str, record: &CallRecord) -> Value {
    let record = serde_json::to_value(record).unwrap_or(Value::Null);
    json!({ "stub": stub, "record": digest_large_strings(record) })
}

fn digest_large_strings(value: Value) -> Value {
    match value {
        Value::String(text) if text.len() > LARGE_VALUE_THRESHOLD => {
            use sha2::{Digest, Sha256};
            let hash = Sha256::digest(text.as_bytes());
            // First 8 bytes (16 hex chars)
            Value::String(format!("<hash:sha256:{}>", hex_bytes(&hash[..8])))
        }
        Value::Array(items) => Value::Array(items.into_iter().map(digest_large_strings).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, digest_large_strings(v)))
                .collect(),
        ),
        other => other,
    }
}

fn hex_bytes(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn truncate_json(value: Value, max_bytes: usize) -> Value {
    let rendered = serde_json::to_string(&value).unwrap_or_default();
    if rendered.len() <= max_bytes {
        return value;
    }
    let mut cut = max_bytes.saturating_sub(3);
    while cut > 0 && !rendered.is_char_boundary(cut) {
        cut -= 1;
    }
    Value::String(format!("{}...", &rendered[..cut]))
}

#[cfg(test)]
mod tests {
    use super::{call_record_payload, JsonlLogger, LogEvent};
    use crate::record::CallRecord;
    use serde_json::{json, Value};

    #[test]
    fn logger_truncates_large_payloads_and_writes_jsonl() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("doubles.jsonl");
        let mut logger = JsonlLogger::new(&path);
        logger.max_payload_bytes = 20;

        logger
            .append(&LogEvent {
                level: "info",
                event_type: "spy_installed",
                payload: json!({"text": "abcdefghijklmnopqrstuvwxyz"}),
            })
            .expect("append");
        logger.info("test_end", json!({"restored": 0}));

        let text = std::fs::read_to_string(&path).expect("read");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"event_type\":\"spy_installed\""));
        assert!(lines[0].contains("..."));
        assert!(lines[1].contains("\"restored\":0"));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let value = super::truncate_json(json!("ééééééééé"), 8);
        let Value::String(text) = value else {
            panic!("expected truncated string");
        };
        assert!(text.ends_with("..."));
    }

    #[test]
    fn call_record_payload_digests_oversized_strings() {
        let big = "x".repeat(2048);
        let record = CallRecord::returned(None, vec![json!(big), json!("small")], Value::Null);
        let payload = call_record_payload("m", &record);
        let args = &payload["record"]["arguments"];
        assert!(args[0]
            .as_str()
            .is_some_and(|s| s.starts_with("<hash:sha256:")));
        assert_eq!(args[1], json!("small"));
        assert_eq!(payload["stub"], json!("m"));
    }
}
