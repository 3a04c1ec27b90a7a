//! Data model shared by every pipeline stage.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::{Error, Result};

// =============================================================================
// INBOUND EVENTS
// =============================================================================

/// Notification that an uploaded file is ready for extraction.
///
/// Field names on the wire are fixed by the upstream producer
/// (`jobId`, `fileId`, `fileName`, `bucket`, `minioPath`, `contentType`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReadyEvent {
    pub job_id: String,
    pub file_id: String,
    pub file_name: String,
    pub bucket: String,
    /// Object path, optionally prefixed with `"{bucket}/"`.
    #[serde(rename = "minioPath")]
    pub storage_path: String,
    #[serde(default)]
    pub content_type: Option<String>,
    /// Originating system, when the producer includes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_id: Option<String>,
    /// Size announced by the producer, in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<i64>,
}

impl FileReadyEvent {
    /// Decode a raw queue payload.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        serde_json::from_slice(payload).map_err(|e| Error::Decode(e.to_string()))
    }

    /// Object key inside the bucket.
    ///
    /// Strips one leading `"{bucket}/"` from the storage path; any other path is
    /// returned unchanged.
    pub fn object_key(&self) -> &str {
        let path = self.storage_path.as_str();
        match path
            .strip_prefix(self.bucket.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
        {
            Some(key) => key,
            None => path,
        }
    }
}

// =============================================================================
// EXTRACTION RESULTS
// =============================================================================

/// Axis-aligned box `[x0, y0, x1, y1]` in page space with a top-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl BoundingBox {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from(v: [f64; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x0, b.y0, b.x1, b.y1]
    }
}

/// A run of text positioned on a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    pub text: String,
    pub bbox: BoundingBox,
}

/// Per-page extraction output for paginated formats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResult {
    /// 1-based, in physical document order.
    pub page_number: u32,
    pub text: String,
    pub text_blocks: Vec<TextBlock>,
    pub width: f64,
    pub height: f64,
}

/// Structured content extracted from one file.
///
/// Built once by an extractor (or by the router for unsupported inputs) and
/// passed on unchanged.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub file_name: String,
    pub file_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pages: Vec<PageResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExtractionResult {
    /// Terminal result for a file no extractor is registered for.
    pub fn unsupported(file_name: impl Into<String>, file_type: impl Into<String>) -> Self {
        let file_type = file_type.into();
        Self {
            file_name: file_name.into(),
            error: Some(format!("no processor for {}", file_type)),
            file_type,
            ..Default::default()
        }
    }

    /// Whether the router produced this result because no extractor matched.
    pub fn is_unsupported(&self) -> bool {
        self.error.is_some() && self.full_text.is_none() && self.pages.is_empty()
    }

    /// Text to store in the searchable `raw_text` column, capped at `max_chars`
    /// characters. Empty when nothing was extracted. NUL characters are dropped.
    pub fn raw_text(&self, max_chars: usize) -> String {
        self.full_text
            .as_deref()
            .map(|text| truncate_chars(&text.replace('\0', ""), max_chars))
            .unwrap_or_default()
    }

    /// JSON document persisted as the record's content.
    ///
    /// PostgreSQL JSONB rejects `\u0000`, so NUL characters are removed from
    /// every string (keys included).
    pub fn to_content_json(&self) -> Result<JsonValue> {
        let mut value = serde_json::to_value(self)?;
        strip_nul(&mut value);
        Ok(value)
    }
}

fn strip_nul(value: &mut JsonValue) {
    match value {
        JsonValue::String(s) => s.retain(|c| c != '\0'),
        JsonValue::Array(items) => items.iter_mut().for_each(strip_nul),
        JsonValue::Object(map) => {
            let entries = std::mem::take(map);
            for (key, mut item) in entries {
                strip_nul(&mut item);
                map.insert(key.replace('\0', ""), item);
            }
        }
        _ => {}
    }
}

/// First `max_chars` characters of `text` (never splits a code point).
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

// =============================================================================
// JOBS AND RECORDS
// =============================================================================

/// Lifecycle status of an ingestion job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Processing,
    #[serde(rename = "COMPLETED")]
    Complete,
    Failed,
}

impl JobStatus {
    /// Value stored in the job table (shared with the upstream job service).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "PROCESSING",
            Self::Complete => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PROCESSING" => Ok(Self::Processing),
            "COMPLETE" | "COMPLETED" => Ok(Self::Complete),
            "FAILED" => Ok(Self::Failed),
            _ => Err(format!("Unknown job status: {}", s)),
        }
    }
}

/// Fields supplied by the pipeline when persisting an extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct NewExtractedRecord {
    pub job_id: String,
    pub file_name: String,
    pub file_type: String,
    pub content: JsonValue,
    pub raw_text: String,
}

/// A persisted extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedRecord {
    pub record_id: Uuid,
    pub job_id: String,
    pub file_name: String,
    pub file_type: String,
    pub content_json: JsonValue,
    pub raw_text: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(bucket: &str, path: &str) -> FileReadyEvent {
        FileReadyEvent {
            job_id: "J1".into(),
            file_id: "F1".into(),
            file_name: "a.pdf".into(),
            bucket: bucket.into(),
            storage_path: path.into(),
            content_type: None,
            system_id: None,
            file_size: None,
        }
    }

    #[test]
    fn test_decode_wire_field_names() {
        let payload = br#"{"jobId":"J1","fileId":"F1","fileName":"a.pdf","bucket":"b",
            "minioPath":"b/docs/a.pdf","contentType":"application/pdf"}"#;
        let event = FileReadyEvent::decode(payload).unwrap();
        assert_eq!(event.job_id, "J1");
        assert_eq!(event.file_id, "F1");
        assert_eq!(event.file_name, "a.pdf");
        assert_eq!(event.bucket, "b");
        assert_eq!(event.storage_path, "b/docs/a.pdf");
        assert_eq!(event.content_type.as_deref(), Some("application/pdf"));
    }

    #[test]
    fn test_decode_optional_and_unknown_fields() {
        let payload = br#"{"jobId":"J2","fileId":"F2","fileName":"x.txt","bucket":"b",
            "minioPath":"x.txt","systemId":"crm","fileSize":42,"createdAt":1700000000.5}"#;
        let event = FileReadyEvent::decode(payload).unwrap();
        assert!(event.content_type.is_none());
        assert_eq!(event.system_id.as_deref(), Some("crm"));
        assert_eq!(event.file_size, Some(42));
    }

    #[test]
    fn test_decode_null_content_type() {
        let payload = br#"{"jobId":"J","fileId":"F","fileName":"a","bucket":"b",
            "minioPath":"p","contentType":null}"#;
        let event = FileReadyEvent::decode(payload).unwrap();
        assert!(event.content_type.is_none());
    }

    #[test]
    fn test_decode_missing_field_is_decode_error() {
        let err = FileReadyEvent::decode(br#"{"jobId":"J1"}"#).unwrap_err();
        assert!(err.is_decode());
        assert!(err.to_string().contains("fileId"));
    }

    #[test]
    fn test_decode_malformed_json_is_decode_error() {
        assert!(FileReadyEvent::decode(b"not json").unwrap_err().is_decode());
        assert!(FileReadyEvent::decode(b"").unwrap_err().is_decode());
        assert!(FileReadyEvent::decode(&[0xff, 0xfe]).unwrap_err().is_decode());
    }

    #[test]
    fn test_object_key_strips_bucket_prefix() {
        assert_eq!(event("b", "b/docs/a.pdf").object_key(), "docs/a.pdf");
        assert_eq!(event("bucket", "bucket/object/key").object_key(), "object/key");
    }

    #[test]
    fn test_object_key_strips_prefix_exactly_once() {
        assert_eq!(event("b", "b/b/x").object_key(), "b/x");
    }

    #[test]
    fn test_object_key_passthrough() {
        assert_eq!(event("b", "docs/a.pdf").object_key(), "docs/a.pdf");
        // Bucket name as a bare prefix without the separator is not stripped
        assert_eq!(event("b", "bdocs/a.pdf").object_key(), "bdocs/a.pdf");
        assert_eq!(event("b", "/b/a.pdf").object_key(), "/b/a.pdf");
        assert_eq!(event("b", "b").object_key(), "b");
    }

    #[test]
    fn test_unsupported_result_shape() {
        let result = ExtractionResult::unsupported("a.xyz", "xyz");
        assert_eq!(result.error.as_deref(), Some("no processor for xyz"));
        assert!(result.is_unsupported());

        let json = result.to_content_json().unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 3);
        assert_eq!(json["file_name"], "a.xyz");
        assert_eq!(json["file_type"], "xyz");
        assert_eq!(json["error"], "no processor for xyz");
    }

    #[test]
    fn test_content_json_page_layout() {
        let result = ExtractionResult {
            file_name: "a.pdf".into(),
            file_type: "PDF".into(),
            full_text: Some("hello".into()),
            page_count: Some(1),
            metadata: BTreeMap::from([("title".to_string(), String::new())]),
            pages: vec![PageResult {
                page_number: 1,
                text: "hello".into(),
                text_blocks: vec![TextBlock {
                    text: "hello".into(),
                    bbox: BoundingBox::new(1.0, 2.0, 3.0, 4.0),
                }],
                width: 612.0,
                height: 792.0,
            }],
            error: None,
        };

        let json = result.to_content_json().unwrap();
        assert_eq!(json["page_count"], 1);
        assert_eq!(json["pages"][0]["page_number"], 1);
        assert_eq!(
            json["pages"][0]["text_blocks"][0]["bbox"],
            serde_json::json!([1.0, 2.0, 3.0, 4.0])
        );
        assert!(json.get("error").is_none());

        let back: ExtractionResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, result);
    }

    #[test]
    fn test_raw_text_truncates_to_cap() {
        let result = ExtractionResult {
            full_text: Some("a".repeat(10_050)),
            ..Default::default()
        };
        let raw = result.raw_text(10_000);
        assert_eq!(raw.chars().count(), 10_000);
        assert_eq!(raw, "a".repeat(10_000));
    }

    #[test]
    fn test_raw_text_absent_is_empty() {
        assert_eq!(ExtractionResult::default().raw_text(10), "");
    }

    #[test]
    fn test_nul_characters_never_reach_storage() {
        let result = ExtractionResult {
            file_name: "n.txt".into(),
            file_type: "TEXT".into(),
            full_text: Some("abc\0def".into()),
            metadata: BTreeMap::from([("k\0ey".to_string(), "v\0".to_string())]),
            pages: vec![PageResult {
                page_number: 1,
                text: "abc\0def".into(),
                text_blocks: vec![TextBlock {
                    text: "\0abc".into(),
                    bbox: BoundingBox::new(0.0, 0.0, 1.0, 1.0),
                }],
                width: 1.0,
                height: 1.0,
            }],
            ..Default::default()
        };

        let json = result.to_content_json().unwrap();
        let serialized = serde_json::to_string(&json).unwrap();
        assert!(!serialized.contains("\\u0000"), "got: {}", serialized);
        assert_eq!(json["full_text"], "abcdef");
        assert_eq!(json["pages"][0]["text_blocks"][0]["text"], "abc");
        assert_eq!(json["metadata"]["key"], "v");

        assert_eq!(result.raw_text(10_000), "abcdef");
        assert_eq!(result.raw_text(4), "abcd");
    }

    #[test]
    fn test_truncate_chars_multibyte() {
        assert_eq!(truncate_chars("żółw", 2), "żó");
        assert_eq!(truncate_chars("abc", 3), "abc");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 0), "");
    }

    #[test]
    fn test_job_status_strings() {
        assert_eq!(JobStatus::Processing.as_str(), "PROCESSING");
        assert_eq!(JobStatus::Complete.as_str(), "COMPLETED");
        assert_eq!(JobStatus::Failed.to_string(), "FAILED");
        assert_eq!("complete".parse::<JobStatus>(), Ok(JobStatus::Complete));
        assert_eq!("FAILED".parse::<JobStatus>(), Ok(JobStatus::Failed));
        assert!("PENDING".parse::<JobStatus>().is_err());
    }

    #[test]
    fn test_job_status_serde_matches_column_value() {
        for status in [JobStatus::Processing, JobStatus::Complete, JobStatus::Failed] {
            let json = serde_json::to_value(status).unwrap();
            assert_eq!(json, serde_json::json!(status.as_str()));
        }
    }
}
