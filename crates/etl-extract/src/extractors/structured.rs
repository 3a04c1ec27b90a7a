//! Structured extractor - handles JSON and CSV.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use etl_core::{ExtractionResult, Extractor, Result};

/// Extractor for structured data formats.
///
/// Keeps the text as-is and describes its shape in metadata. Malformed JSON
/// is reported with `valid = "false"` and a `parse_error` rather than failing.
pub struct StructuredExtractor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Csv,
}

impl Format {
    fn file_type(self) -> &'static str {
        match self {
            Format::Json => "JSON",
            Format::Csv => "CSV",
        }
    }
}

impl StructuredExtractor {
    fn detect_format(file_name: &str, content_type: Option<&str>) -> Format {
        // Check MIME type first
        if let Some(mime) = content_type.map(str::to_lowercase) {
            if mime.contains("json") {
                return Format::Json;
            }
            if mime.contains("csv") {
                return Format::Csv;
            }
        }

        let ext = file_name.rsplit('.').next().unwrap_or("").to_lowercase();
        match ext.as_str() {
            "csv" => Format::Csv,
            _ => Format::Json,
        }
    }

    fn json_metadata(text: &str) -> BTreeMap<String, String> {
        let mut meta = BTreeMap::new();
        match serde_json::from_str::<JsonValue>(text) {
            Ok(val) => {
                meta.insert("valid".into(), "true".into());
                match &val {
                    JsonValue::Object(map) => {
                        let keys: Vec<&str> = map.keys().take(10).map(String::as_str).collect();
                        meta.insert("type".into(), "object".into());
                        meta.insert("key_count".into(), map.len().to_string());
                        meta.insert("top_level_keys".into(), keys.join(","));
                    }
                    JsonValue::Array(arr) => {
                        meta.insert("type".into(), "array".into());
                        meta.insert("element_count".into(), arr.len().to_string());
                    }
                    _ => {
                        meta.insert("type".into(), "primitive".into());
                    }
                }
            }
            Err(e) => {
                meta.insert("valid".into(), "false".into());
                meta.insert("parse_error".into(), e.to_string());
            }
        }
        meta
    }

    fn csv_metadata(text: &str) -> BTreeMap<String, String> {
        let lines: Vec<&str> = text.lines().collect();
        let headers: Vec<&str> = lines
            .first()
            .map(|line| line.split(',').map(str::trim).collect())
            .unwrap_or_default();

        BTreeMap::from([
            ("row_count".to_string(), lines.len().to_string()),
            ("column_count".to_string(), headers.len().to_string()),
            ("headers".to_string(), headers.join(",")),
        ])
    }
}

#[async_trait]
impl Extractor for StructuredExtractor {
    fn keys(&self) -> &[&'static str] {
        &["json", "csv", "application/json", "text/csv"]
    }

    async fn process(
        &self,
        data: &[u8],
        file_name: &str,
        content_type: Option<&str>,
    ) -> Result<ExtractionResult> {
        let text = String::from_utf8_lossy(data).into_owned();
        let format = Self::detect_format(file_name, content_type);

        let mut metadata = match format {
            Format::Json => Self::json_metadata(&text),
            Format::Csv => Self::csv_metadata(&text),
        };
        metadata.insert("format".into(), format.file_type().to_lowercase());

        Ok(ExtractionResult {
            file_name: file_name.to_string(),
            file_type: format.file_type().to_string(),
            full_text: Some(text),
            metadata,
            ..Default::default()
        })
    }

    fn name(&self) -> &str {
        "structured"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_structured_json_object() {
        let result = StructuredExtractor
            .process(
                br#"{"name": "test", "count": 42}"#,
                "data.json",
                Some("application/json"),
            )
            .await
            .unwrap();

        assert_eq!(result.file_type, "JSON");
        assert!(result.full_text.is_some());
        assert_eq!(result.metadata["format"], "json");
        assert_eq!(result.metadata["valid"], "true");
        assert_eq!(result.metadata["type"], "object");
        assert_eq!(result.metadata["key_count"], "2");
    }

    #[tokio::test]
    async fn test_structured_json_array() {
        let result = StructuredExtractor
            .process(b"[1, 2, 3]", "data.json", None)
            .await
            .unwrap();

        assert_eq!(result.metadata["type"], "array");
        assert_eq!(result.metadata["element_count"], "3");
    }

    #[tokio::test]
    async fn test_structured_csv() {
        let csv_data = "name,age,city\nAlice,30,NYC\nBob,25,LA\n";
        let result = StructuredExtractor
            .process(csv_data.as_bytes(), "data.csv", Some("text/csv"))
            .await
            .unwrap();

        assert_eq!(result.file_type, "CSV");
        assert_eq!(result.metadata["format"], "csv");
        assert_eq!(result.metadata["row_count"], "3");
        assert_eq!(result.metadata["column_count"], "3");
        assert_eq!(result.metadata["headers"], "name,age,city");
    }

    #[tokio::test]
    async fn test_structured_invalid_json_is_not_an_error() {
        let result = StructuredExtractor
            .process(b"not valid json {{{", "bad.json", Some("application/json"))
            .await
            .unwrap();

        assert!(result.full_text.is_some());
        assert!(result.error.is_none());
        assert_eq!(result.metadata["valid"], "false");
        assert!(result.metadata.contains_key("parse_error"));
    }

    #[test]
    fn test_detect_format() {
        assert_eq!(
            StructuredExtractor::detect_format("f.txt", Some("application/json")),
            Format::Json
        );
        assert_eq!(
            StructuredExtractor::detect_format("f.txt", Some("text/csv; charset=utf-8")),
            Format::Csv
        );
        assert_eq!(StructuredExtractor::detect_format("data.CSV", None), Format::Csv);
        assert_eq!(StructuredExtractor::detect_format("data.json", None), Format::Json);
    }

    #[test]
    fn test_structured_name() {
        assert_eq!(StructuredExtractor.name(), "structured");
    }
}
