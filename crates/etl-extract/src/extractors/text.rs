//! Text extractor - handles plain text and markdown files.

use std::collections::BTreeMap;

use async_trait::async_trait;

use etl_core::{ExtractionResult, Extractor, Result};

/// File type reported for text extractions.
pub const TEXT_FILE_TYPE: &str = "TEXT";

/// Extractor for plain text files.
///
/// Reads bytes as UTF-8 (with lossy conversion for invalid sequences)
/// and returns the text with basic metadata (char count, line count).
pub struct TextExtractor;

#[async_trait]
impl Extractor for TextExtractor {
    fn keys(&self) -> &[&'static str] {
        &[
            "txt",
            "text",
            "md",
            "markdown",
            "log",
            "text/plain",
            "text/markdown",
        ]
    }

    async fn process(
        &self,
        data: &[u8],
        file_name: &str,
        _content_type: Option<&str>,
    ) -> Result<ExtractionResult> {
        let text = String::from_utf8_lossy(data).into_owned();

        let metadata = BTreeMap::from([
            ("char_count".to_string(), text.chars().count().to_string()),
            ("line_count".to_string(), text.lines().count().to_string()),
        ]);

        Ok(ExtractionResult {
            file_name: file_name.to_string(),
            file_type: TEXT_FILE_TYPE.to_string(),
            full_text: Some(text),
            metadata,
            ..Default::default()
        })
    }

    fn name(&self) -> &str {
        "text"
    }
}
