//! Routing of files to the extractor registered for their type.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use etl_core::defaults::UNKNOWN_FILE_TYPE;
use etl_core::{ExtractionResult, Extractor, Result};

use crate::extractors::{PdfExtractor, StructuredExtractor, TextExtractor};

/// Registry mapping routing keys (extensions and MIME types) to extractors.
///
/// Built once at startup and shared read-only between workers.
pub struct ProcessorRouter {
    extractors: HashMap<String, Arc<dyn Extractor>>,
}

impl ProcessorRouter {
    /// Create an empty router.
    pub fn new() -> Self {
        Self {
            extractors: HashMap::new(),
        }
    }

    /// Router with the PDF, text and structured extractors registered.
    pub fn with_default_extractors() -> Self {
        let mut router = Self::new();
        router.register(Arc::new(PdfExtractor));
        router.register(Arc::new(TextExtractor));
        router.register(Arc::new(StructuredExtractor));
        router
    }

    /// Register an extractor under every key it declares. Replaces any
    /// existing extractor for the same key.
    pub fn register(&mut self, extractor: Arc<dyn Extractor>) {
        for key in extractor.keys() {
            self.extractors
                .insert(normalize_key(key), Arc::clone(&extractor));
        }
    }

    /// Register an extractor under one additional key.
    pub fn register_key(&mut self, key: &str, extractor: Arc<dyn Extractor>) {
        self.extractors.insert(normalize_key(key), extractor);
    }

    /// Routing key for a file.
    ///
    /// The declared content type wins when it names a registered key; otherwise
    /// the lower-cased extension; otherwise `"unknown"`.
    pub fn resolve_file_type(&self, file_name: &str, content_type: Option<&str>) -> String {
        if let Some(mime) = content_type.map(normalize_key) {
            if self.extractors.contains_key(&mime) {
                return mime;
            }
        }

        // Everything after the last dot, so ".bashrc" resolves to "bashrc"
        file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .filter(|ext| !ext.is_empty())
            .unwrap_or_else(|| UNKNOWN_FILE_TYPE.to_string())
    }

    /// Check if an extractor is registered for the given key.
    pub fn has_extractor(&self, key: &str) -> bool {
        self.extractors.contains_key(&normalize_key(key))
    }

    /// All registered keys, sorted.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.extractors.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /// Extract `data` with the extractor for its file type.
    ///
    /// A file nobody handles yields [`ExtractionResult::unsupported`], not an
    /// error. Extractor failures propagate unchanged.
    pub async fn process(
        &self,
        data: &[u8],
        file_name: &str,
        content_type: Option<&str>,
    ) -> Result<ExtractionResult> {
        let file_type = self.resolve_file_type(file_name, content_type);

        match self.extractors.get(&file_type) {
            Some(extractor) => {
                debug!(
                    component = "router",
                    file_name,
                    file_type = %file_type,
                    extractor = extractor.name(),
                    bytes = data.len(),
                    "Dispatching to extractor"
                );
                extractor.process(data, file_name, content_type).await
            }
            None => {
                debug!(
                    component = "router",
                    file_name,
                    file_type = %file_type,
                    "No extractor registered"
                );
                Ok(ExtractionResult::unsupported(file_name, file_type))
            }
        }
    }
}

impl Default for ProcessorRouter {
    fn default() -> Self {
        Self::new()
    }
}

/// Trim, lower-case and drop MIME parameters (`text/plain; charset=utf-8`).
fn normalize_key(key: &str) -> String {
    key.split(';').next().unwrap_or("").trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use etl_core::Error;

    struct FailingExtractor;

    #[async_trait]
    impl Extractor for FailingExtractor {
        fn keys(&self) -> &[&'static str] {
            &["bad"]
        }

        async fn process(&self, _: &[u8], _: &str, _: Option<&str>) -> Result<ExtractionResult> {
            Err(Error::Extraction("broken input".into()))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    #[test]
    fn test_router_new_is_empty() {
        let router = ProcessorRouter::new();
        assert!(router.keys().is_empty());
        assert!(!router.has_extractor("pdf"));
    }

    #[test]
    fn test_default_extractors_registered() {
        let router = ProcessorRouter::with_default_extractors();
        for key in ["pdf", "application/pdf", "txt", "text/plain", "json", "csv"] {
            assert!(router.has_extractor(key), "{}", key);
        }
        assert!(!router.has_extractor("xyz"));
    }

    #[test]
    fn test_resolve_content_type_first() {
        let router = ProcessorRouter::with_default_extractors();
        assert_eq!(
            router.resolve_file_type("scan.bin", Some("application/pdf")),
            "application/pdf"
        );
        assert_eq!(
            router.resolve_file_type("scan.bin", Some(" Application/PDF ; charset=binary")),
            "application/pdf"
        );
    }

    #[test]
    fn test_resolve_unregistered_content_type_falls_back_to_extension() {
        let router = ProcessorRouter::with_default_extractors();
        assert_eq!(
            router.resolve_file_type("Report.PDF", Some("application/octet-stream")),
            "pdf"
        );
        assert_eq!(router.resolve_file_type("a.xyz", None), "xyz");
    }

    #[test]
    fn test_resolve_unknown() {
        let router = ProcessorRouter::with_default_extractors();
        assert_eq!(router.resolve_file_type("README", None), "unknown");
        assert_eq!(router.resolve_file_type("a.", None), "unknown");
        assert_eq!(router.resolve_file_type("", Some("")), "unknown");
    }

    #[test]
    fn test_resolve_takes_text_after_last_dot() {
        let router = ProcessorRouter::new();
        assert_eq!(router.resolve_file_type(".bashrc", None), "bashrc");
        assert_eq!(router.resolve_file_type("backup.tar.GZ", None), "gz");
    }

    #[tokio::test]
    async fn test_unsupported_is_not_an_error() {
        let router = ProcessorRouter::with_default_extractors();
        let result = router.process(b"data", "a.xyz", None).await.unwrap();
        assert_eq!(result.file_type, "xyz");
        assert_eq!(result.error.as_deref(), Some("no processor for xyz"));
        assert!(result.is_unsupported());
    }

    #[tokio::test]
    async fn test_dispatch_to_text_extractor() {
        let router = ProcessorRouter::with_default_extractors();
        let result = router.process(b"hello world", "notes.md", None).await.unwrap();
        assert_eq!(result.file_type, "TEXT");
        assert_eq!(result.full_text.as_deref(), Some("hello world"));
    }

    #[tokio::test]
    async fn test_extractor_error_propagates() {
        let mut router = ProcessorRouter::new();
        router.register(Arc::new(FailingExtractor));
        let err = router.process(b"x", "f.bad", None).await.unwrap_err();
        assert!(matches!(err, Error::Extraction(_)));
    }

    #[tokio::test]
    async fn test_register_key_alias() {
        let mut router = ProcessorRouter::new();
        router.register_key("LOG", Arc::new(TextExtractor));
        assert!(router.has_extractor("log"));
        let result = router.process(b"line", "app.log", None).await.unwrap();
        assert_eq!(result.file_type, "TEXT");
    }
}
