//! Routing and extraction properties across the default extractor set.

use etl_extract::test_fixtures::{pdf_with_info, pdf_with_pages};
use etl_extract::ProcessorRouter;

#[tokio::test]
async fn pdf_routed_by_content_type_despite_extension() {
    let router = ProcessorRouter::with_default_extractors();
    let data = pdf_with_pages(&["Invoice"]);

    let result = router
        .process(&data, "upload.bin", Some("application/pdf"))
        .await
        .unwrap();

    assert_eq!(result.file_type, "PDF");
    assert_eq!(result.page_count, Some(1));
}

#[tokio::test]
async fn pdf_routed_by_extension_without_content_type() {
    let router = ProcessorRouter::with_default_extractors();
    let data = pdf_with_pages(&["One", "Two", "Three"]);

    let result = router.process(&data, "a.PDF", None).await.unwrap();

    assert_eq!(result.file_type, "PDF");
    assert_eq!(result.page_count, Some(3));
    assert!(!result.full_text.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn unregistered_types_yield_error_result() {
    let router = ProcessorRouter::with_default_extractors();

    for (name, content_type, key) in [
        ("a.xyz", None, "xyz"),
        ("archive.ZIP", Some("application/zip"), "zip"),
        ("Makefile", None, "unknown"),
        (".bashrc", None, "bashrc"),
    ] {
        let result = router.process(b"\x00\x01", name, content_type).await.unwrap();
        assert_eq!(result.file_name, name);
        assert_eq!(result.file_type, key);
        assert_eq!(result.error, Some(format!("no processor for {}", key)));
        assert!(result.full_text.is_none());
    }
}

#[tokio::test]
async fn extraction_is_repeatable() {
    let router = ProcessorRouter::with_default_extractors();
    let data = pdf_with_info(&["First page", "Second page"], &[("Author", "Ops")]);

    let first = router.process(&data, "r.pdf", None).await.unwrap();
    let second = router.process(&data, "r.pdf", None).await.unwrap();
    assert_eq!(first, second);

    let csv = b"a,b\n1,2\n";
    let first = router.process(csv, "t.csv", None).await.unwrap();
    let second = router.process(csv, "t.csv", None).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn corrupt_pdf_is_an_extraction_error() {
    let router = ProcessorRouter::with_default_extractors();
    let err = router
        .process(b"definitely not a pdf", "broken.pdf", None)
        .await
        .unwrap_err();
    assert!(matches!(err, etl_core::Error::Extraction(_)));
}
