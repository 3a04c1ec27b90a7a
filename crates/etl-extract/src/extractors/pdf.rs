//! PDF extractor - per-page text, positioned text blocks, and document info via lopdf.

use std::collections::BTreeMap;

use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::{debug, warn};

use etl_core::defaults::PAGE_SEPARATOR;
use etl_core::{
    BoundingBox, Error, ExtractionResult, Extractor, PageResult, Result, TextBlock,
};

/// File type reported for PDF extractions.
pub const PDF_FILE_TYPE: &str = "PDF";

/// Average glyph advance as a fraction of the font size, used to estimate
/// block widths without loading font metrics.
const AVG_GLYPH_WIDTH: f64 = 0.5;

/// Descender depth below the baseline as a fraction of the font size.
const DESCENT_RATIO: f64 = 0.2;

/// `TJ` adjustments more negative than this (thousandths of an em) are read
/// as a word gap.
const TJ_SPACE_THRESHOLD: f64 = -200.0;

/// Guard against cyclic `/Parent` chains when resolving inherited attributes.
const MAX_PAGE_TREE_DEPTH: usize = 32;

/// US Letter, used when a page declares no MediaBox at any level.
const DEFAULT_PAGE_SIZE: (f64, f64) = (612.0, 792.0);

/// Document info keys and the metadata names they are reported under.
const INFO_FIELDS: [(&str, &str); 7] = [
    ("Title", "title"),
    ("Author", "author"),
    ("Subject", "subject"),
    ("Creator", "creator"),
    ("Producer", "producer"),
    ("CreationDate", "creation_date"),
    ("ModDate", "mod_date"),
];

/// Extractor for PDF documents.
///
/// Pages are emitted in physical order with 1-based numbers. Each page carries
/// its plain text, one text block per `BT … ET` text object with an
/// approximate bounding box, and its size in points (rotation applied).
/// Table structure is not recovered.
pub struct PdfExtractor;

impl PdfExtractor {
    /// Parse and extract synchronously. lopdf work is CPU-bound, so
    /// [`Extractor::process`] runs this on the blocking pool.
    pub fn extract_document(data: &[u8], file_name: &str) -> Result<ExtractionResult> {
        if data.is_empty() {
            return Err(Error::Extraction(format!(
                "Cannot extract text from empty PDF data ('{}')",
                file_name
            )));
        }

        if data.len() < 4 || &data[0..4] != b"%PDF" {
            return Err(Error::Extraction(format!(
                "File '{}' is not a valid PDF (missing %PDF header)",
                file_name
            )));
        }

        let doc = Document::load_mem(data).map_err(|e| {
            Error::Extraction(format!("Failed to parse PDF '{}': {}", file_name, e))
        })?;

        doc.catalog().map_err(|e| {
            Error::Extraction(format!(
                "PDF '{}' has no document catalog: {}",
                file_name, e
            ))
        })?;

        let metadata = document_metadata(&doc);

        // get_pages() is keyed by page number, so iteration follows physical order
        let page_ids = doc.get_pages();
        let mut pages = Vec::with_capacity(page_ids.len());
        for (page_number, page_id) in page_ids {
            pages.push(extract_page(&doc, page_number, page_id, file_name)?);
        }

        let full_text = pages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join(PAGE_SEPARATOR);

        debug!(
            file_name,
            page_count = pages.len(),
            char_count = full_text.chars().count(),
            "PDF extracted"
        );

        Ok(ExtractionResult {
            file_name: file_name.to_string(),
            file_type: PDF_FILE_TYPE.to_string(),
            full_text: Some(full_text),
            page_count: Some(pages.len() as u32),
            metadata,
            pages,
            error: None,
        })
    }
}

#[async_trait]
impl Extractor for PdfExtractor {
    fn keys(&self) -> &[&'static str] {
        &["pdf", "application/pdf"]
    }

    async fn process(
        &self,
        data: &[u8],
        file_name: &str,
        _content_type: Option<&str>,
    ) -> Result<ExtractionResult> {
        let data = data.to_vec();
        let owned_name = file_name.to_string();
        tokio::task::spawn_blocking(move || Self::extract_document(&data, &owned_name))
            .await
            .map_err(|e| {
                Error::Extraction(format!("PDF extraction task for '{}' failed: {}", file_name, e))
            })?
    }

    fn name(&self) -> &str {
        "pdf"
    }
}

fn extract_page(
    doc: &Document,
    page_number: u32,
    page_id: ObjectId,
    file_name: &str,
) -> Result<PageResult> {
    let (width, height) = page_size(doc, page_id);

    let content = doc.get_page_content(page_id).map_err(|e| {
        Error::Extraction(format!(
            "Failed to read content of page {} in '{}': {}",
            page_number, file_name, e
        ))
    })?;
    let operations = Content::decode(&content)
        .map_err(|e| {
            Error::Extraction(format!(
                "Failed to decode content of page {} in '{}': {}",
                page_number, file_name, e
            ))
        })?
        .operations;

    let text_blocks = text_blocks(&operations, height);

    let text = match doc.extract_text(&[page_number]) {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => blocks_text(&text_blocks),
        Err(e) => {
            warn!(file_name, page_number, error = %e, "Page text extraction failed, using text blocks");
            blocks_text(&text_blocks)
        }
    };

    Ok(PageResult {
        page_number,
        text,
        text_blocks,
        width,
        height,
    })
}

fn blocks_text(blocks: &[TextBlock]) -> String {
    blocks
        .iter()
        .map(|b| b.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

// =============================================================================
// DOCUMENT METADATA
// =============================================================================

fn document_metadata(doc: &Document) -> BTreeMap<String, String> {
    let info = doc
        .trailer
        .get(b"Info")
        .ok()
        .map(|obj| resolve(doc, obj))
        .and_then(|obj| obj.as_dict().ok());

    INFO_FIELDS
        .iter()
        .map(|(key, name)| {
            let value = info
                .and_then(|dict| dict_string(doc, dict, key.as_bytes()))
                .unwrap_or_default();
            (name.to_string(), value)
        })
        .collect()
}

fn dict_string(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<String> {
    match resolve(doc, dict.get(key).ok()?) {
        Object::String(bytes, _) => Some(decode_pdf_string(bytes)),
        Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
        _ => None,
    }
}

/// Decode a PDF text string: UTF-16BE with BOM, UTF-8 with BOM, otherwise
/// single-byte (PDFDocEncoding is Latin-1 for the printable range).
fn decode_pdf_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(rest).into_owned();
    }
    bytes.iter().map(|&b| b as char).collect()
}

// =============================================================================
// PAGE GEOMETRY
// =============================================================================

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        other => other,
    }
}

/// Look up a page attribute, walking `/Parent` links for inheritable keys.
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_PAGE_TREE_DEPTH {
        if let Ok(value) = node.get(key) {
            return Some(resolve(doc, value));
        }
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}

fn page_size(doc: &Document, page_id: ObjectId) -> (f64, f64) {
    let (width, height) = inherited(doc, page_id, b"MediaBox")
        .and_then(|obj| obj.as_array().ok())
        .and_then(|arr| {
            let coords: Vec<f64> = arr
                .iter()
                .filter_map(|o| resolve(doc, o).as_float().ok())
                .map(f64::from)
                .collect();
            match coords.as_slice() {
                [x0, y0, x1, y1] => Some(((x1 - x0).abs(), (y1 - y0).abs())),
                _ => None,
            }
        })
        .unwrap_or(DEFAULT_PAGE_SIZE);

    let rotation = inherited(doc, page_id, b"Rotate")
        .and_then(|obj| obj.as_i64().ok())
        .unwrap_or(0);

    if rotation.rem_euclid(180) == 90 {
        (height, width)
    } else {
        (width, height)
    }
}

// =============================================================================
// TEXT BLOCKS
// =============================================================================

/// Accumulates one `BT … ET` text object.
#[derive(Default)]
struct BlockBuilder {
    line_x: f64,
    line_y: f64,
    cursor_x: f64,
    scale: f64,
    text: String,
    /// (x0, y0, x1, y1) in PDF user space (bottom-left origin).
    bounds: Option<(f64, f64, f64, f64)>,
}

impl BlockBuilder {
    fn new() -> Self {
        Self {
            scale: 1.0,
            ..Default::default()
        }
    }

    fn break_line(&mut self) {
        if !self.text.is_empty() && !self.text.ends_with('\n') {
            self.text.push('\n');
        }
    }

    fn gap(&mut self) {
        if !self.text.is_empty() && !self.text.ends_with(char::is_whitespace) {
            self.text.push(' ');
        }
    }

    fn move_line(&mut self, tx: f64, ty: f64) {
        self.line_x += tx * self.scale;
        self.line_y += ty * self.scale;
        self.cursor_x = self.line_x;
        if ty != 0.0 {
            self.break_line();
        } else if tx != 0.0 {
            self.gap();
        }
    }

    fn set_matrix(&mut self, scale: f64, x: f64, y: f64) {
        if y != self.line_y {
            self.break_line();
        }
        self.scale = if scale == 0.0 { 1.0 } else { scale };
        self.line_x = x;
        self.line_y = y;
        self.cursor_x = x;
    }

    fn show(&mut self, bytes: &[u8], font_size: f64) {
        let decoded: String = decode_pdf_string(bytes)
            .chars()
            .filter(|c| !c.is_control() || *c == '\n')
            .collect();
        if decoded.is_empty() {
            return;
        }

        let size = (font_size * self.scale).abs();
        let advance = decoded.chars().count() as f64 * size * AVG_GLYPH_WIDTH;
        let (x0, y0) = (self.cursor_x, self.line_y - size * DESCENT_RATIO);
        let (x1, y1) = (self.cursor_x + advance, self.line_y + size);

        self.bounds = Some(match self.bounds {
            Some((bx0, by0, bx1, by1)) => (bx0.min(x0), by0.min(y0), bx1.max(x1), by1.max(y1)),
            None => (x0, y0, x1, y1),
        });
        self.cursor_x += advance;
        self.text.push_str(&decoded);
    }

    fn finish(self, page_height: f64) -> Option<TextBlock> {
        let text = self.text.trim().to_string();
        let (x0, y0, x1, y1) = self.bounds?;
        if text.is_empty() {
            return None;
        }
        Some(TextBlock {
            text,
            bbox: BoundingBox::new(x0, page_height - y1, x1, page_height - y0),
        })
    }
}

fn operand(operands: &[Object], index: usize) -> Option<f64> {
    operands.get(index)?.as_float().ok().map(f64::from)
}

fn string_operand(operands: &[Object], index: usize) -> Option<&[u8]> {
    match operands.get(index)? {
        Object::String(bytes, _) => Some(bytes.as_slice()),
        _ => None,
    }
}

/// Group the page's text-showing operators into positioned blocks.
fn text_blocks(operations: &[Operation], page_height: f64) -> Vec<TextBlock> {
    let mut blocks = Vec::new();
    let mut font_size = 0.0;
    let mut leading = 0.0;
    let mut current: Option<BlockBuilder> = None;

    for op in operations {
        let operands = op.operands.as_slice();
        match op.operator.as_str() {
            "BT" => current = Some(BlockBuilder::new()),
            "ET" => {
                if let Some(block) = current.take().and_then(|b| b.finish(page_height)) {
                    blocks.push(block);
                }
            }
            // Font and leading are text state, kept across text objects
            "Tf" => font_size = operand(operands, 1).unwrap_or(font_size),
            "TL" => leading = operand(operands, 0).unwrap_or(leading),
            _ => {
                let Some(block) = current.as_mut() else {
                    continue;
                };
                match op.operator.as_str() {
                    "Td" | "TD" => {
                        let tx = operand(operands, 0).unwrap_or(0.0);
                        let ty = operand(operands, 1).unwrap_or(0.0);
                        if op.operator == "TD" {
                            leading = -ty;
                        }
                        block.move_line(tx, ty);
                    }
                    "Tm" => {
                        let d = operand(operands, 3).unwrap_or(1.0);
                        let e = operand(operands, 4).unwrap_or(0.0);
                        let f = operand(operands, 5).unwrap_or(0.0);
                        block.set_matrix(d, e, f);
                    }
                    "T*" => block.move_line(0.0, -leading),
                    "Tj" => {
                        if let Some(bytes) = string_operand(operands, 0) {
                            block.show(bytes, font_size);
                        }
                    }
                    "'" => {
                        block.move_line(0.0, -leading);
                        if let Some(bytes) = string_operand(operands, 0) {
                            block.show(bytes, font_size);
                        }
                    }
                    "\"" => {
                        block.move_line(0.0, -leading);
                        if let Some(bytes) = string_operand(operands, 2) {
                            block.show(bytes, font_size);
                        }
                    }
                    "TJ" => {
                        if let Some(Ok(items)) = operands.first().map(Object::as_array) {
                            for item in items {
                                match item {
                                    Object::String(bytes, _) => block.show(bytes, font_size),
                                    other => {
                                        if let Ok(adjust) = other.as_float() {
                                            if f64::from(adjust) < TJ_SPACE_THRESHOLD {
                                                block.gap();
                                            }
                                        }
                                    }
                                }
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    // Unterminated text object at end of stream
    if let Some(block) = current.and_then(|b| b.finish(page_height)) {
        blocks.push(block);
    }

    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{pdf_from_content_streams, pdf_with_info, pdf_with_pages};

    #[test]
    fn test_pdf_keys_and_name() {
        let extractor = PdfExtractor;
        assert_eq!(extractor.keys(), &["pdf", "application/pdf"]);
        assert_eq!(extractor.name(), "pdf");
    }

    #[tokio::test]
    async fn test_pdf_empty_input() {
        let err = PdfExtractor
            .process(b"", "empty.pdf", Some("application/pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Extraction(_)));
        assert!(err.to_string().contains("empty"), "got: {}", err);
    }

    #[tokio::test]
    async fn test_pdf_missing_header() {
        let err = PdfExtractor
            .process(b"not a pdf at all", "bad.pdf", None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not a valid PDF"), "got: {}", err);
    }

    #[tokio::test]
    async fn test_pdf_corrupt_body() {
        let err = PdfExtractor
            .process(b"%PDF-1.4\ngarbage without objects", "corrupt.pdf", None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Extraction(_)));
        assert!(err.to_string().contains("corrupt.pdf"));
    }

    #[tokio::test]
    async fn test_pdf_three_pages_in_order() {
        let data = pdf_with_pages(&["Page One", "Page Two", "Page Three"]);
        let result = PdfExtractor.process(&data, "a.pdf", None).await.unwrap();

        assert_eq!(result.file_name, "a.pdf");
        assert_eq!(result.file_type, "PDF");
        assert_eq!(result.page_count, Some(3));
        assert!(result.error.is_none());

        let numbers: Vec<u32> = result.pages.iter().map(|p| p.page_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);

        let block_texts: Vec<&str> = result
            .pages
            .iter()
            .map(|p| p.text_blocks[0].text.as_str())
            .collect();
        assert_eq!(block_texts, vec!["Page One", "Page Two", "Page Three"]);

        for page in &result.pages {
            assert!(!page.text.trim().is_empty());
            assert_eq!(page.width, 612.0);
            assert_eq!(page.height, 792.0);
        }

        let full_text = result.full_text.unwrap();
        assert!(!full_text.is_empty());
        let one = full_text.find("One").unwrap();
        let two = full_text.find("Two").unwrap();
        let three = full_text.find("Three").unwrap();
        assert!(one < two && two < three);
    }

    #[tokio::test]
    async fn test_pdf_full_text_joins_pages_with_blank_line() {
        let data = pdf_with_pages(&["Alpha", "Beta"]);
        let result = PdfExtractor.process(&data, "ab.pdf", None).await.unwrap();
        let expected = format!("{}\n\n{}", result.pages[0].text, result.pages[1].text);
        assert_eq!(result.full_text.as_deref(), Some(expected.as_str()));
    }

    #[tokio::test]
    async fn test_pdf_metadata_defaults_to_empty() {
        let data = pdf_with_pages(&["x"]);
        let result = PdfExtractor.process(&data, "x.pdf", None).await.unwrap();

        assert_eq!(result.metadata.len(), 7);
        for key in [
            "title",
            "author",
            "subject",
            "creator",
            "producer",
            "creation_date",
            "mod_date",
        ] {
            assert_eq!(result.metadata.get(key).map(String::as_str), Some(""), "{}", key);
        }
    }

    #[tokio::test]
    async fn test_pdf_metadata_from_info_dictionary() {
        let data = pdf_with_info(
            &["Body"],
            &[
                ("Title", "Quarterly Report"),
                ("Author", "Finance Team"),
                ("CreationDate", "D:20250107103000Z"),
            ],
        );
        let result = PdfExtractor.process(&data, "q.pdf", None).await.unwrap();
        assert_eq!(result.metadata["title"], "Quarterly Report");
        assert_eq!(result.metadata["author"], "Finance Team");
        assert_eq!(result.metadata["creation_date"], "D:20250107103000Z");
        assert_eq!(result.metadata["subject"], "");
    }

    #[tokio::test]
    async fn test_pdf_block_bounding_box() {
        let data = pdf_from_content_streams(&["BT /F1 12 Tf 72 720 Td (Hello) Tj ET".to_string()]);
        let result = PdfExtractor.process(&data, "h.pdf", None).await.unwrap();
        let block = &result.pages[0].text_blocks[0];

        assert_eq!(block.text, "Hello");
        assert!((block.bbox.x0 - 72.0).abs() < 1e-6);
        assert!((block.bbox.x1 - 102.0).abs() < 1e-6);
        // Top-left origin: baseline 720 + 12pt ascent sits 60pt below the top edge
        assert!((block.bbox.y0 - 60.0).abs() < 1e-6);
        assert!((block.bbox.y1 - 74.4).abs() < 1e-3);
    }

    #[tokio::test]
    async fn test_pdf_multiple_blocks_and_lines() {
        let content = "BT /F1 12 Tf 72 720 Td (Line one) Tj 0 -14 Td (Line two) Tj ET \
                       BT /F1 10 Tf 72 100 Td [(Foot) -300 (note)] TJ ET"
            .to_string();
        let data = pdf_from_content_streams(&[content]);
        let result = PdfExtractor.process(&data, "m.pdf", None).await.unwrap();
        let blocks = &result.pages[0].text_blocks;

        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].text, "Line one\nLine two");
        assert_eq!(blocks[1].text, "Foot note");
        // Second block is lower on the page, so further from the top
        assert!(blocks[1].bbox.y0 > blocks[0].bbox.y1);
    }

    #[tokio::test]
    async fn test_pdf_page_without_text() {
        let data = pdf_from_content_streams(&["0 0 m 100 100 l S".to_string()]);
        let result = PdfExtractor.process(&data, "blank.pdf", None).await.unwrap();
        assert_eq!(result.page_count, Some(1));
        assert!(result.pages[0].text_blocks.is_empty());
        assert!(result.pages[0].text.trim().is_empty());
    }

    #[tokio::test]
    async fn test_pdf_extraction_is_deterministic() {
        let data = pdf_with_info(&["Same", "Bytes"], &[("Title", "T")]);
        let first = PdfExtractor.process(&data, "d.pdf", None).await.unwrap();
        let second = PdfExtractor.process(&data, "d.pdf", None).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_pdf_blocking_pool_matches_direct_extraction() {
        let data = pdf_with_pages(&["Offloaded"]);
        let direct = PdfExtractor::extract_document(&data, "o.pdf").unwrap();
        let pooled = PdfExtractor.process(&data, "o.pdf", None).await.unwrap();
        assert_eq!(direct, pooled);

        let err = PdfExtractor.process(b"not a pdf", "o.pdf", None).await.unwrap_err();
        assert!(matches!(err, Error::Extraction(_)));
    }

    #[test]
    fn test_decode_pdf_string_variants() {
        assert_eq!(decode_pdf_string(b"plain"), "plain");
        assert_eq!(decode_pdf_string(&[0xFE, 0xFF, 0x00, 0x41, 0x00, 0x42]), "AB");
        assert_eq!(decode_pdf_string(&[0xEF, 0xBB, 0xBF, b'o', b'k']), "ok");
        assert_eq!(decode_pdf_string(&[0xE9]), "é");
    }

    #[test]
    fn test_text_blocks_ignores_text_outside_bt() {
        let ops = vec![Operation::new("Tj", vec![Object::string_literal("stray")])];
        assert!(text_blocks(&ops, 792.0).is_empty());
    }

    #[test]
    fn test_text_blocks_tm_and_tstar() {
        let ops = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![Object::Name(b"F1".to_vec()), 10.into()]),
            Operation::new("TL", vec![12.into()]),
            Operation::new(
                "Tm",
                vec![1.into(), 0.into(), 0.into(), 1.into(), 50.into(), 500.into()],
            ),
            Operation::new("Tj", vec![Object::string_literal("first")]),
            Operation::new("T*", vec![]),
            Operation::new("Tj", vec![Object::string_literal("second")]),
            Operation::new("ET", vec![]),
        ];
        let blocks = text_blocks(&ops, 800.0);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].text, "first\nsecond");
        assert!((blocks[0].bbox.x0 - 50.0).abs() < 1e-6);
    }
}
