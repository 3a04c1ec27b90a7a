//! PDF fixtures for extractor and pipeline tests.
//!
//! Builds small, valid PDFs in memory with lopdf so tests never depend on
//! files checked into the repository.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use etl_extract::test_fixtures::pdf_with_pages;
//!
//! let bytes = pdf_with_pages(&["Page One", "Page Two", "Page Three"]);
//! ```

use lopdf::{dictionary, Document, Object, Stream, StringFormat};

/// Escape text for use inside a PDF literal string.
fn escape_literal(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('(', "\\(")
        .replace(')', "\\)")
}

/// Content stream drawing `text` as a single line in 12pt Helvetica.
pub fn text_content(text: &str) -> String {
    format!("BT /F1 12 Tf 72 720 Td ({}) Tj ET", escape_literal(text))
}

/// US Letter PDF with one page per entry, each showing that entry's text.
pub fn pdf_with_pages(page_texts: &[&str]) -> Vec<u8> {
    let streams: Vec<String> = page_texts.iter().map(|t| text_content(t)).collect();
    build_pdf(&streams, &[])
}

/// Like [`pdf_with_pages`], with a document information dictionary.
pub fn pdf_with_info(page_texts: &[&str], info: &[(&str, &str)]) -> Vec<u8> {
    let streams: Vec<String> = page_texts.iter().map(|t| text_content(t)).collect();
    build_pdf(&streams, info)
}

/// US Letter PDF with one page per raw content stream.
pub fn pdf_from_content_streams(streams: &[String]) -> Vec<u8> {
    build_pdf(streams, &[])
}

fn build_pdf(streams: &[String], info: &[(&str, &str)]) -> Vec<u8> {
    let mut doc = Document::with_version("1.4");

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let pages_id = doc.new_object_id();

    let mut page_ids = Vec::with_capacity(streams.len());
    for content in streams {
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.clone().into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => resources_id,
            "Contents" => content_id,
        });
        page_ids.push(page_id);
    }

    let kids: Vec<Object> = page_ids.iter().map(|&id| id.into()).collect();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => Object::Integer(page_ids.len() as i64),
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    if !info.is_empty() {
        let mut dict = lopdf::Dictionary::new();
        for (key, value) in info {
            dict.set(
                key.as_bytes().to_vec(),
                Object::String(value.as_bytes().to_vec(), StringFormat::Literal),
            );
        }
        let info_id = doc.add_object(dict);
        doc.trailer.set("Info", info_id);
    }

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .expect("Failed to serialize fixture PDF");
    buffer
}
