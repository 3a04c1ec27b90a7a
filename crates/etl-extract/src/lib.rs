//! # etl-extract
//!
//! File-type routing and the format-specific extractors.
//!
//! The [`ProcessorRouter`] picks an extractor from the declared content type
//! or the file extension. Files with no registered extractor produce an
//! [`etl_core::ExtractionResult`] carrying an `error` instead of failing.

pub mod extractors;
pub mod router;
pub mod test_fixtures;

pub use extractors::{PdfExtractor, StructuredExtractor, TextExtractor};
pub use router::ProcessorRouter;
