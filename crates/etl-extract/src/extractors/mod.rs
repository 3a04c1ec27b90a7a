//! Format-specific extractors.

pub mod pdf;
pub mod structured;
pub mod text;

pub use pdf::PdfExtractor;
pub use structured::StructuredExtractor;
pub use text::TextExtractor;
