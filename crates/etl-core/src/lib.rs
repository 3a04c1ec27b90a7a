//! # etl-core
//!
//! Core types, traits, and abstractions for the extraction engine.
//!
//! This crate provides the data model that flows through the pipeline
//! (file-ready events, extraction results, job status), the error taxonomy,
//! and the capability traits implemented by extractors, the object store
//! adapter, and the persistence layer.

pub mod defaults;
pub mod error;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result, RetrievalError};
pub use models::*;
pub use traits::*;
