//! # etl-storage
//!
//! Object store access for the extraction engine.
//!
//! [`S3RetrievalGateway`] implements [`etl_core::RetrievalGateway`] against
//! any S3-compatible endpoint using path-style addressing (MinIO).

pub mod config;
pub mod gateway;

pub use config::StorageConfig;
pub use gateway::S3RetrievalGateway;
