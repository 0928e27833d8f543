//! Core data models for the media ingestion service.
//!
//! Upload requests flow in, objects land in a bucket, and metadata plus
//! carousel rows are persisted in SQLite via `sqlx`. Everything serializes
//! as JSON via `serde` for the HTTP layer.

pub mod carousel;
pub mod image;
pub mod object;
pub mod upload;
