//! Ingestion pipeline: key generation, the capability traits for the three
//! stores with their concrete adapters, and the orchestrator sequencing them.

pub mod bucket_registry;
pub mod carousel_repository;
pub mod ingestion_service;
pub mod key_generator;
pub mod metadata_repository;
pub mod object_store;
pub mod outcome;
pub mod repository;

#[cfg(test)]
pub mod testing;
