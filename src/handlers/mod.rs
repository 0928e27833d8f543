pub mod carousel_handlers;
pub mod health_handlers;
pub mod ingest_handlers;
pub mod object_handlers;
