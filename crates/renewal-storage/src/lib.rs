//! Storage layer for the renewal engine.
//!
//! Provides RocksDB-backed storage with:
//! - One column family per entity (staff, instructors, requirements,
//!   validity records, sessions)
//! - An atomic session swap via a single `WriteBatch`
//! - Record links kept consistent with the stored session set
//! - Bulk import of JSON datasets

pub mod column_families;
pub mod dataset;
pub mod db;
pub mod error;
mod store;

pub use dataset::{Dataset, ImportStats};
pub use db::{Storage, StorageStats};
pub use error::StorageError;
