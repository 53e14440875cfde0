//! Column family definitions for RocksDB.
//!
//! Each entity lives in its own column family keyed by its id:
//! - staff: staff directory entries
//! - instructors: instructor directory entries
//! - requirements: training requirement catalog
//! - records: validity records, the bulk of the data (compressed)
//! - sessions: scheduled and historical training sessions

use rocksdb::{ColumnFamilyDescriptor, Options};

/// Column family name for staff members
pub const CF_STAFF: &str = "staff";

/// Column family name for instructors
pub const CF_INSTRUCTORS: &str = "instructors";

/// Column family name for the requirement catalog
pub const CF_REQUIREMENTS: &str = "requirements";

/// Column family name for validity records
pub const CF_RECORDS: &str = "records";

/// Column family name for training sessions
pub const CF_SESSIONS: &str = "sessions";

/// All column family names
pub const ALL_CF_NAMES: &[&str] = &[
    CF_STAFF,
    CF_INSTRUCTORS,
    CF_REQUIREMENTS,
    CF_RECORDS,
    CF_SESSIONS,
];

fn records_options() -> Options {
    let mut opts = Options::default();
    opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
    opts
}

/// Build all column family descriptors
pub fn build_cf_descriptors() -> Vec<ColumnFamilyDescriptor> {
    vec![
        ColumnFamilyDescriptor::new(CF_STAFF, Options::default()),
        ColumnFamilyDescriptor::new(CF_INSTRUCTORS, Options::default()),
        ColumnFamilyDescriptor::new(CF_REQUIREMENTS, Options::default()),
        ColumnFamilyDescriptor::new(CF_RECORDS, records_options()),
        ColumnFamilyDescriptor::new(CF_SESSIONS, Options::default()),
    ]
}
