//! kura-core: embedded, file-backed key-value store with unitemporal
//! versioning, bitemporal milestoning, secondary indices and joins.
//!
//! Storage is JSON-per-key under one directory per partition; everything is
//! durable and inspectable with a text editor. See [`Kura`] for the entry
//! point.

mod backup;
pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod index;
pub mod key;
pub mod kura;
pub mod layout;
pub mod partition;
pub mod record;
pub mod time;

// Re-export commonly used types
pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use kura::Kura;
pub use partition::{BitemporalPartition, Join, Partition, VersionedPartition};
pub use record::{BitemporalRecord, Metadata, Slice, VersionSlot, VersionedRecord};
pub use time::INFINITY_TIME;
