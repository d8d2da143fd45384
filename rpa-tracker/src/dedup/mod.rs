//! Deduplication of incoming work.
//!
//! A [`DeduplicationStrategy`] turns a payload into a fingerprint and maps
//! fingerprints to transactions. Strategies are chosen per process code
//! through a [`DeduplicationRegistry`] that the tracker receives at
//! construction time.

mod fields;
mod registry;
mod strategy;

pub use fields::{hash_key, FieldDeduplication, HashedFieldDeduplication, DEFAULT_SEPARATOR};
pub use registry::DeduplicationRegistry;
pub use strategy::DeduplicationStrategy;
