//! Merge checkpoint store.
//!
//! Remembers, per (source library, destination library) pair, which source
//! photos were already merged, skipped or failed, so repeated runs neither
//! duplicate photos nor redo finished work. The store is a single JSON
//! document, written atomically after every change, or an in-memory copy of
//! it for dry runs.

pub mod db;
pub mod error;
pub mod types;

pub use db::{JsonMergeDb, MergeStore};
pub use error::StateError;
pub use types::{MergeRecord, MergeSummary, MetadataSnapshot, RecordOutcome};
