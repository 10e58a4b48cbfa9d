//! Pure catalog logic shared by the storage layer and the admin surface.
//!
//! Nothing in this crate performs I/O: CSV batches are parsed from bytes the
//! caller already holds, the sort adapter rewrites an in-memory query
//! descriptor, and currency formatting works on raw attribute strings.

pub mod import;
pub mod money;
pub mod query;
pub mod types;
