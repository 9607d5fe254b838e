//! Event data: the immutable weighted table and its on-disk sources.

pub mod loader;
pub mod table;

pub use loader::{open, TableFormat};
pub use table::{DataError, EventRecord, EventTable};
