//! Search results: the per-cut-point table and its on-disk form.

pub mod persist;
pub mod store;

pub use persist::PersistError;
pub use store::{ResultRow, ResultStore};
