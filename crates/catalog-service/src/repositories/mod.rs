//! Repository layer for the catalog service.
//!
//! Follows the Handler -> Repository pattern; storage is in memory.

pub mod cars;

pub use cars::{CarRepository, SortOrder};
