//! Common utilities shared across the catalog gate crates.

#![warn(clippy::pedantic)]

/// Module for JWT utilities (header inspection, algorithm allow-list, constants)
pub mod jwt;
