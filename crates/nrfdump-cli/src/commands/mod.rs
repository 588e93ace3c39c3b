//! CLI command implementations.

pub mod dump;
pub mod find;
pub mod marker;
