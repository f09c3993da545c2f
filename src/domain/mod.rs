//! Domain layer types and invariants.

pub mod arguments;
pub mod error;
pub mod keys;
pub mod news;
