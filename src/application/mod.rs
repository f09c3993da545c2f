//! Application layer: the handler boundary, built-in handlers and repository seams.

pub mod error;
pub mod handler;
pub mod handlers;
pub mod registry;
pub mod repos;
