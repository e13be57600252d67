//! Durable document store for crewfs.
//!
//! Shared state lives in JSON documents that are only ever replaced
//! atomically and only ever mutated inside [`DocumentStore::locked_transaction`].
//! Reads validate shape on the way in; writes validate on the way out.

mod document;
mod schema;

#[cfg(test)]
mod tests;

pub use document::DocumentStore;
pub use schema::{FieldError, Validate, require_non_empty};
