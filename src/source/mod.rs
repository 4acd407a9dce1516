// src/source/mod.rs
// =============================================================================
// Loading input documents for the command line (files, URLs, stdin).
//
// Filtering itself is synchronous; only this loading step is async.
// =============================================================================

mod fetch;

pub use fetch::{load_documents, InputFormat};
