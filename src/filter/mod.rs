// src/filter/mod.rs
// =============================================================================
// Text-level machinery, independent of courses and activities.
//
// Submodules:
// - phrases: longest-first phrase substitution that skips tags and
//   already-replaced text
// - text: strip_tags / escape helpers
// =============================================================================

mod phrases;
mod text;

pub use phrases::{filter_phrases, FilterPhrase};
pub use text::{escape, strip_tags};
