// src/activity/mod.rs
// =============================================================================
// Turns a course's H5P activities into filter phrases and applies them.
//
// Submodules:
// - index: builds the longest-first phrase list for a course and viewer
// - cache: HvpFilter, the entry point, plus the per-viewer index cache
// - embed: prepares one activity for embedding (also the `embed` command)
// =============================================================================

mod cache;
mod embed;
mod index;

pub use cache::HvpFilter;
pub use embed::embed_content;
pub use index::{build_index, ActivityIndex, EmbedStyle};
