// src/activity/embed.rs
// =============================================================================
// Prepares one H5P activity for embedding.
//
// This is the same work the LMS embed endpoint does before it renders a
// player:
// 1. Resolve the course module (it must be an hvp module)
// 2. Resolve its course
// 3. Load and validate its content record
// 4. Put the player assets on the page
// 5. Record that the viewer saw it
//
// It returns the content id, which div-style markup carries in its
// `data-content-id` attribute.
//
// NOTE: steps 4 and 5 are side effects. The index builder calls this for
// every eligible module when it builds div markup, so building an index
// logs a view for modules nobody opened. The builder keeps that behavior.
// =============================================================================

use thiserror::Error;
use tracing::debug;

use crate::host::{CourseHost, HvpContent, HVP_MODNAME};

/// Why an activity can't be embedded. The messages are shown to users.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EmbedError {
    #[error("Invalid course module ID: {0}")]
    InvalidCourseModule(u64),
    #[error("Course {course} of module {cmid} is misconfigured")]
    CourseMisconfigured { cmid: u64, course: u64 },
    #[error("Invalid H5P content in module {0}")]
    InvalidContent(u64),
}

/// Validates and registers the content of an hvp module; returns its content id.
pub fn embed_content<H: CourseHost + ?Sized>(host: &H, cmid: u64) -> Result<u64, EmbedError> {
    let cm = host
        .module_by_type_and_id(HVP_MODNAME, cmid)
        .ok_or(EmbedError::InvalidCourseModule(cmid))?;

    let course = host.course(cm.course).ok_or(EmbedError::CourseMisconfigured {
        cmid,
        course: cm.course,
    })?;

    let content = host
        .content(cm.instance)
        .filter(is_valid_content)
        .ok_or(EmbedError::InvalidContent(cmid))?;

    host.add_assets_to_page(&content);
    host.log_viewed(&cm, &content);

    debug!(cmid, course = course.id, content_id = content.id, "prepared embed");
    Ok(content.id)
}

// A content record without a main library can't be played
fn is_valid_content(content: &HvpContent) -> bool {
    !content.library.trim().is_empty()
}
