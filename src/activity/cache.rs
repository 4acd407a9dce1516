// src/activity/cache.rs
// =============================================================================
// The filter entry point and its per-viewer cache.
//
// Building an index costs a module listing (and, for div embeds, one embed
// preparation per activity), while a single page can run the filter dozens
// of times. So the last index is kept and reused as long as the course and
// the viewer stay the same. Any change of either drops it and builds anew;
// old indexes are never merged with new ones.
//
// HvpFilter owns its cache. Give each worker its own filter: a cache is
// plain mutable state with no locking.
// =============================================================================

use std::borrow::Cow;
use tracing::debug;

use super::index::{build_index, ActivityIndex};
use crate::filter::filter_phrases;
use crate::host::{CourseHost, FilterContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CacheKey {
    course_id: u64,
    viewer_id: u64,
}

/// Remembers the most recent index for one (course, viewer) pair.
#[derive(Debug, Default)]
pub struct FilterCache {
    key: Option<CacheKey>,
    index: Option<ActivityIndex>,
    builds: usize,
}

impl FilterCache {
    /// Returns the cached index for this course and viewer, building it if needed.
    pub fn get_or_build<H: CourseHost + ?Sized>(
        &mut self,
        host: &H,
        course_id: u64,
        viewer_id: u64,
    ) -> &ActivityIndex {
        let key = CacheKey { course_id, viewer_id };

        if self.key != Some(key) {
            if self.index.is_some() {
                debug!(course_id, viewer_id, "course or viewer changed, dropping cached index");
            }
            self.invalidate();
            self.key = Some(key);
        }

        if self.index.is_none() {
            self.builds += 1;
            debug!(course_id, viewer_id, "building activity index");
        }
        self.index
            .get_or_insert_with(|| build_index(host, course_id, viewer_id))
    }

    /// Forgets the cached index; the next lookup rebuilds it.
    pub fn invalidate(&mut self) {
        self.index = None;
    }

    /// How many indexes have been built so far
    pub fn builds(&self) -> usize {
        self.builds
    }
}

/// Embeds H5P activities wherever their names appear in a text.
#[derive(Debug, Default)]
pub struct HvpFilter {
    cache: FilterCache,
}

impl HvpFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filters one piece of text rendered in `context`.
    ///
    /// Text outside a course comes back untouched, as does text with no
    /// activity names in it. Text that belongs to an activity never embeds
    /// that same activity.
    pub fn filter<'t, H: CourseHost + ?Sized>(
        &mut self,
        host: &H,
        text: &'t str,
        context: &FilterContext,
    ) -> Cow<'t, str> {
        let Ok(Some(course)) = context.course_context(false) else {
            return Cow::Borrowed(text);
        };

        let index = self
            .cache
            .get_or_build(host, course.course_id, context.viewer_id);
        if index.is_empty() {
            return Cow::Borrowed(text);
        }

        let phrases = index.phrases_excluding(context.module_id());
        filter_phrases(text, &phrases)
    }

    pub fn cache(&self) -> &FilterCache {
        &self.cache
    }
}
