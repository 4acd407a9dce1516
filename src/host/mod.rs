// src/host/mod.rs
// =============================================================================
// Everything the filter needs from the learning-management system.
//
// The filter never talks to a database or a session directly. It asks a
// CourseHost for plain data:
// - which modules a viewer can see in a course
// - course and content records
// - which filters also run on headings
// and it tells the host when an embed is prepared (assets + view event).
//
// Submodules:
// - manifest: a CourseHost backed by a JSON file (used by the CLI)
// =============================================================================

mod manifest;
#[cfg(test)]
pub(crate) mod testing;

pub use manifest::ManifestHost;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;
use url::Url;

/// Module type name of interactive H5P activities.
pub const HVP_MODNAME: &str = "hvp";

/// A course module as the host reports it for one viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInfo {
    /// Course module id
    pub id: u64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default = "default_true")]
    pub visible: bool,
    /// Labels and other inline modules have no page of their own
    #[serde(default = "default_true")]
    pub has_view: bool,
    /// Visible to this viewer after access rules
    #[serde(default = "default_true")]
    pub user_visible: bool,
    /// Module type, e.g. "hvp", "label", "forum"
    pub modname: String,
    /// Id of the module's own instance record
    pub instance: u64,
    pub course: u64,
}

fn default_true() -> bool {
    true
}

impl ModuleInfo {
    // The access rules the filter uses to decide if a module can be linked
    pub fn is_linkable(&self) -> bool {
        self.visible && self.has_view && self.user_visible
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: u64,
    #[serde(default)]
    pub fullname: String,
}

/// An H5P content record, the thing an embed actually shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HvpContent {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    /// Main library, e.g. "H5P.InteractiveVideo 1.22"
    #[serde(default)]
    pub library: String,
    /// Content parameters as stored by the host
    #[serde(default)]
    pub json: String,
}

/// The data source behind the filter.
///
/// Everything runs on one thread per request, so side-effecting calls take
/// `&self` and implementations keep their own interior mutability.
pub trait CourseHost {
    /// Base URL of the site, used to build embed links
    fn wwwroot(&self) -> &Url;

    /// Modules of a course with visibility resolved for the current viewer.
    fn visible_modules(&self, course_id: u64, viewer_id: u64) -> Result<Vec<ModuleInfo>>;

    /// Looks a course module up, but only if it is of type `modname`.
    fn module_by_type_and_id(&self, modname: &str, cmid: u64) -> Option<ModuleInfo>;

    /// Filters that also run on headings and titles, not just body text
    fn active_string_filters(&self) -> BTreeSet<String>;

    fn course(&self, course_id: u64) -> Option<Course>;

    fn content(&self, instance_id: u64) -> Option<HvpContent>;

    /// Makes the H5P player scripts and styles available to the page.
    fn add_assets_to_page(&self, content: &HvpContent);

    /// Records a "content viewed" event for the current viewer.
    fn log_viewed(&self, module: &ModuleInfo, content: &HvpContent);
}

/// Where the text being filtered is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "level", rename_all = "snake_case")]
pub enum ContextLevel {
    System,
    User,
    Course { course_id: u64 },
    /// Text that belongs to one activity (its intro, its page)
    Module { course_id: u64, cmid: u64 },
    /// A block, which may or may not sit on a course page
    Block { course_id: Option<u64> },
}

/// The enclosing course of a rendering context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CourseContext {
    pub course_id: u64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContextError {
    #[error("context is not inside a course")]
    NotInCourse,
}

/// Who is looking at the text and where it is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterContext {
    pub level: ContextLevel,
    pub viewer_id: u64,
}

impl FilterContext {
    pub fn new(level: ContextLevel, viewer_id: u64) -> Self {
        Self { level, viewer_id }
    }

    /// Resolves the course this context belongs to.
    ///
    /// `Ok(None)` means "not in a course". With `strict` set that case is an
    /// error instead.
    pub fn course_context(&self, strict: bool) -> Result<Option<CourseContext>, ContextError> {
        let course_id = match self.level {
            ContextLevel::Course { course_id } | ContextLevel::Module { course_id, .. } => {
                Some(course_id)
            }
            ContextLevel::Block { course_id } => course_id,
            ContextLevel::System | ContextLevel::User => None,
        };

        match course_id {
            Some(course_id) => Ok(Some(CourseContext { course_id })),
            None if strict => Err(ContextError::NotInCourse),
            None => Ok(None),
        }
    }

    /// The activity whose own text this is, if any
    pub fn module_id(&self) -> Option<u64> {
        match self.level {
            ContextLevel::Module { cmid, .. } => Some(cmid),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_context_has_course_and_module() {
        let ctx = FilterContext::new(ContextLevel::Module { course_id: 3, cmid: 9 }, 1);
        assert_eq!(ctx.course_context(false), Ok(Some(CourseContext { course_id: 3 })));
        assert_eq!(ctx.module_id(), Some(9));
    }

    #[test]
    fn test_system_context_is_not_in_course() {
        let ctx = FilterContext::new(ContextLevel::System, 1);
        assert_eq!(ctx.course_context(false), Ok(None));
        assert_eq!(ctx.course_context(true), Err(ContextError::NotInCourse));
        assert_eq!(ctx.module_id(), None);
    }

    #[test]
    fn test_block_context_follows_its_page() {
        let on_course = FilterContext::new(ContextLevel::Block { course_id: Some(4) }, 1);
        let on_dashboard = FilterContext::new(ContextLevel::Block { course_id: None }, 1);
        assert_eq!(on_course.course_context(false), Ok(Some(CourseContext { course_id: 4 })));
        assert_eq!(on_dashboard.course_context(false), Ok(None));
    }

    #[test]
    fn test_linkable_rules() {
        let mut cm = ModuleInfo {
            id: 1,
            name: "Quiz".into(),
            url: None,
            visible: true,
            has_view: true,
            user_visible: true,
            modname: HVP_MODNAME.into(),
            instance: 1,
            course: 1,
        };
        assert!(cm.is_linkable());
        cm.has_view = false;
        assert!(!cm.is_linkable());
        cm.has_view = true;
        cm.user_visible = false;
        assert!(!cm.is_linkable());
    }
}
