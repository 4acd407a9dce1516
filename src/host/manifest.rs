// src/host/manifest.rs
// =============================================================================
// A CourseHost that reads everything from one JSON "course manifest".
//
// The manifest is how the command line gets course data without a running
// LMS. Example:
//
//   {
//     "wwwroot": "https://lms.example.edu",
//     "string_filters": ["hvp"],
//     "courses":  [{ "id": 2, "fullname": "Biology 101" }],
//     "modules":  [{ "id": 7, "name": "Cell Quiz", "modname": "hvp",
//                    "instance": 1, "course": 2 }],
//     "contents": [{ "id": 1, "library": "H5P.QuestionSet 1.20" }],
//     "hidden_for": { "5": [7] }
//   }
//
// `hidden_for` maps a user id to modules that user can't see, which is how
// the manifest expresses per-viewer access rules.
//
// Side effects (page assets, view events) are recorded in memory so the CLI
// can report them.
// =============================================================================

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use url::Url;

use super::{Course, CourseHost, HvpContent, ModuleInfo};

// On-disk shape of the manifest
#[derive(Debug, Deserialize)]
struct Manifest {
    wwwroot: String,
    #[serde(default)]
    string_filters: BTreeSet<String>,
    #[serde(default)]
    courses: Vec<Course>,
    #[serde(default)]
    modules: Vec<ModuleInfo>,
    #[serde(default)]
    contents: Vec<HvpContent>,
    #[serde(default)]
    hidden_for: HashMap<u64, BTreeSet<u64>>,
}

/// A recorded "content viewed" event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewEvent {
    pub cmid: u64,
    pub content_id: u64,
}

#[derive(Debug)]
pub struct ManifestHost {
    wwwroot: Url,
    string_filters: BTreeSet<String>,
    courses: HashMap<u64, Course>,
    modules: Vec<ModuleInfo>,
    contents: HashMap<u64, HvpContent>,
    hidden_for: HashMap<u64, BTreeSet<u64>>,
    assets: RefCell<BTreeSet<u64>>,
    views: RefCell<Vec<ViewEvent>>,
}

impl ManifestHost {
    /// Reads and parses a manifest file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("Invalid manifest {}", path.display()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let manifest: Manifest = serde_json::from_str(json)?;

        let wwwroot = Url::parse(&manifest.wwwroot)
            .map_err(|e| anyhow!("Invalid wwwroot '{}': {}", manifest.wwwroot, e))?;
        if wwwroot.cannot_be_a_base() {
            return Err(anyhow!("wwwroot must be an absolute http(s) URL: {}", wwwroot));
        }

        Ok(Self {
            wwwroot,
            string_filters: manifest.string_filters,
            courses: manifest.courses.into_iter().map(|c| (c.id, c)).collect(),
            modules: manifest.modules,
            contents: manifest.contents.into_iter().map(|c| (c.id, c)).collect(),
            hidden_for: manifest.hidden_for,
            assets: RefCell::new(BTreeSet::new()),
            views: RefCell::new(Vec::new()),
        })
    }

    /// Content ids whose player assets were added to the page
    pub fn assets(&self) -> Vec<u64> {
        self.assets.borrow().iter().copied().collect()
    }

    pub fn views(&self) -> Vec<ViewEvent> {
        self.views.borrow().clone()
    }
}

impl CourseHost for ManifestHost {
    fn wwwroot(&self) -> &Url {
        &self.wwwroot
    }

    fn visible_modules(&self, course_id: u64, viewer_id: u64) -> Result<Vec<ModuleInfo>> {
        if !self.courses.contains_key(&course_id) {
            return Err(anyhow!("Course {} not found in manifest", course_id));
        }

        let hidden = self.hidden_for.get(&viewer_id);
        let modules = self
            .modules
            .iter()
            .filter(|cm| cm.course == course_id)
            .map(|cm| {
                let mut cm = cm.clone();
                if hidden.is_some_and(|ids| ids.contains(&cm.id)) {
                    cm.user_visible = false;
                }
                cm
            })
            .collect();

        Ok(modules)
    }

    fn module_by_type_and_id(&self, modname: &str, cmid: u64) -> Option<ModuleInfo> {
        self.modules
            .iter()
            .find(|cm| cm.id == cmid && cm.modname == modname)
            .cloned()
    }

    fn active_string_filters(&self) -> BTreeSet<String> {
        self.string_filters.clone()
    }

    fn course(&self, course_id: u64) -> Option<Course> {
        self.courses.get(&course_id).cloned()
    }

    fn content(&self, instance_id: u64) -> Option<HvpContent> {
        self.contents.get(&instance_id).cloned()
    }

    fn add_assets_to_page(&self, content: &HvpContent) {
        self.assets.borrow_mut().insert(content.id);
    }

    fn log_viewed(&self, module: &ModuleInfo, content: &HvpContent) {
        self.views.borrow_mut().push(ViewEvent {
            cmid: module.id,
            content_id: content.id,
        });
    }
}
