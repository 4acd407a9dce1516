// In-memory CourseHost for unit tests, counts how often it is asked for modules

use anyhow::{anyhow, Result};
use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use url::Url;

use super::{Course, CourseHost, HvpContent, ModuleInfo, HVP_MODNAME};

pub(crate) struct FakeHost {
    pub wwwroot: Url,
    pub modules: Vec<ModuleInfo>,
    pub courses: Vec<Course>,
    pub contents: Vec<HvpContent>,
    pub string_filters: BTreeSet<String>,
    pub fail_listing: bool,
    pub listings: Cell<usize>,
    pub views: RefCell<Vec<u64>>,
    pub assets: RefCell<Vec<u64>>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self {
            wwwroot: Url::parse("https://lms.test/").unwrap(),
            modules: Vec::new(),
            courses: vec![Course { id: 1, fullname: "Course".into() }],
            contents: Vec::new(),
            string_filters: BTreeSet::new(),
            fail_listing: false,
            listings: Cell::new(0),
            views: RefCell::new(Vec::new()),
            assets: RefCell::new(Vec::new()),
        }
    }

    // Adds an hvp module in course 1 with a content record of the same id
    pub fn with_hvp(mut self, cmid: u64, name: &str) -> Self {
        self.modules.push(module(cmid, name, HVP_MODNAME));
        self.contents.push(HvpContent {
            id: cmid,
            name: name.into(),
            library: "H5P.Column 1.16".into(),
            json: "{}".into(),
        });
        self
    }

    pub fn with_module(mut self, cm: ModuleInfo) -> Self {
        self.modules.push(cm);
        self
    }

    pub fn with_string_filter(mut self, name: &str) -> Self {
        self.string_filters.insert(name.into());
        self
    }
}

pub(crate) fn module(cmid: u64, name: &str, modname: &str) -> ModuleInfo {
    ModuleInfo {
        id: cmid,
        name: name.into(),
        url: Some(format!("https://lms.test/mod/{modname}/view.php?id={cmid}")),
        visible: true,
        has_view: true,
        user_visible: true,
        modname: modname.into(),
        instance: cmid,
        course: 1,
    }
}

impl CourseHost for FakeHost {
    fn wwwroot(&self) -> &Url {
        &self.wwwroot
    }

    fn visible_modules(&self, course_id: u64, _viewer_id: u64) -> Result<Vec<ModuleInfo>> {
        self.listings.set(self.listings.get() + 1);
        if self.fail_listing {
            return Err(anyhow!("database went away"));
        }
        Ok(self
            .modules
            .iter()
            .filter(|cm| cm.course == course_id)
            .cloned()
            .collect())
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
        self.courses.iter().find(|c| c.id == course_id).cloned()
    }

    fn content(&self, instance_id: u64) -> Option<HvpContent> {
        self.contents.iter().find(|c| c.id == instance_id).cloned()
    }

    fn add_assets_to_page(&self, content: &HvpContent) {
        self.assets.borrow_mut().push(content.id);
    }

    fn log_viewed(&self, module: &ModuleInfo, _content: &HvpContent) {
        self.views.borrow_mut().push(module.id);
    }
}
