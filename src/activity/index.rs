// src/activity/index.rs
// =============================================================================
// Builds the list of phrases the filter looks for in one course.
//
// For every H5P activity the viewer can open, we create a FilterPhrase that
// turns the activity's name into an embedded player. The list is kept
// longest name first, so "Intro Quiz" is tried before "Quiz" and a shorter
// name can never steal part of a longer one.
//
// Steps (build_index):
// 1. Ask the host for the course's modules as this viewer sees them
// 2. Keep visible, viewable, accessible hvp modules with a non-empty name
// 3. Pick the embed style once: <div> if the filter also runs on headings,
//    otherwise <iframe>
// 4. Add one entry per module, plus an "escaped twin" when the name has
//    characters like '&' that appear entity-encoded in escaped text
// =============================================================================

use serde::{Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, warn};
use url::Url;

use super::embed::embed_content;
use crate::filter::{escape, strip_tags, FilterPhrase};
use crate::host::{CourseHost, HVP_MODNAME};

const DIV_CLOSE: &str = "</div>";
const IFRAME_CLOSE: &str = "</iframe>";

/// Identifies an entry in the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKey {
    /// The activity's own name
    Module(u64),
    /// Its entity-escaped twin, written `<cmid>-e`
    Escaped(u64),
}

impl EntryKey {
    pub fn cmid(&self) -> u64 {
        match *self {
            EntryKey::Module(cmid) | EntryKey::Escaped(cmid) => cmid,
        }
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKey::Module(cmid) => write!(f, "{}", cmid),
            EntryKey::Escaped(cmid) => write!(f, "{}-e", cmid),
        }
    }
}

impl Serialize for EntryKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivityEntry {
    pub key: EntryKey,
    #[serde(flatten)]
    pub phrase: FilterPhrase,
}

/// How a matched name is turned into a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedStyle {
    /// `<div class="h5p-content" data-content-id=..>`, rendered in place
    Div,
    /// `<iframe src=".../mod/hvp/embed.php?id=..">`
    Iframe,
}

impl EmbedStyle {
    // Headings can't hold an iframe nicely, so when the filter also runs on
    // them we switch every embed to the div player.
    pub fn resolve(string_filters: &BTreeSet<String>) -> Self {
        if string_filters.contains(HVP_MODNAME) {
            EmbedStyle::Div
        } else {
            EmbedStyle::Iframe
        }
    }

    fn close_tag(self) -> &'static str {
        match self {
            EmbedStyle::Div => DIV_CLOSE,
            EmbedStyle::Iframe => IFRAME_CLOSE,
        }
    }
}

/// Filter entries ordered by descending name length.
///
/// The order is kept by `insert`; equal lengths stay in insertion order.
/// Names and keys are unique.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ActivityIndex {
    entries: Vec<ActivityEntry>,
}

fn name_len(entry: &ActivityEntry) -> usize {
    entry.phrase.phrase.chars().count()
}

impl ActivityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry in its place, after every entry at least as long.
    ///
    /// Returns false (and drops the entry) if its key or name is taken.
    pub fn insert(&mut self, entry: ActivityEntry) -> bool {
        let taken = self
            .entries
            .iter()
            .any(|e| e.key == entry.key || e.phrase.phrase == entry.phrase.phrase);
        if taken {
            return false;
        }

        let len = name_len(&entry);
        let at = self
            .entries
            .iter()
            .position(|e| name_len(e) < len)
            .unwrap_or(self.entries.len());
        self.entries.insert(at, entry);
        true
    }

    pub fn entries(&self) -> &[ActivityEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The phrases to use for text that belongs to module `exclude`.
    ///
    /// An activity never embeds itself, so both of its entries are left out.
    /// The index itself is not touched.
    pub fn phrases_excluding(&self, exclude: Option<u64>) -> Vec<&FilterPhrase> {
        self.entries
            .iter()
            .filter(|e| Some(e.key.cmid()) != exclude)
            .map(|e| &e.phrase)
            .collect()
    }
}

// Writes an opening tag with escaped attribute values, in the given order
fn start_tag(name: &str, attrs: &[(&str, &str)]) -> String {
    let mut tag = format!("<{}", name);
    for (attr, value) in attrs {
        tag.push_str(&format!(" {}=\"{}\"", attr, escape(value)));
    }
    tag.push('>');
    tag
}

// <wwwroot>/mod/hvp/embed.php?id=<cmid>
fn embed_url(wwwroot: &Url, cmid: u64) -> Option<Url> {
    let mut url = wwwroot.clone();
    url.path_segments_mut()
        .ok()?
        .pop_if_empty()
        .extend(["mod", HVP_MODNAME, "embed.php"]);
    url.query_pairs_mut()
        .clear()
        .append_pair("id", &cmid.to_string());
    url.set_fragment(None);
    Some(url)
}

fn div_open(content_id: u64) -> String {
    start_tag(
        "div",
        &[
            ("class", "h5p-content"),
            ("data-content-id", &content_id.to_string()),
        ],
    )
}

fn iframe_open(src: &Url) -> String {
    start_tag(
        "iframe",
        &[
            ("class", "h5p-content"),
            ("width", "400"),
            ("height", "400"),
            ("frameborder", "0"),
            ("allowfullscreen", "allowfullscreen"),
            ("src", src.as_str()),
        ],
    )
}

/// Builds the phrase list for one viewer in one course.
///
/// Never fails: if the host can't list modules the index is empty and the
/// filter does nothing.
pub fn build_index<H: CourseHost + ?Sized>(host: &H, course_id: u64, viewer_id: u64) -> ActivityIndex {
    let mut index = ActivityIndex::new();

    let modules = match host.visible_modules(course_id, viewer_id) {
        Ok(modules) => modules,
        Err(e) => {
            warn!(course_id, viewer_id, error = %e, "could not list course modules, nothing will be embedded");
            return index;
        }
    };

    let style = EmbedStyle::resolve(&host.active_string_filters());

    for cm in modules.iter().filter(|cm| cm.is_linkable()) {
        let name = cm.name.trim();
        if strip_tags(name).trim().is_empty() {
            continue;
        }
        let Some(hvp) = host.module_by_type_and_id(HVP_MODNAME, cm.id) else {
            continue;
        };

        let open = match style {
            EmbedStyle::Div => match embed_content(host, hvp.id) {
                Ok(content_id) => div_open(content_id),
                Err(e) => {
                    warn!(cmid = cm.id, error = %e, "skipping activity that can't be embedded");
                    continue;
                }
            },
            EmbedStyle::Iframe => match embed_url(host.wwwroot(), cm.id) {
                Some(src) => iframe_open(&src),
                None => {
                    warn!(wwwroot = %host.wwwroot(), "wwwroot can't hold an embed path");
                    continue;
                }
            },
        };

        let phrase = FilterPhrase::new(name, open.clone(), style.close_tag())
            .case_insensitive()
            .full_words()
            .with_replacement(" ");
        index.insert(ActivityEntry {
            key: EntryKey::Module(cm.id),
            phrase,
        });

        let escaped = escape(name);
        if escaped != name {
            // The twin always closes as an iframe, even for div embeds.
            let phrase = FilterPhrase::new(escaped, open, IFRAME_CLOSE)
                .case_insensitive()
                .full_words();
            index.insert(ActivityEntry {
                key: EntryKey::Escaped(cm.id),
                phrase,
            });
        }
    }

    debug!(course_id, viewer_id, ?style, entries = index.len(), "built activity index");
    index
}
