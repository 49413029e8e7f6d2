//! Resolution of test chapter labels to catalog chapters.
//!
//! Attempts record a free-form chapter label. Strategies are tried in
//! order and the first strategy that hits any chapter wins.

use tracing::debug;

use crate::records::{CatalogChapter, derive_chapter_key};

/// One way of recognising a catalog chapter from a test label.
pub trait ChapterMatcher: Send + Sync {
    fn name(&self) -> &'static str;

    /// `label` is already trimmed and non-empty.
    fn matches(&self, label: &str, chapter: &CatalogChapter) -> bool;
}

/// The label is the chapter name.
pub struct ExactLabelMatcher;

impl ChapterMatcher for ExactLabelMatcher {
    fn name(&self) -> &'static str {
        "exact_label"
    }

    fn matches(&self, label: &str, chapter: &CatalogChapter) -> bool {
        chapter.name.trim() == label
    }
}

/// The label, or the key derived from it, is the chapter key.
pub struct DerivedKeyMatcher;

impl ChapterMatcher for DerivedKeyMatcher {
    fn name(&self) -> &'static str {
        "derived_key"
    }

    fn matches(&self, label: &str, chapter: &CatalogChapter) -> bool {
        let catalog_key = chapter.chapter_key();
        if label == catalog_key {
            return true;
        }
        let derived = derive_chapter_key(label);
        !derived.is_empty()
            && (derived == catalog_key || derived == derive_chapter_key(&chapter.name))
    }
}

/// A video in the chapter carries the label as its embedded chapter name.
pub struct EmbeddedNameMatcher;

impl ChapterMatcher for EmbeddedNameMatcher {
    fn name(&self) -> &'static str {
        "embedded_name"
    }

    fn matches(&self, label: &str, chapter: &CatalogChapter) -> bool {
        chapter.videos.iter().any(|video| {
            video
                .chapter_name
                .as_deref()
                .is_some_and(|name| name.trim().eq_ignore_ascii_case(label))
        })
    }
}

/// A successful resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChapterMatch {
    /// Index into the catalog's chapter list.
    pub index: usize,
    pub strategy: &'static str,
}

/// Ordered list of matching strategies.
pub struct MatcherChain {
    matchers: Vec<Box<dyn ChapterMatcher>>,
}

impl MatcherChain {
    pub fn new(matchers: Vec<Box<dyn ChapterMatcher>>) -> Self {
        Self { matchers }
    }

    /// Find the chapter a label refers to.
    pub fn resolve(&self, label: &str, chapters: &[CatalogChapter]) -> Option<ChapterMatch> {
        let label = label.trim();
        if label.is_empty() {
            return None;
        }
        for matcher in &self.matchers {
            if let Some(index) = chapters.iter().position(|c| matcher.matches(label, c)) {
                debug!(label, chapter = %chapters[index].name, strategy = matcher.name(), "chapter matched");
                return Some(ChapterMatch {
                    index,
                    strategy: matcher.name(),
                });
            }
        }
        None
    }
}

impl Default for MatcherChain {
    fn default() -> Self {
        Self::new(vec![
            Box::new(ExactLabelMatcher),
            Box::new(DerivedKeyMatcher),
            Box::new(EmbeddedNameMatcher),
        ])
    }
}
