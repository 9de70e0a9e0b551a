//! Deciding which page elements a reader would actually see
//!
//! Bloom pages carry every language's text and let stylesheets hide the ones that
//! are not wanted. Working out what is displayed needs a CSS engine, so staging asks
//! an injected [`VisibilityOracle`] about each page.

mod css;
mod ui_thread;

pub use css::CssDisplayOracle;
pub use ui_thread::UiThreadOracle;

use crate::error::VisibilityError;
use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

/// What the oracle found out about one rendered page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderedPage {
    hidden: HashSet<String>,
    fonts: BTreeSet<String>,
}

impl RenderedPage {
    pub fn new(hidden: HashSet<String>, fonts: BTreeSet<String>) -> Self {
        Self { hidden, fonts }
    }

    /// Whether the element with this id is displayed. Unknown ids count as displayed.
    pub fn is_displayed(&self, id: &str) -> bool {
        !self.hidden.contains(id)
    }

    /// Font families used by displayed text
    pub fn font_families(&self) -> &BTreeSet<String> {
        &self.fonts
    }

    pub fn hidden_count(&self) -> usize {
        self.hidden.len()
    }
}

/// Renders a serialized page and reports element visibility and fonts
pub trait VisibilityOracle: Send + Sync {
    fn render(&self, page_markup: &str) -> Result<RenderedPage, VisibilityError>;
}

/// Oracle answering from fixed tables, for tests and headless runs where the
/// page styles are already known
#[derive(Debug, Default)]
pub struct StaticOracle {
    hidden: HashSet<String>,
    fonts: BTreeSet<String>,
    transient_failures: AtomicUsize,
    unavailable: bool,
    calls: AtomicUsize,
}

impl StaticOracle {
    /// An oracle that reports everything as displayed
    pub fn new() -> Self {
        Self::default()
    }

    /// Report the element with `id` as hidden
    pub fn hiding(mut self, id: impl Into<String>) -> Self {
        self.hidden.insert(id.into());
        self
    }

    /// Report `family` as used on every page
    pub fn with_font(mut self, family: impl Into<String>) -> Self {
        self.fonts.insert(family.into());
        self
    }

    /// Fail the next `count` renders with a navigation error
    pub fn failing_times(self, count: usize) -> Self {
        self.transient_failures.store(count, Ordering::SeqCst);
        self
    }

    /// Fail every render as if the renderer had gone away
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    /// Number of render requests received
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl VisibilityOracle for StaticOracle {
    fn render(&self, _page_markup: &str) -> Result<RenderedPage, VisibilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(VisibilityError::Unavailable("renderer closed".to_string()));
        }
        let failed = self
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(VisibilityError::Navigation("page did not load".to_string()));
        }
        Ok(RenderedPage::new(self.hidden.clone(), self.fonts.clone()))
    }
}
