pub mod fetcher;
pub mod html_session;

pub use fetcher::{HttpLoader, PageLoader, StaticPages};
pub use html_session::HtmlSession;

use crate::model::BrowserError;
use std::fmt;

/// How to find an element, relative to the document or to a scope element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// Any descendant matching a CSS selector.
    Css(String),
    /// The `position`-th (1-based) direct child with the given tag name.
    NthChild { tag: String, position: usize },
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css(selector.into())
    }

    pub fn nth_child(tag: impl Into<String>, position: usize) -> Self {
        Locator::NthChild {
            tag: tag.into(),
            position,
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(selector) => write!(f, "css `{}`", selector),
            Locator::NthChild { tag, position } => write!(f, "{}[{}]", tag, position),
        }
    }
}

/// Handle to an element of the currently loaded document.
///
/// Handles are only valid for the document they were read from; after any
/// navigation the browser rejects them with [`BrowserError::StaleElement`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    generation: u64,
    path: Vec<usize>,
}

impl Element {
    pub(crate) fn new(generation: u64, path: Vec<usize>) -> Self {
        Self { generation, path }
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn path(&self) -> &[usize] {
        &self.path
    }
}

/// A navigable document session driven by one logical thread of control.
#[async_trait::async_trait]
pub trait Browser: Send + Sync {
    async fn load(&mut self, url: &str) -> Result<(), BrowserError>;

    async fn find_one(
        &self,
        scope: Option<&Element>,
        locator: &Locator,
    ) -> Result<Element, BrowserError>;

    async fn find_all(
        &self,
        scope: Option<&Element>,
        locator: &Locator,
    ) -> Result<Vec<Element>, BrowserError>;

    /// Optional lookup: absence is `Ok(None)`, other failures are still errors.
    async fn try_find(
        &self,
        scope: Option<&Element>,
        locator: &Locator,
    ) -> Result<Option<Element>, BrowserError> {
        match self.find_one(scope, locator).await {
            Ok(element) => Ok(Some(element)),
            Err(BrowserError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn text(&self, element: &Element) -> Result<String, BrowserError>;

    async fn click(&mut self, element: &Element) -> Result<(), BrowserError>;

    async fn go_back(&mut self) -> Result<(), BrowserError>;

    /// Markup of the current document, used for debugging snapshots.
    async fn page_source(&self) -> Result<String, BrowserError>;

    async fn quit(&mut self) -> Result<(), BrowserError>;
}
