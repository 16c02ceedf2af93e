use std::fmt;

use async_trait::async_trait;
use serde_json::Value;

/// Opaque reference to an element the driver handed out.
///
/// Only valid for the session that produced it, and only until the page
/// re-renders the element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId(pub u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where to look for elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// Page-level CSS selector.
    Css(String),
    /// CSS selector evaluated inside an element's subtree.
    Within(ElementId, String),
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css(selector.into())
    }

    pub fn within(element: ElementId, selector: impl Into<String>) -> Self {
        Locator::Within(element, selector.into())
    }

    pub fn selector(&self) -> &str {
        match self {
            Locator::Css(selector) | Locator::Within(_, selector) => selector,
        }
    }
}

/// Script argument, exposed to the script as `arguments[i]`.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptArg {
    Element(ElementId),
    Value(Value),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DriverError {
    /// The element was detached from the document since it was handed out.
    #[error("stale element reference")]
    StaleReference,
    #[error("script error: {0}")]
    Script(String),
    #[error("browser session failed: {0}")]
    Session(String),
}

/// Minimal browser automation surface the harvester needs.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), DriverError>;

    async fn query(&self, locator: &Locator) -> Result<Vec<ElementId>, DriverError>;

    async fn get_attribute(
        &self,
        element: ElementId,
        name: &str,
    ) -> Result<Option<String>, DriverError>;

    /// Rendered text content of the element.
    async fn get_text(&self, element: ElementId) -> Result<String, DriverError>;

    async fn execute_script(&self, script: &str, args: &[ScriptArg])
        -> Result<Value, DriverError>;

    async fn click(&self, element: ElementId) -> Result<(), DriverError>;
}

/// A driver that owns a browser session and must be closed when done.
#[async_trait]
pub trait BrowserSession: BrowserDriver {
    fn as_driver(&self) -> &dyn BrowserDriver;

    async fn close(&self) -> Result<(), DriverError>;
}

/// Opens one isolated session per page worker.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> Result<Box<dyn BrowserSession>, DriverError>;
}
