use async_trait::async_trait;
use engine_logging::{engine_debug, engine_trace};
use serde::{Deserialize, Serialize};

use crate::driver::{BrowserDriver, DriverError, ElementId, Locator};

/// CSS selectors describing the carousel markup of a site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WidgetSelectors {
    /// Flat list of widget containers, in page order.
    pub root: String,
    /// Fallback container selector when `root` matches nothing.
    pub root_class: String,
    pub next: String,
    pub counter: String,
    /// Containers whose id starts with one of these are page chrome, not widgets.
    pub excluded_id_prefixes: Vec<String>,
}

impl Default for WidgetSelectors {
    fn default() -> Self {
        Self {
            root: r#"[id^="comp-mfqwrx08__item"]"#.to_string(),
            root_class: r#"div[class*="NqU03H"]"#.to_string(),
            next: r#"button[data-testid="gallery-nextButton"]"#.to_string(),
            counter: r#"[data-testid="gallery-counter"]"#.to_string(),
            excluded_id_prefixes: vec!["bgLayers_".to_string(), "bgMedia_".to_string()],
        }
    }
}

impl WidgetSelectors {
    fn is_excluded(&self, id: Option<&str>) -> bool {
        id.is_some_and(|id| {
            self.excluded_id_prefixes
                .iter()
                .any(|prefix| id.starts_with(prefix.as_str()))
        })
    }
}

/// Stable description of a widget, fixed at discovery time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WidgetIdentity {
    /// 0-based position in the page's widget list.
    pub ordinal: usize,
    pub dom_id: Option<String>,
}

impl WidgetIdentity {
    pub fn new(ordinal: usize, dom_id: Option<String>) -> Self {
        Self { ordinal, dom_id }
    }
}

/// Element references for one widget, valid until the next DOM mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetHandle {
    pub identity: WidgetIdentity,
    pub root: ElementId,
    pub counter: Option<ElementId>,
    pub next: Option<ElementId>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("widget not found")]
    NotFound,
    #[error("browser session failed: {0}")]
    Session(String),
}

/// One way of finding a widget's root element.
#[async_trait]
pub trait RootStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn locate(
        &self,
        driver: &dyn BrowserDriver,
        selectors: &WidgetSelectors,
        identity: &WidgetIdentity,
    ) -> Result<Option<ElementId>, DriverError>;
}

/// `[id="<dom_id>"]`.
pub struct DomIdStrategy;

#[async_trait]
impl RootStrategy for DomIdStrategy {
    fn name(&self) -> &'static str {
        "dom-id"
    }

    async fn locate(
        &self,
        driver: &dyn BrowserDriver,
        _selectors: &WidgetSelectors,
        identity: &WidgetIdentity,
    ) -> Result<Option<ElementId>, DriverError> {
        let Some(dom_id) = identity.dom_id.as_deref() else {
            return Ok(None);
        };
        let selector = format!("[id={}]", css_string(dom_id));
        Ok(driver.query(&Locator::Css(selector)).await?.into_iter().next())
    }
}

/// The `ordinal`-th container, accepted only when it owns a next control.
pub struct AncestorStrategy;

#[async_trait]
impl RootStrategy for AncestorStrategy {
    fn name(&self) -> &'static str {
        "ancestor"
    }

    async fn locate(
        &self,
        driver: &dyn BrowserDriver,
        selectors: &WidgetSelectors,
        identity: &WidgetIdentity,
    ) -> Result<Option<ElementId>, DriverError> {
        let selector = format!("{}:has({})", selectors.root, selectors.next);
        let owners = driver.query(&Locator::Css(selector)).await?;
        if owners.is_empty() {
            return Ok(None);
        }
        let candidate = nth_widget(driver, selectors, &selectors.root, identity.ordinal).await?;
        Ok(candidate.filter(|root| owners.contains(root)))
    }
}

/// The `ordinal`-th match of the fallback container selector.
pub struct ClassStrategy;

#[async_trait]
impl RootStrategy for ClassStrategy {
    fn name(&self) -> &'static str {
        "class"
    }

    async fn locate(
        &self,
        driver: &dyn BrowserDriver,
        selectors: &WidgetSelectors,
        identity: &WidgetIdentity,
    ) -> Result<Option<ElementId>, DriverError> {
        nth_widget(driver, selectors, &selectors.root_class, identity.ordinal).await
    }
}

/// The `ordinal`-th entry of the flat container list.
pub struct PositionalStrategy;

#[async_trait]
impl RootStrategy for PositionalStrategy {
    fn name(&self) -> &'static str {
        "positional"
    }

    async fn locate(
        &self,
        driver: &dyn BrowserDriver,
        selectors: &WidgetSelectors,
        identity: &WidgetIdentity,
    ) -> Result<Option<ElementId>, DriverError> {
        nth_widget(driver, selectors, &selectors.root, identity.ordinal).await
    }
}

/// Lists the non-excluded matches of `selector` with their id attribute.
async fn widget_list(
    driver: &dyn BrowserDriver,
    selectors: &WidgetSelectors,
    selector: &str,
) -> Result<Vec<(ElementId, Option<String>)>, DriverError> {
    let mut widgets = Vec::new();
    for element in driver.query(&Locator::css(selector)).await? {
        let id = driver
            .get_attribute(element, "id")
            .await?
            .filter(|id| !id.is_empty());
        if !selectors.is_excluded(id.as_deref()) {
            widgets.push((element, id));
        }
    }
    Ok(widgets)
}

async fn nth_widget(
    driver: &dyn BrowserDriver,
    selectors: &WidgetSelectors,
    selector: &str,
    ordinal: usize,
) -> Result<Option<ElementId>, DriverError> {
    Ok(widget_list(driver, selectors, selector)
        .await?
        .into_iter()
        .nth(ordinal)
        .map(|(element, _)| element))
}

pub const DEFAULT_STALE_RETRIES: u32 = 3;

/// Finds and re-finds widgets in a DOM that re-renders underneath us.
pub struct LocatorResolver {
    selectors: WidgetSelectors,
    strategies: Vec<Box<dyn RootStrategy>>,
    stale_retries: u32,
}

impl LocatorResolver {
    pub fn new(selectors: WidgetSelectors) -> Self {
        Self::with_strategies(selectors, default_strategies())
    }

    pub fn with_strategies(
        selectors: WidgetSelectors,
        strategies: Vec<Box<dyn RootStrategy>>,
    ) -> Self {
        Self {
            selectors,
            strategies,
            stale_retries: DEFAULT_STALE_RETRIES,
        }
    }

    pub fn with_stale_retries(mut self, stale_retries: u32) -> Self {
        self.stale_retries = stale_retries;
        self
    }

    pub fn selectors(&self) -> &WidgetSelectors {
        &self.selectors
    }

    pub fn stale_retries(&self) -> u32 {
        self.stale_retries
    }

    /// Lists the widgets currently on the page.
    pub async fn discover(
        &self,
        driver: &dyn BrowserDriver,
    ) -> Result<Vec<WidgetIdentity>, DriverError> {
        let mut widgets = widget_list(driver, &self.selectors, &self.selectors.root).await?;
        if widgets.is_empty() {
            widgets = widget_list(driver, &self.selectors, &self.selectors.root_class).await?;
        }
        let identities: Vec<WidgetIdentity> = widgets
            .into_iter()
            .enumerate()
            .map(|(ordinal, (_, dom_id))| WidgetIdentity::new(ordinal, dom_id))
            .collect();
        engine_debug!("Discovered {} widget(s)", identities.len());
        Ok(identities)
    }

    /// Produces a fresh handle for `identity`. Stale references met along the
    /// way trigger a new resolution instead of an error.
    pub async fn resolve(
        &self,
        driver: &dyn BrowserDriver,
        identity: &WidgetIdentity,
    ) -> Result<WidgetHandle, ResolveError> {
        let mut attempt = 0;
        loop {
            match self.try_resolve(driver, identity).await {
                Ok(Some(handle)) => return Ok(handle),
                Ok(None) => return Err(ResolveError::NotFound),
                Err(DriverError::StaleReference) if attempt < self.stale_retries => {
                    attempt += 1;
                    engine_debug!(
                        "Stale reference resolving widget {}, retry {attempt}",
                        identity.ordinal
                    );
                }
                Err(DriverError::StaleReference) | Err(DriverError::Script(_)) => {
                    return Err(ResolveError::NotFound)
                }
                Err(DriverError::Session(message)) => return Err(ResolveError::Session(message)),
            }
        }
    }

    async fn try_resolve(
        &self,
        driver: &dyn BrowserDriver,
        identity: &WidgetIdentity,
    ) -> Result<Option<WidgetHandle>, DriverError> {
        let Some(root) = self.locate_root(driver, identity).await? else {
            return Ok(None);
        };
        let counter = first_within(driver, root, &self.selectors.counter).await?;
        let next = match first_within(driver, root, &self.selectors.next).await? {
            Some(next) => Some(next),
            None => self.page_level_next(driver, identity).await?,
        };
        Ok(Some(WidgetHandle {
            identity: identity.clone(),
            root,
            counter,
            next,
        }))
    }

    /// Next control outside the root, taken from the page-level list only
    /// while that list pairs exactly one control with each widget.
    async fn page_level_next(
        &self,
        driver: &dyn BrowserDriver,
        identity: &WidgetIdentity,
    ) -> Result<Option<ElementId>, DriverError> {
        let controls = driver
            .query(&Locator::css(self.selectors.next.as_str()))
            .await?;
        let mut widgets = widget_list(driver, &self.selectors, &self.selectors.root).await?;
        if widgets.is_empty() {
            widgets = widget_list(driver, &self.selectors, &self.selectors.root_class).await?;
        }
        if controls.len() != widgets.len() {
            return Ok(None);
        }
        Ok(controls.into_iter().nth(identity.ordinal))
    }

    async fn locate_root(
        &self,
        driver: &dyn BrowserDriver,
        identity: &WidgetIdentity,
    ) -> Result<Option<ElementId>, DriverError> {
        for strategy in &self.strategies {
            let found = match strategy.locate(driver, &self.selectors, identity).await {
                Ok(found) => found,
                Err(DriverError::Script(message)) => {
                    engine_trace!("Strategy {} failed: {message}", strategy.name());
                    None
                }
                Err(err) => return Err(err),
            };
            let Some(root) = found else {
                engine_trace!(
                    "Strategy {} missed widget {}",
                    strategy.name(),
                    identity.ordinal
                );
                continue;
            };
            if self.is_consistent(driver, root, identity).await? {
                return Ok(Some(root));
            }
            engine_trace!(
                "Strategy {} matched a different widget than {}",
                strategy.name(),
                identity.ordinal
            );
        }
        Ok(None)
    }

    async fn is_consistent(
        &self,
        driver: &dyn BrowserDriver,
        root: ElementId,
        identity: &WidgetIdentity,
    ) -> Result<bool, DriverError> {
        let Some(expected) = identity.dom_id.as_deref() else {
            return Ok(true);
        };
        Ok(driver.get_attribute(root, "id").await?.as_deref() == Some(expected))
    }
}

pub fn default_strategies() -> Vec<Box<dyn RootStrategy>> {
    vec![
        Box::new(DomIdStrategy),
        Box::new(AncestorStrategy),
        Box::new(ClassStrategy),
        Box::new(PositionalStrategy),
    ]
}

/// Quotes `value` as a CSS string literal.
fn css_string(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for ch in value.chars() {
        match ch {
            '"' | '\\' => {
                quoted.push('\\');
                quoted.push(ch);
            }
            '\n' => quoted.push_str("\\a "),
            _ => quoted.push(ch),
        }
    }
    quoted.push('"');
    quoted
}

async fn first_within(
    driver: &dyn BrowserDriver,
    root: ElementId,
    selector: &str,
) -> Result<Option<ElementId>, DriverError> {
    match driver.query(&Locator::within(root, selector)).await {
        Ok(found) => Ok(found.into_iter().next()),
        Err(DriverError::Script(message)) => {
            engine_trace!("Control lookup {selector} failed: {message}");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}
