#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use async_trait::async_trait;
use gallery_core::ResourcePolicy;
use gallery_engine::{
    scripts, BrowserDriver, BrowserSession, DriverError, ElementId, GalleryHarvester,
    HarvestSettings, Locator, LocatorResolver, NavigationSettings, PageHarvester, PageSettings,
    ScriptArg, SessionFactory, WidgetSelectors,
};
use serde_json::{json, Value};

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

pub fn image(name: &str) -> String {
    format!("https://static.wixstatic.com/media/{name}.jpg")
}

pub fn quick_navigation() -> NavigationSettings {
    NavigationSettings {
        settle_delay: Duration::ZERO,
        poll_attempts: 3,
        poll_interval: Duration::ZERO,
    }
}

pub fn quick_harvester() -> GalleryHarvester {
    GalleryHarvester::new(
        LocatorResolver::new(WidgetSelectors::default()),
        ResourcePolicy::default(),
        HarvestSettings {
            navigation: quick_navigation(),
            ..HarvestSettings::default()
        },
    )
}

pub fn quick_page_harvester() -> PageHarvester {
    PageHarvester::new(
        quick_harvester(),
        PageSettings {
            load_settle: Duration::ZERO,
            scroll_settle: Duration::ZERO,
        },
    )
}

/// One scripted carousel. Each slide lists the URLs visible while it shows.
#[derive(Debug, Clone)]
pub struct FakeCarousel {
    pub dom_id: Option<String>,
    pub slides: Vec<Vec<String>>,
    pub show_counter: bool,
    /// Total printed by the counter; defaults to the slide count.
    pub declared_total: Option<u32>,
    /// Slides stay mounted once revealed.
    pub cumulative: bool,
    /// Advancing past the last slide wraps to the first.
    pub looping: bool,
    pub has_next: bool,
    /// 1-based click attempts that find the next control re-rendered.
    pub stale_on_click: Vec<usize>,
    /// 1-based image collections that find the container re-rendered.
    pub stale_on_observe: Vec<usize>,
    /// 1-based control lookups inside the container that find it re-rendered.
    pub stale_on_lookup: Vec<usize>,
    pub html: String,
}

impl FakeCarousel {
    pub fn new(slides: Vec<Vec<String>>) -> Self {
        Self {
            dom_id: None,
            slides,
            show_counter: true,
            declared_total: None,
            cumulative: false,
            looping: false,
            has_next: true,
            stale_on_click: Vec::new(),
            stale_on_observe: Vec::new(),
            stale_on_lookup: Vec::new(),
            html: "<div></div>".to_string(),
        }
    }

    /// One URL per slide.
    pub fn of(urls: &[String]) -> Self {
        Self::new(urls.iter().map(|url| vec![url.clone()]).collect())
    }

    pub fn id(mut self, dom_id: &str) -> Self {
        self.dom_id = Some(dom_id.to_string());
        self
    }

    pub fn without_counter(mut self) -> Self {
        self.show_counter = false;
        self
    }

    pub fn declaring(mut self, total: u32) -> Self {
        self.declared_total = Some(total);
        self
    }

    pub fn cumulative(mut self) -> Self {
        self.cumulative = true;
        self
    }

    pub fn looping(mut self) -> Self {
        self.looping = true;
        self
    }

    pub fn without_next(mut self) -> Self {
        self.has_next = false;
        self
    }

    pub fn stale_on_click(mut self, attempt: usize) -> Self {
        self.stale_on_click.push(attempt);
        self
    }

    pub fn stale_on_observe(mut self, attempt: usize) -> Self {
        self.stale_on_observe.push(attempt);
        self
    }

    pub fn stale_on_lookup(mut self, attempt: usize) -> Self {
        self.stale_on_lookup.push(attempt);
        self
    }

    pub fn html(mut self, html: &str) -> Self {
        self.html = html.to_string();
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakePage {
    pub carousels: Vec<FakeCarousel>,
    /// Ids of background containers that also match the root selector.
    pub technical_roots: Vec<String>,
    pub hero: Vec<Value>,
    /// Only the fallback class selector matches the containers.
    pub class_only: bool,
    /// The ancestor selector fails as unsupported.
    pub no_has_support: bool,
    pub navigation_error: Option<String>,
    pub navigate_delay: Duration,
    /// Every driver call after this many fails with a session error.
    pub fail_after_calls: Option<usize>,
}

impl FakePage {
    pub fn with(carousels: Vec<FakeCarousel>) -> Self {
        Self {
            carousels,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Element {
    Root(usize),
    Counter(usize),
    Technical(usize),
    Next(usize, u64),
}

const ROOT_BASE: u64 = 100;
const COUNTER_BASE: u64 = 200;
const TECHNICAL_BASE: u64 = 300;
const NEXT_BASE: u64 = 10_000;
const NEXT_STRIDE: u64 = 1_000;

fn decode(id: ElementId) -> Option<Element> {
    match id.0 {
        n if n >= NEXT_BASE => {
            let offset = n - NEXT_BASE;
            Some(Element::Next(
                (offset / NEXT_STRIDE) as usize,
                offset % NEXT_STRIDE,
            ))
        }
        n if n >= TECHNICAL_BASE => Some(Element::Technical((n - TECHNICAL_BASE) as usize)),
        n if n >= COUNTER_BASE => Some(Element::Counter((n - COUNTER_BASE) as usize)),
        n if n >= ROOT_BASE => Some(Element::Root((n - ROOT_BASE) as usize)),
        _ => None,
    }
}

#[derive(Debug, Default)]
struct State {
    page: FakePage,
    positions: Vec<usize>,
    generations: Vec<u64>,
    click_attempts: Vec<usize>,
    clicks: Vec<usize>,
    observe_attempts: Vec<usize>,
    lookup_attempts: Vec<usize>,
    calls: usize,
}

impl State {
    fn load(page: FakePage) -> Self {
        let count = page.carousels.len();
        Self {
            page,
            positions: vec![0; count],
            generations: vec![0; count],
            click_attempts: vec![0; count],
            clicks: vec![0; count],
            observe_attempts: vec![0; count],
            lookup_attempts: vec![0; count],
            calls: 0,
        }
    }

    fn tick(&mut self) -> Result<(), DriverError> {
        self.calls += 1;
        match self.page.fail_after_calls {
            Some(limit) if self.calls > limit => {
                Err(DriverError::Session("browser crashed".to_string()))
            }
            _ => Ok(()),
        }
    }

    fn root(c: usize) -> ElementId {
        ElementId(ROOT_BASE + c as u64)
    }

    fn counter(c: usize) -> ElementId {
        ElementId(COUNTER_BASE + c as u64)
    }

    fn next(&self, c: usize) -> ElementId {
        ElementId(NEXT_BASE + c as u64 * NEXT_STRIDE + self.generations[c])
    }

    fn live(&self, id: ElementId) -> Result<Element, DriverError> {
        let element = decode(id).ok_or(DriverError::StaleReference)?;
        let carousels = &self.page.carousels;
        let live = match element {
            Element::Root(c) => c < carousels.len(),
            Element::Counter(c) => c < carousels.len() && carousels[c].show_counter,
            Element::Technical(i) => i < self.page.technical_roots.len(),
            Element::Next(c, generation) => {
                c < carousels.len() && carousels[c].has_next && self.generations[c] == generation
            }
        };
        if live {
            Ok(element)
        } else {
            Err(DriverError::StaleReference)
        }
    }

    fn all_roots(&self) -> Vec<ElementId> {
        let technical = (0..self.page.technical_roots.len())
            .map(|i| ElementId(TECHNICAL_BASE + i as u64));
        technical
            .chain((0..self.page.carousels.len()).map(Self::root))
            .collect()
    }

    fn page_query(
        &self,
        selector: &str,
        selectors: &WidgetSelectors,
    ) -> Result<Vec<ElementId>, DriverError> {
        if let Some(id) = selector
            .strip_prefix("[id=\"")
            .and_then(|rest| rest.strip_suffix("\"]"))
        {
            let id = css_unescape(id);
            let id = id.as_str();
            let technical = self
                .page
                .technical_roots
                .iter()
                .position(|candidate| candidate == id)
                .map(|i| ElementId(TECHNICAL_BASE + i as u64));
            let carousel = self
                .page
                .carousels
                .iter()
                .position(|carousel| carousel.dom_id.as_deref() == Some(id))
                .map(Self::root);
            return Ok(technical.into_iter().chain(carousel).collect());
        }
        if selector == format!("{}:has({})", selectors.root, selectors.next) {
            if self.page.no_has_support {
                return Err(DriverError::Script("':has' is not a valid selector".into()));
            }
            if self.page.class_only {
                return Ok(Vec::new());
            }
            return Ok((0..self.page.carousels.len())
                .filter(|c| self.page.carousels[*c].has_next)
                .map(Self::root)
                .collect());
        }
        if selector == selectors.root {
            return Ok(if self.page.class_only {
                Vec::new()
            } else {
                self.all_roots()
            });
        }
        if selector == selectors.root_class {
            return Ok(self.all_roots());
        }
        if selector == selectors.next {
            return Ok((0..self.page.carousels.len())
                .filter(|c| self.page.carousels[*c].has_next)
                .map(|c| self.next(c))
                .collect());
        }
        if selector == selectors.counter {
            return Ok((0..self.page.carousels.len())
                .filter(|c| self.page.carousels[*c].show_counter)
                .map(Self::counter)
                .collect());
        }
        Ok(Vec::new())
    }

    fn observe(&mut self, c: usize) -> Result<Vec<String>, DriverError> {
        self.observe_attempts[c] += 1;
        if self.page.carousels[c]
            .stale_on_observe
            .contains(&self.observe_attempts[c])
        {
            return Err(DriverError::StaleReference);
        }
        Ok(self.visible_urls(c))
    }

    fn lookup(&mut self, c: usize) -> Result<(), DriverError> {
        self.lookup_attempts[c] += 1;
        if self.page.carousels[c]
            .stale_on_lookup
            .contains(&self.lookup_attempts[c])
        {
            return Err(DriverError::StaleReference);
        }
        Ok(())
    }

    fn visible_urls(&self, c: usize) -> Vec<String> {
        let carousel = &self.page.carousels[c];
        let position = self.positions[c];
        if carousel.slides.is_empty() {
            return Vec::new();
        }
        if carousel.cumulative {
            carousel.slides[..=position].concat()
        } else {
            carousel.slides[position].clone()
        }
    }

    fn click(&mut self, c: usize) -> Result<(), DriverError> {
        self.click_attempts[c] += 1;
        // Every click re-renders the next control, invalidating the old one.
        self.generations[c] += 1;
        let carousel = &self.page.carousels[c];
        if carousel.stale_on_click.contains(&self.click_attempts[c]) {
            return Err(DriverError::StaleReference);
        }
        self.clicks[c] += 1;
        let last = carousel.slides.len().saturating_sub(1);
        if self.positions[c] < last {
            self.positions[c] += 1;
        } else if carousel.looping {
            self.positions[c] = 0;
        }
        Ok(())
    }
}

/// Scripted in-memory browser.
pub struct FakeDriver {
    state: Mutex<State>,
    selectors: WidgetSelectors,
    site: Option<Arc<HashMap<String, FakePage>>>,
    closed: Arc<AtomicUsize>,
}

impl FakeDriver {
    /// A driver already showing `page`; navigation keeps it.
    pub fn new(page: FakePage) -> Self {
        Self {
            state: Mutex::new(State::load(page)),
            selectors: WidgetSelectors::default(),
            site: None,
            closed: Arc::default(),
        }
    }

    /// A driver whose navigation loads pages from `site`.
    pub fn for_site(site: Arc<HashMap<String, FakePage>>, closed: Arc<AtomicUsize>) -> Self {
        Self {
            state: Mutex::new(State::default()),
            selectors: WidgetSelectors::default(),
            site: Some(site),
            closed,
        }
    }

    pub fn position(&self, carousel: usize) -> usize {
        self.with_state(|state| state.positions[carousel])
    }

    /// Clicks that reached the carousel.
    pub fn clicks(&self, carousel: usize) -> usize {
        self.with_state(|state| state.clicks[carousel])
    }

    /// Image collections attempted on the carousel, stale ones included.
    pub fn observations(&self, carousel: usize) -> usize {
        self.with_state(|state| state.observe_attempts[carousel])
    }

    /// Invalidates the carousel's current next control.
    pub fn rerender_next(&self, carousel: usize) {
        self.with_state(|state| state.generations[carousel] += 1);
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut State) -> T) -> T {
        let mut state = self.state.lock().expect("fake driver state");
        f(&mut state)
    }

    fn op<T>(
        &self,
        f: impl FnOnce(&mut State) -> Result<T, DriverError>,
    ) -> Result<T, DriverError> {
        self.with_state(|state| {
            state.tick()?;
            f(state)
        })
    }
}

/// Reads back a quoted CSS string body; `\a ` is a newline.
fn css_unescape(body: &str) -> String {
    let mut value = String::new();
    let mut chars = body.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            value.push(ch);
            continue;
        }
        match chars.next() {
            Some('a') => {
                value.push('\n');
                chars.next();
            }
            Some(escaped) => value.push(escaped),
            None => {}
        }
    }
    value
}

fn element_arg(args: &[ScriptArg], index: usize) -> Result<ElementId, DriverError> {
    match args.get(index) {
        Some(ScriptArg::Element(id)) => Ok(*id),
        _ => Err(DriverError::Script(format!("argument {index} is not an element"))),
    }
}

#[async_trait]
impl BrowserDriver for FakeDriver {
    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        let page = match &self.site {
            Some(site) => site
                .get(url)
                .cloned()
                .ok_or_else(|| DriverError::Session(format!("no page at {url}")))?,
            None => self.with_state(|state| state.page.clone()),
        };
        if !page.navigate_delay.is_zero() {
            tokio::time::sleep(page.navigate_delay).await;
        }
        if let Some(error) = &page.navigation_error {
            return Err(DriverError::Session(error.clone()));
        }
        if self.site.is_some() {
            self.with_state(|state| *state = State::load(page));
        }
        Ok(())
    }

    async fn query(&self, locator: &Locator) -> Result<Vec<ElementId>, DriverError> {
        self.op(|state| match locator {
            Locator::Css(selector) => state.page_query(selector, &self.selectors),
            Locator::Within(element, selector) => match state.live(*element)? {
                Element::Root(c) => {
                    state.lookup(c)?;
                    let carousel = &state.page.carousels[c];
                    if *selector == self.selectors.next && carousel.has_next {
                        Ok(vec![state.next(c)])
                    } else if *selector == self.selectors.counter && carousel.show_counter {
                        Ok(vec![State::counter(c)])
                    } else {
                        Ok(Vec::new())
                    }
                }
                _ => Ok(Vec::new()),
            },
        })
    }

    async fn get_attribute(
        &self,
        element: ElementId,
        name: &str,
    ) -> Result<Option<String>, DriverError> {
        self.op(|state| {
            let element = state.live(element)?;
            if name != "id" {
                return Ok(None);
            }
            Ok(match element {
                Element::Root(c) => state.page.carousels[c].dom_id.clone(),
                Element::Technical(i) => Some(state.page.technical_roots[i].clone()),
                _ => None,
            })
        })
    }

    async fn get_text(&self, element: ElementId) -> Result<String, DriverError> {
        self.op(|state| match state.live(element)? {
            Element::Counter(c) => {
                let carousel = &state.page.carousels[c];
                let total = carousel
                    .declared_total
                    .unwrap_or(carousel.slides.len() as u32);
                Ok(format!("{}/{}", state.positions[c] + 1, total))
            }
            _ => Ok(String::new()),
        })
    }

    async fn execute_script(
        &self,
        script: &str,
        args: &[ScriptArg],
    ) -> Result<Value, DriverError> {
        self.op(|state| {
            if script == scripts::COLLECT_CANDIDATES {
                match state.live(element_arg(args, 0)?)? {
                    Element::Root(c) => Ok(Value::Array(
                        state
                            .observe(c)?
                            .into_iter()
                            .map(|url| json!({ "url": url, "label": null, "channel": "source" }))
                            .collect(),
                    )),
                    _ => Ok(json!([])),
                }
            } else if script == scripts::HERO_CANDIDATES {
                Ok(Value::Array(state.page.hero.clone()))
            } else if script == scripts::SCROLL_INTO_VIEW {
                state.live(element_arg(args, 0)?)?;
                Ok(Value::Null)
            } else if script == scripts::SCROLL_TO_BOTTOM {
                Ok(Value::Null)
            } else if script == scripts::OUTER_HTML {
                match state.live(element_arg(args, 0)?)? {
                    Element::Root(c) => Ok(json!(state.page.carousels[c].html)),
                    _ => Ok(json!("")),
                }
            } else {
                Err(DriverError::Script("unknown script".to_string()))
            }
        })
    }

    async fn click(&self, element: ElementId) -> Result<(), DriverError> {
        self.op(|state| match state.live(element)? {
            Element::Next(c, _) => state.click(c),
            _ => Ok(()),
        })
    }
}

#[async_trait]
impl BrowserSession for FakeDriver {
    fn as_driver(&self) -> &dyn BrowserDriver {
        self
    }

    async fn close(&self) -> Result<(), DriverError> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Opens fake sessions over a shared set of pages keyed by URL.
pub struct FakeSessionFactory {
    site: Arc<HashMap<String, FakePage>>,
    pub opened: AtomicUsize,
    pub closed: Arc<AtomicUsize>,
}

impl FakeSessionFactory {
    pub fn new(pages: Vec<(String, FakePage)>) -> Self {
        Self {
            site: Arc::new(pages.into_iter().collect()),
            opened: AtomicUsize::new(0),
            closed: Arc::default(),
        }
    }
}

#[async_trait]
impl SessionFactory for FakeSessionFactory {
    async fn open(&self) -> Result<Box<dyn BrowserSession>, DriverError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeDriver::for_site(
            self.site.clone(),
            self.closed.clone(),
        )))
    }
}
