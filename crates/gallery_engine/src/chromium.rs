//! [`BrowserDriver`] over a local Chromium via the DevTools protocol.
//!
//! Element references live page-side in `window.__galleryHarvestRefs`; an
//! [`ElementId`] is an index into that array. A navigation drops the array,
//! and a detached or released entry reports [`DriverError::StaleReference`].

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use engine_logging::{engine_debug, engine_info};
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::driver::{
    BrowserDriver, BrowserSession, DriverError, ElementId, Locator, ScriptArg, SessionFactory,
};

/// Page-side reference table. Registering a new element first releases every
/// detached one; released slots stay empty so their ids keep reading stale.
const REF_PRELUDE: &str = r#"  const refs = (window.__galleryHarvestRefs = window.__galleryHarvestRefs || []);
  const slots = (window.__galleryHarvestSlots = window.__galleryHarvestSlots || new Map());
  const register = (el) => {
    let index = slots.get(el);
    if (index === undefined) {
      for (const [known, slot] of slots) {
        if (!known.isConnected) { refs[slot] = null; slots.delete(known); }
      }
      index = refs.push(el) - 1;
      slots.set(el, index);
    }
    return index;
  };"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChromiumSettings {
    pub headless: bool,
    /// Browser binary; chromiumoxide's own lookup is used when unset.
    pub executable: Option<PathBuf>,
    pub window_size: (u32, u32),
    pub navigation_timeout: Duration,
    pub extra_args: Vec<String>,
}

impl Default for ChromiumSettings {
    fn default() -> Self {
        Self {
            headless: true,
            executable: None,
            window_size: (1920, 1080),
            navigation_timeout: Duration::from_secs(60),
            extra_args: Vec::new(),
        }
    }
}

/// Launches one browser per session.
#[derive(Debug, Clone, Default)]
pub struct ChromiumSessionFactory {
    settings: ChromiumSettings,
}

impl ChromiumSessionFactory {
    pub fn new(settings: ChromiumSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl SessionFactory for ChromiumSessionFactory {
    async fn open(&self) -> Result<Box<dyn BrowserSession>, DriverError> {
        Ok(Box::new(ChromiumSession::launch(&self.settings).await?))
    }
}

pub struct ChromiumSession {
    browser: Mutex<Browser>,
    page: Page,
    handler: JoinHandle<()>,
    navigation_timeout: Duration,
}

impl ChromiumSession {
    pub async fn launch(settings: &ChromiumSettings) -> Result<Self, DriverError> {
        engine_info!("Launching browser (headless={})", settings.headless);
        let (width, height) = settings.window_size;
        let mut builder = BrowserConfig::builder()
            .window_size(width, height)
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--no-sandbox")
            .arg("--disable-gpu")
            .arg("--no-first-run");
        // with_head means NOT headless
        if !settings.headless {
            builder = builder.with_head();
        }
        if let Some(executable) = &settings.executable {
            builder = builder.chrome_executable(executable);
        }
        for arg in &settings.extra_args {
            builder = builder.arg(arg);
        }
        let config = builder
            .build()
            .map_err(|err| DriverError::Session(format!("browser config: {err}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|err| DriverError::Session(format!("launch failed: {err}")))?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|err| DriverError::Session(format!("new page failed: {err}")))?;

        Ok(Self {
            browser: Mutex::new(browser),
            page,
            handler,
            navigation_timeout: settings.navigation_timeout,
        })
    }

    /// Runs `body` as a function over `args` with element references
    /// substituted, inside the page.
    async fn call(&self, body: &str, args: &[ScriptArg]) -> Result<Value, DriverError> {
        let encoded: Vec<Value> = args
            .iter()
            .map(|arg| match arg {
                ScriptArg::Element(id) => json!({ "__element": id.0 }),
                ScriptArg::Value(value) => json!({ "value": value }),
            })
            .collect();
        let expression = format!(
            r#"(() => {{
{prelude}
  const args = [];
  for (const arg of {args}) {{
    if (Object.prototype.hasOwnProperty.call(arg, '__element')) {{
      const el = refs[arg.__element];
      if (!el || !el.isConnected) return {{ stale: true }};
      args.push(el);
    }} else {{
      args.push(arg.value);
    }}
  }}
  try {{
    const value = (function () {{ {body} }}).apply(null, args);
    return {{ value: value === undefined ? null : value }};
  }} catch (e) {{
    return {{ error: String(e && e.message ? e.message : e) }};
  }}
}})()"#,
            prelude = REF_PRELUDE,
            args = Value::Array(encoded),
        );

        let outcome: ScriptOutcome = self
            .page
            .evaluate(expression)
            .await
            .map_err(|err| DriverError::Session(err.to_string()))?
            .into_value()
            .map_err(|err| DriverError::Script(format!("unreadable result: {err:?}")))?;

        if outcome.stale {
            return Err(DriverError::StaleReference);
        }
        if let Some(error) = outcome.error {
            return Err(DriverError::Script(error));
        }
        Ok(outcome.value)
    }
}

#[derive(Debug, Deserialize)]
struct ScriptOutcome {
    #[serde(default)]
    stale: bool,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    error: Option<String>,
}

fn element_ids(value: Value) -> Result<Vec<ElementId>, DriverError> {
    serde_json::from_value::<Vec<u64>>(value)
        .map(|ids| ids.into_iter().map(ElementId).collect())
        .map_err(|err| DriverError::Script(format!("unexpected element list: {err}")))
}

#[async_trait]
impl BrowserDriver for ChromiumSession {
    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        engine_debug!("Navigating to {url}");
        let navigation = async {
            self.page.goto(url).await?;
            self.page.wait_for_navigation().await?;
            Ok::<_, chromiumoxide::error::CdpError>(())
        };
        match tokio::time::timeout(self.navigation_timeout, navigation).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(DriverError::Session(format!("navigation failed: {err}"))),
            Err(_) => Err(DriverError::Session(format!(
                "navigation timed out after {}s",
                self.navigation_timeout.as_secs()
            ))),
        }
    }

    async fn query(&self, locator: &Locator) -> Result<Vec<ElementId>, DriverError> {
        let value = match locator {
            Locator::Css(selector) => {
                self.call(
                    "return Array.from(document.querySelectorAll(arguments[0]), register);",
                    &[ScriptArg::Value(json!(selector))],
                )
                .await?
            }
            Locator::Within(root, selector) => {
                self.call(
                    "return Array.from(arguments[0].querySelectorAll(arguments[1]), register);",
                    &[ScriptArg::Element(*root), ScriptArg::Value(json!(selector))],
                )
                .await?
            }
        };
        element_ids(value)
    }

    async fn get_attribute(
        &self,
        element: ElementId,
        name: &str,
    ) -> Result<Option<String>, DriverError> {
        let value = self
            .call(
                "return arguments[0].getAttribute(arguments[1]);",
                &[ScriptArg::Element(element), ScriptArg::Value(json!(name))],
            )
            .await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn get_text(&self, element: ElementId) -> Result<String, DriverError> {
        let value = self
            .call(
                "return arguments[0].innerText || arguments[0].textContent || '';",
                &[ScriptArg::Element(element)],
            )
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn execute_script(
        &self,
        script: &str,
        args: &[ScriptArg],
    ) -> Result<Value, DriverError> {
        self.call(script, args).await
    }

    async fn click(&self, element: ElementId) -> Result<(), DriverError> {
        self.call("arguments[0].click(); return null;", &[ScriptArg::Element(element)])
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    fn as_driver(&self) -> &dyn BrowserDriver {
        self
    }

    async fn close(&self) -> Result<(), DriverError> {
        let result = self.browser.lock().await.close().await;
        self.handler.abort();
        result
            .map(|_| ())
            .map_err(|err| DriverError::Session(format!("close failed: {err}")))
    }
}
