//! RON configuration listing the pages to harvest and optional overrides.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use engine_logging::engine_info;
use gallery_core::ResourcePolicy;
use gallery_engine::{
    ChromiumSettings, FetchSettings, HarvestSettings, NavigationSettings, PageSettings,
    PageTarget, PoolSettings, WidgetSelectors,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub pages: Vec<PageTarget>,
    pub output_dir: PathBuf,
    pub max_workers: usize,
    pub download: bool,
    pub selectors: WidgetSelectors,
    pub policy: ResourcePolicy,
    pub timing: TimingConfig,
    pub browser: BrowserConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            pages: Vec::new(),
            output_dir: PathBuf::from("output"),
            max_workers: PoolSettings::default().max_workers,
            download: false,
            selectors: WidgetSelectors::default(),
            policy: ResourcePolicy::default(),
            timing: TimingConfig::default(),
            browser: BrowserConfig::default(),
        }
    }
}

/// Waits and limits, in plain integers so the file stays readable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub load_settle_ms: u64,
    pub scroll_settle_ms: u64,
    pub click_settle_ms: u64,
    pub poll_attempts: u32,
    pub poll_interval_ms: u64,
    pub page_budget_secs: u64,
    pub default_ceiling: u32,
    pub stall_limit: u32,
    pub fetch_attempts: u32,
    pub fetch_concurrency: usize,
}

impl Default for TimingConfig {
    fn default() -> Self {
        let page = PageSettings::default();
        let harvest = HarvestSettings::default();
        let pool = PoolSettings::default();
        let fetch = FetchSettings::default();
        Self {
            load_settle_ms: millis(page.load_settle),
            scroll_settle_ms: millis(page.scroll_settle),
            click_settle_ms: millis(harvest.navigation.settle_delay),
            poll_attempts: harvest.navigation.poll_attempts,
            poll_interval_ms: millis(harvest.navigation.poll_interval),
            page_budget_secs: pool.page_budget.as_secs(),
            default_ceiling: harvest.default_ceiling,
            stall_limit: harvest.stall_limit,
            fetch_attempts: fetch.max_attempts,
            fetch_concurrency: fetch.concurrency,
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl TimingConfig {
    pub fn page_settings(&self) -> PageSettings {
        PageSettings {
            load_settle: Duration::from_millis(self.load_settle_ms),
            scroll_settle: Duration::from_millis(self.scroll_settle_ms),
        }
    }

    pub fn harvest_settings(&self) -> HarvestSettings {
        HarvestSettings {
            navigation: NavigationSettings {
                settle_delay: Duration::from_millis(self.click_settle_ms),
                poll_attempts: self.poll_attempts,
                poll_interval: Duration::from_millis(self.poll_interval_ms),
            },
            default_ceiling: self.default_ceiling,
            stall_limit: self.stall_limit,
        }
    }

    pub fn pool_settings(&self, max_workers: usize) -> PoolSettings {
        PoolSettings {
            max_workers,
            page_budget: Duration::from_secs(self.page_budget_secs),
        }
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            max_attempts: self.fetch_attempts,
            concurrency: self.fetch_concurrency,
            ..FetchSettings::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless: bool,
    pub executable: Option<PathBuf>,
    pub navigation_timeout_secs: u64,
    pub extra_args: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        let settings = ChromiumSettings::default();
        Self {
            headless: settings.headless,
            executable: settings.executable,
            navigation_timeout_secs: settings.navigation_timeout.as_secs(),
            extra_args: settings.extra_args,
        }
    }
}

impl BrowserConfig {
    pub fn chromium_settings(&self, force_headed: bool) -> ChromiumSettings {
        ChromiumSettings {
            headless: self.headless && !force_headed,
            executable: self.executable.clone(),
            navigation_timeout: Duration::from_secs(self.navigation_timeout_secs),
            extra_args: self.extra_args.clone(),
            ..ChromiumSettings::default()
        }
    }
}

pub fn parse(content: &str) -> anyhow::Result<AppConfig> {
    let config: AppConfig = ron::from_str(content).context("invalid configuration")?;
    if config.pages.is_empty() {
        bail!("configuration lists no pages");
    }
    if let Some(page) = config.pages.iter().find(|page| page.url.trim().is_empty()) {
        bail!("page {:?} has an empty url", page.name);
    }
    Ok(config)
}

pub fn load(path: &Path) -> anyhow::Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read configuration {}", path.display()))?;
    let config = parse(&content).with_context(|| format!("in {}", path.display()))?;
    engine_info!(
        "Loaded {} page(s) from {}",
        config.pages.len(),
        path.display()
    );
    Ok(config)
}
