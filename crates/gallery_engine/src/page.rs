use std::time::Duration;

use engine_logging::{engine_debug, engine_info, engine_warn};
use gallery_core::{HeroImage, PageRecord, ProjectRecord};
use serde::{Deserialize, Serialize};

use crate::details::{describe, WidgetDetails};
use crate::driver::{BrowserDriver, DriverError, ScriptArg};
use crate::extract::extract_hero;
use crate::harvester::GalleryHarvester;
use crate::locator::WidgetIdentity;
use crate::{scripts, EngineEvent, ProgressSink};

/// A page to harvest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageTarget {
    pub name: String,
    pub url: String,
}

impl PageTarget {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSettings {
    /// Wait after navigation before touching the DOM.
    pub load_settle: Duration,
    /// Wait after scrolling to the bottom so lazy content mounts.
    pub scroll_settle: Duration,
}

impl Default for PageSettings {
    fn default() -> Self {
        Self {
            load_settle: Duration::from_secs(5),
            scroll_settle: Duration::from_secs(3),
        }
    }
}

/// Harvests every widget of one page into a [`PageRecord`].
pub struct PageHarvester {
    harvester: GalleryHarvester,
    settings: PageSettings,
}

impl PageHarvester {
    pub fn new(harvester: GalleryHarvester, settings: PageSettings) -> Self {
        Self {
            harvester,
            settings,
        }
    }

    pub async fn harvest_page(
        &self,
        driver: &dyn BrowserDriver,
        target: &PageTarget,
        sink: &dyn ProgressSink,
    ) -> PageRecord {
        match self.try_harvest_page(driver, target, sink).await {
            Ok(record) => record,
            Err(err) => {
                engine_warn!("Page {} failed: {err}", target.name);
                PageRecord::failed(&target.name, &target.url, err.to_string())
            }
        }
    }

    async fn try_harvest_page(
        &self,
        driver: &dyn BrowserDriver,
        target: &PageTarget,
        sink: &dyn ProgressSink,
    ) -> Result<PageRecord, DriverError> {
        engine_info!("Harvesting page {} ({})", target.name, target.url);
        driver.navigate(&target.url).await?;
        tokio::time::sleep(self.settings.load_settle).await;
        tolerate_script(driver.execute_script(scripts::SCROLL_TO_BOTTOM, &[]).await)?;
        tokio::time::sleep(self.settings.scroll_settle).await;

        let mut record = PageRecord::new(&target.name, &target.url);
        record.hero_image = self.hero(driver, target).await?;

        let widgets = tolerate_script(self.harvester.resolver().discover(driver).await)?
            .unwrap_or_default();
        engine_info!("Page {}: {} widget(s)", target.name, widgets.len());

        for identity in &widgets {
            let project_number = identity.ordinal + 1;
            self.scroll_to(driver, identity).await?;
            let report = self.harvester.harvest(driver, identity).await;
            if let Some(error) = &report.error {
                engine_warn!(
                    "Page {} project {project_number} ended early: {error}",
                    target.name
                );
            }
            let details = self.details(driver, identity, project_number).await?;
            sink.emit(EngineEvent::WidgetHarvested {
                page: target.name.clone(),
                project: project_number,
                found: report.result.len(),
                declared: report.declared_total,
                termination: report.termination,
            });
            record.projects.push(ProjectRecord::from_report(
                project_number,
                details.title,
                details.description,
                &report,
            ));
        }

        engine_info!(
            "Page {} done: {} photo(s) in {} project(s)",
            target.name,
            record.total_photos(),
            record.projects.len()
        );
        Ok(record)
    }

    async fn hero(
        &self,
        driver: &dyn BrowserDriver,
        target: &PageTarget,
    ) -> Result<Option<HeroImage>, DriverError> {
        let fallback_alt = format!("{} Hero", target.name);
        let hero = tolerate_script(
            extract_hero(driver, self.harvester.policy(), &fallback_alt).await,
        )?
        .flatten();
        match &hero {
            Some(hero) => engine_debug!("Page {} hero: {}", target.name, hero.url),
            None => engine_debug!("Page {} has no hero image", target.name),
        }
        Ok(hero)
    }

    async fn scroll_to(
        &self,
        driver: &dyn BrowserDriver,
        identity: &WidgetIdentity,
    ) -> Result<(), DriverError> {
        let Ok(handle) = self.harvester.resolver().resolve(driver, identity).await else {
            return Ok(());
        };
        match driver
            .execute_script(scripts::SCROLL_INTO_VIEW, &[ScriptArg::Element(handle.root)])
            .await
        {
            Err(DriverError::Session(message)) => Err(DriverError::Session(message)),
            _ => Ok(()),
        }
    }

    async fn details(
        &self,
        driver: &dyn BrowserDriver,
        identity: &WidgetIdentity,
        project_number: usize,
    ) -> Result<WidgetDetails, DriverError> {
        let html = match self.harvester.resolver().resolve(driver, identity).await {
            Ok(handle) => match driver
                .execute_script(scripts::OUTER_HTML, &[ScriptArg::Element(handle.root)])
                .await
            {
                Ok(value) => value.as_str().map(str::to_string),
                Err(DriverError::Session(message)) => return Err(DriverError::Session(message)),
                Err(_) => None,
            },
            Err(_) => None,
        };
        Ok(describe(html.as_deref().unwrap_or_default(), project_number))
    }
}

/// Script failures degrade to "nothing found"; session failures propagate.
fn tolerate_script<T>(result: Result<T, DriverError>) -> Result<Option<T>, DriverError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(DriverError::Script(message)) => {
            engine_warn!("Page script failed: {message}");
            Ok(None)
        }
        Err(DriverError::StaleReference) => Ok(None),
        Err(err) => Err(err),
    }
}
