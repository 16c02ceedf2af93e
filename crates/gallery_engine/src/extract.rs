use engine_logging::{engine_debug, engine_warn};
use gallery_core::{
    qualify_candidates, select_hero, Candidate, HeroImage, Observation, ProgressState,
    QualifiedUrl, ResourcePolicy,
};
use serde_json::Value;

use crate::driver::{BrowserDriver, DriverError, ElementId, ScriptArg};
use crate::locator::{LocatorResolver, WidgetHandle, WidgetIdentity};
use crate::scripts;
use crate::HarvestFault;

/// Qualifying resource URLs visible in `root`'s subtree right now, distinct
/// and in page order.
pub async fn extract(
    driver: &dyn BrowserDriver,
    root: ElementId,
    policy: &ResourcePolicy,
) -> Result<Vec<QualifiedUrl>, DriverError> {
    let value = driver
        .execute_script(scripts::COLLECT_CANDIDATES, &[ScriptArg::Element(root)])
        .await?;
    let candidates = parse_candidates(value)?;
    Ok(qualify_candidates(&candidates, policy))
}

/// The page's hero image: the largest sufficiently big qualifying image.
pub async fn extract_hero(
    driver: &dyn BrowserDriver,
    policy: &ResourcePolicy,
    fallback_alt: &str,
) -> Result<Option<HeroImage>, DriverError> {
    let value = driver.execute_script(scripts::HERO_CANDIDATES, &[]).await?;
    let candidates = parse_candidates(value)?;
    Ok(select_hero(&candidates, policy, fallback_alt))
}

/// Reads the widget's indicator; no indicator means an unknown total.
pub async fn read_progress(
    driver: &dyn BrowserDriver,
    handle: &WidgetHandle,
) -> Result<ProgressState, DriverError> {
    match handle.counter {
        Some(counter) => Ok(ProgressState::parse(&driver.get_text(counter).await?)),
        None => Ok(ProgressState::unknown()),
    }
}

/// Resolves the widget afresh and captures what it shows.
pub async fn observe_widget(
    driver: &dyn BrowserDriver,
    resolver: &LocatorResolver,
    identity: &WidgetIdentity,
    policy: &ResourcePolicy,
) -> Result<Observation, HarvestFault> {
    let mut attempt = 0;
    loop {
        let handle = resolver.resolve(driver, identity).await?;
        let outcome = async {
            let urls = extract(driver, handle.root, policy).await?;
            let progress = read_progress(driver, &handle).await?;
            Ok::<_, DriverError>(Observation { urls, progress })
        }
        .await;
        match outcome {
            Ok(observation) => return Ok(observation),
            Err(DriverError::StaleReference) if attempt < resolver.stale_retries() => {
                attempt += 1;
                engine_debug!(
                    "Widget {} went stale while observing, retry {attempt}",
                    identity.ordinal
                );
            }
            Err(DriverError::StaleReference) => return Err(HarvestFault::WidgetLost),
            Err(DriverError::Script(message)) => {
                engine_warn!(
                    "Could not read widget {}: {message}",
                    identity.ordinal
                );
                return Ok(Observation::default());
            }
            Err(DriverError::Session(message)) => return Err(HarvestFault::Session(message)),
        }
    }
}

fn parse_candidates(value: Value) -> Result<Vec<Candidate>, DriverError> {
    if value.is_null() {
        return Ok(Vec::new());
    }
    serde_json::from_value(value)
        .map_err(|err| DriverError::Script(format!("unexpected candidate list: {err}")))
}
