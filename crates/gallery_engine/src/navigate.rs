use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use engine_logging::{engine_debug, engine_trace, engine_warn};
use gallery_core::{Observation, ResourcePolicy};

use crate::driver::{BrowserDriver, DriverError, ElementId, ScriptArg};
use crate::extract::observe_widget;
use crate::locator::{LocatorResolver, WidgetIdentity};
use crate::{scripts, HarvestFault};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationSettings {
    /// Pause between scrolling the next control into view and clicking it.
    pub settle_delay: Duration,
    pub poll_attempts: u32,
    pub poll_interval: Duration,
}

impl Default for NavigationSettings {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(300),
            poll_attempts: 10,
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// What the widget showed right before an advance.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Baseline {
    keys: HashSet<String>,
    current: u32,
}

impl Baseline {
    pub fn capture(observation: &Observation) -> Self {
        Self {
            keys: observation
                .urls
                .iter()
                .map(|item| item.url.key().to_string())
                .collect(),
            current: observation.progress.current,
        }
    }

    /// True when `observation` shows a resource or a position the baseline
    /// did not.
    pub fn is_exceeded_by(&self, observation: &Observation) -> bool {
        observation.progress.current > self.current
            || observation
                .urls
                .iter()
                .any(|item| !self.keys.contains(item.url.key()))
    }
}

/// Polls `predicate` up to `attempts` times, sleeping `interval` before each
/// check. Stops early on the first `true` or error.
pub async fn poll_until<F, Fut, E>(
    attempts: u32,
    interval: Duration,
    mut predicate: F,
) -> Result<bool, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, E>>,
{
    for attempt in 1..=attempts {
        tokio::time::sleep(interval).await;
        if predicate().await? {
            engine_trace!("Condition met after {attempt} poll(s)");
            return Ok(true);
        }
    }
    Ok(false)
}

/// Clicks the widget's next control and waits for the widget to show
/// something beyond `baseline`.
///
/// Returns `Ok(false)` when the widget has no next control, the click could
/// not be delivered, or nothing changed within the polling budget.
pub async fn advance(
    driver: &dyn BrowserDriver,
    resolver: &LocatorResolver,
    identity: &WidgetIdentity,
    baseline: &Baseline,
    settings: &NavigationSettings,
    policy: &ResourcePolicy,
) -> Result<bool, HarvestFault> {
    let mut attempt = 0;
    loop {
        let handle = resolver.resolve(driver, identity).await?;
        let Some(next) = handle.next else {
            engine_debug!("Widget {} has no next control", identity.ordinal);
            return Ok(false);
        };
        match click_next(driver, next, settings).await {
            Ok(()) => break,
            Err(DriverError::StaleReference) if attempt < resolver.stale_retries() => {
                attempt += 1;
                engine_debug!(
                    "Next control of widget {} went stale, retry {attempt}",
                    identity.ordinal
                );
            }
            Err(DriverError::StaleReference) => {
                engine_warn!(
                    "Next control of widget {} stayed stale, giving up",
                    identity.ordinal
                );
                return Ok(false);
            }
            Err(DriverError::Script(message)) => {
                engine_warn!(
                    "Could not click next on widget {}: {message}",
                    identity.ordinal
                );
                return Ok(false);
            }
            Err(DriverError::Session(message)) => return Err(HarvestFault::Session(message)),
        }
    }

    poll_until(settings.poll_attempts, settings.poll_interval, || async move {
        let observation = observe_widget(driver, resolver, identity, policy).await?;
        Ok::<_, HarvestFault>(baseline.is_exceeded_by(&observation))
    })
    .await
}

async fn click_next(
    driver: &dyn BrowserDriver,
    next: ElementId,
    settings: &NavigationSettings,
) -> Result<(), DriverError> {
    driver
        .execute_script(scripts::SCROLL_INTO_VIEW, &[ScriptArg::Element(next)])
        .await?;
    tokio::time::sleep(settings.settle_delay).await;
    driver.click(next).await
}
