use std::collections::VecDeque;

use engine_logging::{engine_debug, engine_info, engine_warn};
use gallery_core::{
    update, HarvestEffect, HarvestMsg, HarvestReport, HarvestState, Observation, ResourcePolicy,
    DEFAULT_STALL_LIMIT, DEFAULT_STEP_CEILING,
};

use crate::driver::BrowserDriver;
use crate::extract::observe_widget;
use crate::locator::{LocatorResolver, WidgetIdentity};
use crate::navigate::{advance, Baseline, NavigationSettings};
use crate::HarvestFault;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestSettings {
    pub navigation: NavigationSettings,
    /// Step ceiling while no indicator reported a larger total.
    pub default_ceiling: u32,
    /// Empty observations tolerated before an indicator-less widget is done.
    pub stall_limit: u32,
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self {
            navigation: NavigationSettings::default(),
            default_ceiling: DEFAULT_STEP_CEILING,
            stall_limit: DEFAULT_STALL_LIMIT,
        }
    }
}

/// Runs the harvest state machine for one widget against a live driver.
pub struct GalleryHarvester {
    resolver: LocatorResolver,
    policy: ResourcePolicy,
    settings: HarvestSettings,
}

impl GalleryHarvester {
    pub fn new(resolver: LocatorResolver, policy: ResourcePolicy, settings: HarvestSettings) -> Self {
        Self {
            resolver,
            policy,
            settings,
        }
    }

    pub fn resolver(&self) -> &LocatorResolver {
        &self.resolver
    }

    pub fn policy(&self) -> &ResourcePolicy {
        &self.policy
    }

    /// Discovers every image behind `identity`. Never fails: faults end the
    /// harvest and are recorded on the report together with what was found.
    pub async fn harvest(
        &self,
        driver: &dyn BrowserDriver,
        identity: &WidgetIdentity,
    ) -> HarvestReport {
        let mut state =
            HarvestState::with_limits(self.settings.default_ceiling, self.settings.stall_limit);
        let mut last_observation = Observation::default();
        let mut inbox = VecDeque::from([HarvestMsg::Begin]);

        while let Some(msg) = inbox.pop_front() {
            let (next_state, effects) = update(state, msg);
            state = next_state;
            for effect in effects {
                match effect {
                    HarvestEffect::Observe => {
                        let msg = match observe_widget(
                            driver,
                            &self.resolver,
                            identity,
                            &self.policy,
                        )
                        .await
                        {
                            Ok(observation) => {
                                engine_debug!(
                                    "Widget {} step {}: {} url(s), indicator {}/{:?}",
                                    identity.ordinal,
                                    state.steps(),
                                    observation.urls.len(),
                                    observation.progress.current,
                                    observation.progress.total
                                );
                                last_observation = observation.clone();
                                HarvestMsg::Observed(observation)
                            }
                            Err(fault) => fault_msg(fault),
                        };
                        inbox.push_back(msg);
                    }
                    HarvestEffect::Advance => {
                        let baseline = Baseline::capture(&last_observation);
                        let msg = match advance(
                            driver,
                            &self.resolver,
                            identity,
                            &baseline,
                            &self.settings.navigation,
                            &self.policy,
                        )
                        .await
                        {
                            Ok(progressed) => HarvestMsg::Advanced(progressed),
                            Err(fault) => fault_msg(fault),
                        };
                        inbox.push_back(msg);
                    }
                    HarvestEffect::Finish(termination) => {
                        engine_info!(
                            "Widget {} finished ({termination}): {} image(s) in {} step(s)",
                            identity.ordinal,
                            state.accumulator().len(),
                            state.steps()
                        );
                    }
                }
            }
        }

        let report = state.into_report();
        if let Some(missing) = report.shortfall().filter(|missing| *missing > 0) {
            engine_warn!(
                "Widget {} declared {:?} image(s), {missing} not found",
                identity.ordinal,
                report.declared_total
            );
        }
        report
    }
}

fn fault_msg(fault: HarvestFault) -> HarvestMsg {
    match fault {
        HarvestFault::WidgetLost => HarvestMsg::WidgetLost,
        HarvestFault::Session(message) => HarvestMsg::Faulted(message),
    }
}
