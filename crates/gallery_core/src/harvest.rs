use std::fmt;

use crate::{DedupAccumulator, HarvestResult, ProgressState, ProgressTracker, QualifiedUrl};

/// Consecutive observations without a new resource tolerated before a widget
/// with no usable indicator is considered exhausted.
pub const DEFAULT_STALL_LIMIT: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HarvestPhase {
    #[default]
    Start,
    /// Bulk extraction without navigating.
    Probe,
    /// Advance + extract, repeated.
    Step,
    Done,
}

/// What the widget showed at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Observation {
    pub urls: Vec<QualifiedUrl>,
    pub progress: ProgressState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HarvestMsg {
    Begin,
    Observed(Observation),
    /// Result of one advance attempt: whether any observable change followed.
    Advanced(bool),
    /// The widget could no longer be located.
    WidgetLost,
    /// The browser session failed underneath the harvest.
    Faulted(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HarvestEffect {
    /// Extract URLs and read the indicator without navigating.
    Observe,
    /// Invoke the widget's next control and wait for a change.
    Advance,
    Finish(Termination),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Declared total reached or indicator at its last position.
    Complete,
    /// An advance produced no observable change.
    NoProgress,
    /// No indicator and repeated observations added nothing new.
    Converged,
    StepCeiling,
    WidgetLost,
    Faulted,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Complete => write!(f, "complete"),
            Termination::NoProgress => write!(f, "no further progress"),
            Termination::Converged => write!(f, "converged"),
            Termination::StepCeiling => write!(f, "step ceiling reached"),
            Termination::WidgetLost => write!(f, "widget lost"),
            Termination::Faulted => write!(f, "faulted"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestState {
    phase: HarvestPhase,
    accumulator: DedupAccumulator,
    tracker: ProgressTracker,
    declared_total: Option<u32>,
    last_progress: ProgressState,
    steps: u32,
    stalled: u32,
    stall_limit: u32,
    termination: Option<Termination>,
    error: Option<String>,
}

impl Default for HarvestState {
    fn default() -> Self {
        Self::new()
    }
}

impl HarvestState {
    pub fn new() -> Self {
        Self {
            phase: HarvestPhase::Start,
            accumulator: DedupAccumulator::new(),
            tracker: ProgressTracker::new(),
            declared_total: None,
            last_progress: ProgressState::unknown(),
            steps: 0,
            stalled: 0,
            stall_limit: DEFAULT_STALL_LIMIT,
            termination: None,
            error: None,
        }
    }

    pub fn with_limits(default_ceiling: u32, stall_limit: u32) -> Self {
        Self {
            tracker: ProgressTracker::with_default_ceiling(default_ceiling),
            stall_limit: stall_limit.max(1),
            ..Self::new()
        }
    }

    pub fn phase(&self) -> HarvestPhase {
        self.phase
    }

    pub fn is_done(&self) -> bool {
        self.phase == HarvestPhase::Done
    }

    /// Number of completed advance-and-observe rounds.
    pub fn steps(&self) -> u32 {
        self.steps
    }

    pub fn ceiling(&self) -> u32 {
        self.tracker.ceiling()
    }

    pub fn declared_total(&self) -> Option<u32> {
        self.declared_total
    }

    pub fn last_progress(&self) -> ProgressState {
        self.last_progress
    }

    pub fn accumulator(&self) -> &DedupAccumulator {
        &self.accumulator
    }

    pub fn termination(&self) -> Option<Termination> {
        self.termination
    }

    pub fn into_report(self) -> HarvestReport {
        HarvestReport {
            result: self.accumulator.finish(),
            declared_total: self.declared_total,
            steps: self.steps,
            termination: self.termination.unwrap_or(Termination::Faulted),
            error: self.error,
        }
    }

    fn absorb(&mut self, observation: Observation) -> usize {
        let progress = observation.progress;
        if self.declared_total.is_none() {
            if let Some(total) = progress.total {
                self.declared_total = Some(total);
                self.accumulator.set_limit(Some(total as usize));
            }
        }
        self.tracker.observe(&progress);
        self.last_progress = progress;
        self.accumulator.add(observation.urls)
    }

    fn reached_total(&self) -> bool {
        match self.declared_total {
            Some(total) => {
                self.accumulator.len() >= total as usize
                    || self.last_progress.indicator_complete()
            }
            None => self.accumulator.len() >= self.tracker.ceiling() as usize,
        }
    }

    fn finish(&mut self, termination: Termination) -> Vec<HarvestEffect> {
        self.phase = HarvestPhase::Done;
        self.termination = Some(termination);
        vec![HarvestEffect::Finish(termination)]
    }
}

/// Pure update function: applies a message to the harvest and returns the
/// effects the runner must execute next.
pub fn update(mut state: HarvestState, msg: HarvestMsg) -> (HarvestState, Vec<HarvestEffect>) {
    if state.phase == HarvestPhase::Done {
        return (state, Vec::new());
    }

    let effects = match msg {
        HarvestMsg::Begin => {
            if state.phase == HarvestPhase::Start {
                state.phase = HarvestPhase::Probe;
                vec![HarvestEffect::Observe]
            } else {
                Vec::new()
            }
        }
        HarvestMsg::Observed(observation) => match state.phase {
            HarvestPhase::Probe => {
                state.absorb(observation);
                if state.reached_total() {
                    state.finish(Termination::Complete)
                } else {
                    state.phase = HarvestPhase::Step;
                    vec![HarvestEffect::Advance]
                }
            }
            HarvestPhase::Step => {
                state.steps += 1;
                let added = state.absorb(observation);
                if state.reached_total() {
                    state.finish(Termination::Complete)
                } else {
                    if state.declared_total.is_none() && added == 0 {
                        state.stalled += 1;
                    } else {
                        state.stalled = 0;
                    }
                    if state.declared_total.is_none() && state.stalled >= state.stall_limit {
                        state.finish(Termination::Converged)
                    } else if state.tracker.is_complete(&state.last_progress, state.steps) {
                        state.finish(Termination::StepCeiling)
                    } else {
                        vec![HarvestEffect::Advance]
                    }
                }
            }
            HarvestPhase::Start | HarvestPhase::Done => Vec::new(),
        },
        HarvestMsg::Advanced(progressed) => {
            if state.phase != HarvestPhase::Step {
                Vec::new()
            } else if progressed {
                vec![HarvestEffect::Observe]
            } else {
                state.finish(Termination::NoProgress)
            }
        }
        HarvestMsg::WidgetLost => state.finish(Termination::WidgetLost),
        HarvestMsg::Faulted(error) => {
            state.error = Some(error);
            state.finish(Termination::Faulted)
        }
    };

    (state, effects)
}

/// Outcome of one widget harvest. Always produced, even on failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestReport {
    pub result: HarvestResult,
    pub declared_total: Option<u32>,
    pub steps: u32,
    pub termination: Termination,
    pub error: Option<String>,
}

impl HarvestReport {
    /// An empty report for a harvest that could not run at all.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            result: HarvestResult::default(),
            declared_total: None,
            steps: 0,
            termination: Termination::Faulted,
            error: Some(error.into()),
        }
    }

    /// How many declared images were not found, when a total was declared.
    pub fn shortfall(&self) -> Option<u32> {
        self.declared_total
            .map(|total| total.saturating_sub(self.result.len() as u32))
    }
}
