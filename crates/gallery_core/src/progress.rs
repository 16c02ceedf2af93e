use std::sync::LazyLock;

use regex::Regex;

/// Step ceiling used when no indicator ever reported a larger total.
pub const DEFAULT_STEP_CEILING: u32 = 10;

static COUNTER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*/\s*(\d+)").expect("valid counter pattern"));

/// Position reported by a widget's "current/total" indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressState {
    pub current: u32,
    /// `None` when the widget renders no parsable indicator.
    pub total: Option<u32>,
}

impl ProgressState {
    pub fn unknown() -> Self {
        Self::default()
    }

    /// Parses the first `<current>/<total>` occurrence in `text`.
    ///
    /// Anything else (empty text, a lone number, digits that overflow, a zero
    /// total) yields an unknown total.
    pub fn parse(text: &str) -> Self {
        let Some(caps) = COUNTER_PATTERN.captures(text) else {
            return Self::unknown();
        };
        let current = caps[1].parse::<u32>();
        let total = caps[2].parse::<u32>();
        match (current, total) {
            (Ok(current), Ok(total)) if total > 0 => Self {
                current,
                total: Some(total),
            },
            _ => Self::unknown(),
        }
    }

    pub fn is_known(&self) -> bool {
        self.total.is_some()
    }

    /// True when the indicator itself says the last item is showing.
    pub fn indicator_complete(&self) -> bool {
        matches!(self.total, Some(total) if self.current >= total)
    }
}

/// Remembers the largest total any indicator reported and derives the step
/// ceiling from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressTracker {
    max_total: u32,
    default_ceiling: u32,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::with_default_ceiling(DEFAULT_STEP_CEILING)
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_ceiling(default_ceiling: u32) -> Self {
        Self {
            max_total: 0,
            default_ceiling,
        }
    }

    pub fn observe(&mut self, state: &ProgressState) {
        if let Some(total) = state.total {
            self.max_total = self.max_total.max(total);
        }
    }

    /// `max(any total ever observed, default ceiling)`.
    pub fn ceiling(&self) -> u32 {
        self.max_total.max(self.default_ceiling)
    }

    pub fn is_complete(&self, state: &ProgressState, steps: u32) -> bool {
        state.indicator_complete() || steps >= self.ceiling()
    }
}
