use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{ResourcePolicy, ResourceUrl};

/// Where in the DOM a candidate URL was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Primary source of a media element (`currentSrc` / `src`).
    Source,
    /// Deferred-loading attribute populated before the primary source.
    Deferred,
    /// Computed `background-image` style.
    Background,
}

/// One raw URL observation reported by the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub url: String,
    #[serde(default)]
    pub label: Option<String>,
    pub channel: Channel,
    /// Reported pixel area, when the page could measure it.
    #[serde(default)]
    pub area: Option<u64>,
    /// Sits inside a section the page marks as its hero.
    #[serde(default)]
    pub hero_hint: bool,
}

impl Candidate {
    pub fn new(url: impl Into<String>, channel: Channel) -> Self {
        Self {
            url: url.into(),
            label: None,
            channel,
            area: None,
            hero_hint: false,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_area(mut self, area: u64) -> Self {
        self.area = Some(area);
        self
    }

    pub fn in_hero_section(mut self) -> Self {
        self.hero_hint = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedUrl {
    pub url: ResourceUrl,
    pub label: Option<String>,
}

/// Keeps the candidates the policy accepts, distinct by fetch URL, in the
/// order the page reported them.
pub fn qualify_candidates(candidates: &[Candidate], policy: &ResourcePolicy) -> Vec<QualifiedUrl> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for candidate in candidates {
        let Some(url) = ResourceUrl::parse(&candidate.url, policy) else {
            continue;
        };
        if !seen.insert(url.raw().to_string()) {
            continue;
        }
        let label = candidate
            .label
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(ToOwned::to_owned);
        out.push(QualifiedUrl { url, label });
    }
    out
}
