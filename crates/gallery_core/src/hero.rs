use serde::{Deserialize, Serialize};

use crate::{Candidate, ResourcePolicy, ResourceUrl};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeroImage {
    pub url: String,
    pub alt: String,
}

/// Picks the hero among qualifying candidates whose reported area reaches
/// `policy.min_hero_area`: the largest one inside a marked hero section,
/// else the largest overall. Ties keep the earlier candidate.
pub fn select_hero(
    candidates: &[Candidate],
    policy: &ResourcePolicy,
    fallback_alt: &str,
) -> Option<HeroImage> {
    let mut best: Option<((bool, u64), &Candidate, ResourceUrl)> = None;
    for candidate in candidates {
        let Some(area) = candidate.area else {
            continue;
        };
        if area < policy.min_hero_area {
            continue;
        }
        let Some(url) = ResourceUrl::parse(&candidate.url, policy) else {
            continue;
        };
        let rank = (candidate.hero_hint, area);
        if best.as_ref().is_none_or(|(best_rank, _, _)| rank > *best_rank) {
            best = Some((rank, candidate, url));
        }
    }

    best.map(|(_, candidate, url)| HeroImage {
        url: url.raw().to_string(),
        alt: candidate
            .label
            .as_deref()
            .map(str::trim)
            .filter(|alt| !alt.is_empty())
            .unwrap_or(fallback_alt)
            .to_string(),
    })
}
