//! Gallery core: pure harvest state machine and the data it accumulates.
mod accumulator;
mod candidate;
mod harvest;
mod hero;
mod progress;
mod report;
mod resource;

pub use accumulator::{DedupAccumulator, HarvestEntry, HarvestResult};
pub use candidate::{qualify_candidates, Candidate, Channel, QualifiedUrl};
pub use harvest::{
    update, HarvestEffect, HarvestMsg, HarvestPhase, HarvestReport, HarvestState, Observation,
    Termination, DEFAULT_STALL_LIMIT,
};
pub use hero::{select_hero, HeroImage};
pub use progress::{ProgressState, ProgressTracker, DEFAULT_STEP_CEILING};
pub use report::{
    fetch_plan, page_slug, FetchTarget, HarvestSummary, ImageRecord, PageRecord, ProjectRecord,
};
pub use resource::{equivalence_key, ImageFormat, ResourcePolicy, ResourceUrl};
