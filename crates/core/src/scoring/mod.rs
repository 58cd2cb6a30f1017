//! ICP scoring
//!
//! Deterministic weighted scoring of a prospect against an Ideal Customer
//! Profile, plus the store that owns which profile is currently active.

mod scorer;
mod store;

pub use scorer::{
    score, ComponentScores, IcpScorer, Recommendation, ScoreBreakdown, ScoredProspect,
    ScoringInput,
};
pub use store::ActiveConfigStore;

/// Component score at or above which a match reason is recorded.
pub const STRONG_COMPONENT_THRESHOLD: u32 = 70;

/// Component score below which a concern is recorded.
pub const WEAK_COMPONENT_THRESHOLD: u32 = 30;

/// Total returned when no profile is configured.
pub const NEUTRAL_TOTAL: u32 = 50;
