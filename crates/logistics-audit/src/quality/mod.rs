//! Data quality scoring module.
//!
//! This module quantifies table health before and after cleaning.

mod scorer;

pub(crate) use scorer::round2;
pub use scorer::{
    DUPLICATE_PENALTY_CAP, NULLITY_PENALTY_CAP, OUTLIER_PENALTY_CAP, QualityScorer,
    ScorePenalties,
};
