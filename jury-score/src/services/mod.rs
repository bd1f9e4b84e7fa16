//! Scoring core: aggregation engine, access policy, category membership

pub mod access;
pub mod aggregation;
pub mod key_lock;
pub mod membership;

pub use access::AccessPolicy;
pub use aggregation::{
    AggregationEngine, CriterionScoreSubmission, RepairReport, ScoreSubmissionOutcome,
};
pub use key_lock::KeyedLocks;
pub use membership::CategoryMembership;
