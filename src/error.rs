//! Error taxonomy for the clustering and link-planning core.

use thiserror::Error;

/// Failures that make an entire planning run meaningless.
///
/// Per-page and per-cluster dead ends (no pillar, no usable anchor) are not
/// errors; they silently shrink the output list. A cohesion score below the
/// configured floor is a warning carried on the run result, never a failure.
#[derive(Debug, Error)]
pub enum PlanError {
    /// Fewer than two usable pages were supplied.
    #[error("need at least 2 usable pages, got {0}")]
    InsufficientInput(usize),

    /// No candidate cluster count produced a valid partition.
    #[error("no cluster count in {min_k}..={max_k} produced a valid partition")]
    ClusteringFailure {
        /// Smallest cluster count that was attempted.
        min_k: usize,
        /// Largest cluster count that was attempted.
        max_k: usize,
    },

    /// An internal contract was broken. Always a programming error in the
    /// caller or a component, never an expected runtime condition.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}
