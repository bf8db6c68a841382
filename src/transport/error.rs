//! Errors surfaced by the initialization algorithm.

#![forbid(unsafe_code)]

use thiserror::Error;

use crate::transport::newton::SolverError;

/// Failure modes of [`initial_weights`](crate::transport::guess::initial_weights).
///
/// Degeneracy checks themselves are local (area comparisons against the
/// threshold) and never surface as errors; only precondition violations,
/// solver and linear-algebra failures, and budget exhaustion do. No partial
/// result is ever returned: the caller either gets a weight vector that
/// passed the area-threshold check or one of these errors.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum InitialWeightsError {
    /// Neither axis is periodic; the algorithm is only defined under
    /// periodic boundary conditions.
    #[error("the domain must be periodic in at least one axis")]
    NoPeriodicAxis,
    /// The target vector does not have one entry per seed.
    #[error("target count {actual} does not match seed count {expected}")]
    TargetCountMismatch {
        /// Number of seeds.
        expected: usize,
        /// Number of targets supplied.
        actual: usize,
    },
    /// The damped Newton solve failed for a perturbed configuration even
    /// after falling back to the default guess.
    #[error("damped Newton solve failed for a perturbed configuration: {0}")]
    Solver(#[from] SolverError),
    /// The reduced weight Jacobian stayed singular across consecutive
    /// perturbation attempts.
    #[error("reduced weight Jacobian stayed singular across {attempts} consecutive attempts")]
    SingularJacobian {
        /// Length of the singular streak.
        attempts: usize,
    },
    /// The perturbation-correction loop exhausted its halving budget
    /// without producing a non-degenerate weight vector.
    #[error(
        "no non-degenerate weight vector within {attempts} perturbation halvings \
         (last minimum area {last_min_area:.3e}, threshold {threshold:.3e}, \
         last amplitude {last_amplitude:.3e})"
    )]
    RetryBudgetExhausted {
        /// Number of attempts performed.
        attempts: usize,
        /// Minimum cell area observed for the last corrected candidate
        /// (NaN when no candidate was ever evaluated).
        last_min_area: f64,
        /// The degeneracy threshold in force.
        threshold: f64,
        /// Amplitude of the last perturbation tried.
        last_amplitude: f64,
    },
}
