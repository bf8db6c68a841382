//! Damped Newton iteration on the mass map.
//!
//! Solves `areas(w) = targets` for the weight vector of a Laguerre
//! tessellation. The weight-shift invariance of the areas makes the full
//! Jacobian rank-deficient, so the iteration pins the last weight at zero
//! and solves the leading `(n - 1) × (n - 1)` block. Steps are accepted only
//! while every cell keeps an area above half the smaller of the minimum
//! target and the minimum starting area; otherwise the step is shrunk by the
//! damping factor.

#![forbid(unsafe_code)]

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

use crate::geometry::domain::Domain;

/// Relative slack allowed between the summed targets and the domain area.
const MASS_BALANCE_TOLERANCE: f64 = 1e-8;

/// Errors raised by [`damped_newton`].
#[derive(Clone, Debug, Error, PartialEq)]
pub enum SolverError {
    /// The target vector does not have one entry per seed.
    #[error("target count {actual} does not match seed count {expected}")]
    TargetCountMismatch {
        /// Number of seeds.
        expected: usize,
        /// Number of targets supplied.
        actual: usize,
    },
    /// A prescribed area is zero or negative.
    #[error("target area at index {index} is not strictly positive: {value}")]
    NonPositiveTarget {
        /// Offending entry.
        index: usize,
        /// Its value.
        value: f64,
    },
    /// The targets do not tile the domain.
    #[error("target areas sum to {target_sum:.6e} but the domain area is {domain_area:.6e}")]
    MassImbalance {
        /// Sum of the prescribed areas.
        target_sum: f64,
        /// Area of the domain box.
        domain_area: f64,
    },
    /// The damping factor is outside `(0, 1)`.
    #[error("damping factor must lie in (0, 1), got {value}")]
    InvalidDamping {
        /// Supplied damping factor.
        value: f64,
    },
    /// The reduced weight Jacobian could not be factored.
    #[error("reduced weight Jacobian is singular at Newton iteration {iteration}")]
    SingularJacobian {
        /// Iteration at which the factorization failed.
        iteration: usize,
    },
    /// The line search shrank the step below the acceptance floor.
    #[error("line search underflow at iteration {iteration} (residual {residual:.3e})")]
    StepUnderflow {
        /// Iteration at which the search gave up.
        iteration: usize,
        /// Maximum area residual before the step.
        residual: f64,
    },
    /// The iteration budget ran out before the residual met the tolerance.
    #[error("no convergence after {iterations} iterations (residual {residual:.3e})")]
    NotConverged {
        /// Iterations performed.
        iterations: usize,
        /// Final maximum area residual.
        residual: f64,
    },
}

/// Tuning knobs for the Newton iteration.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewtonParams {
    /// Maximum number of Newton steps.
    pub max_iterations: usize,
    /// Convergence tolerance on the maximum area residual, relative to the
    /// domain area.
    pub tolerance: f64,
    /// Smallest line-search step factor before the solve is abandoned.
    pub min_step: f64,
}

impl Default for NewtonParams {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            tolerance: 1e-11,
            min_step: 1e-12,
        }
    }
}

/// Runs the damped Newton iteration.
///
/// `areas_of` evaluates cell areas for a weight vector; `jacobian_of`
/// returns the areas together with the dense weight Jacobian. The returned
/// weight vector has its last entry fixed at zero.
///
/// # Errors
///
/// Returns a [`SolverError`] for inconsistent targets, an invalid damping
/// factor, a singular reduced Jacobian, a collapsed line search, or an
/// exhausted iteration budget.
pub fn damped_newton<A, J>(
    domain: &Domain,
    targets: &[f64],
    initial_weights: &[f64],
    damping: f64,
    params: &NewtonParams,
    mut areas_of: A,
    mut jacobian_of: J,
) -> Result<Vec<f64>, SolverError>
where
    A: FnMut(&[f64]) -> Vec<f64>,
    J: FnMut(&[f64]) -> (Vec<f64>, DMatrix<f64>),
{
    let n = initial_weights.len();
    if targets.len() != n {
        return Err(SolverError::TargetCountMismatch {
            expected: n,
            actual: targets.len(),
        });
    }
    if let Some((index, &value)) = targets.iter().enumerate().find(|&(_, &t)| !(t > 0.0)) {
        return Err(SolverError::NonPositiveTarget { index, value });
    }
    let domain_area = domain.area();
    let target_sum: f64 = targets.iter().sum();
    if (target_sum - domain_area).abs() > MASS_BALANCE_TOLERANCE * domain_area {
        return Err(SolverError::MassImbalance {
            target_sum,
            domain_area,
        });
    }
    if !(damping > 0.0 && damping < 1.0) {
        return Err(SolverError::InvalidDamping { value: damping });
    }
    if n == 0 {
        return Ok(Vec::new());
    }

    let mut weights = normalize_last_to_zero(initial_weights.to_vec());
    if n == 1 {
        // A single cell tiles the domain for any weight.
        return Ok(weights);
    }

    let mut areas = areas_of(&weights);
    let min_target = targets.iter().copied().fold(f64::INFINITY, f64::min);
    let min_start = areas.iter().copied().fold(f64::INFINITY, f64::min);
    // Cells must stay above this floor for a step to be accepted; starting
    // from a degenerate guess the floor is zero and any positive area passes.
    let area_floor = 0.5 * min_target.min(min_start);
    let mut residual = max_residual(&areas, targets);
    let m = n - 1;

    for iteration in 0..=params.max_iterations {
        if residual <= params.tolerance * domain_area {
            return Ok(weights);
        }
        if iteration == params.max_iterations {
            return Err(SolverError::NotConverged {
                iterations: params.max_iterations,
                residual,
            });
        }

        let (areas_now, d_weights) = jacobian_of(&weights);
        areas = areas_now;
        let reduced = d_weights.view_range(0..m, 0..m).into_owned();
        let rhs = DVector::from_iterator(m, (0..m).map(|i| targets[i] - areas[i]));
        let Some(direction) = reduced.lu().solve(&rhs) else {
            return Err(SolverError::SingularJacobian { iteration });
        };
        if !direction.iter().all(|v| v.is_finite()) {
            return Err(SolverError::SingularJacobian { iteration });
        }

        let mut step = 1.0;
        loop {
            let mut trial = weights.clone();
            for i in 0..m {
                trial[i] += step * direction[i];
            }
            let trial_areas = areas_of(&trial);
            let trial_min = trial_areas.iter().copied().fold(f64::INFINITY, f64::min);
            let trial_residual = max_residual(&trial_areas, targets);
            if trial_min > area_floor && trial_residual < residual {
                trace!(iteration, step, residual = trial_residual, "accepted Newton step");
                weights = trial;
                residual = trial_residual;
                break;
            }
            step *= damping;
            if step < params.min_step {
                return Err(SolverError::StepUnderflow {
                    iteration,
                    residual,
                });
            }
        }
    }
    unreachable!("the iteration either converges or errors within the budget")
}

/// Subtracts the last entry from every weight so the vector satisfies the
/// zero-last-weight convention. Areas are invariant under the shift.
#[must_use]
pub(crate) fn normalize_last_to_zero(mut weights: Vec<f64>) -> Vec<f64> {
    if let Some(&shift) = weights.last()
        && shift != 0.0
    {
        for w in &mut weights {
            *w -= shift;
        }
    }
    weights
}

fn max_residual(areas: &[f64], targets: &[f64]) -> f64 {
    areas
        .iter()
        .zip(targets)
        .map(|(a, t)| (a - t).abs())
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_domain() -> Domain {
        Domain::new(0.0, 0.0, 1.0, 1.0).unwrap()
    }

    /// A linear synthetic mass map: areas = base + M * w with rows of M
    /// summing to zero, mimicking the shift invariance of the real one.
    fn synthetic_areas(weights: &[f64]) -> Vec<f64> {
        let (w0, w1, w2) = (weights[0], weights[1], weights[2]);
        vec![
            1.0 / 3.0 + 2.0 * w0 - w1 - w2,
            1.0 / 3.0 - w0 + 2.0 * w1 - w2,
            1.0 / 3.0 - w0 - w1 + 2.0 * w2,
        ]
    }

    fn synthetic_jacobian(weights: &[f64]) -> (Vec<f64>, DMatrix<f64>) {
        let m = DMatrix::from_row_slice(3, 3, &[2.0, -1.0, -1.0, -1.0, 2.0, -1.0, -1.0, -1.0, 2.0]);
        (synthetic_areas(weights), m)
    }

    #[test]
    fn converges_on_linear_map() {
        let domain = unit_domain();
        let targets = vec![0.5, 0.3, 0.2];
        let weights = damped_newton(
            &domain,
            &targets,
            &[0.0, 0.0, 0.0],
            0.1,
            &NewtonParams::default(),
            synthetic_areas,
            synthetic_jacobian,
        )
        .unwrap();
        let areas = synthetic_areas(&weights);
        for (a, t) in areas.iter().zip(&targets) {
            assert_relative_eq!(a, t, epsilon = 1e-9);
        }
        assert_relative_eq!(weights[2], 0.0);
    }

    #[test]
    fn validates_target_count() {
        let err = damped_newton(
            &unit_domain(),
            &[0.5, 0.5],
            &[0.0, 0.0, 0.0],
            0.1,
            &NewtonParams::default(),
            synthetic_areas,
            synthetic_jacobian,
        )
        .unwrap_err();
        assert_eq!(
            err,
            SolverError::TargetCountMismatch {
                expected: 3,
                actual: 2
            }
        );
    }

    #[test]
    fn validates_target_positivity() {
        let err = damped_newton(
            &unit_domain(),
            &[0.5, 0.5, 0.0],
            &[0.0, 0.0, 0.0],
            0.1,
            &NewtonParams::default(),
            synthetic_areas,
            synthetic_jacobian,
        )
        .unwrap_err();
        assert!(matches!(err, SolverError::NonPositiveTarget { index: 2, .. }));
    }

    #[test]
    fn validates_mass_balance() {
        let err = damped_newton(
            &unit_domain(),
            &[0.5, 0.5, 0.5],
            &[0.0, 0.0, 0.0],
            0.1,
            &NewtonParams::default(),
            synthetic_areas,
            synthetic_jacobian,
        )
        .unwrap_err();
        assert!(matches!(err, SolverError::MassImbalance { .. }));
    }

    #[test]
    fn validates_damping_range() {
        let err = damped_newton(
            &unit_domain(),
            &[0.4, 0.3, 0.3],
            &[0.0, 0.0, 0.0],
            1.5,
            &NewtonParams::default(),
            synthetic_areas,
            synthetic_jacobian,
        )
        .unwrap_err();
        assert_eq!(err, SolverError::InvalidDamping { value: 1.5 });
    }

    #[test]
    fn singular_jacobian_is_reported() {
        let err = damped_newton(
            &unit_domain(),
            &[0.4, 0.3, 0.3],
            &[0.0, 0.0, 0.0],
            0.1,
            &NewtonParams::default(),
            synthetic_areas,
            |w| (synthetic_areas(w), DMatrix::zeros(3, 3)),
        )
        .unwrap_err();
        assert!(matches!(err, SolverError::SingularJacobian { iteration: 0 }));
    }

    #[test]
    fn single_seed_is_trivial() {
        let weights = damped_newton(
            &unit_domain(),
            &[1.0],
            &[0.25],
            0.1,
            &NewtonParams::default(),
            |_| vec![1.0],
            |_| (vec![1.0], DMatrix::zeros(1, 1)),
        )
        .unwrap();
        assert_relative_eq!(weights[0], 0.0);
    }

    #[test]
    fn normalization_shifts_to_zero_last() {
        let w = normalize_last_to_zero(vec![3.0, 2.5, 1.5]);
        assert_relative_eq!(w[0], 1.5);
        assert_relative_eq!(w[1], 1.0);
        assert_relative_eq!(w[2], 0.0);
        assert!(normalize_last_to_zero(Vec::new()).is_empty());
    }
}
