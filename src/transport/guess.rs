//! Degeneracy-safe initial weights for the damped Newton transport solver.
//!
//! The cost-transform of the zero potential is the natural starting weight
//! vector, and under full periodicity it never produces an empty cell. With
//! a single periodic axis it can: seeds outside the domain that are aligned
//! perpendicular to the periodic axis all project onto the same boundary
//! point, and the losers of that tie get zero area. A Newton solver started
//! there faces a singular linearization.
//!
//! [`initial_weights`] first tries the default guess and returns it when
//! every cell clears the area threshold. Otherwise it runs a continuation
//! scheme: perturb the seeds along the periodic axis — the direction
//! orthogonal to the degenerate alignment, so distinct seeds project onto
//! distinct boundary points — solve the perturbed problem to optimality,
//! and undo the perturbation to first order by solving the reduced weight
//! Jacobian against the seed-displacement forcing. The corrected candidate
//! is verified against the *original* seeds; on failure the perturbation is
//! halved and the previous perturbed solution seeds the next attempt
//! through the same first-order transport.

#![forbid(unsafe_code)]

use nalgebra::DVector;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::geometry::domain::{Axis, Domain, Periodicity};
use crate::geometry::point::Point2;
use crate::transport::error::InitialWeightsError;
use crate::transport::newton::normalize_last_to_zero;
use crate::transport::traits::{MassMapJacobian, SemiDiscreteTransport};

/// Fraction of the average target cell area below which a cell counts as
/// degenerate, when no explicit threshold is supplied.
pub const DEGENERATE_AREA_FRACTION: f64 = 1e-14;

/// Initial perturbation amplitude as a fraction of the domain extent in the
/// periodic axis.
const INITIAL_AMPLITUDE_SCALE: f64 = 0.015_625; // 2^-6

/// Tuning knobs for [`initial_weights`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GuessParams {
    /// Cells with area at or below this value count as degenerate. When
    /// `None`, the threshold is derived as
    /// [`DEGENERATE_AREA_FRACTION`]` * domain_area / n`, so it scales with
    /// the problem.
    pub area_threshold: Option<f64>,
    /// Maximum number of perturbation attempts (the amplitude halves on
    /// each retry, so this bounds the geometric descent).
    pub max_halvings: usize,
    /// Number of consecutive singular reduced-Jacobian solves tolerated
    /// before the initialization is abandoned.
    pub max_singular_streak: usize,
    /// Damping factor forwarded to the perturbed Newton solves.
    pub damping: f64,
    /// Initial perturbation amplitude as a fraction of the domain extent in
    /// the periodic axis.
    pub amplitude_scale: f64,
}

impl Default for GuessParams {
    fn default() -> Self {
        Self {
            area_threshold: None,
            max_halvings: 40,
            max_singular_streak: 4,
            damping: 0.1,
            amplitude_scale: INITIAL_AMPLITUDE_SCALE,
        }
    }
}

/// The perturbed configuration carried from one attempt to the next: its
/// seeds, its solved weights, and the mass-map Jacobian at that solution
/// (reused to extrapolate the next starting guess).
struct PerturbedSolve {
    seeds: Vec<Point2>,
    weights: Vec<f64>,
    jacobian: MassMapJacobian,
}

/// Computes a weight vector for `seeds` whose every Laguerre cell has area
/// strictly above the degeneracy threshold.
///
/// The common case costs one closed-form guess and one area query: when the
/// seeds are not pathologically aligned, the default guess already clears
/// the threshold and is returned unchanged. Under full periodicity the
/// default guess is provably non-degenerate and is returned directly.
/// Otherwise the perturbation-correction loop runs until a verified
/// candidate emerges or a retry budget is exhausted.
///
/// `rng` drives the perturbation; supplying a seeded generator makes the
/// whole initialization deterministic.
///
/// # Errors
///
/// - [`InitialWeightsError::NoPeriodicAxis`] when neither axis is periodic.
/// - [`InitialWeightsError::TargetCountMismatch`] when `targets` does not
///   have one entry per seed.
/// - [`InitialWeightsError::Solver`] when a perturbed Newton solve fails
///   even from the default guess.
/// - [`InitialWeightsError::SingularJacobian`] when the reduced weight
///   Jacobian stays singular across consecutive attempts.
/// - [`InitialWeightsError::RetryBudgetExhausted`] when the halving budget
///   runs out.
pub fn initial_weights<T, R>(
    transport: &T,
    domain: &Domain,
    seeds: &[Point2],
    targets: &[f64],
    periodicity: Periodicity,
    params: &GuessParams,
    rng: &mut R,
) -> Result<Vec<f64>, InitialWeightsError>
where
    T: SemiDiscreteTransport + ?Sized,
    R: Rng + ?Sized,
{
    if !periodicity.any() {
        return Err(InitialWeightsError::NoPeriodicAxis);
    }
    let n = seeds.len();
    if targets.len() != n {
        return Err(InitialWeightsError::TargetCountMismatch {
            expected: n,
            actual: targets.len(),
        });
    }
    if n == 0 {
        return Ok(Vec::new());
    }

    let defaults = transport.default_weight_guess(domain, seeds, periodicity);
    if periodicity.both() {
        return Ok(defaults);
    }

    #[allow(clippy::cast_precision_loss)]
    let threshold = params
        .area_threshold
        .unwrap_or_else(|| DEGENERATE_AREA_FRACTION * domain.area() / n as f64);
    let areas = transport.cell_areas(domain, seeds, &defaults, periodicity);
    let min_area = min_of(&areas);
    if min_area > threshold {
        return Ok(defaults);
    }

    debug!(
        min_area,
        threshold, "default guess induces a degenerate cell, perturbing seeds"
    );
    // Exactly one axis is periodic here. Seeds degenerate together when
    // they share their periodic-axis coordinate, so the perturbation moves
    // that coordinate.
    let perturb_axis = periodicity
        .single_axis()
        .ok_or(InitialWeightsError::NoPeriodicAxis)?;
    correction_loop(
        transport,
        domain,
        seeds,
        targets,
        periodicity,
        perturb_axis,
        threshold,
        params,
        rng,
    )
}

/// The perturbation-correction loop: repeatedly solves a perturbed problem
/// and transports its solution back to the original seeds, halving the
/// perturbation until the transported candidate verifies non-degenerate.
#[allow(clippy::too_many_arguments)]
fn correction_loop<T, R>(
    transport: &T,
    domain: &Domain,
    seeds: &[Point2],
    targets: &[f64],
    periodicity: Periodicity,
    perturb_axis: Axis,
    threshold: f64,
    params: &GuessParams,
    rng: &mut R,
) -> Result<Vec<f64>, InitialWeightsError>
where
    T: SemiDiscreteTransport + ?Sized,
    R: Rng + ?Sized,
{
    let n = seeds.len();
    let extent = domain.extent(perturb_axis);
    // One offset per seed along the periodic axis, either direction. The
    // direction pattern is drawn once; retries only shrink it.
    let mut offsets: Vec<f64> = (0..n)
        .map(|_| params.amplitude_scale * extent * rng.random_range(-1.0..1.0))
        .collect();

    let mut previous: Option<PerturbedSolve> = None;
    let mut singular_streak = 0usize;
    let mut last_min_area = f64::NAN;
    let mut last_amplitude = 0.0f64;

    for attempt in 0..params.max_halvings {
        let amplitude = offsets.iter().fold(0.0f64, |acc, o| acc.max(o.abs()));
        last_amplitude = amplitude;
        let perturbed: Vec<Point2> = seeds
            .iter()
            .zip(&offsets)
            .map(|(&seed, &offset)| {
                let mut moved = seed;
                moved.set_coord(perturb_axis, moved.coord(perturb_axis) + offset);
                moved
            })
            .collect();

        let (guess, guess_is_default) = perturbed_guess(
            transport,
            domain,
            &perturbed,
            periodicity,
            previous.as_ref(),
            threshold,
        );

        let solved = match transport.solve_optimal_weights(
            domain,
            &perturbed,
            targets,
            &guess,
            params.damping,
            periodicity,
        ) {
            Ok(weights) => weights,
            Err(err) if !guess_is_default => {
                debug!(%err, attempt, "solver rejected the extrapolated guess, retrying from the default guess");
                let fallback = transport.default_weight_guess(domain, &perturbed, periodicity);
                transport.solve_optimal_weights(
                    domain,
                    &perturbed,
                    targets,
                    &fallback,
                    params.damping,
                    periodicity,
                )?
            }
            Err(err) => return Err(err.into()),
        };
        let solved = normalize_last_to_zero(solved);

        let jacobian = transport.mass_map_derivatives(domain, &perturbed, &solved, periodicity);
        match first_order_update(&jacobian, &perturbed, seeds) {
            Some(update) => {
                singular_streak = 0;
                let candidate: Vec<f64> = solved
                    .iter()
                    .zip(&update)
                    .map(|(weight, delta)| weight + delta)
                    .collect();
                let areas = transport.cell_areas(domain, seeds, &candidate, periodicity);
                let min_area = min_of(&areas);
                trace!(attempt, amplitude, min_area, "corrected candidate evaluated");
                if min_area > threshold {
                    debug!(attempt, min_area, "perturbation-correction succeeded");
                    return Ok(candidate);
                }
                last_min_area = min_area;
            }
            None => {
                singular_streak += 1;
                trace!(attempt, singular_streak, "reduced weight Jacobian is singular");
                if singular_streak >= params.max_singular_streak {
                    return Err(InitialWeightsError::SingularJacobian {
                        attempts: singular_streak,
                    });
                }
            }
        }

        for offset in &mut offsets {
            *offset *= 0.5;
        }
        previous = Some(PerturbedSolve {
            seeds: perturbed,
            weights: solved,
            jacobian,
        });
    }

    Err(InitialWeightsError::RetryBudgetExhausted {
        attempts: params.max_halvings,
        last_min_area,
        threshold,
        last_amplitude,
    })
}

/// Starting guess for a perturbed solve: a first-order extrapolation from
/// the previous perturbed solution when one exists and its cells clear the
/// threshold, the default cost-transform guess otherwise. The boolean marks
/// the default case (which has no further fallback).
fn perturbed_guess<T>(
    transport: &T,
    domain: &Domain,
    perturbed: &[Point2],
    periodicity: Periodicity,
    previous: Option<&PerturbedSolve>,
    threshold: f64,
) -> (Vec<f64>, bool)
where
    T: SemiDiscreteTransport + ?Sized,
{
    if let Some(prev) = previous
        && let Some(update) = first_order_update(&prev.jacobian, &prev.seeds, perturbed)
    {
        let guess: Vec<f64> = prev
            .weights
            .iter()
            .zip(&update)
            .map(|(weight, delta)| weight + delta)
            .collect();
        let areas = transport.cell_areas(domain, perturbed, &guess, periodicity);
        if min_of(&areas) > threshold {
            return (guess, false);
        }
        trace!("extrapolated guess is degenerate, reverting to the default guess");
    }
    (
        transport.default_weight_guess(domain, perturbed, periodicity),
        true,
    )
}

/// First-order weight change that compensates for moving the seeds from
/// `from_seeds` to `to_seeds` while keeping the cell areas fixed: solves the
/// leading `(n - 1) × (n - 1)` block of `∂m/∂w` against
/// `-(∂m/∂z_x · Δx + ∂m/∂z_y · Δy)` and pads the pinned last entry with
/// zero. Returns `None` when the reduced block is singular or the solution
/// is not finite.
fn first_order_update(
    jacobian: &MassMapJacobian,
    from_seeds: &[Point2],
    to_seeds: &[Point2],
) -> Option<Vec<f64>> {
    let n = from_seeds.len();
    if n <= 1 {
        return Some(vec![0.0; n]);
    }
    let m = n - 1;
    let dx = DVector::from_iterator(n, from_seeds.iter().zip(to_seeds).map(|(f, t)| t.x - f.x));
    let dy = DVector::from_iterator(n, from_seeds.iter().zip(to_seeds).map(|(f, t)| t.y - f.y));
    let forcing = &jacobian.d_seeds_x * &dx + &jacobian.d_seeds_y * &dy;
    let rhs = DVector::from_iterator(m, (0..m).map(|i| -forcing[i]));
    let reduced = jacobian.d_weights.view_range(0..m, 0..m).into_owned();
    let solution = reduced.lu().solve(&rhs)?;
    if !solution.iter().all(|v| v.is_finite()) {
        return None;
    }
    let mut update: Vec<f64> = solution.iter().copied().collect();
    update.push(0.0);
    Some(update)
}

fn min_of(areas: &[f64]) -> f64 {
    areas.iter().copied().fold(f64::INFINITY, f64::min)
}
