//! Contracts between the initializer and the diagram machinery.
//!
//! The initialization algorithm never touches cell geometry directly; it
//! consumes the four operations below. Keeping them behind a trait lets
//! tests script degenerate and failing transports without building actual
//! diagrams, and keeps the initializer agnostic of how cells are clipped.

#![forbid(unsafe_code)]

use nalgebra::DMatrix;

use crate::geometry::domain::{Domain, Periodicity};
use crate::geometry::point::Point2;
use crate::transport::newton::SolverError;

/// Sensitivities of the mass map (cell areas) at one configuration.
///
/// Row `i` of each block differentiates the area of cell `i`; columns run
/// over weights or seed coordinates. Rows of `d_weights` sum to zero because
/// areas depend only on weight differences.
#[derive(Clone, Debug)]
pub struct MassMapJacobian {
    /// Cell areas at the evaluation point, one per seed.
    pub areas: Vec<f64>,
    /// `∂ area_i / ∂ w_j`.
    pub d_weights: DMatrix<f64>,
    /// `∂ area_i / ∂ x_j` (x coordinates of the seeds).
    pub d_seeds_x: DMatrix<f64>,
    /// `∂ area_i / ∂ y_j` (y coordinates of the seeds).
    pub d_seeds_y: DMatrix<f64>,
}

/// The diagram operations the initializer builds on.
///
/// Implementations must preserve the index correspondence between seeds,
/// weights, and areas: entry `i` of every output refers to seed `i`, and
/// seeds are never reordered.
pub trait SemiDiscreteTransport {
    /// The cost-transform of the zero potential: a closed-form weight guess
    /// that is total (defined for every seed configuration) but may induce
    /// degenerate cells under single-axis periodicity.
    fn default_weight_guess(
        &self,
        domain: &Domain,
        seeds: &[Point2],
        periodicity: Periodicity,
    ) -> Vec<f64>;

    /// Area of each seed's Laguerre cell intersected with the domain,
    /// periodic wrapping applied. Areas are non-negative and sum to the
    /// domain area.
    fn cell_areas(
        &self,
        domain: &Domain,
        seeds: &[Point2],
        weights: &[f64],
        periodicity: Periodicity,
    ) -> Vec<f64>;

    /// Damped Newton solve driving cell areas to `targets`.
    ///
    /// The returned vector has its last entry fixed at zero (the weight
    /// normalization convention).
    ///
    /// # Errors
    ///
    /// Returns a [`SolverError`] when the targets are inconsistent or the
    /// iteration fails to converge from `initial_weights`.
    fn solve_optimal_weights(
        &self,
        domain: &Domain,
        seeds: &[Point2],
        targets: &[f64],
        initial_weights: &[f64],
        damping: f64,
        periodicity: Periodicity,
    ) -> Result<Vec<f64>, SolverError>;

    /// Areas together with the three Jacobian blocks at `(seeds, weights)`.
    fn mass_map_derivatives(
        &self,
        domain: &Domain,
        seeds: &[Point2],
        weights: &[f64],
        periodicity: Periodicity,
    ) -> MassMapJacobian;
}
