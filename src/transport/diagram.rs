//! Laguerre (power) diagrams under partial periodic boundary conditions.
//!
//! Every seed is first wrapped into the box along the periodic axes. A cell
//! then starts from the owner-centered period rectangle: along a periodic
//! axis its sides are the bisectors against the owner's own periodic images
//! (at half a period on either side), along a non-periodic axis they are the
//! domain walls. This makes the wrap exact — a cell that straddles the
//! periodic boundary is represented in one piece in the owner's window, and
//! its area equals the area it covers on the cylinder.
//!
//! The rectangle is clipped against the power bisectors of the other seeds
//! and their one ring of periodic images, visited in order of increasing
//! distance with a security-radius cutoff, so each cell only ever sees its
//! near neighborhood.
//!
//! Because every polygon edge records the seed image that generated it, the
//! mass-map Jacobian falls out of the cell geometry directly: each bisector
//! edge contributes `|e| / (2 d)` to the weight block and edge-midpoint
//! moments to the coordinate blocks.

#![forbid(unsafe_code)]

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::geometry::domain::{Axis, Domain, Periodicity};
use crate::geometry::point::Point2;
use crate::geometry::polygon::{CellPolygon, EdgeKind};
use crate::transport::newton::{NewtonParams, SolverError, damped_newton};
use crate::transport::traits::{MassMapJacobian, SemiDiscreteTransport};

/// Edges shorter than this contribute nothing to the Jacobian; they are
/// clipping round-off, not geometry.
const MIN_EDGE_LENGTH: f64 = 1e-12;

/// Seed images closer than this to the cell owner are treated as coincident
/// and skipped in the Jacobian (their bisector direction is undefined).
const MIN_SITE_DISTANCE: f64 = 1e-12;

/// Reference implementation of [`SemiDiscreteTransport`] backed by explicit
/// cell construction.
///
/// # Examples
///
/// ```rust
/// use sdot::prelude::*;
///
/// let domain = Domain::new(0.0, 0.0, 1.0, 1.0).unwrap();
/// let seeds = vec![Point2::new(0.25, 0.5), Point2::new(0.75, 0.5)];
/// let diagram = LaguerreDiagram::default();
///
/// let areas = diagram.cell_areas(&domain, &seeds, &[0.0, 0.0], Periodicity::X);
/// assert!((areas[0] - 0.5).abs() < 1e-12);
/// assert!((areas[1] - 0.5).abs() < 1e-12);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LaguerreDiagram {
    /// Parameters of the damped Newton solver behind
    /// [`SemiDiscreteTransport::solve_optimal_weights`].
    pub newton: NewtonParams,
}

impl LaguerreDiagram {
    /// Creates a diagram backend with explicit solver parameters.
    #[must_use]
    pub const fn new(newton: NewtonParams) -> Self {
        Self { newton }
    }

    /// Builds the Laguerre cell of seed `index` and returns it with its
    /// edge provenance.
    ///
    /// The polygon lives in the owner's period window: along a periodic
    /// axis it may extend up to half a period outside the box, and that
    /// overhang is exactly the part of the cell that wraps around.
    #[must_use]
    pub fn cell(
        &self,
        domain: &Domain,
        seeds: &[Point2],
        weights: &[f64],
        periodicity: Periodicity,
        index: usize,
    ) -> CellPolygon {
        let wrapped = wrap_seeds(domain, seeds, periodicity);
        let shifts = image_shifts(domain, periodicity);
        build_cell(domain, &wrapped, weights, &shifts, periodicity, index)
    }
}

impl SemiDiscreteTransport for LaguerreDiagram {
    fn default_weight_guess(
        &self,
        domain: &Domain,
        seeds: &[Point2],
        periodicity: Periodicity,
    ) -> Vec<f64> {
        seeds
            .iter()
            .map(|&seed| exterior_gap_squared(domain, seed, periodicity))
            .collect()
    }

    fn cell_areas(
        &self,
        domain: &Domain,
        seeds: &[Point2],
        weights: &[f64],
        periodicity: Periodicity,
    ) -> Vec<f64> {
        let wrapped = wrap_seeds(domain, seeds, periodicity);
        let shifts = image_shifts(domain, periodicity);
        (0..wrapped.len())
            .map(|i| build_cell(domain, &wrapped, weights, &shifts, periodicity, i).area())
            .collect()
    }

    fn solve_optimal_weights(
        &self,
        domain: &Domain,
        seeds: &[Point2],
        targets: &[f64],
        initial_weights: &[f64],
        damping: f64,
        periodicity: Periodicity,
    ) -> Result<Vec<f64>, SolverError> {
        damped_newton(
            domain,
            targets,
            initial_weights,
            damping,
            &self.newton,
            |w| self.cell_areas(domain, seeds, w, periodicity),
            |w| {
                let jacobian = self.mass_map_derivatives(domain, seeds, w, periodicity);
                (jacobian.areas, jacobian.d_weights)
            },
        )
    }

    fn mass_map_derivatives(
        &self,
        domain: &Domain,
        seeds: &[Point2],
        weights: &[f64],
        periodicity: Periodicity,
    ) -> MassMapJacobian {
        let n = seeds.len();
        let wrapped = wrap_seeds(domain, seeds, periodicity);
        let shifts = image_shifts(domain, periodicity);
        let mut areas = vec![0.0; n];
        let mut d_weights = DMatrix::zeros(n, n);
        let mut d_seeds_x = DMatrix::zeros(n, n);
        let mut d_seeds_y = DMatrix::zeros(n, n);

        for i in 0..n {
            let owner = wrapped[i];
            let polygon = build_cell(domain, &wrapped, weights, &shifts, periodicity, i);
            areas[i] = polygon.area();
            for (start, end, kind) in polygon.edges() {
                let EdgeKind::Bisector { source, site } = kind else {
                    continue;
                };
                let edge_length = (end - start).length();
                if edge_length <= MIN_EDGE_LENGTH {
                    continue;
                }
                let distance = owner.distance(site);
                if distance <= MIN_SITE_DISTANCE {
                    continue;
                }
                let weight_term = edge_length / (2.0 * distance);
                d_weights[(i, source)] -= weight_term;
                d_weights[(i, i)] += weight_term;

                let midpoint = start.midpoint(end);
                let moment = edge_length / distance;
                d_seeds_x[(i, i)] += moment * (midpoint.x - owner.x);
                d_seeds_x[(i, source)] -= moment * (midpoint.x - site.x);
                d_seeds_y[(i, i)] += moment * (midpoint.y - owner.y);
                d_seeds_y[(i, source)] -= moment * (midpoint.y - site.y);
            }
        }

        MassMapJacobian {
            areas,
            d_weights,
            d_seeds_x,
            d_seeds_y,
        }
    }
}

/// Squared periodic distance from `seed` to the domain box: the
/// cost-transform of the zero potential. Zero for seeds inside the box or
/// wrapped inside along a periodic axis.
fn exterior_gap_squared(domain: &Domain, seed: Point2, periodicity: Periodicity) -> f64 {
    let mut gap2 = 0.0;
    for axis in [Axis::X, Axis::Y] {
        if periodicity.is_periodic(axis) {
            continue;
        }
        let c = seed.coord(axis);
        let lo = domain.min().coord(axis);
        let hi = domain.max().coord(axis);
        let gap = (lo - c).max(c - hi).max(0.0);
        gap2 += gap * gap;
    }
    gap2
}

/// Wraps every seed into the box along the periodic axes. The quadratic
/// periodic cost is invariant under the wrap, so areas and derivatives are
/// unchanged.
fn wrap_seeds(domain: &Domain, seeds: &[Point2], periodicity: Periodicity) -> Vec<Point2> {
    seeds
        .iter()
        .map(|&seed| domain.wrap(seed, periodicity))
        .collect()
}

/// Image shifts for one ring of periodic copies: `{-L, 0, +L}` along every
/// periodic axis, `{0}` otherwise.
fn image_shifts(domain: &Domain, periodicity: Periodicity) -> SmallVec<[Point2; 9]> {
    let xs: SmallVec<[f64; 3]> = if periodicity.x {
        let width = domain.width();
        SmallVec::from_slice(&[-width, 0.0, width])
    } else {
        SmallVec::from_slice(&[0.0])
    };
    let ys: SmallVec<[f64; 3]> = if periodicity.y {
        let height = domain.height();
        SmallVec::from_slice(&[-height, 0.0, height])
    } else {
        SmallVec::from_slice(&[0.0])
    };
    let mut shifts = SmallVec::new();
    for &sx in &xs {
        for &sy in &ys {
            shifts.push(Point2::new(sx, sy));
        }
    }
    shifts
}

/// The owner-centered period rectangle a cell is clipped out of.
///
/// Along a periodic axis the sides sit half a period from the owner and are
/// the bisectors against the owner's own images (own images share the
/// owner's weight, so the bisector is the unweighted midline). Along a
/// non-periodic axis the sides are the domain walls.
fn initial_cell(
    domain: &Domain,
    owner: Point2,
    index: usize,
    periodicity: Periodicity,
) -> CellPolygon {
    let mut lo = domain.min();
    let mut hi = domain.max();
    // [bottom, right, top, left]
    let mut edges = [EdgeKind::Wall; 4];
    if periodicity.x {
        let half = 0.5 * domain.width();
        lo.x = owner.x - half;
        hi.x = owner.x + half;
        edges[1] = EdgeKind::Bisector {
            source: index,
            site: Point2::new(owner.x + domain.width(), owner.y),
        };
        edges[3] = EdgeKind::Bisector {
            source: index,
            site: Point2::new(owner.x - domain.width(), owner.y),
        };
    }
    if periodicity.y {
        let half = 0.5 * domain.height();
        lo.y = owner.y - half;
        hi.y = owner.y + half;
        edges[2] = EdgeKind::Bisector {
            source: index,
            site: Point2::new(owner.x, owner.y + domain.height()),
        };
        edges[0] = EdgeKind::Bisector {
            source: index,
            site: Point2::new(owner.x, owner.y - domain.height()),
        };
    }
    CellPolygon::rectangle(lo, hi, edges)
}

/// One seed image waiting to cut a cell, ordered nearest-first in the heap.
#[derive(Clone, Copy, Debug)]
struct Candidate {
    distance_squared: f64,
    source: usize,
    site: Point2,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.distance_squared.total_cmp(&other.distance_squared) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    // Reversed so that `BinaryHeap::pop` yields the nearest image first.
    fn cmp(&self, other: &Self) -> Ordering {
        other.distance_squared.total_cmp(&self.distance_squared)
    }
}

/// Clips the Laguerre cell of seed `index` out of its period rectangle.
///
/// Candidate images are visited nearest-first; the loop stops as soon as
/// the next image is provably too far to cut the remaining polygon. An
/// image at distance `d` can only reach the cell when
/// `d <= r + sqrt(r^2 + w_excess)`, where `r` is the current polygon radius
/// around the owner and `w_excess` bounds how much any weight exceeds the
/// owner's.
fn build_cell(
    domain: &Domain,
    wrapped: &[Point2],
    weights: &[f64],
    shifts: &[Point2],
    periodicity: Periodicity,
    index: usize,
) -> CellPolygon {
    let owner = wrapped[index];
    let owner_weight = weights[index];
    let mut polygon = initial_cell(domain, owner, index, periodicity);

    let mut candidates: Vec<Candidate> = Vec::with_capacity(wrapped.len() * shifts.len());
    for (j, &seed) in wrapped.iter().enumerate() {
        if j == index {
            continue;
        }
        for &shift in shifts {
            let site = seed + shift;
            candidates.push(Candidate {
                distance_squared: owner.distance_squared(site),
                source: j,
                site,
            });
        }
    }
    let mut heap = BinaryHeap::from(candidates);

    let weight_excess = weights
        .iter()
        .copied()
        .fold(owner_weight, f64::max)
        - owner_weight;

    while let Some(candidate) = heap.pop() {
        if polygon.is_empty() {
            break;
        }
        let radius = polygon.max_squared_radius(owner).sqrt();
        let reach = radius + radius.mul_add(radius, weight_excess).sqrt();
        if candidate.distance_squared > reach * reach {
            break;
        }
        let site = candidate.site;
        let site_weight = weights[candidate.source];
        polygon.clip_half_plane(
            |x| {
                (x.distance_squared(owner) - owner_weight)
                    - (x.distance_squared(site) - site_weight)
            },
            EdgeKind::Bisector {
                source: candidate.source,
                site,
            },
        );
    }
    polygon
}
