//! # sdot
//!
//! Semi-discrete optimal transport on a planar domain with partial periodic
//! boundary conditions (periodic in exactly one axis).
//!
//! The crate computes Laguerre (power) diagrams of weighted point seeds,
//! clipped to an axis-aligned domain box and wrapped across its periodic
//! axes, and adjusts the weights with a damped Newton iteration until every
//! cell carries a prescribed area. Its centerpiece is a robust *initializer*
//! for that Newton iteration: a weight vector that induces no zero-area cell,
//! so the solver starts from a well-conditioned linearization.
//!
//! # Why initialization is the hard part
//!
//! The closed-form starting guess — the cost-transform of the zero potential,
//! concretely the squared periodic distance from each seed to the domain —
//! is provably non-degenerate when *both* axes are periodic. Under
//! single-axis periodicity it can assign zero area to cells whose seeds lie
//! outside the domain and are aligned perpendicular to the periodic axis.
//! [`initial_weights`](transport::guess::initial_weights) repairs such
//! configurations by perturbing the seeds along the periodic axis — which
//! breaks the perpendicular alignment and separates their projections —
//! solving the perturbed problem to optimality, and transporting that
//! solution back to the original seeds through a first-order
//! (implicit-function-theorem) correction, shrinking the perturbation
//! geometrically until the corrected estimate verifies non-degenerate.
//!
//! # Basic Usage
//!
//! ```rust
//! use rand::SeedableRng;
//! use rand::rngs::StdRng;
//! use sdot::prelude::*;
//!
//! let domain = Domain::new(0.0, 0.0, 1.0, 1.0).unwrap();
//! let periodicity = Periodicity::X;
//! let seeds = vec![
//!     Point2::new(0.2, 0.3),
//!     Point2::new(0.7, 0.6),
//!     Point2::new(0.4, 0.9),
//! ];
//! let targets = vec![domain.area() / 3.0; 3];
//!
//! let diagram = LaguerreDiagram::default();
//! let mut rng = StdRng::seed_from_u64(7);
//! let weights = initial_weights(
//!     &diagram,
//!     &domain,
//!     &seeds,
//!     &targets,
//!     periodicity,
//!     &GuessParams::default(),
//!     &mut rng,
//! )
//! .unwrap();
//!
//! // Every induced cell has strictly positive area.
//! let areas = diagram.cell_areas(&domain, &seeds, &weights, periodicity);
//! assert!(areas.iter().all(|&a| a > 0.0));
//! ```
//!
//! # Architecture
//!
//! The initializer consumes the diagram machinery only through the
//! [`SemiDiscreteTransport`](transport::traits::SemiDiscreteTransport) trait:
//! the default weight guess, cell-area queries, the damped Newton solve, and
//! the mass-map Jacobian (sensitivities of cell areas with respect to weights
//! and seed coordinates). [`LaguerreDiagram`](transport::diagram::LaguerreDiagram)
//! is the reference implementation; tests substitute scripted transports to
//! pin down the retry and fallback behavior of the correction loop.
//!
//! Weight vectors follow a fixed normalization: cell areas are invariant
//! under a global additive shift of the weights, so the last entry is pinned
//! at zero and every linear solve acts on the leading `(n - 1) × (n - 1)`
//! block of the weight Jacobian.

#![forbid(unsafe_code)]

/// Geometric types: planar points, the domain box with periodicity flags,
/// and labeled convex cell polygons.
pub mod geometry {
    pub mod domain;
    pub mod point;
    pub mod polygon;
    pub use domain::*;
    pub use point::*;
    pub use polygon::*;
}

/// Semi-discrete transport: the Laguerre diagram backend, the damped Newton
/// weight solver, and the degeneracy-safe initializer built on top of them.
pub mod transport {
    pub mod diagram;
    pub mod error;
    pub mod guess;
    pub mod newton;
    pub mod traits;
    pub use diagram::*;
    pub use error::*;
    pub use guess::*;
    pub use newton::*;
    pub use traits::*;
}

/// A prelude module that re-exports the commonly used types and functions.
pub mod prelude {
    pub use crate::geometry::{
        domain::{Axis, Domain, DomainError, Periodicity},
        point::Point2,
        polygon::{CellPolygon, EdgeKind},
    };
    pub use crate::transport::{
        diagram::LaguerreDiagram,
        error::InitialWeightsError,
        guess::{GuessParams, initial_weights},
        newton::{NewtonParams, SolverError},
        traits::{MassMapJacobian, SemiDiscreteTransport},
    };
}
