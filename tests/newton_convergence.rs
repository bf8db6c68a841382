//! Integration tests for the damped Newton weight solver on real diagrams.

use approx::assert_relative_eq;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sdot::prelude::*;

fn unit_domain() -> Domain {
    Domain::new(0.0, 0.0, 1.0, 1.0).unwrap()
}

#[test]
fn uniform_targets_are_reached() {
    let domain = unit_domain();
    let diagram = LaguerreDiagram::default();
    let mut rng = ChaCha8Rng::seed_from_u64(101);
    let n = 30_usize;
    let share = 1.0 / 30.0;
    let seeds: Vec<Point2> = (0..n)
        .map(|_| Point2::new(rng.random_range(0.0..1.0), rng.random_range(0.0..1.0)))
        .collect();
    let targets = vec![share; n];
    let initial = diagram.default_weight_guess(&domain, &seeds, Periodicity::X);
    let weights = diagram
        .solve_optimal_weights(&domain, &seeds, &targets, &initial, 0.1, Periodicity::X)
        .unwrap();
    let areas = diagram.cell_areas(&domain, &seeds, &weights, Periodicity::X);
    for &area in &areas {
        assert_relative_eq!(area, share, epsilon = 1e-8);
    }
    assert_relative_eq!(weights[weights.len() - 1], 0.0);
}

#[test]
fn non_uniform_targets_are_reached() {
    let domain = unit_domain();
    let diagram = LaguerreDiagram::default();
    let seeds = vec![
        Point2::new(0.2, 0.3),
        Point2::new(0.7, 0.2),
        Point2::new(0.5, 0.8),
    ];
    let targets = vec![0.5, 0.3, 0.2];
    let initial = diagram.default_weight_guess(&domain, &seeds, Periodicity::X);
    let weights = diagram
        .solve_optimal_weights(&domain, &seeds, &targets, &initial, 0.1, Periodicity::X)
        .unwrap();
    let areas = diagram.cell_areas(&domain, &seeds, &weights, Periodicity::X);
    for (&area, &target) in areas.iter().zip(&targets) {
        assert_relative_eq!(area, target, epsilon = 1e-8);
    }
}

#[test]
fn torus_solves_converge_too() {
    let domain = unit_domain();
    let diagram = LaguerreDiagram::default();
    let seeds = vec![
        Point2::new(0.1, 0.1),
        Point2::new(0.6, 0.4),
        Point2::new(0.3, 0.9),
        Point2::new(0.9, 0.7),
    ];
    let targets = vec![0.25; 4];
    let initial = vec![0.0; 4];
    let weights = diagram
        .solve_optimal_weights(&domain, &seeds, &targets, &initial, 0.1, Periodicity::BOTH)
        .unwrap();
    let areas = diagram.cell_areas(&domain, &seeds, &weights, Periodicity::BOTH);
    for &area in &areas {
        assert_relative_eq!(area, 0.25, epsilon = 1e-8);
    }
}

#[test]
fn inconsistent_targets_are_rejected() {
    let domain = unit_domain();
    let diagram = LaguerreDiagram::default();
    let seeds = vec![Point2::new(0.25, 0.5), Point2::new(0.75, 0.5)];

    let err = diagram
        .solve_optimal_weights(&domain, &seeds, &[0.5], &[0.0, 0.0], 0.1, Periodicity::X)
        .unwrap_err();
    assert_eq!(
        err,
        SolverError::TargetCountMismatch {
            expected: 2,
            actual: 1
        }
    );

    let err = diagram
        .solve_optimal_weights(
            &domain,
            &seeds,
            &[0.5, -0.5],
            &[0.0, 0.0],
            0.1,
            Periodicity::X,
        )
        .unwrap_err();
    assert!(matches!(err, SolverError::NonPositiveTarget { index: 1, .. }));

    let err = diagram
        .solve_optimal_weights(
            &domain,
            &seeds,
            &[0.9, 0.9],
            &[0.0, 0.0],
            0.1,
            Periodicity::X,
        )
        .unwrap_err();
    assert!(matches!(err, SolverError::MassImbalance { .. }));
}

#[test]
fn single_seed_needs_no_iteration() {
    let domain = Domain::new(0.0, 0.0, 2.0, 1.0).unwrap();
    let diagram = LaguerreDiagram::default();
    let weights = diagram
        .solve_optimal_weights(
            &domain,
            &[Point2::new(0.5, 0.5)],
            &[2.0],
            &[3.0],
            0.1,
            Periodicity::X,
        )
        .unwrap();
    // Normalized to the zero-last-weight convention.
    assert_relative_eq!(weights[0], 0.0);
}
