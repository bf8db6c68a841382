//! Convex cell polygons with labeled edges.
//!
//! A Laguerre cell is carved out of the domain rectangle by successive
//! half-plane cuts. Every edge of the resulting polygon remembers where it
//! came from — a wall of the domain box or the power bisector against a
//! specific generating seed image — so the mass-map Jacobian can later be
//! assembled edge by edge without re-deriving adjacency.

#![forbid(unsafe_code)]

use smallvec::SmallVec;

use crate::geometry::domain::Domain;
use crate::geometry::point::Point2;

/// Inline capacity of the vertex/edge buffers. Interior Laguerre cells are
/// hexagonal on average, so most cells never spill to the heap.
const INLINE_VERTICES: usize = 8;

/// Provenance of one polygon edge.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EdgeKind {
    /// A piece of the domain boundary.
    Wall,
    /// A piece of the power bisector against a seed image.
    Bisector {
        /// Index of the generating seed (into the original seed slice).
        source: usize,
        /// Position of the generating image, periodic shift applied.
        site: Point2,
    },
}

/// A convex polygon with per-edge provenance.
///
/// Vertices are kept in counter-clockwise order; edge `k` runs from vertex
/// `k` to vertex `k + 1` (cyclically). Clipping keeps the side where the
/// supplied level function is non-positive.
#[derive(Clone, Debug)]
pub struct CellPolygon {
    verts: SmallVec<[Point2; INLINE_VERTICES]>,
    edges: SmallVec<[EdgeKind; INLINE_VERTICES]>,
}

impl CellPolygon {
    /// The full domain rectangle, all four edges labeled [`EdgeKind::Wall`].
    #[must_use]
    pub fn from_domain(domain: &Domain) -> Self {
        Self::rectangle(domain.min(), domain.max(), [EdgeKind::Wall; 4])
    }

    /// An axis-aligned rectangle with explicit edge labels.
    ///
    /// `edges` are given counter-clockwise starting from the bottom edge:
    /// `[bottom, right, top, left]`.
    #[must_use]
    pub fn rectangle(lo: Point2, hi: Point2, edges: [EdgeKind; 4]) -> Self {
        let mut verts = SmallVec::new();
        verts.push(Point2::new(lo.x, lo.y));
        verts.push(Point2::new(hi.x, lo.y));
        verts.push(Point2::new(hi.x, hi.y));
        verts.push(Point2::new(lo.x, hi.y));
        Self {
            verts,
            edges: SmallVec::from_slice(&edges),
        }
    }

    /// `true` when the polygon has no interior (fewer than three vertices).
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.verts.len() < 3
    }

    /// Number of vertices.
    #[inline]
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.verts.len()
    }

    /// Signed shoelace area, clamped at zero. The clamp only absorbs
    /// round-off on slivers; orientation stays counter-clockwise throughout
    /// clipping.
    #[must_use]
    pub fn area(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        let mut twice = 0.0;
        for (k, &a) in self.verts.iter().enumerate() {
            let b = self.verts[(k + 1) % self.verts.len()];
            twice += a.x.mul_add(b.y, -(b.x * a.y));
        }
        (0.5 * twice).max(0.0)
    }

    /// Largest squared distance from `center` to any vertex. Zero for an
    /// empty polygon.
    #[must_use]
    pub fn max_squared_radius(&self, center: Point2) -> f64 {
        self.verts
            .iter()
            .map(|&v| v.distance_squared(center))
            .fold(0.0, f64::max)
    }

    /// Iterates over `(start, end, kind)` for every edge.
    pub fn edges(&self) -> impl Iterator<Item = (Point2, Point2, EdgeKind)> + '_ {
        self.verts.iter().enumerate().map(move |(k, &a)| {
            let b = self.verts[(k + 1) % self.verts.len()];
            (a, b, self.edges[k])
        })
    }

    /// Clips the polygon against the half-plane `{ x : level(x) <= 0 }`.
    ///
    /// The newly created edge (if the cut intersects the polygon) is labeled
    /// `kind`; surviving edges keep their labels. A cut that removes every
    /// vertex empties the polygon.
    pub fn clip_half_plane<F>(&mut self, level: F, kind: EdgeKind)
    where
        F: Fn(Point2) -> f64,
    {
        let len = self.verts.len();
        if len == 0 {
            return;
        }
        let values: SmallVec<[f64; INLINE_VERTICES]> =
            self.verts.iter().map(|&v| level(v)).collect();
        if values.iter().all(|&g| g <= 0.0) {
            return;
        }
        if values.iter().all(|&g| g > 0.0) {
            self.verts.clear();
            self.edges.clear();
            return;
        }

        let mut out_verts: SmallVec<[Point2; INLINE_VERTICES]> = SmallVec::new();
        let mut out_edges: SmallVec<[EdgeKind; INLINE_VERTICES]> = SmallVec::new();
        for k in 0..len {
            let k1 = (k + 1) % len;
            let (v0, v1) = (self.verts[k], self.verts[k1]);
            let (g0, g1) = (values[k], values[k1]);
            let label = self.edges[k];
            let inside0 = g0 <= 0.0;
            let inside1 = g1 <= 0.0;
            if inside0 {
                out_verts.push(v0);
                if inside1 {
                    out_edges.push(label);
                } else {
                    // Exit point: the rest of this edge is cut away and the
                    // polygon continues along the new bisector.
                    out_edges.push(label);
                    out_verts.push(intersect(v0, v1, g0, g1));
                    out_edges.push(kind);
                }
            } else if inside1 {
                // Entry point: the edge resumes with its original label.
                out_verts.push(intersect(v0, v1, g0, g1));
                out_edges.push(label);
            }
        }

        // A cut through an existing vertex emits that vertex twice. Merge
        // the duplicates, keeping the label of the edge that leaves the
        // merged vertex.
        let mut verts: SmallVec<[Point2; INLINE_VERTICES]> = SmallVec::new();
        let mut edges: SmallVec<[EdgeKind; INLINE_VERTICES]> = SmallVec::new();
        for (vertex, edge) in out_verts.into_iter().zip(out_edges) {
            match (verts.last(), edges.last_mut()) {
                (Some(&last), Some(last_edge)) if last == vertex => *last_edge = edge,
                _ => {
                    verts.push(vertex);
                    edges.push(edge);
                }
            }
        }
        while verts.len() > 1 && verts.first() == verts.last() {
            verts.pop();
            edges.pop();
        }
        self.verts = verts;
        self.edges = edges;
    }
}

/// Point where the segment `v0 -> v1` crosses the zero level, given the
/// level values at its endpoints (which must straddle zero).
#[inline]
fn intersect(v0: Point2, v1: Point2, g0: f64, g1: f64) -> Point2 {
    let t = g0 / (g0 - g1);
    v0 + (v1 - v0) * t
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_square() -> CellPolygon {
        CellPolygon::from_domain(&Domain::new(0.0, 0.0, 1.0, 1.0).unwrap())
    }

    fn bisector_label(source: usize) -> EdgeKind {
        EdgeKind::Bisector {
            source,
            site: Point2::ZERO,
        }
    }

    #[test]
    fn domain_rectangle_area() {
        let poly = CellPolygon::from_domain(&Domain::new(-1.0, 0.0, 2.0, 2.0).unwrap());
        assert_relative_eq!(poly.area(), 6.0);
        assert_eq!(poly.vertex_count(), 4);
        assert!(poly.edges().all(|(_, _, kind)| kind == EdgeKind::Wall));
    }

    #[test]
    fn clip_keeps_half() {
        let mut poly = unit_square();
        // Keep x <= 0.5.
        poly.clip_half_plane(|p| p.x - 0.5, bisector_label(3));
        assert_relative_eq!(poly.area(), 0.5);
        // Exactly one edge carries the new label.
        let cut_edges = poly
            .edges()
            .filter(|&(_, _, kind)| kind == bisector_label(3))
            .count();
        assert_eq!(cut_edges, 1);
    }

    #[test]
    fn cut_edge_has_expected_geometry() {
        let mut poly = unit_square();
        poly.clip_half_plane(|p| p.x - 0.5, bisector_label(0));
        let (a, b, _) = poly
            .edges()
            .find(|&(_, _, kind)| kind == bisector_label(0))
            .unwrap();
        assert_relative_eq!(a.x, 0.5);
        assert_relative_eq!(b.x, 0.5);
        assert_relative_eq!((a.y - b.y).abs(), 1.0);
    }

    #[test]
    fn clip_outside_empties_polygon() {
        let mut poly = unit_square();
        poly.clip_half_plane(|p| 1.0 - p.x, bisector_label(0));
        assert!(poly.is_empty());
        assert_relative_eq!(poly.area(), 0.0);
        // Further cuts on an empty polygon are no-ops.
        poly.clip_half_plane(|p| p.y, bisector_label(1));
        assert!(poly.is_empty());
    }

    #[test]
    fn clip_inside_is_noop() {
        let mut poly = unit_square();
        poly.clip_half_plane(|p| p.x - 2.0, bisector_label(0));
        assert_eq!(poly.vertex_count(), 4);
        assert_relative_eq!(poly.area(), 1.0);
    }

    #[test]
    fn successive_cuts_compose() {
        let mut poly = unit_square();
        poly.clip_half_plane(|p| p.x - 0.5, bisector_label(0));
        poly.clip_half_plane(|p| p.y - 0.5, bisector_label(1));
        assert_relative_eq!(poly.area(), 0.25);
        // Two wall edges survive, two bisector edges were created.
        let walls = poly
            .edges()
            .filter(|&(_, _, kind)| kind == EdgeKind::Wall)
            .count();
        assert_eq!(walls, 2);
    }

    #[test]
    fn diagonal_cut_area() {
        let mut poly = unit_square();
        // Keep the triangle below the main diagonal.
        poly.clip_half_plane(|p| p.y - p.x, bisector_label(0));
        assert_relative_eq!(poly.area(), 0.5);
        assert_eq!(poly.vertex_count(), 3);
    }

    #[test]
    fn max_radius_tracks_vertices() {
        let poly = unit_square();
        let r2 = poly.max_squared_radius(Point2::new(0.0, 0.0));
        assert_relative_eq!(r2, 2.0);
        let r2_center = poly.max_squared_radius(Point2::new(0.5, 0.5));
        assert_relative_eq!(r2_center, 0.5);
    }
}
