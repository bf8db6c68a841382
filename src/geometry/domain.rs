//! The transport domain: an axis-aligned box with per-axis periodicity.
//!
//! The box defines both the spatial extent of the tessellation and,
//! implicitly, the wrap length of every periodic axis. Periodicity is a pair
//! of independent flags; the initialization algorithm operates in the
//! single-axis regime, while the diagram machinery handles any combination.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::point::Point2;

/// A coordinate axis of the plane.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    /// The horizontal axis.
    X,
    /// The vertical axis.
    Y,
}

impl Axis {
    /// Returns the other axis.
    #[inline]
    #[must_use]
    pub const fn orthogonal(self) -> Self {
        match self {
            Self::X => Self::Y,
            Self::Y => Self::X,
        }
    }
}

/// Per-axis periodic boundary flags.
///
/// # Examples
///
/// ```rust
/// use sdot::geometry::domain::{Axis, Periodicity};
///
/// assert_eq!(Periodicity::X.single_axis(), Some(Axis::X));
/// assert_eq!(Periodicity::BOTH.single_axis(), None);
/// assert!(!Periodicity::NONE.any());
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Periodicity {
    /// Whether the x axis wraps.
    pub x: bool,
    /// Whether the y axis wraps.
    pub y: bool,
}

impl Periodicity {
    /// No periodic axis.
    pub const NONE: Self = Self { x: false, y: false };
    /// Periodic in x only.
    pub const X: Self = Self { x: true, y: false };
    /// Periodic in y only.
    pub const Y: Self = Self { x: false, y: true };
    /// Periodic in both axes (the full torus).
    pub const BOTH: Self = Self { x: true, y: true };

    /// `true` when `axis` wraps.
    #[inline]
    #[must_use]
    pub const fn is_periodic(self, axis: Axis) -> bool {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
        }
    }

    /// `true` when at least one axis wraps.
    #[inline]
    #[must_use]
    pub const fn any(self) -> bool {
        self.x || self.y
    }

    /// `true` when both axes wrap.
    #[inline]
    #[must_use]
    pub const fn both(self) -> bool {
        self.x && self.y
    }

    /// The periodic axis, if exactly one axis wraps.
    #[inline]
    #[must_use]
    pub const fn single_axis(self) -> Option<Axis> {
        match (self.x, self.y) {
            (true, false) => Some(Axis::X),
            (false, true) => Some(Axis::Y),
            _ => None,
        }
    }
}

/// Errors raised when constructing a [`Domain`].
#[derive(Clone, Debug, Error, PartialEq)]
pub enum DomainError {
    /// A coordinate of the box is NaN or infinite.
    #[error("domain bounds must be finite, got [{xmin}, {ymin}, {xmax}, {ymax}]")]
    NonFiniteBounds {
        /// Lower x bound.
        xmin: f64,
        /// Lower y bound.
        ymin: f64,
        /// Upper x bound.
        xmax: f64,
        /// Upper y bound.
        ymax: f64,
    },
    /// The box has zero or negative extent along an axis.
    #[error("domain is empty along {axis:?}: [{min}, {max}]")]
    EmptyExtent {
        /// The collapsed axis.
        axis: Axis,
        /// Lower bound along that axis.
        min: f64,
        /// Upper bound along that axis.
        max: f64,
    },
}

/// An axis-aligned rectangular domain `[xmin, xmax] × [ymin, ymax]`.
///
/// The box is validated on construction: bounds must be finite and strictly
/// ordered along both axes, so downstream code can rely on positive extents
/// and a positive area.
///
/// # Examples
///
/// ```rust
/// use sdot::geometry::domain::{Axis, Domain};
///
/// let domain = Domain::new(0.0, 0.0, 2.0, 1.0).unwrap();
/// assert_eq!(domain.extent(Axis::X), 2.0);
/// assert_eq!(domain.area(), 2.0);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    min: Point2,
    max: Point2,
}

impl Domain {
    /// Creates a domain from its corner coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::NonFiniteBounds`] if any coordinate is NaN or
    /// infinite, and [`DomainError::EmptyExtent`] if `xmin >= xmax` or
    /// `ymin >= ymax`.
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Result<Self, DomainError> {
        if !(xmin.is_finite() && ymin.is_finite() && xmax.is_finite() && ymax.is_finite()) {
            return Err(DomainError::NonFiniteBounds {
                xmin,
                ymin,
                xmax,
                ymax,
            });
        }
        if xmin >= xmax {
            return Err(DomainError::EmptyExtent {
                axis: Axis::X,
                min: xmin,
                max: xmax,
            });
        }
        if ymin >= ymax {
            return Err(DomainError::EmptyExtent {
                axis: Axis::Y,
                min: ymin,
                max: ymax,
            });
        }
        Ok(Self {
            min: Point2::new(xmin, ymin),
            max: Point2::new(xmax, ymax),
        })
    }

    /// The lower-left corner.
    #[inline]
    #[must_use]
    pub const fn min(&self) -> Point2 {
        self.min
    }

    /// The upper-right corner.
    #[inline]
    #[must_use]
    pub const fn max(&self) -> Point2 {
        self.max
    }

    /// Extent of the box along `axis` (also the wrap length when that axis
    /// is periodic).
    #[inline]
    #[must_use]
    pub fn extent(&self, axis: Axis) -> f64 {
        self.max.coord(axis) - self.min.coord(axis)
    }

    /// Width of the box (extent along x).
    #[inline]
    #[must_use]
    pub fn width(&self) -> f64 {
        self.extent(Axis::X)
    }

    /// Height of the box (extent along y).
    #[inline]
    #[must_use]
    pub fn height(&self) -> f64 {
        self.extent(Axis::Y)
    }

    /// Area of the box.
    #[inline]
    #[must_use]
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// `true` when `point` lies inside the closed box.
    #[must_use]
    pub fn contains(&self, point: Point2) -> bool {
        point.x >= self.min.x && point.x <= self.max.x && point.y >= self.min.y && point.y <= self.max.y
    }

    /// Wraps a coordinate into `[min, max)` along `axis`.
    #[must_use]
    pub fn wrap_coord(&self, axis: Axis, value: f64) -> f64 {
        let min = self.min.coord(axis);
        let extent = self.extent(axis);
        min + (value - min).rem_euclid(extent)
    }

    /// Wraps `point` into the box along every periodic axis; non-periodic
    /// coordinates are left untouched.
    #[must_use]
    pub fn wrap(&self, point: Point2, periodicity: Periodicity) -> Point2 {
        let mut wrapped = point;
        if periodicity.x {
            wrapped.x = self.wrap_coord(Axis::X, wrapped.x);
        }
        if periodicity.y {
            wrapped.y = self.wrap_coord(Axis::Y, wrapped.y);
        }
        wrapped
    }
}
