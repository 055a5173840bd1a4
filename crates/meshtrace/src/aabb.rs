//! Axis-aligned bounding boxes.
//!
//! Boxes start out invalid (inverted) and grow as points are folded in, so
//! the union of zero points stays invalid and is skipped during traversal.

use meshtrace_math::{Axis, Point3, Vec3};

/// Axis-aligned bounding box in 3D.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb3 {
    /// Minimum corner.
    pub min: Point3,
    /// Maximum corner.
    pub max: Point3,
}

impl Default for Aabb3 {
    fn default() -> Self {
        Self::empty()
    }
}

impl Aabb3 {
    /// Create an AABB from min and max corners.
    pub fn new(min: Point3, max: Point3) -> Self {
        Self { min, max }
    }

    /// Create an empty (inverted) AABB suitable for expansion.
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f32::INFINITY, f32::INFINITY, f32::INFINITY),
            max: Point3::new(f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
        }
    }

    /// Smallest box containing all of `points`.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point3>) -> Self {
        let mut aabb = Self::empty();
        for p in points {
            aabb.include_point(p);
        }
        aabb
    }

    /// Whether `min <= max` on every axis. Empty boxes are invalid.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }

    /// Expand this AABB to include a point.
    #[inline]
    pub fn include_point(&mut self, p: &Point3) {
        self.min = self.min.inf(p);
        self.max = self.max.sup(p);
    }

    /// Expand this AABB to include another box. Invalid boxes are ignored.
    #[inline]
    pub fn include_aabb(&mut self, other: &Aabb3) {
        if other.is_valid() {
            self.include_point(&other.min);
            self.include_point(&other.max);
        }
    }

    /// Closed containment test: `min <= p <= max` on every axis.
    #[inline]
    pub fn contains(&self, p: &Point3) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    /// Size of the box along each axis.
    #[inline]
    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }

    /// Point inside the box closest to `p`.
    #[inline]
    pub fn closest_point(&self, p: &Point3) -> Point3 {
        Point3::new(
            p.x.max(self.min.x).min(self.max.x),
            p.y.max(self.min.y).min(self.max.y),
            p.z.max(self.min.z).min(self.max.z),
        )
    }

    /// Squared distance from `p` to the box; zero when `p` is inside.
    #[inline]
    pub fn distance_squared(&self, p: &Point3) -> f32 {
        (self.closest_point(p) - p).norm_squared()
    }

    /// Split at the midpoint of the longest axis.
    ///
    /// Returns the axis and the lower and upper halves, which share the
    /// cut plane.
    pub fn split_longest(&self) -> (Axis, Aabb3, Aabb3) {
        let axis = Axis::longest(&self.extent());
        let i = axis.index();
        let mid = self.min[i] + self.extent()[i] * 0.5;

        let mut first = *self;
        let mut second = *self;
        first.max[i] = mid;
        second.min[i] = mid;
        (axis, first, second)
    }
}
