#![warn(missing_docs)]

//! Math types for the meshtrace acceleration structure.
//!
//! Thin wrappers around nalgebra providing the single-precision types used
//! by the ray tracer: points, vectors, unit directions, instance transforms,
//! axis selection and the intersection tolerances.

use nalgebra::{Matrix4, Rotation3, Unit, Vector3};

/// A point in 3D space.
pub type Point3 = nalgebra::Point3<f32>;

/// A vector in 3D space.
pub type Vec3 = Vector3<f32>;

/// A unit (normalized) direction vector in 3D space.
pub type Dir3 = Unit<Vector3<f32>>;

/// A point in 2D space, typically a texture coordinate.
pub type Point2 = nalgebra::Point2<f32>;

/// One of the three coordinate axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// The X axis.
    X,
    /// The Y axis.
    Y,
    /// The Z axis.
    Z,
}

impl Axis {
    /// Pick the longest axis of an extent vector.
    ///
    /// X is chosen only when it is strictly longer than both Y and Z,
    /// otherwise Y when it is strictly longer than Z, otherwise Z.
    pub fn longest(extent: &Vec3) -> Self {
        if extent.x > extent.y && extent.x > extent.z {
            Axis::X
        } else if extent.y > extent.z {
            Axis::Y
        } else {
            Axis::Z
        }
    }

    /// Component index of this axis (0, 1 or 2).
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

/// An affine transform used to place mesh instances in world space.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    /// The underlying 4x4 matrix.
    pub matrix: Matrix4<f32>,
}

impl Transform {
    /// Identity transform.
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    /// Translation by `(dx, dy, dz)`.
    pub fn translation(dx: f32, dy: f32, dz: f32) -> Self {
        Self {
            matrix: Matrix4::new_translation(&Vec3::new(dx, dy, dz)),
        }
    }

    /// Non-uniform scale by `(sx, sy, sz)`.
    pub fn scale(sx: f32, sy: f32, sz: f32) -> Self {
        Self {
            matrix: Matrix4::new_nonuniform_scaling(&Vec3::new(sx, sy, sz)),
        }
    }

    /// Rotation about an axis through the origin by `angle` radians.
    pub fn rotation(axis: &Dir3, angle: f32) -> Self {
        Self {
            matrix: Rotation3::from_axis_angle(axis, angle).to_homogeneous(),
        }
    }

    /// Compose: the result applies `other` first, then `self`.
    pub fn then(&self, other: &Transform) -> Self {
        Self {
            matrix: self.matrix * other.matrix,
        }
    }

    /// Whether this is exactly the identity transform.
    pub fn is_identity(&self) -> bool {
        self.matrix == Matrix4::identity()
    }

    /// Transform a point.
    pub fn apply_point(&self, p: &Point3) -> Point3 {
        self.matrix.transform_point(p)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

/// Tolerance used by the intersection routines.
#[derive(Debug, Clone, Copy)]
pub struct Tolerance {
    /// Determinant magnitude below which a ray is treated as parallel to a
    /// triangle, and the minimum accepted hit distance.
    pub intersection: f32,
}

impl Tolerance {
    /// Default single-precision tolerances.
    pub const DEFAULT: Self = Self {
        intersection: 1e-7,
    };

    /// Check if a determinant is too small to intersect against.
    pub fn is_degenerate(&self, determinant: f32) -> bool {
        determinant.abs() < self.intersection
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::DEFAULT
    }
}
