//! Ray-triangle intersection (Möller–Trumbore).

use meshtrace_math::{Point3, Tolerance};

use crate::Ray;

/// Result of a ray-triangle intersection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriangleHit {
    /// Distance along the ray.
    pub t: f32,
    /// Barycentric weight of the second vertex.
    pub u: f32,
    /// Barycentric weight of the third vertex.
    pub v: f32,
}

impl TriangleHit {
    /// Barycentric weights of the three vertices, summing to one.
    #[inline]
    pub fn barycentric(&self) -> [f32; 3] {
        [1.0 - self.u - self.v, self.u, self.v]
    }
}

/// Intersect a ray with the triangle `(a, b, c)`.
///
/// Both faces are hit. Returns `None` for rays parallel to the triangle
/// plane, for degenerate (zero-area) triangles, and for hits at or behind
/// the origin.
#[inline]
pub fn intersect_triangle(ray: &Ray, a: &Point3, b: &Point3, c: &Point3) -> Option<TriangleHit> {
    let tol = Tolerance::DEFAULT;
    let direction = ray.direction.as_ref();

    let edge1 = b - a;
    let edge2 = c - a;

    let h = direction.cross(&edge2);
    let det = edge1.dot(&h);

    if tol.is_degenerate(det) {
        return None;
    }

    let f = 1.0 / det;
    let s = ray.origin - a;

    let u = f * s.dot(&h);
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q = s.cross(&edge1);
    let v = f * direction.dot(&q);
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = f * edge2.dot(&q);
    if t > tol.intersection {
        Some(TriangleHit { t, u, v })
    } else {
        None
    }
}
