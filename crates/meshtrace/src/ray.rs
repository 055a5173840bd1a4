//! Ray representation and ray-box tests.

use meshtrace_math::{Dir3, Point3, Vec3};

use crate::aabb::Aabb3;

/// A ray in 3D space defined by origin and direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    /// Origin point of the ray.
    pub origin: Point3,
    /// Unit direction of the ray.
    pub direction: Dir3,
    /// Precomputed reciprocal of direction components for fast AABB tests.
    inv_direction: Vec3,
    /// Sign of direction components (0 if positive, 1 if negative).
    sign: [usize; 3],
}

impl Ray {
    /// Create a new ray from origin and direction.
    ///
    /// The direction will be normalized, so hit distances are measured in
    /// world units.
    pub fn new(origin: Point3, direction: Vec3) -> Self {
        Self::from_dir(origin, Dir3::new_normalize(direction))
    }

    /// Create a ray from an already normalized direction.
    pub fn from_dir(origin: Point3, direction: Dir3) -> Self {
        let inv = Vec3::new(1.0 / direction.x, 1.0 / direction.y, 1.0 / direction.z);
        let sign = [
            usize::from(inv.x < 0.0),
            usize::from(inv.y < 0.0),
            usize::from(inv.z < 0.0),
        ];
        Self {
            origin,
            direction,
            inv_direction: inv,
            sign,
        }
    }

    /// Ray from `from` towards `to`, paired with the distance between them.
    ///
    /// Returns `None` when the points coincide. Feeding the pair to
    /// an occlusion query tests visibility between the two points.
    pub fn segment(from: Point3, to: Point3) -> Option<(Self, f32)> {
        let (direction, length) = Dir3::try_new_and_get(to - from, f32::EPSILON)?;
        Some((Self::from_dir(from, direction), length))
    }

    /// Evaluate the ray at parameter `t`: `origin + t * direction`.
    #[inline]
    pub fn at(&self, t: f32) -> Point3 {
        self.origin + self.direction.as_ref() * t
    }

    /// Test ray-AABB intersection using the slab method.
    ///
    /// Returns `Some((t_min, t_max))` if the ray intersects the box,
    /// where `t_min` and `t_max` are the entry and exit parameters.
    /// `t_min` is clamped to zero when the origin is inside the box.
    /// Returns `None` if no intersection or the box lies behind the ray.
    ///
    /// Handles infinite reciprocals correctly for axis-aligned rays.
    #[inline]
    pub fn intersect_aabb(&self, aabb: &Aabb3) -> Option<(f32, f32)> {
        let bounds = [aabb.min, aabb.max];

        let tx1 = (bounds[self.sign[0]].x - self.origin.x) * self.inv_direction.x;
        let tx2 = (bounds[1 - self.sign[0]].x - self.origin.x) * self.inv_direction.x;

        let mut t_min = tx1;
        let mut t_max = tx2;

        let ty1 = (bounds[self.sign[1]].y - self.origin.y) * self.inv_direction.y;
        let ty2 = (bounds[1 - self.sign[1]].y - self.origin.y) * self.inv_direction.y;

        t_min = t_min.max(ty1);
        t_max = t_max.min(ty2);

        let tz1 = (bounds[self.sign[2]].z - self.origin.z) * self.inv_direction.z;
        let tz2 = (bounds[1 - self.sign[2]].z - self.origin.z) * self.inv_direction.z;

        t_min = t_min.max(tz1);
        t_max = t_max.min(tz2);

        if t_max >= t_min && t_max >= 0.0 {
            Some((t_min.max(0.0), t_max))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_box() -> Aabb3 {
        Aabb3::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0))
    }

    #[test]
    fn test_ray_at() {
        let ray = Ray::new(Point3::new(0.0, 0.0, 0.0), Vec3::new(2.0, 0.0, 0.0));
        let p = ray.at(5.0);
        assert_relative_eq!(p, Point3::new(5.0, 0.0, 0.0));
    }

    #[test]
    fn test_ray_segment() {
        let (ray, length) =
            Ray::segment(Point3::new(1.0, 1.0, 1.0), Point3::new(1.0, 4.0, 5.0)).unwrap();
        assert_relative_eq!(length, 5.0);
        assert_relative_eq!(ray.at(length), Point3::new(1.0, 4.0, 5.0), epsilon = 1e-5);

        let p = Point3::new(2.0, 2.0, 2.0);
        assert!(Ray::segment(p, p).is_none());
    }

    #[test]
    fn test_ray_aabb_hit() {
        let ray = Ray::new(Point3::new(-5.0, 0.5, 0.5), Vec3::new(1.0, 0.0, 0.0));
        let (t_min, t_max) = ray.intersect_aabb(&unit_box()).unwrap();
        assert_relative_eq!(t_min, 5.0);
        assert_relative_eq!(t_max, 6.0);
    }

    #[test]
    fn test_ray_aabb_miss() {
        let ray = Ray::new(Point3::new(-5.0, 5.0, 5.0), Vec3::new(1.0, 0.0, 0.0));
        assert!(ray.intersect_aabb(&unit_box()).is_none());
    }

    #[test]
    fn test_ray_inside_aabb() {
        let ray = Ray::new(Point3::new(0.5, 0.5, 0.5), Vec3::new(1.0, 0.0, 0.0));
        let (t_min, t_max) = ray.intersect_aabb(&unit_box()).unwrap();
        assert_eq!(t_min, 0.0);
        assert_relative_eq!(t_max, 0.5);
    }

    #[test]
    fn test_ray_aabb_diagonal() {
        let ray = Ray::new(Point3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0));
        let (t_min, _) = ray.intersect_aabb(&unit_box()).unwrap();
        assert_relative_eq!(t_min, 3.0_f32.sqrt(), epsilon = 1e-5);
    }

    #[test]
    fn test_ray_aabb_behind() {
        let ray = Ray::new(Point3::new(-5.0, 0.5, 0.5), Vec3::new(-1.0, 0.0, 0.0));
        assert!(ray.intersect_aabb(&unit_box()).is_none());
    }

    #[test]
    fn test_ray_aabb_negative_direction() {
        let ray = Ray::new(Point3::new(0.5, 0.5, 10.0), Vec3::new(0.0, 0.0, -1.0));
        let (t_min, t_max) = ray.intersect_aabb(&unit_box()).unwrap();
        assert_relative_eq!(t_min, 9.0);
        assert_relative_eq!(t_max, 10.0);
    }

    #[test]
    fn test_ray_aabb_flat_box() {
        // Boxes around axis-aligned triangles have zero thickness
        let flat = Aabb3::new(Point3::new(0.0, 0.0, 2.0), Point3::new(1.0, 1.0, 2.0));
        let ray = Ray::new(Point3::new(0.5, 0.5, 0.0), Vec3::new(0.0, 0.0, 1.0));
        let (t_min, t_max) = ray.intersect_aabb(&flat).unwrap();
        assert_relative_eq!(t_min, 2.0);
        assert_relative_eq!(t_max, 2.0);
    }
}
