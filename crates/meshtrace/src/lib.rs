#![warn(missing_docs)]

//! Bounding volume hierarchy over static triangle meshes.
//!
//! This crate answers the two questions a ray tracer asks of its scene:
//! which surface does a ray hit first, and is anything between two points.
//! Geometry is collected in a [`GeometryStore`], partitioned by spatial
//! median splits, then frozen into an [`AccelerationStructure`] whose
//! queries only read, so any number of threads may share it.
//!
//! # Architecture
//!
//! - [`GeometryStore`] - Vertex and triangle ingestion before the build
//! - [`build`] - Spatial-median partitioning into a temporary tree
//! - [`flatten`] - Arena layout and tight box refitting
//! - [`AccelerationStructure`] - Frozen tree with nearest-hit and occlusion queries
//!
//! # Example
//!
//! ```
//! use meshtrace::{GeometryStore, Ray, Triangle, Vertex};
//! use meshtrace_math::{Point3, Vec3};
//!
//! let mut store: GeometryStore<(), &str> = GeometryStore::new();
//! let a = store.add_vertex(Vertex::at(0.0, 0.0, 0.0));
//! let b = store.add_vertex(Vertex::at(1.0, 0.0, 0.0));
//! let c = store.add_vertex(Vertex::at(0.0, 1.0, 0.0));
//! store.add_triangle(Triangle::new([a, b, c], "floor"));
//!
//! let bvh = store.build(8).unwrap();
//! let ray = Ray::new(Point3::new(0.25, 0.25, 2.0), Vec3::new(0.0, 0.0, -1.0));
//!
//! let hit = bvh.find_nearest(&ray).unwrap();
//! assert_eq!(hit.triangle.user_data, "floor");
//! assert!(bvh.is_occluded(&ray, 3.0));
//! ```

mod aabb;
pub mod build;
mod error;
pub mod flatten;
mod geometry;
pub mod intersect;
mod ray;
mod settings;
mod traverse;

use std::ops::{Add, Mul};

use meshtrace_math::Point3;
use rayon::prelude::*;

pub use aabb::Aabb3;
pub use error::{MeshtraceError, Result};
pub use flatten::{BuildStats, FlatNode};
pub use geometry::{Candidate, GeometryStore, HitFilter, Triangle, Vertex};
pub use ray::Ray;
pub use settings::{
    BuildSettings, DEFAULT_MAX_DEPTH, DEFAULT_MAX_TRIANGLES_PER_LEAF, MAX_SUPPORTED_DEPTH,
};

use flatten::Arena;
use intersect::TriangleHit;

/// A built, immutable bounding volume hierarchy.
///
/// Produced by [`GeometryStore::build`]. All queries take `&self`; the
/// structure is `Send + Sync` whenever the payload types are.
pub struct AccelerationStructure<A = (), U = ()> {
    arena: Arena<A, U>,
}

/// The nearest accepted intersection of a ray.
pub struct Hit<'a, A, U> {
    /// The intersected triangle.
    pub triangle: &'a Triangle<A, U>,
    /// Index of the triangle in [`AccelerationStructure::triangles`].
    pub triangle_index: u32,
    /// The triangle's three vertices.
    pub vertices: [&'a Vertex<A>; 3],
    /// Distance from the ray origin.
    pub distance: f32,
    /// Barycentric weight of the second vertex.
    pub u: f32,
    /// Barycentric weight of the third vertex.
    pub v: f32,
}

impl<A, U> Hit<'_, A, U> {
    /// World-space hit point along `ray`.
    pub fn point(&self, ray: &Ray) -> Point3 {
        ray.at(self.distance)
    }

    /// Weights of the three vertices at the hit point.
    pub fn barycentric(&self) -> [f32; 3] {
        self.triangle_hit().barycentric()
    }

    fn triangle_hit(&self) -> TriangleHit {
        TriangleHit {
            t: self.distance,
            u: self.u,
            v: self.v,
        }
    }

    /// Interpolate a per-vertex quantity at the hit point.
    pub fn interpolate<T>(&self, attribute: impl Fn(&Vertex<A>) -> T) -> T
    where
        T: Add<Output = T> + Mul<f32, Output = T>,
    {
        geometry::interpolate(&self.vertices, self.barycentric(), attribute)
    }
}

impl<A, U> std::fmt::Debug for Hit<'_, A, U> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hit")
            .field("triangle_index", &self.triangle_index)
            .field("distance", &self.distance)
            .field("u", &self.u)
            .field("v", &self.v)
            .finish()
    }
}

impl<A, U> AccelerationStructure<A, U> {
    pub(crate) fn from_arena(arena: Arena<A, U>) -> Self {
        Self { arena }
    }

    /// Find the nearest intersection along `ray`.
    pub fn find_nearest(&self, ray: &Ray) -> Option<Hit<'_, A, U>> {
        self.find_nearest_within(ray, f32::INFINITY)
    }

    /// Find the nearest intersection strictly closer than `max_distance`.
    pub fn find_nearest_within(&self, ray: &Ray, max_distance: f32) -> Option<Hit<'_, A, U>> {
        let (index, hit) = self.arena.nearest(ray, max_distance)?;
        let triangle = &self.arena.triangles[index as usize];
        Some(Hit {
            triangle,
            triangle_index: index,
            vertices: triangle.indices.map(|i| &self.arena.vertices[i as usize]),
            distance: hit.t,
            u: hit.u,
            v: hit.v,
        })
    }

    /// Whether any surface lies along `ray` strictly closer than
    /// `max_distance`.
    ///
    /// Pair with [`Ray::segment`] for point-to-point visibility.
    pub fn is_occluded(&self, ray: &Ray, max_distance: f32) -> bool {
        self.arena.occluded(ray, max_distance)
    }

    /// Vertex by index.
    pub fn vertex(&self, index: u32) -> Option<&Vertex<A>> {
        self.arena.vertices.get(index as usize)
    }

    /// All vertices, in insertion order.
    pub fn vertices(&self) -> &[Vertex<A>] {
        self.arena.vertices()
    }

    /// All triangles, grouped by leaf.
    pub fn triangles(&self) -> &[Triangle<A, U>] {
        self.arena.triangles()
    }

    /// Triangle by arena index, as reported in [`Hit::triangle_index`].
    pub fn triangle(&self, index: u32) -> Option<&Triangle<A, U>> {
        self.arena.triangles.get(index as usize)
    }

    /// Flattened nodes; the root is at index 0.
    pub fn nodes(&self) -> &[FlatNode] {
        self.arena.nodes()
    }

    /// Tight bounds of all geometry; invalid when there are no triangles.
    pub fn bounds(&self) -> Aabb3 {
        self.arena.bounds()
    }

    /// Build statistics.
    pub fn stats(&self) -> &BuildStats {
        self.arena.stats()
    }

    /// Iterate over leaves in depth-first order, paired with their tight
    /// bounds.
    pub fn leaves(&self) -> Leaves<'_, A, U> {
        Leaves {
            arena: &self.arena,
            stack: vec![(0, self.arena.bounds)],
        }
    }
}

impl<A: Sync, U: Sync> AccelerationStructure<A, U> {
    /// Nearest hits for many rays, traced in parallel.
    pub fn find_nearest_batch(&self, rays: &[Ray]) -> Vec<Option<Hit<'_, A, U>>> {
        rays.par_iter().map(|ray| self.find_nearest(ray)).collect()
    }

    /// Occlusion for many `(ray, max_distance)` pairs, tested in parallel.
    pub fn is_occluded_batch(&self, queries: &[(Ray, f32)]) -> Vec<bool> {
        queries
            .par_iter()
            .map(|(ray, max_distance)| self.is_occluded(ray, *max_distance))
            .collect()
    }
}

/// Iterator over the leaves of an [`AccelerationStructure`].
pub struct Leaves<'a, A, U> {
    arena: &'a Arena<A, U>,
    stack: Vec<(u32, Aabb3)>,
}

impl<'a, A, U> Iterator for Leaves<'a, A, U> {
    type Item = (Aabb3, &'a [Triangle<A, U>]);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((node, aabb)) = self.stack.pop() {
            match self.arena.nodes[node as usize] {
                FlatNode::Leaf { first, count } => {
                    return Some((aabb, self.arena.leaf_triangles(first, count)));
                }
                FlatNode::Internal { boxes, children } => {
                    self.stack.push((children[1], boxes[1]));
                    self.stack.push((children[0], boxes[0]));
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use meshtrace_math::{Point2, Vec3};

    fn textured_quad() -> AccelerationStructure<Point2, u8> {
        let mut store = GeometryStore::new();
        let corners = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)];
        for (x, y) in corners {
            store.add_vertex(Vertex::new(Point3::new(x, y, 0.0), Point2::new(x, y)));
        }
        store.add_triangle(Triangle::new([0, 1, 2], 1));
        store.add_triangle(Triangle::new([0, 2, 3], 2));
        store.build(1).unwrap()
    }

    #[test]
    fn test_find_nearest_reports_hit() {
        let bvh = textured_quad();
        let ray = Ray::new(Point3::new(0.75, 0.25, 4.0), Vec3::new(0.0, 0.0, -1.0));
        let hit = bvh.find_nearest(&ray).unwrap();

        assert_eq!(hit.triangle.user_data, 1);
        assert_eq!(bvh.triangle(hit.triangle_index).unwrap().user_data, 1);
        assert_relative_eq!(hit.distance, 4.0, epsilon = 1e-5);
        assert_relative_eq!(hit.point(&ray), Point3::new(0.75, 0.25, 0.0), epsilon = 1e-5);

        let weights = hit.barycentric();
        assert_relative_eq!(weights.iter().sum::<f32>(), 1.0, epsilon = 1e-5);
        assert_relative_eq!(weights[0], 0.25, epsilon = 1e-5);
        assert_relative_eq!(weights[1], 0.5, epsilon = 1e-5);
        assert_relative_eq!(weights[2], 0.25, epsilon = 1e-5);

        let uv = hit.interpolate(|v| v.attributes.coords);
        assert_relative_eq!(uv.x, 0.75, epsilon = 1e-5);
        assert_relative_eq!(uv.y, 0.25, epsilon = 1e-5);
    }

    #[test]
    fn test_find_nearest_within() {
        let bvh = textured_quad();
        let ray = Ray::new(Point3::new(0.25, 0.75, 4.0), Vec3::new(0.0, 0.0, -1.0));
        assert!(bvh.find_nearest_within(&ray, 3.0).is_none());
        assert_eq!(bvh.find_nearest_within(&ray, 5.0).unwrap().triangle.user_data, 2);
    }

    #[test]
    fn test_segment_visibility() {
        let bvh = textured_quad();
        let (ray, length) =
            Ray::segment(Point3::new(0.5, 0.3, 1.0), Point3::new(0.5, 0.3, -1.0)).unwrap();
        assert!(bvh.is_occluded(&ray, length));

        let (ray, length) =
            Ray::segment(Point3::new(0.5, 0.3, 1.0), Point3::new(0.5, 0.3, 0.5)).unwrap();
        assert!(!bvh.is_occluded(&ray, length));
    }

    #[test]
    fn test_accessors() {
        let bvh = textured_quad();
        assert_eq!(bvh.vertices().len(), 4);
        assert_eq!(bvh.vertex(2).unwrap().attributes, Point2::new(1.0, 1.0));
        assert!(bvh.vertex(4).is_none());
        assert!(bvh.triangle(2).is_none());
        assert_eq!(bvh.bounds().max, Point3::new(1.0, 1.0, 0.0));
        assert_eq!(bvh.stats().triangle_count, 2);
        assert_eq!(bvh.stats().leaf_count, 2);
        assert_eq!(bvh.nodes().len(), 3);
    }

    #[test]
    fn test_leaves_cover_triangles() {
        let bvh = textured_quad();
        let leaves: Vec<_> = bvh.leaves().collect();
        assert_eq!(leaves.len(), 2);
        let total: usize = leaves.iter().map(|(_, triangles)| triangles.len()).sum();
        assert_eq!(total, 2);
        for (aabb, triangles) in leaves {
            for triangle in triangles {
                for &i in &triangle.indices {
                    assert!(aabb.contains(&bvh.vertices()[i as usize].position));
                }
            }
        }
    }

    #[test]
    fn test_batch_queries_match_serial() {
        let bvh = textured_quad();
        let rays: Vec<Ray> = (0..16)
            .map(|i| {
                let x = i as f32 / 8.0 - 0.25;
                Ray::new(Point3::new(x, 0.4, 2.0), Vec3::new(0.0, 0.0, -1.0))
            })
            .collect();

        let batch = bvh.find_nearest_batch(&rays);
        for (ray, hit) in rays.iter().zip(&batch) {
            let serial = bvh.find_nearest(ray);
            assert_eq!(
                hit.as_ref().map(|h| h.triangle_index),
                serial.as_ref().map(|h| h.triangle_index)
            );
        }

        let queries: Vec<(Ray, f32)> = rays.iter().map(|r| (*r, 1.5)).collect();
        assert!(bvh.is_occluded_batch(&queries).iter().all(|&o| !o));
    }

    #[test]
    fn test_structure_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AccelerationStructure<Point2, u8>>();
    }
}
