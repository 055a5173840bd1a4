//! Read-only queries over the flattened tree.

use crate::aabb::Aabb3;
use crate::flatten::{Arena, FlatNode};
use crate::geometry::Candidate;
use crate::intersect::{intersect_triangle, TriangleHit};
use crate::Ray;

/// Closest accepted hit found so far.
struct Nearest {
    limit: f32,
    hit: Option<(u32, TriangleHit)>,
}

impl<A, U> Arena<A, U> {
    /// Closest accepted intersection strictly nearer than `max_distance`.
    ///
    /// Returns the arena index of the hit triangle together with the hit.
    pub fn nearest(&self, ray: &Ray, max_distance: f32) -> Option<(u32, TriangleHit)> {
        let mut best = Nearest {
            limit: max_distance,
            hit: None,
        };
        if self.bounds.is_valid() && self.enters(ray, &self.bounds, max_distance) {
            self.nearest_node(ray, 0, &mut best);
        }
        best.hit
    }

    /// Whether any accepted intersection lies strictly nearer than
    /// `max_distance`.
    pub fn occluded(&self, ray: &Ray, max_distance: f32) -> bool {
        self.bounds.is_valid()
            && self.enters(ray, &self.bounds, max_distance)
            && self.occluded_node(ray, 0, max_distance)
    }

    fn nearest_node(&self, ray: &Ray, node: u32, best: &mut Nearest) {
        match self.nodes[node as usize] {
            FlatNode::Leaf { first, count } => {
                for index in first..first + count {
                    if let Some(hit) = self.test_triangle(ray, index, best.limit) {
                        best.limit = hit.t;
                        best.hit = Some((index, hit));
                    }
                }
            }
            FlatNode::Internal { boxes, children } => {
                for (aabb, child) in boxes.iter().zip(children) {
                    // The limit may have shrunk while visiting the first child.
                    if self.enters(ray, aabb, best.limit) {
                        self.nearest_node(ray, child, best);
                    }
                }
            }
        }
    }

    fn occluded_node(&self, ray: &Ray, node: u32, max_distance: f32) -> bool {
        match self.nodes[node as usize] {
            FlatNode::Leaf { first, count } => {
                (first..first + count).any(|index| self.test_triangle(ray, index, max_distance).is_some())
            }
            FlatNode::Internal { boxes, children } => boxes
                .iter()
                .zip(children)
                .any(|(aabb, child)| self.enters(ray, aabb, max_distance) && self.occluded_node(ray, child, max_distance)),
        }
    }

    /// Whether a subtree bounded by `aabb` can hold a hit nearer than `limit`.
    #[inline]
    fn enters(&self, ray: &Ray, aabb: &Aabb3, limit: f32) -> bool {
        if !aabb.is_valid() || aabb.distance_squared(&ray.origin) >= limit * limit {
            return false;
        }
        matches!(ray.intersect_aabb(aabb), Some((entry, _)) if entry < limit)
    }

    /// Intersect one triangle, keeping the hit only if it is nearer than
    /// `limit` and passes the triangle's filter.
    fn test_triangle(&self, ray: &Ray, index: u32, limit: f32) -> Option<TriangleHit> {
        let triangle = &self.triangles[index as usize];
        let [a, b, c] = triangle.indices.map(|i| &self.vertices[i as usize]);

        let hit = intersect_triangle(ray, &a.position, &b.position, &c.position)?;
        if hit.t >= limit {
            return None;
        }

        match triangle.filter {
            Some(filter) => {
                let candidate = Candidate {
                    ray,
                    triangle,
                    vertices: [a, b, c],
                    hit,
                };
                filter(&candidate).then_some(hit)
            }
            None => Some(hit),
        }
    }
}
