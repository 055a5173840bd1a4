//! Compaction of the build tree into arena storage, with box refitting.
//!
//! Nodes are laid out depth-first with the root in slot 0, and every leaf's
//! triangles occupy one contiguous run of the triangle arena. Boxes are
//! recomputed bottom-up from the actual triangle vertices, replacing the
//! loose split halves produced during the build.

use std::mem;

use crate::aabb::Aabb3;
use crate::build::{BuildNode, BuildTree};
use crate::geometry::{Triangle, Vertex};

/// A node of the flattened tree. Children and triangles are arena indices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FlatNode {
    /// Leaf covering `triangles[first..first + count]`.
    Leaf {
        /// Index of the leaf's first triangle.
        first: u32,
        /// Number of triangles in the leaf.
        count: u32,
    },
    /// Internal node with two children.
    Internal {
        /// Tight bounds of each child's subtree; invalid when the child is
        /// empty.
        boxes: [Aabb3; 2],
        /// Node indices of the children.
        children: [u32; 2],
    },
}

/// Summary of a finished build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    /// Number of vertices.
    pub vertex_count: usize,
    /// Number of triangles.
    pub triangle_count: usize,
    /// Total number of nodes, leaves included.
    pub node_count: usize,
    /// Number of leaf nodes.
    pub leaf_count: usize,
    /// Depth of the deepest leaf; the root is at depth 0.
    pub max_leaf_depth: u32,
    /// Triangle count of the fullest leaf.
    pub largest_leaf: usize,
    /// Leaves kept over capacity by the depth limit.
    pub oversized_leaves: usize,
    /// Bytes held by the vertex, node and triangle arenas.
    pub memory_bytes: usize,
}

/// Frozen storage for a built tree.
pub struct Arena<A, U> {
    pub(crate) vertices: Vec<Vertex<A>>,
    pub(crate) nodes: Vec<FlatNode>,
    pub(crate) triangles: Vec<Triangle<A, U>>,
    pub(crate) bounds: Aabb3,
    pub(crate) stats: BuildStats,
}

impl<A, U> Arena<A, U> {
    /// Vertex storage.
    pub fn vertices(&self) -> &[Vertex<A>] {
        &self.vertices
    }

    /// Node storage; the root is at index 0.
    pub fn nodes(&self) -> &[FlatNode] {
        &self.nodes
    }

    /// Triangle storage, grouped by leaf.
    pub fn triangles(&self) -> &[Triangle<A, U>] {
        &self.triangles
    }

    /// Tight bounds of all geometry; invalid when there are no triangles.
    pub fn bounds(&self) -> Aabb3 {
        self.bounds
    }

    /// Statistics gathered while flattening.
    pub fn stats(&self) -> &BuildStats {
        &self.stats
    }

    /// Triangles of a leaf node.
    #[inline]
    pub(crate) fn leaf_triangles(&self, first: u32, count: u32) -> &[Triangle<A, U>] {
        &self.triangles[first as usize..(first + count) as usize]
    }
}

struct Flattener<A, U> {
    source: Vec<BuildNode<A, U>>,
    vertices: Vec<Vertex<A>>,
    nodes: Vec<FlatNode>,
    triangles: Vec<Triangle<A, U>>,
    stats: BuildStats,
}

/// Move a build tree into arena storage and refit every box.
///
/// Consumes the tree; each leaf's triangle list is moved into the arena and
/// freed as it is visited.
pub fn flatten<A, U>(tree: BuildTree<A, U>) -> Arena<A, U> {
    let BuildTree {
        vertices,
        nodes,
        triangle_count,
        oversized_leaves,
    } = tree;

    let mut flattener = Flattener {
        nodes: Vec::with_capacity(nodes.len()),
        triangles: Vec::with_capacity(triangle_count),
        source: nodes,
        vertices,
        stats: BuildStats {
            triangle_count,
            oversized_leaves,
            ..BuildStats::default()
        },
    };

    let (_, bounds) = flattener.visit(0, 0);

    let Flattener {
        vertices,
        nodes,
        triangles,
        mut stats,
        ..
    } = flattener;

    stats.vertex_count = vertices.len();
    stats.node_count = nodes.len();
    stats.memory_bytes = vertices.len() * mem::size_of::<Vertex<A>>()
        + nodes.len() * mem::size_of::<FlatNode>()
        + triangles.len() * mem::size_of::<Triangle<A, U>>();

    tracing::info!(
        triangles = stats.triangle_count,
        nodes = stats.node_count,
        leaves = stats.leaf_count,
        max_leaf_depth = stats.max_leaf_depth,
        memory_bytes = stats.memory_bytes,
        "acceleration structure built"
    );

    Arena {
        vertices,
        nodes,
        triangles,
        bounds,
        stats,
    }
}

impl<A, U> Flattener<A, U> {
    /// Flatten the subtree rooted at build node `index`.
    ///
    /// Returns the arena slot of the node and the tight bounds of its
    /// geometry.
    fn visit(&mut self, index: usize, depth: u32) -> (u32, Aabb3) {
        let slot = self.nodes.len() as u32;
        self.nodes.push(FlatNode::Leaf { first: 0, count: 0 });

        let node = mem::replace(
            &mut self.source[index],
            BuildNode::Leaf {
                triangles: Vec::new(),
            },
        );

        match node {
            BuildNode::Leaf { triangles } => {
                let mut aabb = Aabb3::empty();
                for triangle in &triangles {
                    for &i in &triangle.indices {
                        aabb.include_point(&self.vertices[i as usize].position);
                    }
                }

                let first = self.triangles.len() as u32;
                let count = triangles.len() as u32;
                self.triangles.extend(triangles);
                self.nodes[slot as usize] = FlatNode::Leaf { first, count };

                self.stats.leaf_count += 1;
                self.stats.max_leaf_depth = self.stats.max_leaf_depth.max(depth);
                self.stats.largest_leaf = self.stats.largest_leaf.max(count as usize);

                (slot, aabb)
            }
            BuildNode::Internal { children, .. } => {
                let (left, left_box) = self.visit(children[0], depth + 1);
                let (right, right_box) = self.visit(children[1], depth + 1);

                let mut aabb = Aabb3::empty();
                aabb.include_aabb(&left_box);
                aabb.include_aabb(&right_box);

                self.nodes[slot as usize] = FlatNode::Internal {
                    boxes: [left_box, right_box],
                    children: [left, right],
                };

                (slot, aabb)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::build_tree;
    use crate::geometry::{GeometryStore, Vertex};
    use crate::settings::BuildSettings;
    use meshtrace_math::Point3;

    fn grid(n: u32) -> GeometryStore<(), u32> {
        let mut store = GeometryStore::new();
        for i in 0..n {
            for j in 0..n {
                let (x, y) = (i as f32, j as f32);
                let a = store.add_vertex(Vertex::at(x, y, 0.0));
                let b = store.add_vertex(Vertex::at(x + 0.5, y, 0.25));
                let c = store.add_vertex(Vertex::at(x, y + 0.5, 0.5));
                store.add_triangle(Triangle::new([a, b, c], i * n + j));
            }
        }
        store
    }

    fn flattened(n: u32, leaf: usize) -> Arena<(), u32> {
        let tree = build_tree(grid(n), &BuildSettings::with_max_triangles_per_leaf(leaf)).unwrap();
        flatten(tree)
    }

    #[test]
    fn test_flatten_empty() {
        let arena = flatten(build_tree(GeometryStore::<(), ()>::new(), &BuildSettings::default()).unwrap());
        assert_eq!(arena.nodes(), &[FlatNode::Leaf { first: 0, count: 0 }]);
        assert!(!arena.bounds().is_valid());
        assert_eq!(arena.stats().leaf_count, 1);
    }

    #[test]
    fn test_flatten_single_leaf_bounds() {
        let arena = flattened(2, 8);
        assert_eq!(arena.nodes().len(), 1);
        assert_eq!(arena.bounds().min, Point3::new(0.0, 0.0, 0.0));
        assert_eq!(arena.bounds().max, Point3::new(1.5, 1.5, 0.5));
    }

    #[test]
    fn test_leaf_runs_cover_all_triangles() {
        let arena = flattened(10, 3);
        let mut covered = vec![false; arena.triangles().len()];
        for node in arena.nodes() {
            if let FlatNode::Leaf { first, count } = *node {
                for i in first..first + count {
                    assert!(!covered[i as usize]);
                    covered[i as usize] = true;
                }
            }
        }
        assert!(covered.iter().all(|&c| c));
        assert_eq!(arena.stats().triangle_count, 100);
        assert!(arena.stats().largest_leaf <= 3);
    }

    #[test]
    fn test_boxes_are_tight() {
        let arena = flattened(10, 3);
        for node in arena.nodes() {
            if let FlatNode::Internal { boxes, children } = node {
                for (aabb, &child) in boxes.iter().zip(children) {
                    let mut expected = Aabb3::empty();
                    collect_bounds(&arena, child, &mut expected);
                    assert_eq!(*aabb, expected);
                }
            }
        }
    }

    fn collect_bounds(arena: &Arena<(), u32>, node: u32, aabb: &mut Aabb3) {
        match arena.nodes()[node as usize] {
            FlatNode::Leaf { first, count } => {
                for triangle in arena.leaf_triangles(first, count) {
                    for &i in &triangle.indices {
                        aabb.include_point(&arena.vertices()[i as usize].position);
                    }
                }
            }
            FlatNode::Internal { children, .. } => {
                collect_bounds(arena, children[0], aabb);
                collect_bounds(arena, children[1], aabb);
            }
        }
    }

    #[test]
    fn test_children_follow_parent() {
        let arena = flattened(10, 3);
        for (slot, node) in arena.nodes().iter().enumerate() {
            if let FlatNode::Internal { children, .. } = node {
                assert!(children.iter().all(|&c| c as usize > slot));
            }
        }
    }

    #[test]
    fn test_stats() {
        let arena = flattened(10, 3);
        let stats = arena.stats();
        assert_eq!(stats.vertex_count, 300);
        assert_eq!(stats.node_count, arena.nodes().len());
        assert_eq!(stats.node_count, 2 * stats.leaf_count - 1);
        assert!(stats.max_leaf_depth > 0);
        assert!(stats.memory_bytes > 0);
    }
}
