//! Spatial-median tree construction.
//!
//! Splits over-full nodes at the midpoint of their longest axis until every
//! leaf holds at most `max_triangles_per_leaf` triangles. Child boxes are the
//! halves of the parent box and are loose; [`crate::flatten`] refits them.

use meshtrace_math::Point3;

use crate::aabb::Aabb3;
use crate::error::Result;
use crate::geometry::{GeometryStore, Triangle, Vertex};
use crate::settings::BuildSettings;

/// A node of the tree under construction.
#[derive(Debug)]
pub enum BuildNode<A, U> {
    /// Leaf owning its triangles.
    Leaf {
        /// Triangles assigned to this leaf.
        triangles: Vec<Triangle<A, U>>,
    },
    /// Internal node with two children.
    Internal {
        /// Split halves of this node's box, one per child.
        boxes: [Aabb3; 2],
        /// Indices of the children in [`BuildTree::nodes`].
        children: [usize; 2],
    },
}

/// Output of [`build_tree`]: the partitioned tree plus the vertices it
/// indexes. Node 0 is the root.
pub struct BuildTree<A, U> {
    pub(crate) vertices: Vec<Vertex<A>>,
    pub(crate) nodes: Vec<BuildNode<A, U>>,
    pub(crate) triangle_count: usize,
    pub(crate) oversized_leaves: usize,
}

impl<A, U> BuildTree<A, U> {
    /// All nodes; the root is at index 0.
    pub fn nodes(&self) -> &[BuildNode<A, U>] {
        &self.nodes
    }

    /// Number of triangles across all leaves.
    pub fn triangle_count(&self) -> usize {
        self.triangle_count
    }

    /// Leaves left over capacity because they reached the depth limit.
    pub fn oversized_leaves(&self) -> usize {
        self.oversized_leaves
    }
}

/// A node waiting to be split.
struct SplitTask {
    node: usize,
    aabb: Aabb3,
    depth: u32,
}

/// Partition the store's triangles into a binary tree.
///
/// Fails only if the settings are invalid or a triangle references a
/// vertex that does not exist.
pub fn build_tree<A, U>(
    store: GeometryStore<A, U>,
    settings: &BuildSettings,
) -> Result<BuildTree<A, U>> {
    settings.validate()?;
    store.validate()?;

    let GeometryStore {
        vertices,
        triangles,
    } = store;

    let mut root_box = Aabb3::empty();
    for triangle in &triangles {
        for &i in &triangle.indices {
            root_box.include_point(&vertices[i as usize].position);
        }
    }

    let triangle_count = triangles.len();
    let mut queue = Vec::new();
    if triangle_count > settings.max_triangles_per_leaf {
        queue.push(SplitTask {
            node: 0,
            aabb: root_box,
            depth: 0,
        });
    }

    let mut tree = BuildTree {
        vertices,
        nodes: vec![BuildNode::Leaf { triangles }],
        triangle_count,
        oversized_leaves: 0,
    };

    while let Some(task) = queue.pop() {
        if task.depth >= settings.max_depth {
            tree.oversized_leaves += 1;
            continue;
        }

        let children = split_node(&mut tree, task.node, &task.aabb);
        for (child, aabb) in children {
            if leaf_len(&tree.nodes[child]) > settings.max_triangles_per_leaf {
                queue.push(SplitTask {
                    node: child,
                    aabb,
                    depth: task.depth + 1,
                });
            }
        }
    }

    if tree.oversized_leaves > 0 {
        tracing::warn!(
            oversized_leaves = tree.oversized_leaves,
            max_depth = settings.max_depth,
            "depth limit reached, keeping oversized leaves"
        );
    }

    Ok(tree)
}

/// Split a leaf in two, converting it into an internal node.
///
/// Returns the new children with their (loose) boxes.
fn split_node<A, U>(tree: &mut BuildTree<A, U>, node: usize, aabb: &Aabb3) -> [(usize, Aabb3); 2] {
    let (axis, first, second) = aabb.split_longest();
    let mid = first.max[axis.index()];

    let triangles = match &mut tree.nodes[node] {
        BuildNode::Leaf { triangles } => std::mem::take(triangles),
        BuildNode::Internal { .. } => unreachable!("only leaves are queued for splitting"),
    };

    let mut lower = Vec::with_capacity(triangles.len());
    let mut upper = Vec::with_capacity(triangles.len());

    for triangle in triangles {
        let center = centroid(&tree.vertices, &triangle);
        // The cut plane belongs to the upper half
        if first.contains(&center) && center[axis.index()] < mid {
            lower.push(triangle);
        } else if second.contains(&center) {
            upper.push(triangle);
        } else if lower.len() < upper.len() {
            lower.push(triangle);
        } else {
            upper.push(triangle);
        }
    }

    lower.shrink_to_fit();
    upper.shrink_to_fit();

    let left = tree.nodes.len();
    tree.nodes.push(BuildNode::Leaf { triangles: lower });
    let right = tree.nodes.len();
    tree.nodes.push(BuildNode::Leaf { triangles: upper });

    tree.nodes[node] = BuildNode::Internal {
        boxes: [first, second],
        children: [left, right],
    };

    [(left, first), (right, second)]
}

fn leaf_len<A, U>(node: &BuildNode<A, U>) -> usize {
    match node {
        BuildNode::Leaf { triangles } => triangles.len(),
        BuildNode::Internal { .. } => 0,
    }
}

/// Average of the triangle's three vertex positions.
fn centroid<A, U>(vertices: &[Vertex<A>], triangle: &Triangle<A, U>) -> Point3 {
    let [a, b, c] = triangle.indices.map(|i| vertices[i as usize].position.coords);
    Point3::from((a + b + c) / 3.0)
}
