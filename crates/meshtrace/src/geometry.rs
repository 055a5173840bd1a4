//! Geometry ingestion: vertices, triangles and the pre-build store.

use std::fmt;
use std::ops::{Add, Mul};

use meshtrace_math::{Point3, Transform};

use crate::error::{MeshtraceError, Result};
use crate::intersect::TriangleHit;
use crate::settings::BuildSettings;
use crate::{build, flatten, AccelerationStructure, Ray};

/// A mesh vertex: a position plus renderer-owned attributes.
///
/// Only the position is read by the acceleration structure; `attributes`
/// is carried through untouched so hit filters and shading code can
/// interpolate normals, texture coordinates and the like.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vertex<A = ()> {
    /// World-space position.
    pub position: Point3,
    /// Opaque per-vertex payload.
    pub attributes: A,
}

impl<A> Vertex<A> {
    /// Create a vertex with attributes.
    pub fn new(position: Point3, attributes: A) -> Self {
        Self {
            position,
            attributes,
        }
    }
}

impl Vertex {
    /// Create a position-only vertex.
    pub fn at(x: f32, y: f32, z: f32) -> Self {
        Self::new(Point3::new(x, y, z), ())
    }
}

/// Decides whether a candidate intersection counts as a hit.
///
/// Returning `false` discards the candidate (alpha-masked geometry, for
/// example) and traversal continues past it.
pub type HitFilter<A, U> = fn(&Candidate<'_, A, U>) -> bool;

/// An intersection under consideration by a [`HitFilter`].
pub struct Candidate<'a, A, U> {
    /// The ray being traced.
    pub ray: &'a Ray,
    /// The intersected triangle.
    pub triangle: &'a Triangle<A, U>,
    /// The triangle's three vertices.
    pub vertices: [&'a Vertex<A>; 3],
    /// Distance and barycentric coordinates of the intersection.
    pub hit: TriangleHit,
}

impl<A, U> Candidate<'_, A, U> {
    /// World-space intersection point.
    pub fn point(&self) -> Point3 {
        self.ray.at(self.hit.t)
    }

    /// Interpolate a per-vertex quantity at the intersection.
    pub fn interpolate<T>(&self, attribute: impl Fn(&Vertex<A>) -> T) -> T
    where
        T: Add<Output = T> + Mul<f32, Output = T>,
    {
        interpolate(&self.vertices, self.hit.barycentric(), attribute)
    }
}

/// Blend a per-vertex quantity with barycentric weights.
pub(crate) fn interpolate<A, T>(
    vertices: &[&Vertex<A>; 3],
    weights: [f32; 3],
    attribute: impl Fn(&Vertex<A>) -> T,
) -> T
where
    T: Add<Output = T> + Mul<f32, Output = T>,
{
    attribute(vertices[0]) * weights[0]
        + attribute(vertices[1]) * weights[1]
        + attribute(vertices[2]) * weights[2]
}

/// A triangle referencing three vertices by index.
pub struct Triangle<A = (), U = ()> {
    /// Indices into the vertex array.
    pub indices: [u32; 3],
    /// Opaque per-triangle payload returned with hits.
    pub user_data: U,
    /// Optional predicate consulted before a hit is accepted.
    pub filter: Option<HitFilter<A, U>>,
}

impl<A, U> Triangle<A, U> {
    /// Create a triangle without a hit filter.
    pub fn new(indices: [u32; 3], user_data: U) -> Self {
        Self {
            indices,
            user_data,
            filter: None,
        }
    }

    /// Attach a hit filter.
    pub fn with_filter(mut self, filter: HitFilter<A, U>) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Largest vertex index referenced by this triangle.
    #[inline]
    pub fn max_index(&self) -> u32 {
        self.indices[0].max(self.indices[1]).max(self.indices[2])
    }
}

impl<A> Triangle<A, ()> {
    /// Create a triangle with no payload.
    pub fn from_indices(indices: [u32; 3]) -> Self {
        Self::new(indices, ())
    }
}

impl<A, U: Clone> Clone for Triangle<A, U> {
    fn clone(&self) -> Self {
        Self {
            indices: self.indices,
            user_data: self.user_data.clone(),
            filter: self.filter,
        }
    }
}

impl<A, U: Copy> Copy for Triangle<A, U> {}

impl<A, U: PartialEq> PartialEq for Triangle<A, U> {
    fn eq(&self, other: &Self) -> bool {
        self.indices == other.indices
            && self.user_data == other.user_data
            && self.filter.is_some() == other.filter.is_some()
    }
}

impl<A, U: fmt::Debug> fmt::Debug for Triangle<A, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Triangle")
            .field("indices", &self.indices)
            .field("user_data", &self.user_data)
            .field("filtered", &self.filter.is_some())
            .finish()
    }
}

/// Vertices and triangles collected before building.
///
/// Building consumes the store, so geometry cannot be added to a frozen
/// structure.
pub struct GeometryStore<A = (), U = ()> {
    pub(crate) vertices: Vec<Vertex<A>>,
    pub(crate) triangles: Vec<Triangle<A, U>>,
}

impl<A, U> Default for GeometryStore<A, U> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A, U> GeometryStore<A, U> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            triangles: Vec::new(),
        }
    }

    /// Create an empty store with preallocated capacity.
    pub fn with_capacity(vertices: usize, triangles: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertices),
            triangles: Vec::with_capacity(triangles),
        }
    }

    /// Number of vertices added so far.
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of triangles added so far.
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Vertices added so far.
    pub fn vertices(&self) -> &[Vertex<A>] {
        &self.vertices
    }

    /// Triangles added so far, in insertion order.
    pub fn triangles(&self) -> &[Triangle<A, U>] {
        &self.triangles
    }

    /// Append a vertex and return its index.
    ///
    /// # Panics
    ///
    /// Panics if the store already holds `u32::MAX + 1` vertices.
    pub fn add_vertex(&mut self, vertex: Vertex<A>) -> u32 {
        let index = u32::try_from(self.vertices.len())
            .unwrap_or_else(|_| panic!("{}", MeshtraceError::TooManyVertices(self.vertices.len())));
        self.vertices.push(vertex);
        index
    }

    /// Append a triangle whose vertices have already been added.
    pub fn try_add_triangle(&mut self, triangle: Triangle<A, U>) -> Result<()> {
        if let Some(&index) = triangle
            .indices
            .iter()
            .find(|&&i| i as usize >= self.vertices.len())
        {
            return Err(MeshtraceError::VertexIndexOutOfRange {
                triangle: self.triangles.len(),
                index,
                vertex_count: self.vertices.len(),
            });
        }
        self.triangles.push(triangle);
        Ok(())
    }

    /// Append a triangle whose vertices have already been added.
    ///
    /// # Panics
    ///
    /// Panics if any index is not below the current vertex count. An
    /// out-of-range index means the upstream asset is corrupt.
    pub fn add_triangle(&mut self, triangle: Triangle<A, U>) {
        if let Err(err) = self.try_add_triangle(triangle) {
            panic!("{err}");
        }
    }

    /// Append a triangle without checking its indices.
    ///
    /// The vertices may be added afterwards; indices are checked when the
    /// store is built.
    pub fn add_triangle_unchecked(&mut self, triangle: Triangle<A, U>) {
        self.triangles.push(triangle);
    }

    /// Append an indexed mesh placed in the world by `transform`.
    ///
    /// `indices` are relative to `vertices` and are offset by the current
    /// vertex count. Every triangle of the mesh receives a clone of
    /// `user_data` and the same filter. Returns the index of the mesh's
    /// first vertex. On error the store is left unchanged.
    pub fn add_mesh(
        &mut self,
        vertices: Vec<Vertex<A>>,
        indices: &[u32],
        transform: &Transform,
        user_data: U,
        filter: Option<HitFilter<A, U>>,
    ) -> Result<u32>
    where
        U: Clone,
    {
        if indices.len() % 3 != 0 {
            return Err(MeshtraceError::MalformedIndexBuffer(indices.len()));
        }
        let total = self.vertices.len() + vertices.len();
        if total > u32::MAX as usize {
            return Err(MeshtraceError::TooManyVertices(total));
        }
        if let Some((position, &index)) = indices
            .iter()
            .enumerate()
            .find(|&(_, &i)| i as usize >= vertices.len())
        {
            return Err(MeshtraceError::VertexIndexOutOfRange {
                triangle: self.triangles.len() + position / 3,
                index,
                vertex_count: vertices.len(),
            });
        }

        let offset = self.vertices.len() as u32;
        let identity = transform.is_identity();
        self.vertices.extend(vertices.into_iter().map(|mut v| {
            if !identity {
                v.position = transform.apply_point(&v.position);
            }
            v
        }));
        self.triangles.extend(indices.chunks_exact(3).map(|t| Triangle {
            indices: [offset + t[0], offset + t[1], offset + t[2]],
            user_data: user_data.clone(),
            filter,
        }));

        Ok(offset)
    }

    /// Check every triangle's indices against the vertex count.
    pub fn validate(&self) -> Result<()> {
        if self.vertices.len() > u32::MAX as usize {
            return Err(MeshtraceError::TooManyVertices(self.vertices.len()));
        }
        for (position, triangle) in self.triangles.iter().enumerate() {
            let index = triangle.max_index();
            if index as usize >= self.vertices.len() {
                return Err(MeshtraceError::VertexIndexOutOfRange {
                    triangle: position,
                    index,
                    vertex_count: self.vertices.len(),
                });
            }
        }
        Ok(())
    }

    /// Build with the given leaf capacity and the default depth limit.
    pub fn build(self, max_triangles_per_leaf: usize) -> Result<AccelerationStructure<A, U>> {
        self.build_with(&BuildSettings::with_max_triangles_per_leaf(max_triangles_per_leaf))
    }

    /// Partition, flatten and freeze the geometry.
    #[tracing::instrument(
        skip_all,
        fields(triangles = self.triangles.len(), vertices = self.vertices.len())
    )]
    pub fn build_with(self, settings: &BuildSettings) -> Result<AccelerationStructure<A, U>> {
        let tree = build::build_tree(self, settings)?;
        let arena = flatten::flatten(tree);
        Ok(AccelerationStructure::from_arena(arena))
    }
}
