//! Error types for building acceleration structures.

use thiserror::Error;

/// Errors that can occur while ingesting geometry or building.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MeshtraceError {
    /// A triangle references a vertex that does not exist.
    #[error("triangle {triangle} references vertex {index}, but only {vertex_count} vertices exist")]
    VertexIndexOutOfRange {
        /// Position of the offending triangle in the input list.
        triangle: usize,
        /// The out-of-range vertex index.
        index: u32,
        /// Number of vertices in the store.
        vertex_count: usize,
    },

    /// More vertices were supplied than `u32` indices can address.
    #[error("too many vertices: {0} exceeds the u32 index range")]
    TooManyVertices(usize),

    /// An index buffer whose length is not a multiple of three.
    #[error("index buffer length {0} is not a multiple of 3")]
    MalformedIndexBuffer(usize),

    /// Invalid build settings.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),
}

/// Result type for meshtrace operations.
pub type Result<T> = std::result::Result<T, MeshtraceError>;
