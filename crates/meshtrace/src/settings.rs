//! Build parameters.

use serde::{Deserialize, Serialize};

use crate::error::{MeshtraceError, Result};

/// Leaf capacity used when no settings are supplied.
pub const DEFAULT_MAX_TRIANGLES_PER_LEAF: usize = 8;

/// Maximum split depth before a node is kept as an oversized leaf.
pub const DEFAULT_MAX_DEPTH: u32 = 64;

/// Largest accepted `max_depth`.
///
/// Flattening and both queries recurse once per tree level, so the depth
/// bounds their stack use.
pub const MAX_SUPPORTED_DEPTH: u32 = 1024;

/// Parameters controlling how the tree is partitioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSettings {
    /// Nodes holding more triangles than this are split.
    pub max_triangles_per_leaf: usize,
    /// Nodes at this depth are never split, regardless of size. Must lie in
    /// `1..=MAX_SUPPORTED_DEPTH`.
    pub max_depth: u32,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            max_triangles_per_leaf: DEFAULT_MAX_TRIANGLES_PER_LEAF,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl BuildSettings {
    /// Settings with the given leaf capacity and the default depth limit.
    pub fn with_max_triangles_per_leaf(max_triangles_per_leaf: usize) -> Self {
        Self {
            max_triangles_per_leaf,
            ..Self::default()
        }
    }

    /// Validate settings.
    pub fn validate(&self) -> Result<()> {
        if self.max_triangles_per_leaf == 0 {
            return Err(MeshtraceError::InvalidSettings(
                "max_triangles_per_leaf must be at least 1".into(),
            ));
        }
        if self.max_depth == 0 {
            return Err(MeshtraceError::InvalidSettings(
                "max_depth must be at least 1".into(),
            ));
        }
        if self.max_depth > MAX_SUPPORTED_DEPTH {
            return Err(MeshtraceError::InvalidSettings(format!(
                "max_depth {} exceeds the supported maximum of {MAX_SUPPORTED_DEPTH}",
                self.max_depth
            )));
        }
        Ok(())
    }
}
