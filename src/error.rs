use std::io;

use scene_common::{DocumentError, HashError, PropertyError};
use thiserror::Error;

/// Malformed persisted data. Every input is treated as untrusted.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error(transparent)]
    Property(#[from] PropertyError),
    #[error("malformed hash: {0}")]
    Hash(#[from] HashError),
    #[error("mesh index {index} is out of range, the chunk has {mesh_count} meshes")]
    MissingMeshIndex { index: u32, mesh_count: usize },
    #[error("shader index {index} is out of range, the shader cache has {shader_count} shaders")]
    MissingShaderIndex { index: u32, shader_count: usize },
    #[error("node index {index} is out of range, the graph has {node_count} nodes")]
    MissingNodeIndex { index: u32, node_count: usize },
    #[error("unknown value {value:?} for {field:?}")]
    UnknownEnumValue { field: &'static str, value: String },
    #[error("field {field:?} has {actual} entries, expected {expected}")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("unsupported: {0}")]
    Unsupported(&'static str),
    #[error("wire format: {0}")]
    Wire(#[from] io::Error),
}

/// A mesh whose contents violate its own invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MeshValidationError {
    #[error("mesh {mesh:?}: triangle {triangle} references vertex {index}, but the mesh only has {vertex_count} vertices")]
    TriangleIndexOutOfRange {
        mesh: String,
        triangle: usize,
        index: u32,
        vertex_count: usize,
    },
    #[error("mesh {mesh:?}: triangle {triangle} uses shader {index}, but the mesh only has {shader_count} sub-mesh shaders")]
    ShaderIndexOutOfRange {
        mesh: String,
        triangle: usize,
        index: u32,
        shader_count: usize,
    },
}

#[derive(Debug, Error)]
pub enum SceneError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error("failed to decode scene data: {0}")]
    Decode(#[from] DecodeError),
    #[error("validation failed: {0}")]
    Validation(#[from] MeshValidationError),
    #[error("{kind} {name:?} is not part of the chunk being baked")]
    UnresolvedReference { kind: &'static str, name: String },
}

impl From<PropertyError> for SceneError {
    fn from(err: PropertyError) -> Self {
        SceneError::Decode(err.into())
    }
}
