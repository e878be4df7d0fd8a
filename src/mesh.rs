use std::{cell::Cell, collections::HashMap, rc::Rc};

use bitflags::bitflags;
use scene_common::{ContentHash, Element};

use crate::{
    error::{DecodeError, MeshValidationError, SceneError},
    scene::Scene,
    scene_object::{FinalizeState, SceneObject},
    shader::{PShader, Shader},
};

pub type PMesh = Rc<Mesh>;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MeshFlags: u8 {
        const HAS_ALPHAS = 1;
        const HAS_WRINKLES = 1 << 1;
    }
}

/// Input of [`Mesh::add_vertex`].
#[derive(Clone, Debug, Copy, Default, PartialEq)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    /// `xyz` is the tangent, `w` its sign.
    pub tangent: [f32; 4],
}

/// Geometry with a capacity fixed at creation.
///
/// Per-vertex normals and all per-corner buffers are allocated up front, so their
/// lengths are always `vertex_count` and `triangle_count * 3`. Everything else grows
/// as data is added.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub(crate) name: String,
    pub(crate) flags: MeshFlags,
    pub(crate) vertex_count: usize,
    pub(crate) triangle_count: usize,

    pub(crate) vertices: Vec<[f32; 3]>,
    pub(crate) normals: Vec<[f32; 3]>,
    pub(crate) per_vertex_uvs: Vec<[f32; 2]>,
    pub(crate) per_vertex_tangents: Vec<[f32; 4]>,
    /// Shared by alphas and wrinkle factors, only one of them is ever in use.
    pub(crate) alphas: Vec<f32>,

    pub(crate) triangles: Vec<u32>,
    pub(crate) shader_indices: Vec<u32>,
    pub(crate) smooth: Vec<bool>,

    pub(crate) uvs: Vec<[f32; 2]>,
    pub(crate) tangents: Vec<[f32; 3]>,
    pub(crate) tangent_signs: Vec<f32>,

    pub(crate) lightmap_uvs: Vec<[f32; 2]>,
    pub(crate) sub_mesh_shaders: Vec<PShader>,

    hash: Cell<Option<ContentHash>>,
    id: Cell<Option<u32>>,
    finalize_state: FinalizeState,
}

impl Mesh {
    pub fn new(name: impl Into<String>, vertex_count: usize, triangle_count: usize, flags: MeshFlags) -> Self {
        let corner_count = triangle_count * 3;
        Self {
            name: name.into(),
            flags,
            vertex_count,
            triangle_count,
            vertices: Vec::with_capacity(vertex_count),
            normals: vec![[0.0; 3]; vertex_count],
            per_vertex_uvs: Vec::with_capacity(vertex_count),
            per_vertex_tangents: Vec::with_capacity(vertex_count),
            alphas: Vec::new(),
            triangles: Vec::with_capacity(corner_count),
            shader_indices: Vec::with_capacity(triangle_count),
            smooth: Vec::with_capacity(triangle_count),
            uvs: vec![[0.0; 2]; corner_count],
            tangents: vec![[0.0; 3]; corner_count],
            tangent_signs: vec![0.0; corner_count],
            lightmap_uvs: Vec::new(),
            sub_mesh_shaders: Vec::new(),
            hash: Cell::new(None),
            id: Cell::new(None),
            finalize_state: FinalizeState::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn flags(&self) -> MeshFlags {
        self.flags
    }

    pub fn has_alphas(&self) -> bool {
        self.flags.contains(MeshFlags::HAS_ALPHAS)
    }

    pub fn has_wrinkles(&self) -> bool {
        self.flags.contains(MeshFlags::HAS_WRINKLES)
    }

    /// Declared vertex capacity.
    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    /// Declared triangle capacity.
    pub fn triangle_count(&self) -> usize {
        self.triangle_count
    }

    pub fn vertices(&self) -> &[[f32; 3]] {
        &self.vertices
    }

    pub fn normals(&self) -> &[[f32; 3]] {
        &self.normals
    }

    pub fn per_vertex_uvs(&self) -> &[[f32; 2]] {
        &self.per_vertex_uvs
    }

    pub fn per_vertex_tangents(&self) -> &[[f32; 4]] {
        &self.per_vertex_tangents
    }

    pub fn alphas(&self) -> &[f32] {
        &self.alphas
    }

    /// Three vertex indices per added triangle, in stored winding order.
    pub fn triangles(&self) -> &[u32] {
        &self.triangles
    }

    pub fn shader_indices(&self) -> &[u32] {
        &self.shader_indices
    }

    pub fn smooth(&self) -> &[bool] {
        &self.smooth
    }

    pub fn uvs(&self) -> &[[f32; 2]] {
        &self.uvs
    }

    pub fn tangents(&self) -> &[[f32; 3]] {
        &self.tangents
    }

    pub fn tangent_signs(&self) -> &[f32] {
        &self.tangent_signs
    }

    pub fn lightmap_uvs(&self) -> &[[f32; 2]] {
        &self.lightmap_uvs
    }

    pub fn set_lightmap_uvs(&mut self, uvs: Vec<[f32; 2]>) {
        self.lightmap_uvs = uvs;
    }

    pub fn sub_mesh_shaders(&self) -> &[PShader] {
        &self.sub_mesh_shaders
    }

    pub fn add_sub_mesh_shader(&mut self, shader: PShader) -> u32 {
        self.sub_mesh_shaders.push(shader);
        (self.sub_mesh_shaders.len() - 1) as u32
    }

    /// Content hash of the last bake.
    pub fn hash(&self) -> Option<ContentHash> {
        self.hash.get()
    }

    pub(crate) fn set_hash(&self, hash: Option<ContentHash>) {
        self.hash.set(hash);
    }

    /// Set by scene finalization.
    pub fn id(&self) -> Option<u32> {
        self.id.get()
    }

    pub(crate) fn set_id(&self, id: u32) {
        self.id.set(Some(id));
    }

    pub fn added_triangle_count(&self) -> usize {
        self.triangles.len() / 3
    }

    #[must_use]
    pub fn add_vertex(&mut self, vertex: Vertex) -> bool {
        let index = self.vertices.len();
        if index >= self.vertex_count {
            return false;
        }
        self.normals[index] = vertex.normal;
        self.vertices.push(vertex.position);
        self.per_vertex_uvs.push(vertex.uv);
        self.per_vertex_tangents.push(vertex.tangent);
        true
    }

    #[must_use]
    pub fn add_alpha(&mut self, alpha: f32) -> bool {
        self.has_alphas() && self.push_alpha(alpha)
    }

    #[must_use]
    pub fn add_wrinkle_factor(&mut self, factor: f32) -> bool {
        self.has_wrinkles() && self.push_alpha(factor)
    }

    /// One value per added vertex, so a vertex has to be added before its alpha.
    fn push_alpha(&mut self, value: f32) -> bool {
        if self.alphas.len() >= self.vertices.len() {
            return false;
        }
        self.alphas.push(value);
        true
    }

    /// Adds a triangle with its winding order inverted, `(i0, i1, i2)` is stored as
    /// `(i0, i2, i1)`. Fails without changing the mesh if the triangle capacity is
    /// exhausted or a corner references a vertex that has not been added yet.
    #[must_use]
    pub fn add_triangle(&mut self, i0: u32, i1: u32, i2: u32, shader_index: u32) -> bool {
        let (i1, i2) = (i2, i1);
        let triangle = self.added_triangle_count();
        if triangle >= self.triangle_count {
            return false;
        }
        let corners = [i0 as usize, i1 as usize, i2 as usize];
        if corners.iter().any(|&i| i >= self.per_vertex_uvs.len()) {
            return false;
        }

        self.triangles.extend_from_slice(&[i0, i1, i2]);
        self.shader_indices.push(shader_index);
        self.smooth.push(true);

        let offset = triangle * 3;
        for (corner, vertex) in corners.into_iter().enumerate() {
            let [x, y, z, sign] = self.per_vertex_tangents[vertex];
            self.uvs[offset + corner] = self.per_vertex_uvs[vertex];
            self.tangents[offset + corner] = [x, y, z];
            self.tangent_signs[offset + corner] = sign;
        }
        true
    }

    /// Appends `other`, shifting its vertex indices by this mesh's vertex count and its
    /// shader indices by this mesh's sub-mesh shader count. The shader lists must be
    /// compatible, which is up to the caller.
    pub fn merge(&mut self, other: &Mesh) {
        let vertex_offset = self.vertices.len();
        let corner_offset = self.triangles.len();
        let shader_offset = self.sub_mesh_shaders.len() as u32;
        let other_vertices = other.vertices.len();
        let other_corners = other.triangles.len();

        self.flags |= other.flags;
        self.vertex_count = vertex_offset + other.vertex_count;
        self.triangle_count = corner_offset / 3 + other.triangle_count;

        self.normals.truncate(vertex_offset);
        self.normals.extend_from_slice(&other.normals[..other_vertices]);
        self.normals.resize(self.vertex_count, [0.0; 3]);

        self.vertices.extend_from_slice(&other.vertices);
        self.per_vertex_uvs.extend_from_slice(&other.per_vertex_uvs);
        self.per_vertex_tangents.extend_from_slice(&other.per_vertex_tangents);
        if !other.alphas.is_empty() {
            self.alphas.resize(vertex_offset, 0.0);
            self.alphas.extend_from_slice(&other.alphas);
        }

        self.triangles
            .extend(other.triangles.iter().map(|i| i + vertex_offset as u32));
        self.shader_indices
            .extend(other.shader_indices.iter().map(|i| i + shader_offset));
        self.smooth.extend_from_slice(&other.smooth);

        let corner_count = self.triangle_count * 3;
        self.uvs.truncate(corner_offset);
        self.uvs.extend_from_slice(&other.uvs[..other_corners]);
        self.uvs.resize(corner_count, [0.0; 2]);
        self.tangents.truncate(corner_offset);
        self.tangents.extend_from_slice(&other.tangents[..other_corners]);
        self.tangents.resize(corner_count, [0.0; 3]);
        self.tangent_signs.truncate(corner_offset);
        self.tangent_signs
            .extend_from_slice(&other.tangent_signs[..other_corners]);
        self.tangent_signs.resize(corner_count, 0.0);

        self.lightmap_uvs.extend_from_slice(&other.lightmap_uvs);
        self.sub_mesh_shaders
            .extend(other.sub_mesh_shaders.iter().cloned());
        self.hash.set(None);
    }

    /// Every triangle corner must reference an added vertex and every triangle must use
    /// an existing sub-mesh shader.
    pub fn validate(&self) -> Result<(), MeshValidationError> {
        let vertex_count = self.vertices.len();
        for (i, &index) in self.triangles.iter().enumerate() {
            if index as usize >= vertex_count {
                return Err(MeshValidationError::TriangleIndexOutOfRange {
                    mesh: self.name.clone(),
                    triangle: i / 3,
                    index,
                    vertex_count,
                });
            }
        }
        let shader_count = self.sub_mesh_shaders.len();
        for (triangle, &index) in self.shader_indices.iter().enumerate() {
            if index as usize >= shader_count {
                return Err(MeshValidationError::ShaderIndexOutOfRange {
                    mesh: self.name.clone(),
                    triangle,
                    index,
                    shader_count,
                });
            }
        }
        Ok(())
    }

    /// Writes the baked form, without the hash. Sub-mesh shaders are written as indices
    /// into the chunk's shader cache.
    pub fn serialize(
        &self,
        element: &mut Element,
        shader_to_index: &HashMap<*const Shader, usize>,
    ) -> Result<(), SceneError> {
        let shader_indices = self
            .sub_mesh_shaders
            .iter()
            .map(|shader| {
                shader_to_index
                    .get(&Rc::as_ptr(shader))
                    .map(|&i| i as u32)
                    .ok_or_else(|| SceneError::UnresolvedReference {
                        kind: "shader",
                        name: shader.name.clone(),
                    })
            })
            .collect::<Result<Vec<u32>, _>>()?;

        element
            .insert("name", self.name.as_str())
            .insert("flags", self.flags.bits() as u32)
            .insert("vertexCount", self.vertex_count as u64)
            .insert("triangleCount", self.triangle_count as u64)
            .insert("vertices", self.vertices.clone())
            .insert("normals", self.normals.clone())
            .insert("perVertexUvs", self.per_vertex_uvs.clone())
            .insert("perVertexTangents", self.per_vertex_tangents.clone())
            .insert("triangles", self.triangles.clone())
            .insert("shaderIndices", self.shader_indices.clone())
            .insert(
                "smooth",
                self.smooth.iter().map(|&s| s as u8).collect::<Vec<u8>>(),
            )
            .insert("uvs", self.uvs.clone())
            .insert("tangents", self.tangents.clone())
            .insert("tangentSigns", self.tangent_signs.clone())
            .insert("lightmapUvs", self.lightmap_uvs.clone())
            .insert("subMeshShaders", shader_indices);
        if self.flags.intersects(MeshFlags::HAS_ALPHAS | MeshFlags::HAS_WRINKLES) {
            element.insert("alphas", self.alphas.clone());
        }
        Ok(())
    }

    /// Rebuilds a mesh from its baked form, resolving shader indices with `get_shader`.
    pub fn deserialize(
        element: &Element,
        get_shader: impl Fn(u32) -> Option<PShader>,
        shader_count: usize,
    ) -> Result<Self, DecodeError> {
        let flags = element.get_as::<u32>("flags")?;
        let flags = MeshFlags::from_bits(flags as u8)
            .filter(|_| flags <= u8::MAX as u32)
            .ok_or_else(|| DecodeError::UnknownEnumValue {
                field: "flags",
                value: flags.to_string(),
            })?;
        let vertex_count = to_usize(element.get_as::<u64>("vertexCount")?)?;
        let triangle_count = to_usize(element.get_as::<u64>("triangleCount")?)?;
        let corner_count = triangle_count
            .checked_mul(3)
            .ok_or(DecodeError::Unsupported("triangle count overflows"))?;

        let mut mesh = Mesh::new(element.get_as::<String>("name")?, 0, 0, flags);
        mesh.vertex_count = vertex_count;
        mesh.triangle_count = triangle_count;

        mesh.vertices = element.get_as("vertices")?;
        let added_vertices = mesh.vertices.len();
        if added_vertices > vertex_count {
            return Err(DecodeError::LengthMismatch {
                field: "vertices",
                expected: vertex_count,
                actual: added_vertices,
            });
        }
        mesh.normals = element.get_as("normals")?;
        check_len("normals", vertex_count, mesh.normals.len())?;
        mesh.per_vertex_uvs = element.get_as("perVertexUvs")?;
        check_len("perVertexUvs", added_vertices, mesh.per_vertex_uvs.len())?;
        mesh.per_vertex_tangents = element.get_as("perVertexTangents")?;
        check_len("perVertexTangents", added_vertices, mesh.per_vertex_tangents.len())?;
        if flags.intersects(MeshFlags::HAS_ALPHAS | MeshFlags::HAS_WRINKLES) {
            mesh.alphas = element.get_as("alphas")?;
            if mesh.alphas.len() > vertex_count {
                return Err(DecodeError::LengthMismatch {
                    field: "alphas",
                    expected: vertex_count,
                    actual: mesh.alphas.len(),
                });
            }
        }

        mesh.triangles = element.get_as("triangles")?;
        let added_corners = mesh.triangles.len();
        if added_corners % 3 != 0 || added_corners > corner_count {
            return Err(DecodeError::LengthMismatch {
                field: "triangles",
                expected: corner_count,
                actual: added_corners,
            });
        }
        mesh.shader_indices = element.get_as("shaderIndices")?;
        check_len("shaderIndices", added_corners / 3, mesh.shader_indices.len())?;
        let smooth: Vec<u8> = element.get_as("smooth")?;
        check_len("smooth", added_corners / 3, smooth.len())?;
        mesh.smooth = smooth.into_iter().map(|s| s != 0).collect();

        mesh.uvs = element.get_as("uvs")?;
        check_len("uvs", corner_count, mesh.uvs.len())?;
        mesh.tangents = element.get_as("tangents")?;
        check_len("tangents", corner_count, mesh.tangents.len())?;
        mesh.tangent_signs = element.get_as("tangentSigns")?;
        check_len("tangentSigns", corner_count, mesh.tangent_signs.len())?;

        mesh.lightmap_uvs = element.get_or("lightmapUvs", Vec::new())?;
        let shader_indices: Vec<u32> = element.get_as("subMeshShaders")?;
        mesh.sub_mesh_shaders = shader_indices
            .into_iter()
            .map(|index| {
                get_shader(index).ok_or(DecodeError::MissingShaderIndex {
                    index,
                    shader_count,
                })
            })
            .collect::<Result<_, _>>()?;
        Ok(mesh)
    }
}

fn to_usize(value: u64) -> Result<usize, DecodeError> {
    usize::try_from(value).map_err(|_| DecodeError::Unsupported("count does not fit in memory"))
}

fn check_len(field: &'static str, expected: usize, actual: usize) -> Result<(), DecodeError> {
    if expected != actual {
        return Err(DecodeError::LengthMismatch {
            field,
            expected,
            actual,
        });
    }
    Ok(())
}

impl SceneObject for Mesh {
    fn finalize_state(&self) -> &FinalizeState {
        &self.finalize_state
    }

    fn do_finalize(&self, _scene: &Scene) -> Result<(), SceneError> {
        self.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertex(i: usize) -> Vertex {
        let f = i as f32;
        Vertex {
            position: [f, f + 0.5, -f],
            normal: [0.0, 1.0, 0.0],
            uv: [f * 0.1, 1.0 - f * 0.1],
            tangent: [1.0, 0.0, 0.0, if i % 2 == 0 { 1.0 } else { -1.0 }],
        }
    }

    fn quad(name: &str) -> Mesh {
        let mut mesh = Mesh::new(name, 4, 2, MeshFlags::empty());
        for i in 0..4 {
            assert!(mesh.add_vertex(vertex(i)));
        }
        assert!(mesh.add_triangle(0, 1, 2, 0));
        assert!(mesh.add_triangle(0, 2, 3, 0));
        mesh.add_sub_mesh_shader(Rc::new(Shader::new("default")));
        mesh
    }

    #[test]
    fn add_vertex_respects_capacity() {
        let mut mesh = Mesh::new("m", 3, 1, MeshFlags::empty());
        for i in 0..3 {
            assert!(mesh.add_vertex(vertex(i)));
        }
        assert!(!mesh.add_vertex(vertex(3)));
        assert_eq!(mesh.vertices().len(), 3);
    }

    #[test]
    fn add_triangle_inverts_winding() {
        let mesh = quad("q");
        assert_eq!(&mesh.triangles()[..3], &[0, 2, 1]);
        assert_eq!(mesh.uvs()[1], vertex(2).uv);
        assert_eq!(mesh.tangent_signs()[2], vertex(1).tangent[3]);
        assert_eq!(mesh.smooth(), &[true, true]);
    }

    #[test]
    fn add_triangle_respects_capacity_and_prerequisites() {
        let mut mesh = Mesh::new("m", 3, 1, MeshFlags::empty());
        assert!(mesh.add_vertex(vertex(0)));
        assert!(mesh.add_vertex(vertex(1)));
        assert!(!mesh.add_triangle(0, 1, 2, 0));
        assert!(mesh.triangles().is_empty());

        assert!(mesh.add_vertex(vertex(2)));
        assert!(mesh.add_triangle(0, 1, 2, 0));
        assert!(!mesh.add_triangle(0, 1, 2, 0));
        assert_eq!(mesh.added_triangle_count(), 1);
    }

    #[test]
    fn alphas_need_their_flag() {
        let mut plain = Mesh::new("m", 2, 0, MeshFlags::empty());
        assert!(!plain.add_alpha(0.5));
        assert!(!plain.add_wrinkle_factor(0.5));

        let mut alpha = Mesh::new("m", 1, 0, MeshFlags::HAS_ALPHAS);
        assert!(!alpha.add_alpha(0.5));
        assert!(alpha.add_vertex(vertex(0)));
        assert!(alpha.add_alpha(0.5));
        assert!(!alpha.add_alpha(0.7));
        assert!(!alpha.add_wrinkle_factor(0.5));
        assert_eq!(alpha.alphas(), &[0.5]);

        let mut wrinkles = Mesh::new("m", 1, 0, MeshFlags::HAS_WRINKLES);
        assert!(wrinkles.add_vertex(vertex(0)));
        assert!(wrinkles.add_wrinkle_factor(0.25));
        assert_eq!(wrinkles.alphas(), &[0.25]);
    }

    #[test]
    fn validate_detects_bad_shader_indices() {
        let mut mesh = Mesh::new("m", 3, 1, MeshFlags::empty());
        for i in 0..3 {
            assert!(mesh.add_vertex(vertex(i)));
        }
        assert!(mesh.add_triangle(0, 1, 2, 1));
        mesh.add_sub_mesh_shader(Rc::new(Shader::new("only")));
        assert!(matches!(
            mesh.validate(),
            Err(MeshValidationError::ShaderIndexOutOfRange { index: 1, .. })
        ));
    }

    #[test]
    fn validate_detects_out_of_range_vertices() {
        let mut mesh = quad("q");
        mesh.vertices.truncate(2);
        assert!(matches!(
            mesh.validate(),
            Err(MeshValidationError::TriangleIndexOutOfRange { index: 2, vertex_count: 2, .. })
        ));
        assert!(quad("ok").validate().is_ok());
    }

    #[test]
    fn merge_shifts_indices() {
        let mut a = quad("a");
        let b = quad("b");
        a.merge(&b);
        assert_eq!(a.vertex_count(), 8);
        assert_eq!(a.triangle_count(), 4);
        assert_eq!(&a.triangles()[6..9], &[4, 6, 5]);
        assert_eq!(a.shader_indices(), &[0, 0, 1, 1]);
        assert_eq!(a.sub_mesh_shaders().len(), 2);
        assert_eq!(a.normals().len(), 8);
        assert_eq!(a.uvs().len(), 12);
        assert!(a.validate().is_ok());
    }

    #[test]
    fn merge_keeps_alphas_of_both_meshes() {
        let mut a = Mesh::new("a", 4, 0, MeshFlags::HAS_ALPHAS);
        for i in 0..2 {
            assert!(a.add_vertex(vertex(i)));
            assert!(a.add_alpha(0.25 * (i + 1) as f32));
        }
        assert!(!a.add_alpha(0.9));
        let mut b = Mesh::new("b", 1, 0, MeshFlags::HAS_ALPHAS);
        assert!(b.add_vertex(vertex(0)));
        assert!(b.add_alpha(1.0));

        a.merge(&b);
        assert_eq!(a.alphas(), &[0.25, 0.5, 1.0]);
        assert_eq!(a.vertices().len(), 3);
    }

    #[test]
    fn element_round_trip() {
        let mut mesh = quad("q");
        mesh.set_lightmap_uvs(vec![[0.0, 0.0], [1.0, 1.0]]);
        let shader = mesh.sub_mesh_shaders()[0].clone();
        let table = HashMap::from([(Rc::as_ptr(&shader), 0usize)]);
        let mut element = Element::new();
        mesh.serialize(&mut element, &table).unwrap();

        let decoded =
            Mesh::deserialize(&element, |i| (i == 0).then(|| shader.clone()), 1).unwrap();
        assert_eq!(decoded.vertices(), mesh.vertices());
        assert_eq!(decoded.normals(), mesh.normals());
        assert_eq!(decoded.triangles(), mesh.triangles());
        assert_eq!(decoded.shader_indices(), mesh.shader_indices());
        assert_eq!(decoded.uvs(), mesh.uvs());
        assert_eq!(decoded.tangents(), mesh.tangents());
        assert_eq!(decoded.tangent_signs(), mesh.tangent_signs());
        assert_eq!(decoded.lightmap_uvs(), mesh.lightmap_uvs());
        assert!(Rc::ptr_eq(&decoded.sub_mesh_shaders()[0], &shader));
    }

    #[test]
    fn missing_shader_is_a_decode_error() {
        let mesh = quad("q");
        let shader = mesh.sub_mesh_shaders()[0].clone();
        let table = HashMap::from([(Rc::as_ptr(&shader), 3usize)]);
        let mut element = Element::new();
        mesh.serialize(&mut element, &table).unwrap();
        let err = Mesh::deserialize(&element, |_| None, 0).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::MissingShaderIndex {
                index: 3,
                shader_count: 0
            }
        ));
    }

    #[test]
    fn truncated_buffers_are_rejected() {
        let mesh = quad("q");
        let shader = mesh.sub_mesh_shaders()[0].clone();
        let table = HashMap::from([(Rc::as_ptr(&shader), 0usize)]);
        let mut element = Element::new();
        mesh.serialize(&mut element, &table).unwrap();
        element.insert("uvs", vec![[0.0f32; 2]; 2]);
        let err = Mesh::deserialize(&element, |_| Some(shader.clone()), 1).unwrap_err();
        assert!(matches!(err, DecodeError::LengthMismatch { field: "uvs", .. }));
    }
}
