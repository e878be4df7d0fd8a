//! Binary entity wire format for meshes and objects.
//!
//! The field order is fixed and shared with existing cache files, see
//! [`Mesh::write_binary`].

use std::{
    collections::HashMap,
    io::{Read, Write},
    rc::Rc,
};

use bitflags::bitflags;
use scene_common::{
    wire::{invalid_data, WireRead, WireWrite},
    Pose,
};

use crate::{
    error::{DecodeError, SceneError},
    mesh::{Mesh, MeshFlags, PMesh},
    object::Object,
    shader::{PShader, Shader},
    world_object::HasWorldObject,
};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SerializationFlags: u8 {
        const USE_ALPHAS = 1;
        const USE_SUBDIV_FACES = 1 << 1;
    }
}

fn write_pose<W: Write>(w: &mut W, pose: &Pose) -> std::io::Result<()> {
    let [x, y, z, qw] = pose.quaternion();
    let position: [f32; 3] = pose.position.into();
    let scale: [f32; 3] = pose.scale.into();
    w.write_f32s(&position)?;
    w.write_f32s(&[qw, x, y, z])?;
    w.write_f32s(&scale)
}

fn read_pose<R: Read>(r: &mut R) -> std::io::Result<Pose> {
    let position = r.read_f32_array::<3>()?;
    let [qw, x, y, z] = r.read_f32_array::<4>()?;
    let scale = r.read_f32_array::<3>()?;
    Ok(Pose::from_arrays(position, [x, y, z, qw], scale))
}

impl Mesh {
    /// Writes the filled part of the mesh.
    ///
    /// Layout: name, mesh flags, vertex count, triangle count, serialization flags,
    /// per-vertex positions, uvs, tangents, tangent signs and optional alphas, then
    /// triangles, triangle shaders, smooth flags, then normals, per-corner uvs,
    /// tangents, tangent signs and optional alphas, then the sub-mesh shader indices
    /// and the lightmap uvs.
    pub fn write_binary<W: Write>(
        &self,
        w: &mut W,
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
            .collect::<Result<Vec<_>, _>>()?;

        let vertex_count = self.vertices.len();
        let corner_count = self.triangles.len();
        let mut flags = SerializationFlags::empty();
        if self.flags.intersects(MeshFlags::HAS_ALPHAS | MeshFlags::HAS_WRINKLES) {
            flags |= SerializationFlags::USE_ALPHAS;
        }
        let mut alphas = self.alphas.clone();
        alphas.resize(vertex_count, 0.0);

        w.write_cstring(&self.name)?;
        w.write_u8(self.flags.bits())?;
        w.write_u64(vertex_count as u64)?;
        w.write_u64((corner_count / 3) as u64)?;
        w.write_u8(flags.bits())?;

        for v in &self.vertices {
            w.write_padded_vec3(*v)?;
        }
        for uv in &self.per_vertex_uvs {
            w.write_f32s(uv)?;
        }
        for tangent in &self.per_vertex_tangents {
            w.write_f32s(tangent)?;
        }
        for t in &self.per_vertex_tangents {
            w.write_f32(t[3])?;
        }
        if flags.contains(SerializationFlags::USE_ALPHAS) {
            w.write_f32s(&alphas)?;
        }

        for index in &self.triangles {
            w.write_u32(*index)?;
        }
        for shader in &self.shader_indices {
            w.write_u32(*shader)?;
        }
        for smooth in &self.smooth {
            w.write_bool(*smooth)?;
        }

        for normal in &self.normals[..vertex_count] {
            w.write_padded_vec3(*normal)?;
        }
        for uv in &self.uvs[..corner_count] {
            w.write_f32s(uv)?;
        }
        for tangent in &self.tangents[..corner_count] {
            w.write_padded_vec3(*tangent)?;
        }
        w.write_f32s(&self.tangent_signs[..corner_count])?;
        if flags.contains(SerializationFlags::USE_ALPHAS) {
            w.write_f32s(&alphas)?;
        }

        w.write_u64(shader_indices.len() as u64)?;
        for index in shader_indices {
            w.write_u32(index)?;
        }
        w.write_u64(self.lightmap_uvs.len() as u64)?;
        for uv in &self.lightmap_uvs {
            w.write_f32s(uv)?;
        }
        Ok(())
    }

    /// Reads a mesh written by [`Mesh::write_binary`]. The declared capacity of the
    /// result equals its filled size.
    pub fn read_binary<R: Read>(
        r: &mut R,
        get_shader: impl Fn(u32) -> Option<PShader>,
        shader_count: usize,
    ) -> Result<Mesh, DecodeError> {
        let name = r.read_cstring()?;
        let mesh_flags = r.read_u8()?;
        let mesh_flags = MeshFlags::from_bits(mesh_flags).ok_or_else(|| DecodeError::UnknownEnumValue {
            field: "flags",
            value: mesh_flags.to_string(),
        })?;
        let vertex_count = r.read_u64()?;
        let triangle_count = r.read_u64()?;
        let flags = r.read_u8()?;
        let flags = SerializationFlags::from_bits(flags).ok_or_else(|| DecodeError::UnknownEnumValue {
            field: "serializationFlags",
            value: flags.to_string(),
        })?;
        if flags.contains(SerializationFlags::USE_SUBDIV_FACES) {
            return Err(DecodeError::Unsupported("subdivision faces"));
        }
        let corner_count = triangle_count
            .checked_mul(3)
            .ok_or_else(|| invalid_data("triangle count overflows"))?;

        let vertices = r.read_items(vertex_count, |r| r.read_padded_vec3())?;
        let per_vertex_uvs = r.read_items(vertex_count, |r| r.read_f32_array::<2>())?;
        let tangents = r.read_items(vertex_count, |r| r.read_f32_array::<4>())?;
        let signs = r.read_items(vertex_count, |r| r.read_f32())?;
        if flags.contains(SerializationFlags::USE_ALPHAS) {
            r.read_items(vertex_count, |r| r.read_f32())?;
        }

        let triangles = r.read_items(corner_count, |r| r.read_u32())?;
        let shader_indices = r.read_items(triangle_count, |r| r.read_u32())?;
        let smooth = r.read_items(triangle_count, |r| r.read_bool())?;

        let normals = r.read_items(vertex_count, |r| r.read_padded_vec3())?;
        let uvs = r.read_items(corner_count, |r| r.read_f32_array::<2>())?;
        let corner_tangents = r.read_items(corner_count, |r| r.read_padded_vec3())?;
        let tangent_signs = r.read_items(corner_count, |r| r.read_f32())?;
        let alphas = if flags.contains(SerializationFlags::USE_ALPHAS) {
            r.read_items(vertex_count, |r| r.read_f32())?
        } else {
            Vec::new()
        };

        let sub_mesh_shader_count = r.read_u64()?;
        let sub_mesh_shaders = r.read_items(sub_mesh_shader_count, |r| r.read_u32())?;
        let sub_mesh_shaders = sub_mesh_shaders
            .into_iter()
            .map(|index| {
                get_shader(index).ok_or(DecodeError::MissingShaderIndex {
                    index,
                    shader_count,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let lightmap_count = r.read_u64()?;
        let lightmap_uvs = r.read_items(lightmap_count, |r| r.read_f32_array::<2>())?;

        let mut mesh = Mesh::new(name, vertices.len(), triangles.len() / 3, mesh_flags);
        mesh.vertices = vertices;
        mesh.normals = normals;
        mesh.per_vertex_uvs = per_vertex_uvs;
        mesh.per_vertex_tangents = tangents
            .into_iter()
            .zip(signs)
            .map(|([x, y, z, _], sign)| [x, y, z, sign])
            .collect();
        mesh.alphas = alphas;
        mesh.triangles = triangles;
        mesh.shader_indices = shader_indices;
        mesh.smooth = smooth;
        mesh.uvs = uvs;
        mesh.tangents = corner_tangents;
        mesh.tangent_signs = tangent_signs;
        mesh.sub_mesh_shaders = sub_mesh_shaders;
        mesh.lightmap_uvs = lightmap_uvs;
        Ok(mesh)
    }
}

impl Object {
    /// Layout: pose, mesh index, name.
    pub fn write_binary<W: Write>(&self, w: &mut W, mesh_index: u32) -> std::io::Result<()> {
        write_pose(w, self.pose())?;
        w.write_u32(mesh_index)?;
        w.write_cstring(self.name())
    }

    pub fn read_binary<R: Read>(
        r: &mut R,
        get_mesh: impl Fn(u32) -> Option<PMesh>,
        mesh_count: usize,
    ) -> Result<Object, DecodeError> {
        let pose = read_pose(r)?;
        let index = r.read_u32()?;
        let name = r.read_cstring()?;
        let mesh = get_mesh(index).ok_or(DecodeError::MissingMeshIndex { index, mesh_count })?;
        let mut object = Object::create(mesh);
        object.world_object_mut().set_pose(pose);
        object.set_name(name);
        Ok(object)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use ultraviolet::{Rotor3, Vec3};

    use super::*;
    use crate::mesh::Vertex;

    fn triangle_mesh(flags: MeshFlags) -> (Mesh, PShader) {
        let shader = Rc::new(Shader::new("default"));
        let mut mesh = Mesh::new("tri", 4, 2, flags);
        for i in 0..3 {
            let f = i as f32;
            assert!(mesh.add_vertex(Vertex {
                position: [f, 0.0, 1.0],
                normal: [0.0, 0.0, 1.0],
                uv: [f, 1.0],
                tangent: [1.0, 0.0, 0.0, -1.0],
            }));
        }
        assert!(mesh.add_triangle(0, 1, 2, 0));
        mesh.add_sub_mesh_shader(shader.clone());
        (mesh, shader)
    }

    #[test]
    fn mesh_round_trip_keeps_filled_data() {
        let (mut mesh, shader) = triangle_mesh(MeshFlags::HAS_ALPHAS);
        assert!(mesh.add_alpha(0.5));
        mesh.set_lightmap_uvs(vec![[0.25, 0.75]]);
        let table = HashMap::from([(Rc::as_ptr(&shader), 0usize)]);
        let mut buf = Vec::new();
        mesh.write_binary(&mut buf, &table).unwrap();

        let decoded =
            Mesh::read_binary(&mut Cursor::new(buf), |_| Some(shader.clone()), 1).unwrap();
        assert_eq!(decoded.vertex_count(), 3);
        assert_eq!(decoded.triangle_count(), 1);
        assert_eq!(decoded.vertices(), mesh.vertices());
        assert_eq!(decoded.triangles(), mesh.triangles());
        assert_eq!(decoded.per_vertex_tangents(), mesh.per_vertex_tangents());
        assert_eq!(decoded.uvs(), &mesh.uvs()[..3]);
        assert_eq!(decoded.alphas(), &[0.5, 0.0, 0.0]);
        assert_eq!(decoded.lightmap_uvs(), mesh.lightmap_uvs());
        assert!(decoded.validate().is_ok());
    }

    #[test]
    fn header_layout() {
        let (mesh, shader) = triangle_mesh(MeshFlags::empty());
        let table = HashMap::from([(Rc::as_ptr(&shader), 0usize)]);
        let mut buf = Vec::new();
        mesh.write_binary(&mut buf, &table).unwrap();
        assert_eq!(&buf[..4], b"tri\0");
        assert_eq!(buf[4], 0);
        assert_eq!(&buf[5..13], &3u64.to_le_bytes());
        assert_eq!(&buf[13..21], &1u64.to_le_bytes());
        assert_eq!(buf[21], 0);
        // first vertex position plus padding
        let mut first_vertex = vec![0u8; 8];
        first_vertex.extend_from_slice(&1.0f32.to_le_bytes());
        first_vertex.extend_from_slice(&[0; 4]);
        assert_eq!(&buf[22..38], &first_vertex[..]);
    }

    #[test]
    fn per_vertex_blocks_have_fixed_strides() {
        let (mesh, shader) = triangle_mesh(MeshFlags::empty());
        let table = HashMap::from([(Rc::as_ptr(&shader), 0usize)]);
        let mut buf = Vec::new();
        mesh.write_binary(&mut buf, &table).unwrap();

        let f32_at = |offset: usize| f32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap());
        let u32_at = |offset: usize| u32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap());

        // 22 header, 3 * 16 positions, 3 * 8 uvs
        let tangents = 22 + 48 + 24;
        assert_eq!(
            [f32_at(tangents), f32_at(tangents + 4), f32_at(tangents + 8), f32_at(tangents + 12)],
            [1.0, 0.0, 0.0, -1.0]
        );
        let signs = tangents + 3 * 16;
        assert_eq!([f32_at(signs), f32_at(signs + 4), f32_at(signs + 8)], [-1.0; 3]);

        let triangles = signs + 3 * 4;
        assert_eq!(triangles, 154);
        assert_eq!(
            [u32_at(triangles), u32_at(triangles + 4), u32_at(triangles + 8)],
            [0, 2, 1]
        );
        assert_eq!(u32_at(triangles + 12), 0);
        assert_eq!(buf[triangles + 16], 1);

        // normals, corner uvs, corner tangents, corner signs, then the sub-mesh shaders
        let sub_mesh_shaders = triangles + 17 + 3 * 16 + 3 * 8 + 3 * 16 + 3 * 4;
        assert_eq!(&buf[sub_mesh_shaders..sub_mesh_shaders + 8], &1u64.to_le_bytes());
        assert_eq!(u32_at(sub_mesh_shaders + 8), 0);
        assert_eq!(&buf[sub_mesh_shaders + 12..], &0u64.to_le_bytes());
    }

    #[test]
    fn subdivision_payload_is_rejected() {
        let mut buf = Vec::new();
        buf.write_cstring("m").unwrap();
        buf.write_u8(0).unwrap();
        buf.write_u64(0).unwrap();
        buf.write_u64(0).unwrap();
        buf.write_u8(SerializationFlags::USE_SUBDIV_FACES.bits()).unwrap();
        let err = Mesh::read_binary(&mut Cursor::new(buf), |_| None, 0).unwrap_err();
        assert!(matches!(err, DecodeError::Unsupported(_)));
    }

    #[test]
    fn truncated_mesh_is_a_wire_error() {
        let (mesh, shader) = triangle_mesh(MeshFlags::empty());
        let table = HashMap::from([(Rc::as_ptr(&shader), 0usize)]);
        let mut buf = Vec::new();
        mesh.write_binary(&mut buf, &table).unwrap();
        buf.truncate(buf.len() - 3);
        let err = Mesh::read_binary(&mut Cursor::new(buf), |_| Some(shader.clone()), 1).unwrap_err();
        assert!(matches!(err, DecodeError::Wire(_)));
    }

    #[test]
    fn object_round_trip() {
        let (mesh, _) = triangle_mesh(MeshFlags::empty());
        let mesh = Rc::new(mesh);
        let mut object = Object::create(mesh.clone());
        object.set_name("rock");
        object.set_pose(Pose {
            position: Vec3::new(1.0, 2.0, 3.0),
            orientation: Rotor3::from_rotation_xy(0.5),
            scale: Vec3::new(2.0, 2.0, 2.0),
        });
        let mut buf = Vec::new();
        object.write_binary(&mut buf, 0).unwrap();
        assert_eq!(buf.len(), 40 + 4 + 5);

        let decoded = Object::read_binary(&mut Cursor::new(buf), |_| Some(mesh.clone()), 1).unwrap();
        assert_eq!(decoded.name(), "rock");
        assert_eq!(decoded.pose().position, object.pose().position);
        assert_eq!(decoded.pose().scale, object.pose().scale);
        assert!(Rc::ptr_eq(decoded.mesh(), &mesh));
    }
}
