use std::{cell::RefCell, collections::HashMap, rc::Rc};

use scene_common::{
    hash_combine, hash_str, AssetDocument, AssetTypeId, ContentHash, DocumentAsset, Element,
    Property,
};

use crate::{
    error::{DecodeError, SceneError},
    mesh::{Mesh, PMesh},
    object::Object,
    shader::ShaderCache,
};

pub type PShaderCache = Rc<RefCell<ShaderCache>>;
pub type PModelCacheChunk = Rc<RefCell<ModelCacheChunk>>;
pub type PModelCache = Rc<RefCell<ModelCache>>;

/// Which representations of a chunk's content are currently present.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ChunkState {
    /// Only the live meshes and objects exist.
    #[default]
    LiveOnly,
    /// Only the baked property trees exist, as after loading.
    BakedOnly,
    /// Both exist and describe the same content.
    Both,
}

impl ChunkState {
    pub fn has_baked_data(self) -> bool {
        matches!(self, ChunkState::BakedOnly | ChunkState::Both)
    }

    pub fn has_live_data(self) -> bool {
        matches!(self, ChunkState::LiveOnly | ChunkState::Both)
    }
}

/// A shader cache plus the meshes and objects that use it.
///
/// Baking turns every mesh and object into a property tree carrying a content hash.
/// Objects refer to meshes and meshes to shaders by index into this chunk, so a
/// baked chunk is self-contained.
#[derive(Debug)]
pub struct ModelCacheChunk {
    shader_cache: PShaderCache,
    meshes: Vec<PMesh>,
    objects: Vec<Object>,
    baked_meshes: Vec<Element>,
    baked_objects: Vec<Element>,
    state: ChunkState,
}

impl ModelCacheChunk {
    pub fn new(shader_cache: PShaderCache) -> Self {
        Self {
            shader_cache,
            meshes: Vec::new(),
            objects: Vec::new(),
            baked_meshes: Vec::new(),
            baked_objects: Vec::new(),
            state: ChunkState::LiveOnly,
        }
    }

    pub fn state(&self) -> ChunkState {
        self.state
    }

    pub fn shader_cache(&self) -> &PShaderCache {
        &self.shader_cache
    }

    pub fn meshes(&self) -> &[PMesh] {
        &self.meshes
    }

    pub fn objects(&self) -> &[Object] {
        &self.objects
    }

    pub fn mesh(&self, index: usize) -> Option<&PMesh> {
        self.meshes.get(index)
    }

    pub fn object(&self, index: usize) -> Option<&Object> {
        self.objects.get(index)
    }

    /// Live objects are only mutable while the chunk holds no baked data, so this
    /// unbakes first.
    pub fn object_mut(&mut self, index: usize) -> Result<Option<&mut Object>, SceneError> {
        self.unbake()?;
        Ok(self.objects.get_mut(index))
    }

    pub fn baked_meshes(&self) -> &[Element] {
        &self.baked_meshes
    }

    pub fn baked_objects(&self) -> &[Element] {
        &self.baked_objects
    }

    pub fn mesh_index(&self, mesh: &PMesh) -> Option<usize> {
        self.meshes.iter().position(|m| Rc::ptr_eq(m, mesh))
    }

    /// Adds the mesh and registers its sub-mesh shaders with the shader cache.
    /// A mesh that is already part of the chunk keeps its index.
    pub fn add_mesh(&mut self, mesh: PMesh) -> Result<usize, SceneError> {
        self.unbake()?;
        if let Some(index) = self.mesh_index(&mesh) {
            return Ok(index);
        }
        {
            let mut shader_cache = self.shader_cache.borrow_mut();
            for shader in mesh.sub_mesh_shaders() {
                if shader_cache.index_of(shader).is_none() {
                    shader_cache.add_shader(shader.clone());
                }
            }
        }
        self.meshes.push(mesh);
        Ok(self.meshes.len() - 1)
    }

    /// Adds the object, and its mesh if the chunk does not contain it yet.
    pub fn add_object(&mut self, object: Object) -> Result<usize, SceneError> {
        self.add_mesh(object.mesh().clone())?;
        self.objects.push(object);
        Ok(self.objects.len() - 1)
    }

    /// Objects that still use the mesh make the next bake fail.
    pub fn remove_mesh(&mut self, mesh: &PMesh) -> Result<bool, SceneError> {
        self.unbake()?;
        match self.mesh_index(mesh) {
            Some(index) => {
                self.meshes.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn remove_object(&mut self, index: usize) -> Result<Option<Object>, SceneError> {
        self.unbake()?;
        if index >= self.objects.len() {
            return Ok(None);
        }
        Ok(Some(self.objects.remove(index)))
    }

    /// Serializes every live mesh and object and hashes the result. The live data is
    /// left untouched. Does nothing if baked data already exists.
    pub fn bake(&mut self) -> Result<(), SceneError> {
        if self.state.has_baked_data() {
            return Ok(());
        }

        let mesh_to_index: HashMap<*const Mesh, usize> = self
            .meshes
            .iter()
            .enumerate()
            .map(|(i, m)| (Rc::as_ptr(m), i))
            .collect();
        let mut baked_objects = Vec::with_capacity(self.objects.len());
        for object in &self.objects {
            let mesh_index = mesh_to_index
                .get(&Rc::as_ptr(object.mesh()))
                .ok_or_else(|| SceneError::UnresolvedReference {
                    kind: "mesh",
                    name: object.mesh().name().to_string(),
                })?;
            let mut element = Element::new();
            object.serialize(&mut element, *mesh_index as u32);
            let hash = element.content_hash();
            element.insert("hash", hash.to_hex());
            object.set_hash(Some(hash));
            baked_objects.push(element);
        }

        let shader_to_index = self.shader_cache.borrow().shader_to_index_table();
        let mut baked_meshes = Vec::with_capacity(self.meshes.len());
        for mesh in &self.meshes {
            let mut element = Element::new();
            mesh.serialize(&mut element, &shader_to_index)?;
            let hash = element.content_hash();
            element.insert("hash", hash.to_hex());
            mesh.set_hash(Some(hash));
            baked_meshes.push(element);
        }

        log::debug!(
            "Baked chunk with {} meshes and {} objects",
            baked_meshes.len(),
            baked_objects.len()
        );
        self.baked_objects = baked_objects;
        self.baked_meshes = baked_meshes;
        self.state = ChunkState::Both;
        Ok(())
    }

    /// Drops the baked data, regenerating the live data from it first if needed.
    pub fn unbake(&mut self) -> Result<(), SceneError> {
        if !self.state.has_baked_data() {
            return Ok(());
        }
        if !self.state.has_live_data() {
            self.generate_unbaked_data(false)?;
        }
        self.baked_objects.clear();
        self.baked_meshes.clear();
        self.state = ChunkState::LiveOnly;
        log::debug!("Unbaked chunk with {} meshes", self.meshes.len());
        Ok(())
    }

    /// Rebuilds the live meshes and objects from the baked data. Without `force` this
    /// does nothing if live data already exists. A chunk without baked data is left as is.
    pub fn generate_unbaked_data(&mut self, force: bool) -> Result<(), SceneError> {
        if self.state.has_live_data() && !force {
            return Ok(());
        }
        if !self.state.has_baked_data() {
            return Ok(());
        }

        let meshes = {
            let shader_cache = self.shader_cache.borrow();
            let shaders = shader_cache.shaders();
            self.baked_meshes
                .iter()
                .map(|element| {
                    let mesh = Mesh::deserialize(
                        element,
                        |index| shaders.get(index as usize).cloned(),
                        shaders.len(),
                    )?;
                    mesh.set_hash(Some(read_hash(element)?));
                    Ok(Rc::new(mesh))
                })
                .collect::<Result<Vec<_>, DecodeError>>()?
        };
        let objects = self
            .baked_objects
            .iter()
            .map(|element| {
                let object = Object::deserialize(
                    element,
                    |index| meshes.get(index as usize).cloned(),
                    meshes.len(),
                )?;
                object.set_hash(Some(read_hash(element)?));
                Ok(object)
            })
            .collect::<Result<Vec<_>, DecodeError>>()?;

        log::debug!(
            "Generated {} meshes and {} objects from baked data",
            meshes.len(),
            objects.len()
        );
        self.meshes = meshes;
        self.objects = objects;
        self.state = ChunkState::Both;
        Ok(())
    }

    /// Folds the object count, mesh count and every mesh's name and declared size into
    /// `seed`. Reads the baked lists when there is no live data.
    fn fold_identity(&self, seed: u64) -> Result<u64, DecodeError> {
        if self.state.has_live_data() {
            let mut hash = hash_combine(seed, self.objects.len() as u64);
            hash = hash_combine(hash, self.meshes.len() as u64);
            for mesh in &self.meshes {
                hash = hash_combine(hash, hash_str(mesh.name()));
                hash = hash_combine(hash, mesh.vertex_count() as u64);
                hash = hash_combine(hash, mesh.triangle_count() as u64);
            }
            return Ok(hash);
        }
        let mut hash = hash_combine(seed, self.baked_objects.len() as u64);
        hash = hash_combine(hash, self.baked_meshes.len() as u64);
        for mesh in &self.baked_meshes {
            hash = hash_combine(hash, hash_str(&mesh.get_as::<String>("name")?));
            hash = hash_combine(hash, mesh.get_as::<u64>("vertexCount")?);
            hash = hash_combine(hash, mesh.get_as::<u64>("triangleCount")?);
        }
        Ok(hash)
    }

    /// Writes the shader cache and the baked lists, baking first.
    pub fn serialize(&mut self, element: &mut Element) -> Result<(), SceneError> {
        self.bake()?;
        self.shader_cache.borrow().serialize(element);
        element
            .insert("objects", to_array(&self.baked_objects))
            .insert("meshes", to_array(&self.baked_meshes));
        Ok(())
    }

    /// Reads a chunk in baked form. Live data is generated on demand.
    pub fn deserialize(element: &Element) -> Result<Self, DecodeError> {
        let shader_cache = ShaderCache::deserialize(element)?;
        let read_list = |key: &str| {
            element
                .elements(key)?
                .map(|e| e.cloned())
                .collect::<Result<Vec<_>, _>>()
        };
        Ok(Self {
            shader_cache: Rc::new(RefCell::new(shader_cache)),
            meshes: Vec::new(),
            objects: Vec::new(),
            baked_objects: read_list("objects")?,
            baked_meshes: read_list("meshes")?,
            state: ChunkState::BakedOnly,
        })
    }
}

fn read_hash(element: &Element) -> Result<ContentHash, DecodeError> {
    Ok(ContentHash::from_hex(&element.get_as::<String>("hash")?)?)
}

fn to_array(elements: &[Element]) -> Vec<Property> {
    elements.iter().cloned().map(Property::Element).collect()
}

/// An ordered collection of chunks, persisted as one cache file.
#[derive(Debug, Default)]
pub struct ModelCache {
    chunks: Vec<PModelCacheChunk>,
    unique: bool,
}

impl DocumentAsset for ModelCache {
    fn id() -> AssetTypeId {
        "PRTC"
    }

    fn version() -> u32 {
        1
    }
}

impl ModelCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chunks(&self) -> &[PModelCacheChunk] {
        &self.chunks
    }

    pub fn add_chunk(&mut self, shader_cache: PShaderCache) -> PModelCacheChunk {
        let chunk = Rc::new(RefCell::new(ModelCacheChunk::new(shader_cache)));
        self.chunks.push(chunk.clone());
        chunk
    }

    /// Appends the other cache's chunks. The chunks are shared, not copied.
    pub fn merge(&mut self, other: &ModelCache) {
        self.chunks.extend(other.chunks.iter().cloned());
    }

    /// A unique cache is saved under a random key instead of one derived from its content.
    pub fn set_unique(&mut self, unique: bool) {
        self.unique = unique;
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    /// Identity of the cache built from its shape: chunk, object and mesh counts plus
    /// mesh names and sizes. Two caches with the same shape share a key.
    pub fn content_key(&self) -> Result<u64, DecodeError> {
        self.chunks
            .iter()
            .try_fold(hash_combine(0, self.chunks.len() as u64), |hash, chunk| {
                chunk.borrow().fold_identity(hash)
            })
    }

    pub fn bake(&self) -> Result<(), SceneError> {
        for chunk in &self.chunks {
            chunk.borrow_mut().bake()?;
        }
        Ok(())
    }

    /// Regenerates the live data of every chunk.
    pub fn generate_data(&self) -> Result<(), SceneError> {
        for chunk in &self.chunks {
            chunk.borrow_mut().generate_unbaked_data(true)?;
        }
        Ok(())
    }

    pub fn serialize(&self, element: &mut Element) -> Result<(), SceneError> {
        let mut chunks = Vec::with_capacity(self.chunks.len());
        for chunk in &self.chunks {
            let mut chunk_element = Element::new();
            chunk.borrow_mut().serialize(&mut chunk_element)?;
            chunks.push(Property::Element(chunk_element));
        }
        element.insert("chunks", chunks);
        Ok(())
    }

    pub fn deserialize(element: &Element) -> Result<Self, DecodeError> {
        let mut cache = ModelCache::new();
        for chunk in element.elements("chunks")? {
            let chunk = ModelCacheChunk::deserialize(chunk?)?;
            cache.chunks.push(Rc::new(RefCell::new(chunk)));
        }
        Ok(cache)
    }

    pub fn to_document(&self) -> Result<AssetDocument, SceneError> {
        let mut document = AssetDocument::for_asset::<ModelCache>();
        self.serialize(&mut document.root)?;
        Ok(document)
    }

    pub fn from_document(document: &AssetDocument) -> Result<Self, SceneError> {
        document.check::<ModelCache>()?;
        Ok(Self::deserialize(&document.root)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        mesh::{MeshFlags, Vertex},
        shader::Shader,
    };

    fn mesh(name: &str, shader: &Rc<Shader>) -> PMesh {
        let mut mesh = Mesh::new(name, 3, 1, MeshFlags::empty());
        for i in 0..3 {
            assert!(mesh.add_vertex(Vertex {
                position: [i as f32, 0.0, 0.0],
                normal: [0.0, 1.0, 0.0],
                uv: [0.0, i as f32],
                tangent: [1.0, 0.0, 0.0, 1.0],
            }));
        }
        assert!(mesh.add_triangle(0, 1, 2, 0));
        mesh.add_sub_mesh_shader(shader.clone());
        Rc::new(mesh)
    }

    fn chunk() -> ModelCacheChunk {
        let shader = Rc::new(Shader::new("default"));
        let mut chunk = ModelCacheChunk::new(Rc::new(RefCell::new(ShaderCache::new())));
        let mesh = mesh("tri", &shader);
        for name in ["a", "b"] {
            let mut object = Object::create(mesh.clone());
            object.set_name(name);
            chunk.add_object(object).unwrap();
        }
        chunk
    }

    #[test]
    fn add_object_registers_mesh_and_shaders() {
        let chunk = chunk();
        assert_eq!(chunk.meshes().len(), 1);
        assert_eq!(chunk.objects().len(), 2);
        assert_eq!(chunk.shader_cache().borrow().len(), 1);
    }

    #[test]
    fn bake_is_non_destructive_and_hashes() {
        let mut chunk = chunk();
        chunk.bake().unwrap();
        assert_eq!(chunk.state(), ChunkState::Both);
        assert_eq!(chunk.baked_objects().len(), 2);
        assert_eq!(chunk.baked_meshes().len(), 1);

        let mesh_hash = chunk.meshes()[0].hash().unwrap();
        assert_eq!(
            chunk.baked_meshes()[0].get_as::<String>("hash").unwrap(),
            mesh_hash.to_hex()
        );
        assert_eq!(
            chunk.baked_objects()[1].get_as::<u32>("meshIndex").unwrap(),
            0
        );
    }

    #[test]
    fn bake_unbake_bake_is_identical() {
        let mut chunk = chunk();
        chunk.bake().unwrap();
        let first = chunk.baked_meshes().to_vec();
        let first_objects = chunk.baked_objects().to_vec();

        chunk.unbake().unwrap();
        assert_eq!(chunk.state(), ChunkState::LiveOnly);
        assert!(chunk.baked_meshes().is_empty());
        chunk.generate_unbaked_data(false).unwrap();
        chunk.bake().unwrap();
        assert_eq!(chunk.baked_meshes(), &first[..]);
        assert_eq!(chunk.baked_objects(), &first_objects[..]);
    }

    #[test]
    fn deserialized_chunk_regenerates_live_data() {
        let mut chunk = chunk();
        let mut element = Element::new();
        chunk.serialize(&mut element).unwrap();
        let hashes: Vec<_> = chunk.objects().iter().map(|o| o.hash()).collect();

        let mut loaded = ModelCacheChunk::deserialize(&element).unwrap();
        assert_eq!(loaded.state(), ChunkState::BakedOnly);
        assert!(loaded.objects().is_empty());

        loaded.generate_unbaked_data(false).unwrap();
        assert_eq!(loaded.state(), ChunkState::Both);
        let loaded_hashes: Vec<_> = loaded.objects().iter().map(|o| o.hash()).collect();
        assert_eq!(loaded_hashes, hashes);
        assert!(Rc::ptr_eq(loaded.objects()[0].mesh(), loaded.objects()[1].mesh()));

        let baked = loaded.baked_objects().to_vec();
        loaded.unbake().unwrap();
        loaded.bake().unwrap();
        assert_eq!(loaded.baked_objects(), &baked[..]);
    }

    #[test]
    fn unbake_on_baked_only_keeps_content() {
        let mut element = Element::new();
        chunk().serialize(&mut element).unwrap();
        let mut loaded = ModelCacheChunk::deserialize(&element).unwrap();
        loaded.unbake().unwrap();
        assert_eq!(loaded.state(), ChunkState::LiveOnly);
        assert_eq!(loaded.objects().len(), 2);
    }

    #[test]
    fn changing_a_field_changes_the_hash() {
        let mut chunk = chunk();
        chunk.bake().unwrap();
        let before = chunk.objects()[0].hash();
        chunk.object_mut(0).unwrap().unwrap().set_name("renamed");
        assert_eq!(chunk.state(), ChunkState::LiveOnly);
        chunk.bake().unwrap();
        assert_ne!(chunk.objects()[0].hash(), before);
    }

    #[test]
    fn mutation_after_bake_unbakes() {
        let mut chunk = chunk();
        chunk.bake().unwrap();
        let shader = Rc::new(Shader::new("other"));
        chunk.add_mesh(mesh("second", &shader)).unwrap();
        assert_eq!(chunk.state(), ChunkState::LiveOnly);
        assert!(chunk.baked_meshes().is_empty());
        assert_eq!(chunk.shader_cache().borrow().len(), 2);
    }

    #[test]
    fn removed_mesh_still_in_use_fails_to_bake() {
        let mut chunk = chunk();
        let mesh = chunk.meshes()[0].clone();
        assert!(chunk.remove_mesh(&mesh).unwrap());
        assert!(matches!(
            chunk.bake(),
            Err(SceneError::UnresolvedReference { kind: "mesh", .. })
        ));
        assert_eq!(chunk.state(), ChunkState::LiveOnly);
    }

    #[test]
    fn bad_hash_is_rejected() {
        let mut element = Element::new();
        chunk().serialize(&mut element).unwrap();
        let mut loaded = ModelCacheChunk::deserialize(&element).unwrap();
        loaded.baked_meshes[0].insert("hash", "abc");
        assert!(matches!(
            loaded.generate_unbaked_data(false),
            Err(SceneError::Decode(DecodeError::Hash(_)))
        ));
    }

    #[test]
    fn cache_document_round_trip() {
        let mut cache = ModelCache::new();
        let chunk = cache.add_chunk(Rc::new(RefCell::new(ShaderCache::new())));
        let shader = Rc::new(Shader::new("s"));
        chunk
            .borrow_mut()
            .add_object(Object::create(mesh("m", &shader)))
            .unwrap();

        let document = cache.to_document().unwrap();
        assert_eq!(document.asset_type, "PRTC");
        let loaded = ModelCache::from_document(&document).unwrap();
        assert_eq!(loaded.chunks().len(), 1);
        loaded.generate_data().unwrap();
        let loaded_chunk = loaded.chunks()[0].borrow();
        assert_eq!(loaded_chunk.objects().len(), 1);
        assert_eq!(loaded_chunk.meshes()[0].name(), "m");
    }

    #[test]
    fn content_key_survives_a_round_trip() {
        let mut cache = ModelCache::new();
        let chunk = cache.add_chunk(Rc::new(RefCell::new(ShaderCache::new())));
        let shader = Rc::new(Shader::new("s"));
        chunk
            .borrow_mut()
            .add_object(Object::create(mesh("m", &shader)))
            .unwrap();
        let key = cache.content_key().unwrap();

        let loaded = ModelCache::from_document(&cache.to_document().unwrap()).unwrap();
        assert_eq!(loaded.content_key().unwrap(), key);
        loaded.generate_data().unwrap();
        assert_eq!(loaded.content_key().unwrap(), key);

        chunk
            .borrow_mut()
            .add_object(Object::create(mesh("other", &shader)))
            .unwrap();
        assert_ne!(cache.content_key().unwrap(), key);
    }

    #[test]
    fn merge_shares_chunks() {
        let mut a = ModelCache::new();
        let mut b = ModelCache::new();
        let chunk = b.add_chunk(Rc::new(RefCell::new(ShaderCache::new())));
        a.merge(&b);
        assert!(Rc::ptr_eq(&a.chunks()[0], &chunk));
    }
}
