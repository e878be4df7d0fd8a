pub mod settings;

use std::{
    cell::{Ref, RefCell},
    collections::HashMap,
    fs,
    path::Path,
    rc::Rc,
};

use scene_common::{hash_combine, AssetDocument, AssetTypeId, DocumentAsset, DocumentFormat, Element, Property};
use uuid::Uuid;

pub use self::settings::*;
use crate::{
    camera::Camera,
    config::SceneConfig,
    error::{DecodeError, SceneError},
    light::Light,
    model_cache::{ModelCache, PModelCache, PModelCacheChunk},
    object::Object,
    scene_object::SceneObject,
    world_object::HasWorldObject,
};

pub const BAKE_TARGET_NAME: &str = "bake_target";

/// Header fields that can be read without loading any geometry.
#[derive(Clone, Debug, PartialEq)]
pub struct SceneHeader {
    pub version: u32,
    pub create_info: CreateInfo,
    pub render_mode: RenderMode,
    pub output_file_name: String,
}

/// A live object inside one of the scene's chunks.
#[derive(Clone, Debug)]
pub struct ObjectHandle {
    pub chunk: PModelCacheChunk,
    pub index: usize,
}

impl ObjectHandle {
    pub fn borrow(&self) -> Option<Ref<'_, Object>> {
        Ref::filter_map(self.chunk.borrow(), |chunk| chunk.object(self.index)).ok()
    }
}

/// Everything that carries a uuid in a scene.
#[derive(Clone, Debug)]
pub enum Actor {
    Camera,
    Light(usize),
    Object(ObjectHandle),
}

/// The camera, lights, geometry caches and render settings of one render job.
pub struct Scene {
    config: SceneConfig,
    create_info: CreateInfo,
    render_mode: RenderMode,
    scene_info: SceneInfo,
    state_flags: StateFlags,
    camera: Camera,
    lights: Vec<Light>,
    model_caches: Vec<PModelCache>,
    output_file_name: String,
    bake_target_name: Option<String>,
}

impl DocumentAsset for Scene {
    fn id() -> AssetTypeId {
        "PRTS"
    }

    fn version() -> u32 {
        1
    }
}

impl Scene {
    pub fn new(config: SceneConfig) -> Self {
        Self::with_settings(config, RenderMode::RenderImage, CreateInfo::default())
    }

    pub fn with_settings(config: SceneConfig, render_mode: RenderMode, create_info: CreateInfo) -> Self {
        Self {
            config,
            create_info,
            render_mode,
            scene_info: SceneInfo::default(),
            state_flags: StateFlags::empty(),
            camera: Camera::new(),
            lights: Vec::new(),
            model_caches: Vec::new(),
            output_file_name: String::new(),
            bake_target_name: None,
        }
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn create_info(&self) -> &CreateInfo {
        &self.create_info
    }

    pub fn set_create_info(&mut self, create_info: CreateInfo) {
        self.create_info = create_info;
    }

    pub fn render_mode(&self) -> RenderMode {
        self.render_mode
    }

    pub fn set_render_mode(&mut self, render_mode: RenderMode) {
        self.render_mode = render_mode;
    }

    pub fn scene_info(&self) -> &SceneInfo {
        &self.scene_info
    }

    pub fn scene_info_mut(&mut self) -> &mut SceneInfo {
        &mut self.scene_info
    }

    pub fn state_flags(&self) -> StateFlags {
        self.state_flags
    }

    pub fn set_state_flags(&mut self, flags: StateFlags) {
        self.state_flags = flags;
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    pub fn add_light(&mut self, light: Light) -> usize {
        self.lights.push(light);
        self.lights.len() - 1
    }

    pub fn light_mut(&mut self, index: usize) -> Option<&mut Light> {
        self.lights.get_mut(index)
    }

    pub fn model_caches(&self) -> &[PModelCache] {
        &self.model_caches
    }

    /// The same cache may be attached to several scenes.
    pub fn add_model_cache(&mut self, cache: PModelCache) {
        self.model_caches.push(cache);
    }

    pub fn output_file_name(&self) -> &str {
        &self.output_file_name
    }

    pub fn set_output_file_name(&mut self, name: impl Into<String>) {
        self.output_file_name = name.into();
    }

    pub fn bake_target_name(&self) -> Option<&str> {
        self.bake_target_name.as_deref()
    }

    /// Marks `object` as the target of an ambient occlusion bake.
    pub fn set_ao_bake_target(&mut self, object: &mut Object) {
        object.set_name(BAKE_TARGET_NAME);
        self.bake_target_name = Some(BAKE_TARGET_NAME.to_string());
    }

    fn chunks(&self) -> impl Iterator<Item = PModelCacheChunk> + '_ {
        self.model_caches
            .iter()
            .flat_map(|cache| cache.borrow().chunks().to_vec())
    }

    /// First live object with the given name, in attachment order.
    pub fn find_object(&self, name: &str) -> Option<ObjectHandle> {
        self.chunks().find_map(|chunk| {
            let index = chunk.borrow().objects().iter().position(|o| o.name() == name)?;
            Some(ObjectHandle { chunk, index })
        })
    }

    pub fn build_actor_map(&self) -> HashMap<Uuid, Actor> {
        let mut map = HashMap::new();
        for (index, light) in self.lights.iter().enumerate() {
            map.insert(light.uuid(), Actor::Light(index));
        }
        map.insert(self.camera.uuid(), Actor::Camera);
        for chunk in self.chunks() {
            let objects: Vec<Uuid> = chunk.borrow().objects().iter().map(|o| o.uuid()).collect();
            for (index, uuid) in objects.into_iter().enumerate() {
                let handle = ObjectHandle {
                    chunk: chunk.clone(),
                    index,
                };
                map.insert(uuid, Actor::Object(handle));
            }
        }
        map
    }

    /// Prepares every entity for rendering and numbers them.
    ///
    /// The camera is always 0. Lights, meshes, objects and shaders are each numbered
    /// from 0 across all caches and chunks in attachment order. Only live data is
    /// numbered.
    pub fn finalize(&self) -> Result<(), SceneError> {
        self.camera.finalize(self, false)?;
        self.camera.set_id(0);
        for (id, light) in self.lights.iter().enumerate() {
            light.finalize(self, false)?;
            light.set_id(id as u32);
        }

        let (mut mesh_id, mut object_id, mut shader_id) = (0u32, 0u32, 0u32);
        for chunk in self.chunks() {
            let chunk = chunk.borrow();
            for mesh in chunk.meshes() {
                mesh.finalize(self, false)?;
                mesh.set_id(mesh_id);
                mesh_id += 1;
            }
            for object in chunk.objects() {
                object.finalize(self, false)?;
                object.set_id(object_id);
                object_id += 1;
            }
            for shader in chunk.shader_cache().borrow().shaders() {
                shader.set_id(shader_id);
                shader_id += 1;
            }
        }
        log::debug!(
            "Finalized scene with {} lights, {mesh_id} meshes, {object_id} objects and {shader_id} shaders",
            self.lights.len()
        );
        Ok(())
    }

    /// Name of the file a model cache is stored under. Unique caches get a fresh random
    /// key on every call.
    pub fn cache_key(cache: &ModelCache) -> Result<u64, DecodeError> {
        if cache.is_unique() {
            return Ok(hash_combine(0, rand::random::<u64>()));
        }
        cache.content_key()
    }

    /// Writes the scene document. Each model cache goes to its own file below
    /// `root_dir`, which is only written if no file with the same key exists yet.
    pub fn save(&self, root_dir: &Path) -> Result<AssetDocument, SceneError> {
        let cache_dir = self.config.cache_dir(root_dir);
        fs::create_dir_all(&cache_dir)?;

        let mut document = AssetDocument::for_asset::<Scene>();
        let root = &mut document.root;
        self.create_info.serialize(root);
        let mut scene_info = Element::new();
        self.scene_info.serialize(&mut scene_info);
        root.insert("renderMode", self.render_mode.name())
            .insert("outputFileName", self.output_file_name.as_str())
            .insert("sceneInfo", scene_info)
            .insert("stateFlags", self.state_flags.to_property());

        let mut cache_entries = Vec::with_capacity(self.model_caches.len());
        for cache in &self.model_caches {
            let cache = cache.borrow();
            let key = Scene::cache_key(&cache)?;
            let format = self.config.cache_format;
            let path = self.config.cache_path(root_dir, key, format);
            if path.exists() {
                log::info!("Reusing model cache {}", path.display());
            } else {
                cache.to_document()?.save(&path, format)?;
                log::info!("Wrote model cache {}", path.display());
            }
            let mut entry = Element::new();
            entry.insert("hash", key);
            cache_entries.push(Property::Element(entry));
        }
        root.insert("modelCaches", cache_entries);

        let lights = self
            .lights
            .iter()
            .map(|light| {
                let mut element = Element::new();
                light.serialize(&mut element);
                Property::Element(element)
            })
            .collect::<Vec<_>>();
        let mut camera = Element::new();
        self.camera.serialize(&mut camera);
        root.insert("lights", lights)
            .insert("camera", camera)
            .insert_opt("bakeTargetName", self.bake_target_name.as_deref());

        log::info!(
            "Saved scene with {} model caches and {} lights",
            self.model_caches.len(),
            self.lights.len()
        );
        Ok(document)
    }

    /// Reads the header, filling `scene_info` only when it is given.
    pub fn read_header(
        document: &AssetDocument,
        scene_info: Option<&mut SceneInfo>,
    ) -> Result<SceneHeader, SceneError> {
        document.check::<Scene>()?;
        let root = &document.root;
        let render_mode = RenderMode::parse("renderMode", &root.get_as::<String>("renderMode")?)?;
        if let Some(scene_info) = scene_info {
            *scene_info = SceneInfo::deserialize(&root.get_or("sceneInfo", Element::new())?)?;
        }
        Ok(SceneHeader {
            version: document.version,
            create_info: CreateInfo::deserialize(root)?,
            render_mode,
            output_file_name: root.get_or("outputFileName", String::new())?,
        })
    }

    /// Replaces the scene's content with the document's. Model caches whose file is
    /// missing below `root_dir` are skipped. Loaded caches hold baked data only.
    pub fn load(&mut self, document: &AssetDocument, root_dir: &Path) -> Result<(), SceneError> {
        let mut scene_info = SceneInfo::default();
        let header = Scene::read_header(document, Some(&mut scene_info))?;
        let root = &document.root;
        let state_flags = match root.get("stateFlags") {
            Some(property) => StateFlags::from_property("stateFlags", property)?,
            None => StateFlags::empty(),
        };

        let mut model_caches = Vec::new();
        for entry in root.elements("modelCaches")? {
            let key: u64 = entry?.get_as("hash")?;
            let found = DocumentFormat::ALL
                .into_iter()
                .map(|format| self.config.cache_path(root_dir, key, format))
                .find(|path| path.exists());
            let Some(path) = found else {
                log::warn!("Model cache {key} is missing from {}, skipping it", root_dir.display());
                continue;
            };
            let cache = ModelCache::from_document(&AssetDocument::load(&path)?)?;
            model_caches.push(Rc::new(RefCell::new(cache)));
        }

        let lights = root
            .elements("lights")?
            .map(|light| Light::deserialize(light?))
            .collect::<Result<Vec<_>, DecodeError>>()?;
        let camera = Camera::deserialize(root.element("camera")?)?;

        self.create_info = header.create_info;
        self.render_mode = header.render_mode;
        self.output_file_name = header.output_file_name;
        self.scene_info = scene_info;
        self.state_flags = state_flags;
        self.model_caches = model_caches;
        self.lights = lights;
        self.camera = camera;
        self.bake_target_name = root.get_opt("bakeTargetName")?;
        log::info!(
            "Loaded scene with {} model caches and {} lights",
            self.model_caches.len(),
            self.lights.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        light::LightType,
        mesh::{Mesh, MeshFlags, Vertex},
        shader::{Shader, ShaderCache},
    };

    fn cache_with(names: &[&str]) -> PModelCache {
        let mut cache = ModelCache::new();
        let chunk = cache.add_chunk(Rc::new(RefCell::new(ShaderCache::new())));
        let shader = Rc::new(Shader::new("default"));
        for name in names {
            let mut mesh = Mesh::new(*name, 3, 1, MeshFlags::empty());
            for i in 0..3 {
                assert!(mesh.add_vertex(Vertex {
                    position: [i as f32, 0.0, 0.0],
                    ..Default::default()
                }));
            }
            assert!(mesh.add_triangle(0, 1, 2, 0));
            mesh.add_sub_mesh_shader(shader.clone());
            let mut object = Object::create(Rc::new(mesh));
            object.set_name(*name);
            chunk.borrow_mut().add_object(object).unwrap();
        }
        Rc::new(RefCell::new(cache))
    }

    #[test]
    fn find_object_and_bake_target() {
        let mut scene = Scene::new(SceneConfig::default());
        scene.add_model_cache(cache_with(&["rock", "tree"]));
        let handle = scene.find_object("tree").unwrap();
        assert_eq!(handle.index, 1);
        assert!(scene.find_object("house").is_none());

        {
            let mut chunk = handle.chunk.borrow_mut();
            let object = chunk.object_mut(handle.index).unwrap().unwrap();
            scene.set_ao_bake_target(object);
        }
        assert_eq!(scene.bake_target_name(), Some(BAKE_TARGET_NAME));
        assert_eq!(handle.borrow().unwrap().name(), BAKE_TARGET_NAME);
    }

    #[test]
    fn invalid_mesh_fails_every_finalize() {
        let mut mesh = Mesh::new("bad", 3, 1, MeshFlags::empty());
        for i in 0..3 {
            assert!(mesh.add_vertex(Vertex {
                position: [i as f32, 0.0, 0.0],
                ..Default::default()
            }));
        }
        assert!(mesh.add_triangle(0, 1, 2, 5));
        let mut cache = ModelCache::new();
        cache
            .add_chunk(Rc::new(RefCell::new(ShaderCache::new())))
            .borrow_mut()
            .add_object(Object::create(Rc::new(mesh)))
            .unwrap();
        let mut scene = Scene::new(SceneConfig::default());
        scene.add_model_cache(Rc::new(RefCell::new(cache)));

        for _ in 0..2 {
            assert!(matches!(scene.finalize(), Err(SceneError::Validation(_))));
        }
    }

    #[test]
    fn actor_map_covers_every_world_object() {
        let mut scene = Scene::new(SceneConfig::default());
        scene.add_light(Light::new(LightType::Point));
        scene.add_model_cache(cache_with(&["a", "b"]));
        let map = scene.build_actor_map();
        assert_eq!(map.len(), 4);
        assert!(matches!(map[&scene.camera().uuid()], Actor::Camera));
        assert!(matches!(map[&scene.lights()[0].uuid()], Actor::Light(0)));
    }

    #[test]
    fn header_peek_without_scene_info() {
        let dir = tempfile::tempdir().unwrap();
        let mut scene = Scene::with_settings(
            SceneConfig::default(),
            RenderMode::SceneAlbedo,
            CreateInfo {
                samples: Some(64),
                ..Default::default()
            },
        );
        scene.set_output_file_name("out.png");
        let document = scene.save(dir.path()).unwrap();

        let header = Scene::read_header(&document, None).unwrap();
        assert_eq!(header.render_mode, RenderMode::SceneAlbedo);
        assert_eq!(header.create_info.samples, Some(64));
        assert_eq!(header.output_file_name, "out.png");
        assert_eq!(header.version, 1);
    }

    #[test]
    fn wrong_document_type_is_rejected() {
        let document = AssetDocument::new("PRTC", 1);
        assert!(matches!(
            Scene::read_header(&document, None),
            Err(SceneError::Document(_))
        ));
    }
}
