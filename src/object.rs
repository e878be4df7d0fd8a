use std::cell::Cell;

use scene_common::{ContentHash, Element, Pose};

use crate::{
    error::{DecodeError, SceneError},
    mesh::PMesh,
    scene::Scene,
    scene_object::{FinalizeState, SceneObject},
    world_object::{HasWorldObject, WorldObject},
};

/// A placed instance of a mesh. Several objects may share one mesh.
#[derive(Debug, Clone)]
pub struct Object {
    world: WorldObject,
    mesh: PMesh,
    name: String,
    motion_pose: Option<Pose>,
    hash: Cell<Option<ContentHash>>,
    id: Cell<Option<u32>>,
    finalize_state: FinalizeState,
}

impl Object {
    pub fn create(mesh: PMesh) -> Self {
        Self {
            world: WorldObject::new(),
            mesh,
            name: String::new(),
            motion_pose: None,
            hash: Cell::new(None),
            id: Cell::new(None),
            finalize_state: FinalizeState::default(),
        }
    }

    pub fn mesh(&self) -> &PMesh {
        &self.mesh
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn pose(&self) -> &Pose {
        self.world.pose()
    }

    pub fn set_pose(&mut self, pose: Pose) {
        self.world.set_pose(pose);
    }

    /// End-of-shutter pose used for motion blur.
    pub fn motion_pose(&self) -> Option<&Pose> {
        self.motion_pose.as_ref()
    }

    pub fn set_motion_pose(&mut self, pose: Option<Pose>) {
        self.motion_pose = pose;
    }

    pub fn hash(&self) -> Option<ContentHash> {
        self.hash.get()
    }

    pub(crate) fn set_hash(&self, hash: Option<ContentHash>) {
        self.hash.set(hash);
    }

    pub fn id(&self) -> Option<u32> {
        self.id.get()
    }

    pub(crate) fn set_id(&self, id: u32) {
        self.id.set(Some(id));
    }

    /// Writes the baked form. The mesh is referenced by its index in the owning chunk.
    pub fn serialize(&self, element: &mut Element, mesh_index: u32) {
        self.world.serialize(element);
        element
            .insert("meshIndex", mesh_index)
            .insert("name", self.name.as_str())
            .insert_opt("motionPose", self.motion_pose.as_ref().map(Pose::to_element));
    }

    pub fn deserialize(
        element: &Element,
        get_mesh: impl Fn(u32) -> Option<PMesh>,
        mesh_count: usize,
    ) -> Result<Self, DecodeError> {
        let index: u32 = element.get_as("meshIndex")?;
        let mesh = get_mesh(index).ok_or(DecodeError::MissingMeshIndex { index, mesh_count })?;
        let motion_pose = match element.get_opt::<Element>("motionPose")? {
            Some(pose) => Some(Pose::from_element(&pose)?),
            None => None,
        };
        Ok(Self {
            world: WorldObject::deserialize(element)?,
            mesh,
            name: element.get_or("name", String::new())?,
            motion_pose,
            hash: Cell::new(None),
            id: Cell::new(None),
            finalize_state: FinalizeState::default(),
        })
    }
}

impl HasWorldObject for Object {
    fn world_object(&self) -> &WorldObject {
        &self.world
    }

    fn world_object_mut(&mut self) -> &mut WorldObject {
        &mut self.world
    }
}

impl SceneObject for Object {
    fn finalize_state(&self) -> &FinalizeState {
        &self.finalize_state
    }

    fn do_finalize(&self, scene: &Scene) -> Result<(), SceneError> {
        self.mesh.finalize(scene, false)
    }
}
