use std::cell::Cell;

use scene_common::Element;
use ultraviolet::{Mat4, Vec3};

use crate::{
    error::{DecodeError, SceneError},
    scene::Scene,
    scene_object::{FinalizeState, SceneObject},
    world_object::{HasWorldObject, WorldObject},
};

named_enum! {
    #[derive(Default)]
    pub enum CameraType {
        #[default]
        Perspective => "Perspective",
        Orthographic => "Orthographic",
        Panorama => "Panorama",
    }
}

named_enum! {
    #[derive(Default)]
    pub enum PanoramaType {
        #[default]
        Equirectangular => "Equirectangular",
        FisheyeEquidistant => "FisheyeEquidistant",
        FisheyeEquisolid => "FisheyeEquisolid",
        Mirrorball => "Mirrorball",
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DepthOfField {
    pub enabled: bool,
    pub focal_distance: f32,
    pub aperture_size: f32,
    pub aperture_ratio: f32,
    pub blade_count: u32,
    /// Degrees.
    pub blades_rotation: f32,
}

impl Default for DepthOfField {
    fn default() -> Self {
        Self {
            enabled: false,
            focal_distance: 10.0,
            aperture_size: 0.0,
            aperture_ratio: 1.0,
            blade_count: 0,
            blades_rotation: 0.0,
        }
    }
}

/// The single camera of a scene.
#[derive(Debug, Clone)]
pub struct Camera {
    world: WorldObject,
    pub camera_type: CameraType,
    pub width: u32,
    pub height: u32,
    pub z_near: f32,
    pub z_far: f32,
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub depth_of_field: DepthOfField,
    pub panorama_type: PanoramaType,
    /// Millimeters.
    pub interocular_distance: f32,
    pub stereoscopic: bool,
    pub longitude_min: f32,
    pub longitude_max: f32,
    pub latitude_min: f32,
    pub latitude_max: f32,
    finalize_state: FinalizeState,
    id: Cell<Option<u32>>,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            world: WorldObject::new(),
            camera_type: CameraType::Perspective,
            width: 1920,
            height: 1080,
            z_near: 0.1,
            z_far: 1000.0,
            fov: 39.6,
            depth_of_field: DepthOfField::default(),
            panorama_type: PanoramaType::Equirectangular,
            interocular_distance: 65.0,
            stereoscopic: false,
            longitude_min: -180.0,
            longitude_max: 180.0,
            latitude_min: -90.0,
            latitude_max: 90.0,
            finalize_state: FinalizeState::default(),
            id: Cell::new(None),
        }
    }
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_resolution(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    pub fn set_equirectangular_horizontal_range(&mut self, range: f32) {
        self.longitude_min = -range / 2.0;
        self.longitude_max = range / 2.0;
    }

    pub fn set_equirectangular_vertical_range(&mut self, range: f32) {
        self.latitude_min = -range / 2.0;
        self.latitude_max = range / 2.0;
    }

    /// Only panorama cameras render in stereo.
    pub fn is_stereoscopic(&self) -> bool {
        self.stereoscopic && self.camera_type == CameraType::Panorama
    }

    /// Positions the camera
    pub fn view_matrix(&self) -> Mat4 {
        let pose = self.world.pose();
        let target = pose.position + pose.orientation * Camera::forward();
        Mat4::look_at(pose.position, target, Camera::up())
    }

    /// in world-space
    pub const fn forward() -> Vec3 {
        Vec3::new(0.0, 0.0, -1.0)
    }

    /// in world-space
    pub const fn up() -> Vec3 {
        Vec3::new(0.0, 1.0, 0.0)
    }

    pub fn id(&self) -> Option<u32> {
        self.id.get()
    }

    pub(crate) fn set_id(&self, id: u32) {
        self.id.set(Some(id));
    }

    pub fn serialize(&self, element: &mut Element) {
        let dof = &self.depth_of_field;
        self.world.serialize(element);
        element
            .insert("type", self.camera_type.name())
            .insert("width", self.width)
            .insert("height", self.height)
            .insert("nearZ", self.z_near)
            .insert("farZ", self.z_far)
            .insert("fov", self.fov)
            .insert("dofEnabled", dof.enabled)
            .insert("focalDistance", dof.focal_distance)
            .insert("apertureSize", dof.aperture_size)
            .insert("apertureRatio", dof.aperture_ratio)
            .insert("bladeCount", dof.blade_count)
            .insert("bladesRotation", dof.blades_rotation)
            .insert("panoramaType", self.panorama_type.name())
            .insert("interocularDistance", self.interocular_distance)
            .insert("stereoscopic", self.stereoscopic)
            .insert("longitudeMin", self.longitude_min)
            .insert("longitudeMax", self.longitude_max)
            .insert("latitudeMin", self.latitude_min)
            .insert("latitudeMax", self.latitude_max);
    }

    pub fn deserialize(element: &Element) -> Result<Self, DecodeError> {
        let defaults = Camera::default();
        let dof = DepthOfField {
            enabled: element.get_or("dofEnabled", defaults.depth_of_field.enabled)?,
            focal_distance: element.get_or("focalDistance", defaults.depth_of_field.focal_distance)?,
            aperture_size: element.get_or("apertureSize", defaults.depth_of_field.aperture_size)?,
            aperture_ratio: element.get_or("apertureRatio", defaults.depth_of_field.aperture_ratio)?,
            blade_count: element.get_or("bladeCount", defaults.depth_of_field.blade_count)?,
            blades_rotation: element.get_or("bladesRotation", defaults.depth_of_field.blades_rotation)?,
        };
        let panorama_type = match element.get_opt::<String>("panoramaType")? {
            Some(name) => PanoramaType::parse("panoramaType", &name)?,
            None => defaults.panorama_type,
        };
        Ok(Self {
            world: WorldObject::deserialize(element)?,
            camera_type: CameraType::parse("type", &element.get_as::<String>("type")?)?,
            width: element.get_or("width", defaults.width)?,
            height: element.get_or("height", defaults.height)?,
            z_near: element.get_or("nearZ", defaults.z_near)?,
            z_far: element.get_or("farZ", defaults.z_far)?,
            fov: element.get_or("fov", defaults.fov)?,
            depth_of_field: dof,
            panorama_type,
            interocular_distance: element.get_or("interocularDistance", defaults.interocular_distance)?,
            stereoscopic: element.get_or("stereoscopic", defaults.stereoscopic)?,
            longitude_min: element.get_or("longitudeMin", defaults.longitude_min)?,
            longitude_max: element.get_or("longitudeMax", defaults.longitude_max)?,
            latitude_min: element.get_or("latitudeMin", defaults.latitude_min)?,
            latitude_max: element.get_or("latitudeMax", defaults.latitude_max)?,
            ..defaults
        })
    }
}

impl HasWorldObject for Camera {
    fn world_object(&self) -> &WorldObject {
        &self.world
    }

    fn world_object_mut(&mut self) -> &mut WorldObject {
        &mut self.world
    }
}

impl SceneObject for Camera {
    fn finalize_state(&self) -> &FinalizeState {
        &self.finalize_state
    }

    fn do_finalize(&self, _scene: &Scene) -> Result<(), SceneError> {
        Ok(())
    }
}
