use std::cell::Cell;

use scene_common::Element;

use crate::{
    error::{DecodeError, SceneError},
    scene::Scene,
    scene_object::{FinalizeState, SceneObject},
    world_object::{HasWorldObject, WorldObject},
};

named_enum! {
    #[derive(Default)]
    pub enum LightType {
        #[default]
        Point => "Point",
        Spot => "Spot",
        Directional => "Directional",
        Area => "Area",
        Background => "Background",
        Triangle => "Triangle",
    }
}

pub type Lumen = f32;

#[derive(Debug, Clone)]
pub struct Light {
    world: WorldObject,
    pub light_type: LightType,
    pub size: f32,
    pub color: [f32; 3],
    pub intensity: Lumen,
    pub blend_fraction: f32,
    /// Radians.
    pub spot_outer_angle: f32,
    pub axis_u: [f32; 3],
    pub axis_v: [f32; 3],
    pub size_u: f32,
    pub size_v: f32,
    pub round: bool,
    id: Cell<Option<u32>>,
    finalize_state: FinalizeState,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            world: WorldObject::new(),
            light_type: LightType::Point,
            size: 0.25,
            color: [1.0; 3],
            intensity: 1600.0,
            blend_fraction: 0.0,
            spot_outer_angle: 0.0,
            axis_u: [0.0; 3],
            axis_v: [0.0; 3],
            size_u: 1.0,
            size_v: 1.0,
            round: false,
            id: Cell::new(None),
            finalize_state: FinalizeState::default(),
        }
    }
}

impl Light {
    pub fn new(light_type: LightType) -> Self {
        Self {
            light_type,
            ..Default::default()
        }
    }

    pub fn set_cone_angle(&mut self, outer_angle: f32, blend_fraction: f32) {
        self.spot_outer_angle = outer_angle;
        self.blend_fraction = blend_fraction;
    }

    pub fn id(&self) -> Option<u32> {
        self.id.get()
    }

    pub(crate) fn set_id(&self, id: u32) {
        self.id.set(Some(id));
    }

    pub fn serialize(&self, element: &mut Element) {
        self.world.serialize(element);
        element
            .insert("type", self.light_type.name())
            .insert("size", self.size)
            .insert("color", self.color)
            .insert("intensity", self.intensity)
            .insert("blendFraction", self.blend_fraction)
            .insert("spotOuterAngle", self.spot_outer_angle)
            .insert("axisU", self.axis_u)
            .insert("axisV", self.axis_v)
            .insert("sizeU", self.size_u)
            .insert("sizeV", self.size_v)
            .insert("round", self.round);
    }

    pub fn deserialize(element: &Element) -> Result<Self, DecodeError> {
        let defaults = Light::default();
        Ok(Self {
            world: WorldObject::deserialize(element)?,
            light_type: LightType::parse("type", &element.get_as::<String>("type")?)?,
            size: element.get_or("size", defaults.size)?,
            color: element.get_or("color", defaults.color)?,
            intensity: element.get_or("intensity", defaults.intensity)?,
            blend_fraction: element.get_or("blendFraction", defaults.blend_fraction)?,
            spot_outer_angle: element.get_or("spotOuterAngle", defaults.spot_outer_angle)?,
            axis_u: element.get_or("axisU", defaults.axis_u)?,
            axis_v: element.get_or("axisV", defaults.axis_v)?,
            size_u: element.get_or("sizeU", defaults.size_u)?,
            size_v: element.get_or("sizeV", defaults.size_v)?,
            round: element.get_or("round", defaults.round)?,
            ..defaults
        })
    }
}

impl HasWorldObject for Light {
    fn world_object(&self) -> &WorldObject {
        &self.world
    }

    fn world_object_mut(&mut self) -> &mut WorldObject {
        &mut self.world
    }
}

impl SceneObject for Light {
    fn finalize_state(&self) -> &FinalizeState {
        &self.finalize_state
    }

    fn do_finalize(&self, _scene: &Scene) -> Result<(), SceneError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let mut light = Light::new(LightType::Spot);
        light.set_cone_angle(0.5, 0.1);
        light.color = [1.0, 0.5, 0.25];
        light.round = true;
        let mut element = Element::new();
        light.serialize(&mut element);

        let decoded = Light::deserialize(&element).unwrap();
        assert_eq!(decoded.light_type, LightType::Spot);
        assert_eq!(decoded.spot_outer_angle, 0.5);
        assert_eq!(decoded.blend_fraction, 0.1);
        assert_eq!(decoded.color, light.color);
        assert!(decoded.round);
        assert_eq!(decoded.uuid(), light.uuid());
    }

    #[test]
    fn unknown_type_is_rejected() {
        let mut element = Element::new();
        Light::default().serialize(&mut element);
        element.insert("type", "Laser");
        assert!(matches!(
            Light::deserialize(&element),
            Err(DecodeError::UnknownEnumValue { field: "type", .. })
        ));
    }
}
