use serde::{Deserialize, Serialize};
use ultraviolet::{Rotor3, Vec3};

use crate::property::{Element, PropertyError};

/// Position, orientation and non-uniform scale of an entity.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Pose {
    pub position: Vec3,
    pub orientation: Rotor3,
    pub scale: Vec3,
}

impl Pose {
    pub fn from_arrays(position: [f32; 3], orientation: [f32; 4], scale: [f32; 3]) -> Self {
        Self {
            position: Vec3::from(position),
            orientation: Rotor3::from_quaternion_array(orientation),
            scale: Vec3::from(scale),
        }
    }

    /// Quaternion as `[x, y, z, w]`.
    pub fn quaternion(&self) -> [f32; 4] {
        self.orientation.into_quaternion_array()
    }

    pub fn to_element(&self) -> Element {
        let position: [f32; 3] = self.position.into();
        let scale: [f32; 3] = self.scale.into();
        let mut element = Element::new();
        element
            .insert("position", position)
            .insert("rotation", self.quaternion())
            .insert("scale", scale);
        element
    }

    pub fn from_element(element: &Element) -> Result<Self, PropertyError> {
        Ok(Self::from_arrays(
            element.get_as("position")?,
            element.get_as("rotation")?,
            element.get_or("scale", [1.0; 3])?,
        ))
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            position: Vec3::zero(),
            orientation: Rotor3::identity(),
            scale: Vec3::one(),
        }
    }
}
