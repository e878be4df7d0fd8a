use scene_common::{Element, Pose};
use ultraviolet::{Rotor3, Vec3};
use uuid::Uuid;

use crate::error::DecodeError;

/// Pose plus a process-unique identity shared by every placeable entity.
#[derive(Clone, Debug, PartialEq)]
pub struct WorldObject {
    pose: Pose,
    uuid: Uuid,
}

impl Default for WorldObject {
    fn default() -> Self {
        Self::new()
    }
}

impl WorldObject {
    pub fn new() -> Self {
        Self {
            pose: Pose::default(),
            uuid: Uuid::new_v4(),
        }
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn pose(&self) -> &Pose {
        &self.pose
    }

    pub fn set_pose(&mut self, pose: Pose) {
        self.pose = pose;
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.pose.position = position;
    }

    pub fn set_rotation(&mut self, rotation: Rotor3) {
        self.pose.orientation = rotation;
    }

    pub fn set_scale(&mut self, scale: Vec3) {
        self.pose.scale = scale;
    }

    pub fn serialize(&self, element: &mut Element) {
        element
            .insert("pose", self.pose.to_element())
            .insert("uuid", self.uuid.to_string());
    }

    pub fn deserialize(element: &Element) -> Result<Self, DecodeError> {
        let pose = Pose::from_element(element.element("pose")?)?;
        let uuid: String = element.get_as("uuid")?;
        let uuid = Uuid::parse_str(&uuid).map_err(|_| DecodeError::UnknownEnumValue {
            field: "uuid",
            value: uuid,
        })?;
        Ok(Self { pose, uuid })
    }
}

/// Entities that carry a [`WorldObject`].
pub trait HasWorldObject {
    fn world_object(&self) -> &WorldObject;
    fn world_object_mut(&mut self) -> &mut WorldObject;

    fn uuid(&self) -> Uuid {
        self.world_object().uuid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuids_are_unique() {
        assert_ne!(WorldObject::new().uuid(), WorldObject::new().uuid());
    }

    #[test]
    fn serialization_keeps_identity() {
        let mut object = WorldObject::new();
        object.set_position(Vec3::new(1.0, 2.0, 3.0));
        let mut element = Element::new();
        object.serialize(&mut element);
        assert_eq!(WorldObject::deserialize(&element).unwrap(), object);
    }

    #[test]
    fn malformed_uuid_is_a_decode_error() {
        let mut element = Element::new();
        WorldObject::new().serialize(&mut element);
        element.insert("uuid", "not-a-uuid");
        assert!(WorldObject::deserialize(&element).is_err());
    }
}
