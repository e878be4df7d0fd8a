use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::hash::ContentHash;

/// A single typed value of a property tree.
///
/// The tree is what both the scene document and the model cache files are made of.
/// Variants are kept distinct in every encoding, so a `UInt` never comes back as an `Int`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Property {
    Nil,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f32),
    Double(f64),
    String(String),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    /// Three rows of four columns.
    Mat3x4([[f32; 4]; 3]),
    Bytes(Vec<u8>),
    FloatArray(Vec<f32>),
    UIntArray(Vec<u32>),
    Vec2Array(Vec<[f32; 2]>),
    Vec3Array(Vec<[f32; 3]>),
    Vec4Array(Vec<[f32; 4]>),
    Array(Vec<Property>),
    Element(Element),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PropertyError {
    #[error("missing field {0:?}")]
    MissingField(String),
    #[error("field {field:?} is not a {expected}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
    },
}

/// A named group of properties. Keys are kept sorted, which makes every encoding
/// (and therefore every content hash) independent of insertion order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Element {
    fields: BTreeMap<String, Property>,
}

impl Element {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Property>) -> &mut Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Inserts the value only when it is present.
    pub fn insert_opt<T: Into<Property>>(&mut self, key: impl Into<String>, value: Option<T>) -> &mut Self {
        if let Some(value) = value {
            self.insert(key, value);
        }
        self
    }

    pub fn remove(&mut self, key: &str) -> Option<Property> {
        self.fields.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&Property> {
        self.fields.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Property)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn get_as<T: FromProperty>(&self, key: &str) -> Result<T, PropertyError> {
        let property = self
            .get(key)
            .ok_or_else(|| PropertyError::MissingField(key.to_string()))?;
        T::from_property(property).ok_or_else(|| PropertyError::TypeMismatch {
            field: key.to_string(),
            expected: T::TYPE_NAME,
        })
    }

    /// Like [`Element::get_as`], but a missing or `Nil` field is `None`.
    pub fn get_opt<T: FromProperty>(&self, key: &str) -> Result<Option<T>, PropertyError> {
        match self.get(key) {
            None | Some(Property::Nil) => Ok(None),
            Some(_) => self.get_as(key).map(Some),
        }
    }

    /// Returns the value, or `default` when the field is missing.
    pub fn get_or<T: FromProperty>(&self, key: &str, default: T) -> Result<T, PropertyError> {
        Ok(self.get_opt(key)?.unwrap_or(default))
    }

    pub fn element(&self, key: &str) -> Result<&Element, PropertyError> {
        match self.get(key) {
            Some(Property::Element(element)) => Ok(element),
            Some(_) => Err(PropertyError::TypeMismatch {
                field: key.to_string(),
                expected: "element",
            }),
            None => Err(PropertyError::MissingField(key.to_string())),
        }
    }

    pub fn array(&self, key: &str) -> Result<&[Property], PropertyError> {
        match self.get(key) {
            Some(Property::Array(items)) => Ok(items),
            Some(_) => Err(PropertyError::TypeMismatch {
                field: key.to_string(),
                expected: "array",
            }),
            None => Err(PropertyError::MissingField(key.to_string())),
        }
    }

    /// Iterates an array of elements, failing on the first entry that is not an element.
    pub fn elements<'a>(
        &'a self,
        key: &str,
    ) -> Result<impl Iterator<Item = Result<&'a Element, PropertyError>> + 'a, PropertyError> {
        let field = key.to_string();
        let items = self.array(key)?;
        Ok(items.iter().map(move |item| match item {
            Property::Element(element) => Ok(element),
            _ => Err(PropertyError::TypeMismatch {
                field: field.clone(),
                expected: "element",
            }),
        }))
    }

    /// Digest over the whole element, including every nested field.
    pub fn content_hash(&self) -> ContentHash {
        let mut hasher = blake3::Hasher::new();
        self.feed(&mut hasher);
        ContentHash::from_hasher(&hasher)
    }

    fn feed(&self, hasher: &mut blake3::Hasher) {
        hasher.update(&(self.fields.len() as u64).to_le_bytes());
        for (key, value) in &self.fields {
            feed_str(hasher, key);
            value.feed(hasher);
        }
    }
}

impl FromIterator<(String, Property)> for Element {
    fn from_iter<I: IntoIterator<Item = (String, Property)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

fn feed_str(hasher: &mut blake3::Hasher, value: &str) {
    hasher.update(&(value.len() as u64).to_le_bytes());
    hasher.update(value.as_bytes());
}

fn feed_floats(hasher: &mut blake3::Hasher, values: &[f32]) {
    for v in values {
        hasher.update(&v.to_le_bytes());
    }
}

impl Property {
    pub fn type_name(&self) -> &'static str {
        match self {
            Property::Nil => "nil",
            Property::Bool(_) => "bool",
            Property::Int(_) => "int",
            Property::UInt(_) => "uint",
            Property::Float(_) => "float",
            Property::Double(_) => "double",
            Property::String(_) => "string",
            Property::Vec2(_) => "vec2",
            Property::Vec3(_) => "vec3",
            Property::Vec4(_) => "vec4",
            Property::Mat3x4(_) => "mat3x4",
            Property::Bytes(_) => "bytes",
            Property::FloatArray(_) => "float array",
            Property::UIntArray(_) => "uint array",
            Property::Vec2Array(_) => "vec2 array",
            Property::Vec3Array(_) => "vec3 array",
            Property::Vec4Array(_) => "vec4 array",
            Property::Array(_) => "array",
            Property::Element(_) => "element",
        }
    }

    fn tag(&self) -> u8 {
        match self {
            Property::Nil => 0,
            Property::Bool(_) => 1,
            Property::Int(_) => 2,
            Property::UInt(_) => 3,
            Property::Float(_) => 4,
            Property::Double(_) => 5,
            Property::String(_) => 6,
            Property::Vec2(_) => 7,
            Property::Vec3(_) => 8,
            Property::Vec4(_) => 9,
            Property::Mat3x4(_) => 10,
            Property::Bytes(_) => 11,
            Property::FloatArray(_) => 12,
            Property::UIntArray(_) => 13,
            Property::Vec2Array(_) => 14,
            Property::Vec3Array(_) => 15,
            Property::Vec4Array(_) => 16,
            Property::Array(_) => 17,
            Property::Element(_) => 18,
        }
    }

    fn feed(&self, hasher: &mut blake3::Hasher) {
        hasher.update(&[self.tag()]);
        match self {
            Property::Nil => {}
            Property::Bool(v) => {
                hasher.update(&[*v as u8]);
            }
            Property::Int(v) => {
                hasher.update(&v.to_le_bytes());
            }
            Property::UInt(v) => {
                hasher.update(&v.to_le_bytes());
            }
            Property::Float(v) => {
                hasher.update(&v.to_le_bytes());
            }
            Property::Double(v) => {
                hasher.update(&v.to_le_bytes());
            }
            Property::String(v) => feed_str(hasher, v),
            Property::Vec2(v) => feed_floats(hasher, v),
            Property::Vec3(v) => feed_floats(hasher, v),
            Property::Vec4(v) => feed_floats(hasher, v),
            Property::Mat3x4(rows) => {
                for row in rows {
                    feed_floats(hasher, row);
                }
            }
            Property::Bytes(v) => {
                hasher.update(&(v.len() as u64).to_le_bytes());
                hasher.update(v);
            }
            Property::FloatArray(v) => {
                hasher.update(&(v.len() as u64).to_le_bytes());
                feed_floats(hasher, v);
            }
            Property::UIntArray(v) => {
                hasher.update(&(v.len() as u64).to_le_bytes());
                for i in v {
                    hasher.update(&i.to_le_bytes());
                }
            }
            Property::Vec2Array(v) => {
                hasher.update(&(v.len() as u64).to_le_bytes());
                v.iter().for_each(|x| feed_floats(hasher, x));
            }
            Property::Vec3Array(v) => {
                hasher.update(&(v.len() as u64).to_le_bytes());
                v.iter().for_each(|x| feed_floats(hasher, x));
            }
            Property::Vec4Array(v) => {
                hasher.update(&(v.len() as u64).to_le_bytes());
                v.iter().for_each(|x| feed_floats(hasher, x));
            }
            Property::Array(items) => {
                hasher.update(&(items.len() as u64).to_le_bytes());
                for item in items {
                    item.feed(hasher);
                }
            }
            Property::Element(element) => element.feed(hasher),
        }
    }
}

/// Typed read access to a [`Property`].
pub trait FromProperty: Sized {
    const TYPE_NAME: &'static str;
    fn from_property(property: &Property) -> Option<Self>;
}

macro_rules! property_conversion {
    ($ty:ty, $variant:ident, $name:literal) => {
        impl From<$ty> for Property {
            fn from(value: $ty) -> Self {
                Property::$variant(value)
            }
        }

        impl FromProperty for $ty {
            const TYPE_NAME: &'static str = $name;
            fn from_property(property: &Property) -> Option<Self> {
                match property {
                    Property::$variant(value) => Some(value.clone()),
                    _ => None,
                }
            }
        }
    };
}

property_conversion!(bool, Bool, "bool");
property_conversion!(i64, Int, "int");
property_conversion!(u64, UInt, "uint");
property_conversion!(f32, Float, "float");
property_conversion!(f64, Double, "double");
property_conversion!(String, String, "string");
property_conversion!([f32; 2], Vec2, "vec2");
property_conversion!([f32; 3], Vec3, "vec3");
property_conversion!([f32; 4], Vec4, "vec4");
property_conversion!([[f32; 4]; 3], Mat3x4, "mat3x4");
property_conversion!(Vec<u8>, Bytes, "bytes");
property_conversion!(Vec<f32>, FloatArray, "float array");
property_conversion!(Vec<u32>, UIntArray, "uint array");
property_conversion!(Vec<[f32; 2]>, Vec2Array, "vec2 array");
property_conversion!(Vec<[f32; 3]>, Vec3Array, "vec3 array");
property_conversion!(Vec<[f32; 4]>, Vec4Array, "vec4 array");
property_conversion!(Vec<Property>, Array, "array");
property_conversion!(Element, Element, "element");

impl From<&str> for Property {
    fn from(value: &str) -> Self {
        Property::String(value.to_string())
    }
}

impl From<i32> for Property {
    fn from(value: i32) -> Self {
        Property::Int(value as i64)
    }
}

impl From<u32> for Property {
    fn from(value: u32) -> Self {
        Property::UInt(value as u64)
    }
}

impl FromProperty for i32 {
    const TYPE_NAME: &'static str = "32 bit int";
    fn from_property(property: &Property) -> Option<Self> {
        match property {
            Property::Int(value) => (*value).try_into().ok(),
            _ => None,
        }
    }
}

impl FromProperty for u32 {
    const TYPE_NAME: &'static str = "32 bit uint";
    fn from_property(property: &Property) -> Option<Self> {
        match property {
            Property::UInt(value) => (*value).try_into().ok(),
            _ => None,
        }
    }
}

impl FromProperty for Property {
    const TYPE_NAME: &'static str = "property";
    fn from_property(property: &Property) -> Option<Self> {
        Some(property.clone())
    }
}
