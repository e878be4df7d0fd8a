use std::{
    fmt::{Display, Formatter},
    io::{Read, Write},
    str::FromStr,
};

use scene_common::{
    wire::{invalid_data, WireRead, WireWrite},
    Element, Property,
};

use crate::error::DecodeError;

/// A 4x3 affine matrix stored as four columns of three rows.
pub type TransformMatrix = [[f32; 3]; 4];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SocketType {
    Bool = 0,
    Float,
    Int,
    UInt,
    Color,
    Vector,
    Point,
    Normal,
    Point2,
    Closure,
    String,
    Enum,
    Transform,
    Node,
    FloatArray,
    ColorArray,
}

impl SocketType {
    pub const ALL: [SocketType; 16] = [
        SocketType::Bool,
        SocketType::Float,
        SocketType::Int,
        SocketType::UInt,
        SocketType::Color,
        SocketType::Vector,
        SocketType::Point,
        SocketType::Normal,
        SocketType::Point2,
        SocketType::Closure,
        SocketType::String,
        SocketType::Enum,
        SocketType::Transform,
        SocketType::Node,
        SocketType::FloatArray,
        SocketType::ColorArray,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SocketType::Bool => "Bool",
            SocketType::Float => "Float",
            SocketType::Int => "Int",
            SocketType::UInt => "UInt",
            SocketType::Color => "Color",
            SocketType::Vector => "Vector",
            SocketType::Point => "Point",
            SocketType::Normal => "Normal",
            SocketType::Point2 => "Point2",
            SocketType::Closure => "Closure",
            SocketType::String => "String",
            SocketType::Enum => "Enum",
            SocketType::Transform => "Transform",
            SocketType::Node => "Node",
            SocketType::FloatArray => "FloatArray",
            SocketType::ColorArray => "ColorArray",
        }
    }

    pub fn from_u8(tag: u8) -> Option<Self> {
        Self::ALL.get(tag as usize).copied()
    }

    fn is_scalar(self) -> bool {
        matches!(
            self,
            SocketType::Bool
                | SocketType::Float
                | SocketType::Int
                | SocketType::UInt
                | SocketType::Enum
        )
    }

    fn is_vector3(self) -> bool {
        matches!(
            self,
            SocketType::Color | SocketType::Vector | SocketType::Point | SocketType::Normal
        )
    }
}

impl Display for SocketType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SocketType {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| DecodeError::UnknownEnumValue {
                field: "type",
                value: s.to_string(),
            })
    }
}

/// The conversion matrix.
///
/// | from \ to            | scalar | vector3 | Point2 | everything else |
/// |----------------------|--------|---------|--------|-----------------|
/// | scalar               | yes    | splat   | splat  | no              |
/// | vector3              | mean   | yes     | xy     | no              |
/// | Point2               | no     | xy0     | yes    | no              |
///
/// Scalars are Bool, Float, Int, UInt and Enum, vector3 kinds are Color, Vector, Point
/// and Normal. Any type converts to itself.
pub fn is_convertible_to(src: SocketType, dst: SocketType) -> bool {
    if src == dst {
        return true;
    }
    match (src, dst) {
        (s, d) if s.is_scalar() && (d.is_scalar() || d.is_vector3() || d == SocketType::Point2) => true,
        (s, d) if s.is_vector3() && (d.is_scalar() || d.is_vector3() || d == SocketType::Point2) => true,
        (SocketType::Point2, d) if d.is_vector3() => true,
        _ => false,
    }
}

/// A typed shader parameter value. Every kind except `Closure` and `Node` may be empty.
#[derive(Clone, Debug, PartialEq)]
pub enum DataValue {
    Bool(Option<bool>),
    Float(Option<f32>),
    Int(Option<i32>),
    UInt(Option<u32>),
    Color(Option<[f32; 3]>),
    Vector(Option<[f32; 3]>),
    Point(Option<[f32; 3]>),
    Normal(Option<[f32; 3]>),
    Point2(Option<[f32; 2]>),
    Closure,
    String(Option<String>),
    Enum(Option<i32>),
    Transform(Option<TransformMatrix>),
    Node,
    FloatArray(Option<Vec<f32>>),
    ColorArray(Option<Vec<[f32; 3]>>),
}

/// Intermediate form used by [`convert`].
enum Numeric {
    Scalar(f64),
    Vector3([f32; 3]),
    Vector2([f32; 2]),
}

impl DataValue {
    /// An empty value of the given type.
    pub fn empty(socket_type: SocketType) -> Self {
        match socket_type {
            SocketType::Bool => DataValue::Bool(None),
            SocketType::Float => DataValue::Float(None),
            SocketType::Int => DataValue::Int(None),
            SocketType::UInt => DataValue::UInt(None),
            SocketType::Color => DataValue::Color(None),
            SocketType::Vector => DataValue::Vector(None),
            SocketType::Point => DataValue::Point(None),
            SocketType::Normal => DataValue::Normal(None),
            SocketType::Point2 => DataValue::Point2(None),
            SocketType::Closure => DataValue::Closure,
            SocketType::String => DataValue::String(None),
            SocketType::Enum => DataValue::Enum(None),
            SocketType::Transform => DataValue::Transform(None),
            SocketType::Node => DataValue::Node,
            SocketType::FloatArray => DataValue::FloatArray(None),
            SocketType::ColorArray => DataValue::ColorArray(None),
        }
    }

    pub fn socket_type(&self) -> SocketType {
        match self {
            DataValue::Bool(_) => SocketType::Bool,
            DataValue::Float(_) => SocketType::Float,
            DataValue::Int(_) => SocketType::Int,
            DataValue::UInt(_) => SocketType::UInt,
            DataValue::Color(_) => SocketType::Color,
            DataValue::Vector(_) => SocketType::Vector,
            DataValue::Point(_) => SocketType::Point,
            DataValue::Normal(_) => SocketType::Normal,
            DataValue::Point2(_) => SocketType::Point2,
            DataValue::Closure => SocketType::Closure,
            DataValue::String(_) => SocketType::String,
            DataValue::Enum(_) => SocketType::Enum,
            DataValue::Transform(_) => SocketType::Transform,
            DataValue::Node => SocketType::Node,
            DataValue::FloatArray(_) => SocketType::FloatArray,
            DataValue::ColorArray(_) => SocketType::ColorArray,
        }
    }

    pub fn has_value(&self) -> bool {
        match self {
            DataValue::Bool(v) => v.is_some(),
            DataValue::Float(v) => v.is_some(),
            DataValue::Int(v) | DataValue::Enum(v) => v.is_some(),
            DataValue::UInt(v) => v.is_some(),
            DataValue::Color(v) | DataValue::Vector(v) | DataValue::Point(v) | DataValue::Normal(v) => {
                v.is_some()
            }
            DataValue::Point2(v) => v.is_some(),
            DataValue::String(v) => v.is_some(),
            DataValue::Transform(v) => v.is_some(),
            DataValue::FloatArray(v) => v.is_some(),
            DataValue::ColorArray(v) => v.is_some(),
            DataValue::Closure | DataValue::Node => false,
        }
    }

    fn numeric(&self) -> Option<Numeric> {
        Some(match self {
            DataValue::Bool(v) => Numeric::Scalar(if (*v)? { 1.0 } else { 0.0 }),
            DataValue::Float(v) => Numeric::Scalar((*v)? as f64),
            DataValue::Int(v) | DataValue::Enum(v) => Numeric::Scalar((*v)? as f64),
            DataValue::UInt(v) => Numeric::Scalar((*v)? as f64),
            DataValue::Color(v) | DataValue::Vector(v) | DataValue::Point(v) | DataValue::Normal(v) => {
                Numeric::Vector3((*v)?)
            }
            DataValue::Point2(v) => Numeric::Vector2((*v)?),
            _ => return None,
        })
    }

    /// Binary form: type tag, presence flag, then the payload.
    pub fn write_binary<W: Write + ?Sized>(&self, out: &mut W) -> std::io::Result<()> {
        out.write_u8(self.socket_type() as u8)?;
        out.write_bool(self.has_value())?;
        match self {
            DataValue::Bool(Some(v)) => out.write_bool(*v),
            DataValue::Float(Some(v)) => out.write_f32(*v),
            DataValue::Int(Some(v)) | DataValue::Enum(Some(v)) => out.write_i32(*v),
            DataValue::UInt(Some(v)) => out.write_u32(*v),
            DataValue::Color(Some(v))
            | DataValue::Vector(Some(v))
            | DataValue::Point(Some(v))
            | DataValue::Normal(Some(v)) => out.write_f32s(v),
            DataValue::Point2(Some(v)) => out.write_f32s(v),
            DataValue::String(Some(v)) => out.write_cstring(v),
            DataValue::Transform(Some(columns)) => columns.iter().try_for_each(|c| out.write_f32s(c)),
            DataValue::FloatArray(Some(v)) => {
                out.write_u32(array_len(v.len())?)?;
                out.write_f32s(v)
            }
            DataValue::ColorArray(Some(v)) => {
                out.write_u32(array_len(v.len())?)?;
                v.iter().try_for_each(|c| out.write_f32s(c))
            }
            _ => Ok(()),
        }
    }

    pub fn read_binary<R: Read>(input: &mut R) -> Result<Self, DecodeError> {
        let tag = input.read_u8()?;
        let socket_type = SocketType::from_u8(tag).ok_or_else(|| DecodeError::UnknownEnumValue {
            field: "type",
            value: tag.to_string(),
        })?;
        if !input.read_bool()? {
            return Ok(Self::empty(socket_type));
        }
        Ok(match socket_type {
            SocketType::Bool => DataValue::Bool(Some(input.read_bool()?)),
            SocketType::Float => DataValue::Float(Some(input.read_f32()?)),
            SocketType::Int => DataValue::Int(Some(input.read_i32()?)),
            SocketType::UInt => DataValue::UInt(Some(input.read_u32()?)),
            SocketType::Color => DataValue::Color(Some(input.read_f32_array()?)),
            SocketType::Vector => DataValue::Vector(Some(input.read_f32_array()?)),
            SocketType::Point => DataValue::Point(Some(input.read_f32_array()?)),
            SocketType::Normal => DataValue::Normal(Some(input.read_f32_array()?)),
            SocketType::Point2 => DataValue::Point2(Some(input.read_f32_array()?)),
            SocketType::Enum => DataValue::Enum(Some(input.read_i32()?)),
            SocketType::String => DataValue::String(Some(input.read_cstring()?)),
            SocketType::Transform => {
                let mut columns = [[0.0; 3]; 4];
                for column in columns.iter_mut() {
                    *column = input.read_f32_array()?;
                }
                DataValue::Transform(Some(columns))
            }
            SocketType::FloatArray => {
                let count = input.read_u32()?;
                DataValue::FloatArray(Some(input.read_items(count as u64, |r| r.read_f32())?))
            }
            SocketType::ColorArray => {
                let count = input.read_u32()?;
                DataValue::ColorArray(Some(
                    input.read_items(count as u64, |r| r.read_f32_array::<3>())?,
                ))
            }
            SocketType::Closure | SocketType::Node => Self::empty(socket_type),
        })
    }

    /// Document form. Transforms are written transposed, as three rows of four.
    pub fn serialize(&self, element: &mut Element) {
        element.insert("type", self.socket_type().name());
        let value = match self {
            DataValue::Bool(Some(v)) => Property::Bool(*v),
            DataValue::Float(Some(v)) => Property::Float(*v),
            DataValue::Int(Some(v)) | DataValue::Enum(Some(v)) => Property::from(*v),
            DataValue::UInt(Some(v)) => Property::from(*v),
            DataValue::Color(Some(v))
            | DataValue::Vector(Some(v))
            | DataValue::Point(Some(v))
            | DataValue::Normal(Some(v)) => Property::Vec3(*v),
            DataValue::Point2(Some(v)) => Property::Vec2(*v),
            DataValue::String(Some(v)) => Property::String(v.clone()),
            DataValue::Transform(Some(columns)) => Property::Mat3x4(transpose(columns)),
            DataValue::FloatArray(Some(v)) => Property::FloatArray(v.clone()),
            DataValue::ColorArray(Some(v)) => Property::Vec3Array(v.clone()),
            _ => Property::Nil,
        };
        element.insert("value", value);
    }

    pub fn deserialize(element: &Element) -> Result<Self, DecodeError> {
        let socket_type: SocketType = element.get_as::<String>("type")?.parse()?;
        if matches!(element.get("value"), None | Some(Property::Nil)) {
            return Ok(Self::empty(socket_type));
        }
        Ok(match socket_type {
            SocketType::Bool => DataValue::Bool(Some(element.get_as("value")?)),
            SocketType::Float => DataValue::Float(Some(element.get_as("value")?)),
            SocketType::Int => DataValue::Int(Some(element.get_as("value")?)),
            SocketType::UInt => DataValue::UInt(Some(element.get_as("value")?)),
            SocketType::Color => DataValue::Color(Some(element.get_as("value")?)),
            SocketType::Vector => DataValue::Vector(Some(element.get_as("value")?)),
            SocketType::Point => DataValue::Point(Some(element.get_as("value")?)),
            SocketType::Normal => DataValue::Normal(Some(element.get_as("value")?)),
            SocketType::Point2 => DataValue::Point2(Some(element.get_as("value")?)),
            SocketType::Enum => DataValue::Enum(Some(element.get_as("value")?)),
            SocketType::String => DataValue::String(Some(element.get_as("value")?)),
            SocketType::Transform => {
                let rows: [[f32; 4]; 3] = element.get_as("value")?;
                DataValue::Transform(Some(transpose_back(&rows)))
            }
            SocketType::FloatArray => DataValue::FloatArray(Some(element.get_as("value")?)),
            SocketType::ColorArray => DataValue::ColorArray(Some(element.get_as("value")?)),
            SocketType::Closure | SocketType::Node => Self::empty(socket_type),
        })
    }
}

fn array_len(len: usize) -> std::io::Result<u32> {
    u32::try_from(len).map_err(|_| invalid_data("array is too long for a data value"))
}

fn transpose(columns: &TransformMatrix) -> [[f32; 4]; 3] {
    let mut rows = [[0.0; 4]; 3];
    for (c, column) in columns.iter().enumerate() {
        for (r, v) in column.iter().enumerate() {
            rows[r][c] = *v;
        }
    }
    rows
}

fn transpose_back(rows: &[[f32; 4]; 3]) -> TransformMatrix {
    let mut columns = [[0.0; 3]; 4];
    for (r, row) in rows.iter().enumerate() {
        for (c, v) in row.iter().enumerate() {
            columns[c][r] = *v;
        }
    }
    columns
}

/// Converts `value` to `dst`, or `None` when the pair is outside the conversion matrix
/// or the number does not fit the destination.
///
/// Float to integer conversions truncate toward zero, integer to integer conversions
/// must be exact.
pub fn convert(value: &DataValue, dst: SocketType) -> Option<DataValue> {
    let src = value.socket_type();
    if !is_convertible_to(src, dst) {
        return None;
    }
    if src == dst {
        return Some(value.clone());
    }
    let Some(numeric) = value.numeric() else {
        return Some(DataValue::empty(dst));
    };
    let as_vector3 = match &numeric {
        Numeric::Scalar(s) => [*s as f32; 3],
        Numeric::Vector3(v) => *v,
        Numeric::Vector2([x, y]) => [*x, *y, 0.0],
    };
    let as_scalar = match &numeric {
        Numeric::Scalar(s) => *s,
        Numeric::Vector3([x, y, z]) => (*x as f64 + *y as f64 + *z as f64) / 3.0,
        Numeric::Vector2(_) => return None,
    };
    let integral = |s: f64| -> Option<i64> { s.is_finite().then(|| s.trunc() as i64) };
    Some(match dst {
        SocketType::Bool => DataValue::Bool(Some(as_scalar != 0.0)),
        SocketType::Float => DataValue::Float(Some(as_scalar as f32)),
        SocketType::Int => DataValue::Int(Some(i32::try_from(integral(as_scalar)?).ok()?)),
        SocketType::Enum => DataValue::Enum(Some(i32::try_from(integral(as_scalar)?).ok()?)),
        SocketType::UInt => DataValue::UInt(Some(u32::try_from(integral(as_scalar)?).ok()?)),
        SocketType::Color => DataValue::Color(Some(as_vector3)),
        SocketType::Vector => DataValue::Vector(Some(as_vector3)),
        SocketType::Point => DataValue::Point(Some(as_vector3)),
        SocketType::Normal => DataValue::Normal(Some(as_vector3)),
        SocketType::Point2 => DataValue::Point2(Some([as_vector3[0], as_vector3[1]])),
        _ => return None,
    })
}

impl From<bool> for DataValue {
    fn from(value: bool) -> Self {
        DataValue::Bool(Some(value))
    }
}

impl From<f32> for DataValue {
    fn from(value: f32) -> Self {
        DataValue::Float(Some(value))
    }
}

impl From<i32> for DataValue {
    fn from(value: i32) -> Self {
        DataValue::Int(Some(value))
    }
}

impl From<u32> for DataValue {
    fn from(value: u32) -> Self {
        DataValue::UInt(Some(value))
    }
}

impl From<&str> for DataValue {
    fn from(value: &str) -> Self {
        DataValue::String(Some(value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn samples() -> Vec<DataValue> {
        vec![
            DataValue::from(true),
            DataValue::from(0.25f32),
            DataValue::from(-7i32),
            DataValue::from(9u32),
            DataValue::Color(Some([1.0, 0.5, 0.0])),
            DataValue::Normal(None),
            DataValue::Point2(Some([3.0, 4.0])),
            DataValue::Enum(Some(2)),
            DataValue::Transform(Some([
                [1.0, 2.0, 3.0],
                [4.0, 5.0, 6.0],
                [7.0, 8.0, 9.0],
                [10.0, 11.0, 12.0],
            ])),
            DataValue::from("image.png"),
            DataValue::FloatArray(Some(vec![0.1, 0.2])),
            DataValue::ColorArray(Some(vec![[0.0, 1.0, 0.0]])),
            DataValue::Closure,
            DataValue::Node,
        ]
    }

    #[test]
    fn binary_round_trip() {
        for value in samples() {
            let mut bytes = Vec::new();
            value.write_binary(&mut bytes).unwrap();
            let decoded = DataValue::read_binary(&mut Cursor::new(bytes)).unwrap();
            assert_eq!(decoded, value);
        }
    }

    #[test]
    fn arrays_keep_their_type() {
        let value = DataValue::FloatArray(Some(vec![1.0, 2.0, 3.0]));
        let mut bytes = Vec::new();
        value.write_binary(&mut bytes).unwrap();
        let decoded = DataValue::read_binary(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(decoded.socket_type(), SocketType::FloatArray);
    }

    #[test]
    fn document_round_trip() {
        for value in samples() {
            let mut element = Element::new();
            value.serialize(&mut element);
            assert_eq!(DataValue::deserialize(&element).unwrap(), value);
        }
    }

    #[test]
    fn transform_is_transposed_in_documents() {
        let columns = [
            [1.0, 2.0, 3.0],
            [4.0, 5.0, 6.0],
            [7.0, 8.0, 9.0],
            [10.0, 11.0, 12.0],
        ];
        let mut element = Element::new();
        DataValue::Transform(Some(columns)).serialize(&mut element);
        assert_eq!(
            element.get("value"),
            Some(&Property::Mat3x4([
                [1.0, 4.0, 7.0, 10.0],
                [2.0, 5.0, 8.0, 11.0],
                [3.0, 6.0, 9.0, 12.0],
            ]))
        );
        assert_eq!(
            DataValue::deserialize(&element).unwrap(),
            DataValue::Transform(Some(columns))
        );
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let err = DataValue::read_binary(&mut Cursor::new(vec![200u8, 0])).unwrap_err();
        assert!(matches!(err, DecodeError::UnknownEnumValue { .. }));
    }

    #[test]
    fn conversion_matrix() {
        assert!(is_convertible_to(SocketType::Float, SocketType::Color));
        assert!(is_convertible_to(SocketType::Color, SocketType::Float));
        assert!(is_convertible_to(SocketType::Point2, SocketType::Vector));
        assert!(!is_convertible_to(SocketType::Point2, SocketType::Float));
        assert!(!is_convertible_to(SocketType::String, SocketType::Float));
        assert!(!is_convertible_to(SocketType::Closure, SocketType::Color));
        for t in SocketType::ALL {
            assert!(is_convertible_to(t, t));
        }
    }

    #[test]
    fn convert_respects_the_matrix() {
        assert_eq!(convert(&DataValue::from("x"), SocketType::Float), None);
        assert_eq!(
            convert(&DataValue::from(0.5f32), SocketType::Color),
            Some(DataValue::Color(Some([0.5; 3])))
        );
        assert_eq!(
            convert(&DataValue::Vector(Some([1.0, 2.0, 3.0])), SocketType::Float),
            Some(DataValue::Float(Some(2.0)))
        );
        assert_eq!(
            convert(&DataValue::from(2.9f32), SocketType::Int),
            Some(DataValue::Int(Some(2)))
        );
        assert_eq!(convert(&DataValue::from(-1i32), SocketType::UInt), None);
        assert_eq!(
            convert(&DataValue::from(3u32), SocketType::Bool),
            Some(DataValue::Bool(Some(true)))
        );
        assert_eq!(
            convert(&DataValue::Float(None), SocketType::Int),
            Some(DataValue::Int(None))
        );
    }

    #[test]
    fn names_round_trip() {
        for t in SocketType::ALL {
            assert_eq!(t.name().parse::<SocketType>().unwrap(), t);
            assert_eq!(SocketType::from_u8(t as u8), Some(t));
        }
    }
}
