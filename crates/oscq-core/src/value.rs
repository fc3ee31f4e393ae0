//! Typed parameter values and their two outward renderings: OSC arguments
//! (feedback) and JSON `VALUE` entries (query documents).

use oscq_codec::OscArg;
use serde_json::Value as Json;
use std::sync::Arc;

/// The declared type of a bindable member.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueType {
    String,
    Char,
    Bool,
    Int,
    Float,
    Vec2,
    Vec3,
    Vec4,
    Color,
    /// Stored as a quaternion, exposed as Euler angles in degrees.
    Quaternion,
    /// Ordered legal names.
    Enum(Arc<[String]>),
    /// Zero-argument action.
    Invoke,
}

impl ValueType {
    pub fn enumeration<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ValueType::Enum(names.into_iter().map(Into::into).collect())
    }

    /// OSCQuery `TYPE` string.
    pub fn type_tag(&self) -> &'static str {
        match self {
            ValueType::String | ValueType::Char | ValueType::Enum(_) => "s",
            ValueType::Bool => "T",
            ValueType::Int => "i",
            ValueType::Float => "f",
            ValueType::Vec2 => "ff",
            ValueType::Vec3 | ValueType::Quaternion => "fff",
            ValueType::Vec4 => "ffff",
            ValueType::Color => "r",
            ValueType::Invoke => "N",
        }
    }

    /// Number of OSC arguments a value of this type occupies.
    pub fn arity(&self) -> usize {
        match self {
            ValueType::Invoke => 0,
            ValueType::Vec2 => 2,
            ValueType::Vec3 | ValueType::Quaternion => 3,
            ValueType::Vec4 => 4,
            _ => 1,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ValueType::Int
                | ValueType::Float
                | ValueType::Vec2
                | ValueType::Vec3
                | ValueType::Vec4
                | ValueType::Quaternion
        )
    }

    pub fn enum_names(&self) -> Option<&[String]> {
        match self {
            ValueType::Enum(names) => Some(names),
            _ => None,
        }
    }
}

/// Unit quaternion, `x, y, z, w` order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quat {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Quat {
    pub const IDENTITY: Quat = Quat { x: 0.0, y: 0.0, z: 0.0, w: 1.0 };

    /// Rotation from Euler angles in degrees, applied Z first, then X, then Y.
    pub fn from_euler_degrees(euler: [f32; 3]) -> Self {
        let [hx, hy, hz] = euler.map(|deg| deg.to_radians() * 0.5);
        let (sx, cx) = hx.sin_cos();
        let (sy, cy) = hy.sin_cos();
        let (sz, cz) = hz.sin_cos();

        Quat {
            x: sx * cy * cz + cx * sy * sz,
            y: cx * sy * cz - sx * cy * sz,
            z: cx * cy * sz - sx * sy * cz,
            w: cx * cy * cz + sx * sy * sz,
        }
    }

    /// Inverse of [`Quat::from_euler_degrees`], each angle normalised to `[0, 360)`.
    pub fn to_euler_degrees(&self) -> [f32; 3] {
        let Quat { x, y, z, w } = *self;

        let m12 = 2.0 * (y * z - w * x);
        let (pitch, yaw, roll) = if m12.abs() < 0.999_999 {
            let pitch = (-m12).asin();
            let yaw = (2.0 * (x * z + w * y)).atan2(1.0 - 2.0 * (x * x + y * y));
            let roll = (2.0 * (x * y + w * z)).atan2(1.0 - 2.0 * (x * x + z * z));
            (pitch, yaw, roll)
        } else {
            // Gimbal lock: fold roll into yaw.
            let pitch = if m12 < 0.0 { std::f32::consts::FRAC_PI_2 } else { -std::f32::consts::FRAC_PI_2 };
            let yaw = (-(2.0 * (x * z - w * y))).atan2(1.0 - 2.0 * (y * y + z * z));
            (pitch, yaw, 0.0)
        };

        [pitch, yaw, roll].map(|rad| normalize_degrees(rad.to_degrees()))
    }
}

fn normalize_degrees(deg: f32) -> f32 {
    let d = deg.rem_euclid(360.0);
    // rem_euclid can land on exactly 360.0 through rounding.
    if d >= 360.0 {
        0.0
    } else {
        d
    }
}

/// A live parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Char(char),
    Bool(bool),
    Int(i32),
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    /// RGBA, components nominally in `0.0..=1.0`.
    Color([f32; 4]),
    Rotation(Quat),
    /// Enum member by name.
    Enum(String),
}

impl Value {
    /// Equality used by the feedback diff: exact for scalars and strings,
    /// component-wise for vectors and colours. Floats compare by bit pattern so
    /// a NaN parameter does not re-send forever.
    pub fn same_as(&self, other: &Value) -> bool {
        fn eq(a: &[f32], b: &[f32]) -> bool {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
        }
        match (self, other) {
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Vec2(a), Value::Vec2(b)) => eq(a, b),
            (Value::Vec3(a), Value::Vec3(b)) => eq(a, b),
            (Value::Vec4(a), Value::Vec4(b)) | (Value::Color(a), Value::Color(b)) => eq(a, b),
            (Value::Rotation(a), Value::Rotation(b)) => {
                eq(&[a.x, a.y, a.z, a.w], &[b.x, b.y, b.z, b.w])
            }
            (a, b) => a == b,
        }
    }

    /// Arguments for an outgoing feedback message.
    pub fn to_osc_args(&self) -> Vec<OscArg> {
        match self {
            Value::String(s) | Value::Enum(s) => vec![OscArg::String(s.clone())],
            Value::Char(c) => vec![OscArg::String(c.to_string())],
            Value::Bool(b) => vec![OscArg::Bool(*b)],
            Value::Int(v) => vec![OscArg::Int(*v)],
            Value::Float(v) => vec![OscArg::Float(*v)],
            Value::Vec2(v) => v.iter().copied().map(OscArg::Float).collect(),
            Value::Vec3(v) => v.iter().copied().map(OscArg::Float).collect(),
            Value::Vec4(v) => v.iter().copied().map(OscArg::Float).collect(),
            Value::Color(c) => vec![OscArg::Color(pack_rgba(*c))],
            Value::Rotation(q) => q.to_euler_degrees().iter().copied().map(OscArg::Float).collect(),
        }
    }

    /// Entries of the JSON `VALUE` array.
    pub fn to_json(&self) -> Vec<Json> {
        match self {
            Value::String(s) | Value::Enum(s) => vec![Json::from(s.as_str())],
            Value::Char(c) => vec![Json::from(c.to_string())],
            Value::Bool(b) => vec![Json::from(*b)],
            Value::Int(v) => vec![Json::from(*v)],
            Value::Float(v) => vec![Json::from(*v)],
            Value::Vec2(v) => v.iter().map(|f| Json::from(*f)).collect(),
            Value::Vec3(v) => v.iter().map(|f| Json::from(*f)).collect(),
            Value::Vec4(v) => v.iter().map(|f| Json::from(*f)).collect(),
            Value::Color(c) => vec![Json::from(color_to_hex(*c))],
            Value::Rotation(q) => q.to_euler_degrees().iter().map(|f| Json::from(*f)).collect(),
        }
    }
}

fn channel_to_byte(c: f32) -> u32 {
    (c.clamp(0.0, 1.0) * 255.0).round() as u32
}

/// Packs an RGBA colour as 0xRRGGBBAA.
pub fn pack_rgba(c: [f32; 4]) -> u32 {
    c.iter().fold(0u32, |acc, ch| (acc << 8) | channel_to_byte(*ch))
}

pub fn unpack_rgba(packed: u32) -> [f32; 4] {
    [24, 16, 8, 0].map(|shift| ((packed >> shift) & 0xFF) as f32 / 255.0)
}

/// `RRGGBBAA`, upper-case, no leading `#`.
pub fn color_to_hex(c: [f32; 4]) -> String {
    format!("{:08X}", pack_rgba(c))
}

/// Accepts `RRGGBB` or `RRGGBBAA`, with or without a leading `#`.
pub fn color_from_hex(s: &str) -> Option<[f32; 4]> {
    let hex = s.strip_prefix('#').unwrap_or(s);
    let packed = match hex.len() {
        6 => (u32::from_str_radix(hex, 16).ok()? << 8) | 0xFF,
        8 => u32::from_str_radix(hex, 16).ok()?,
        _ => return None,
    };
    Some(unpack_rgba(packed))
}
