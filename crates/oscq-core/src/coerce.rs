//! The closed coercion table from incoming OSC arguments to a member's value type.

use crate::value::{color_from_hex, unpack_rgba, Quat, Value, ValueType};
use oscq_codec::OscArg;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoercionError {
    #[error("expected {expected} argument(s), got {got}")]
    Arity { expected: &'static str, got: usize },

    #[error("argument {index} has wire type '{tag}', which cannot become {target}")]
    WireType { index: usize, tag: char, target: &'static str },

    #[error("'{0}' is not a declared enum member")]
    EnumMismatch(String),

    #[error("value type {0} accepts no arguments")]
    Unsupported(&'static str),
}

/// Converts `args` into a value of `ty`.
pub fn coerce(ty: &ValueType, args: &[OscArg]) -> Result<Value, CoercionError> {
    match ty {
        ValueType::String => {
            let arg = single(args)?;
            Ok(Value::String(stringify(arg)))
        }
        ValueType::Char => {
            let arg = single(args)?;
            stringify(arg)
                .chars()
                .next()
                .map(Value::Char)
                .ok_or(CoercionError::WireType { index: 0, tag: arg.tag(), target: "char" })
        }
        ValueType::Bool => {
            let v = numeric(single(args)?, 0, "bool")?;
            Ok(Value::Bool(v != 0.0))
        }
        ValueType::Int => {
            let arg = single(args)?;
            match arg {
                // Keep full precision for integer wire values.
                OscArg::Int(v) => Ok(Value::Int(*v)),
                other => Ok(Value::Int(numeric(other, 0, "int32")? as i32)),
            }
        }
        ValueType::Float => Ok(Value::Float(numeric(single(args)?, 0, "float32")?)),
        ValueType::Vec2 => Ok(Value::Vec2(components::<2>(args, "vec2")?)),
        ValueType::Vec3 => Ok(Value::Vec3(components::<3>(args, "vec3")?)),
        ValueType::Quaternion => {
            let euler = components::<3>(args, "quaternion")?;
            Ok(Value::Rotation(Quat::from_euler_degrees(euler)))
        }
        ValueType::Color => rgba(args).map(Value::Color),
        ValueType::Vec4 => rgba(args).map(Value::Vec4),
        ValueType::Enum(names) => {
            let arg = single(args)?;
            let name = arg.as_str().ok_or(CoercionError::WireType {
                index: 0,
                tag: arg.tag(),
                target: "enum",
            })?;
            names
                .iter()
                .find(|candidate| candidate.as_str() == name)
                .map(|found| Value::Enum(found.clone()))
                .ok_or_else(|| CoercionError::EnumMismatch(name.to_string()))
        }
        ValueType::Invoke => Err(CoercionError::Unsupported("invoke")),
    }
}

fn single(args: &[OscArg]) -> Result<&OscArg, CoercionError> {
    match args {
        [only] => Ok(only),
        _ => Err(CoercionError::Arity { expected: "1", got: args.len() }),
    }
}

fn stringify(arg: &OscArg) -> String {
    match arg {
        OscArg::String(s) => s.clone(),
        OscArg::Int(v) => v.to_string(),
        OscArg::Float(v) => v.to_string(),
        OscArg::Bool(b) => b.to_string(),
        OscArg::Color(c) => format!("{c:08X}"),
        OscArg::Blob(data) => String::from_utf8_lossy(data).into_owned(),
    }
}

fn numeric(arg: &OscArg, index: usize, target: &'static str) -> Result<f32, CoercionError> {
    arg.as_f32().ok_or(CoercionError::WireType { index, tag: arg.tag(), target })
}

fn components<const N: usize>(args: &[OscArg], target: &'static str) -> Result<[f32; N], CoercionError> {
    if args.len() != N {
        let expected = match N {
            2 => "2",
            3 => "3",
            _ => "4",
        };
        return Err(CoercionError::Arity { expected, got: args.len() });
    }
    let mut out = [0.0; N];
    for (index, (slot, arg)) in out.iter_mut().zip(args).enumerate() {
        *slot = numeric(arg, index, target)?;
    }
    Ok(out)
}

fn rgba(args: &[OscArg]) -> Result<[f32; 4], CoercionError> {
    match args {
        [packed] => match packed {
            OscArg::Color(c) => Ok(unpack_rgba(*c)),
            OscArg::Int(c) => Ok(unpack_rgba(*c as u32)),
            OscArg::String(s) => color_from_hex(s).ok_or(CoercionError::WireType {
                index: 0,
                tag: 's',
                target: "color",
            }),
            other => Err(CoercionError::WireType { index: 0, tag: other.tag(), target: "color" }),
        },
        // Extra arguments past alpha are ignored.
        [r, g, b, rest @ ..] => {
            let alpha = match rest.first() {
                Some(a) => numeric(a, 3, "color")?,
                None => 1.0,
            };
            Ok([
                numeric(r, 0, "color")?,
                numeric(g, 1, "color")?,
                numeric(b, 2, "color")?,
                alpha,
            ])
        }
        _ => Err(CoercionError::Arity { expected: "1 or at least 3", got: args.len() }),
    }
}
