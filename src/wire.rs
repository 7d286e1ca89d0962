//! Interpreted message values and their wire-level (de)serialization.
//!
//! This is the runtime half of the dynamic entry point: a registered spec
//! is walked directly over the wire rules, producing bytes identical to
//! what the emitted Python produces. Byte order is little-endian
//! throughout; strings and variable-length arrays carry a `u32` prefix,
//! embedded messages are appended contiguously with no framing, and
//! `uint8[]`/`byte[]` are opaque byte strings.

use bytes::{Buf, BufMut};
use thiserror::Error;

use crate::base_type::{is_special, parse_type, DURATION, TIME};
use crate::error::{Error as GenError, Result as GenResult};
use crate::spec::{MsgContext, MsgSpec};

/// Raised while packing a message value into bytes.
#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("field [{field}]: expected {expected}")]
    TypeMismatch { field: String, expected: &'static str },
    #[error("field [{field}]: value out of range for {ty}")]
    OutOfRange { field: String, ty: String },
    #[error("field [{field}]: fixed array of length {expected} has {actual} elements")]
    LengthMismatch {
        field: String,
        expected: usize,
        actual: usize,
    },
    #[error("field [{field}] is not set")]
    MissingField { field: String },
    #[error("unknown type [{0}]")]
    UnknownType(String),
}

/// Raised while unpacking bytes into a message value.
#[derive(Debug, Error)]
pub enum DeserializationError {
    /// Most likely buffer underfill.
    #[error("buffer underfill: needed {needed} bytes, {remaining} remaining")]
    Underfill { needed: usize, remaining: usize },
    #[error("string payload is not valid UTF-8")]
    InvalidUtf8,
    #[error("unknown type [{0}]")]
    UnknownType(String),
}

/// Seconds/nanoseconds pair backing both `time` and `duration`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeVal {
    pub secs: i32,
    pub nsecs: i32,
}

impl TimeVal {
    pub fn new(secs: i32, nsecs: i32) -> TimeVal {
        TimeVal { secs, nsecs }
    }

    /// Canonical form: nanoseconds wrapped into `[0, 1e9)`.
    pub fn canon(self) -> TimeVal {
        const NSECS_PER_SEC: i32 = 1_000_000_000;
        TimeVal {
            secs: self.secs + self.nsecs.div_euclid(NSECS_PER_SEC),
            nsecs: self.nsecs.rem_euclid(NSECS_PER_SEC),
        }
    }
}

/// A dynamically-typed field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    /// Opaque byte string: the in-memory form of `uint8[]`/`byte[]`.
    Bytes(Vec<u8>),
    Array(Vec<Value>),
    Message(MessageValue),
    Time(TimeVal),
    Duration(TimeVal),
}

/// An instance of a message type: ordered field name/value pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageValue {
    pub type_name: String,
    fields: Vec<(String, Value)>,
}

impl MessageValue {
    pub fn new(type_name: impl Into<String>) -> MessageValue {
        MessageValue {
            type_name: type_name.into(),
            fields: Vec::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    /// Set a field, replacing any existing value under the same name.
    pub fn set(&mut self, name: impl Into<String>, value: Value) -> &mut MessageValue {
        let name = name.into();
        match self.fields.iter_mut().find(|(field, _)| *field == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
        self
    }

    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }
}

/// Default value for a field of type `ty`, per the primitive catalog.
pub fn default_for(context: &MsgContext, package: &str, ty: &str) -> GenResult<Value> {
    let (base, is_array, array_len) = parse_type(ty)?;
    if is_array {
        if base == "uint8" || base == "byte" {
            return Ok(Value::Bytes(vec![0u8; array_len.unwrap_or(0)]));
        }
        return Ok(match array_len {
            None => Value::Array(Vec::new()),
            Some(len) => {
                let element = default_for(context, package, base)?;
                Value::Array(vec![element; len])
            }
        });
    }
    match base {
        "bool" => Ok(Value::Bool(false)),
        "int8" | "byte" | "int16" | "int32" | "int64" => Ok(Value::Int(0)),
        "uint8" | "char" | "uint16" | "uint32" | "uint64" => Ok(Value::UInt(0)),
        "float32" | "float64" => Ok(Value::Float(0.0)),
        "string" => Ok(Value::Str(String::new())),
        TIME => Ok(Value::Time(TimeVal::default())),
        DURATION => Ok(Value::Duration(TimeVal::default())),
        other => {
            let full = context
                .resolve(package, other)
                .ok_or_else(|| GenError::UnknownType(other.to_string()))?;
            let spec = context.get_registered(&full)?;
            Ok(Value::Message(default_message(context, spec)?))
        }
    }
}

/// A message instance with every field set to its default.
pub fn default_message(context: &MsgContext, spec: &MsgSpec) -> GenResult<MessageValue> {
    let mut message = MessageValue::new(spec.full_name.clone());
    for field in &spec.fields {
        let value = default_for(context, &spec.package, &field.ty)?;
        message.set(field.name.clone(), value);
    }
    Ok(message)
}

/// Serialize `message` against `spec` into wire bytes.
pub fn serialize(
    context: &MsgContext,
    spec: &MsgSpec,
    message: &MessageValue,
) -> Result<Vec<u8>, SerializationError> {
    let mut buf = Vec::new();
    write_message(context, spec, message, &mut buf)?;
    Ok(buf)
}

fn write_message(
    context: &MsgContext,
    spec: &MsgSpec,
    message: &MessageValue,
    buf: &mut Vec<u8>,
) -> Result<(), SerializationError> {
    for field in &spec.fields {
        let value = message
            .get(&field.name)
            .ok_or_else(|| SerializationError::MissingField {
                field: field.name.clone(),
            })?;
        write_field(context, &spec.package, &field.ty, &field.name, value, buf)?;
    }
    Ok(())
}

fn write_length(
    field: &str,
    len: usize,
    buf: &mut Vec<u8>,
) -> Result<(), SerializationError> {
    let len = u32::try_from(len).map_err(|_| SerializationError::OutOfRange {
        field: field.to_string(),
        ty: "uint32 length".to_string(),
    })?;
    buf.put_u32_le(len);
    Ok(())
}

fn write_field(
    context: &MsgContext,
    package: &str,
    ty: &str,
    field: &str,
    value: &Value,
    buf: &mut Vec<u8>,
) -> Result<(), SerializationError> {
    let (base, is_array, array_len) = parse_type(ty).map_err(|_| SerializationError::UnknownType(ty.to_string()))?;
    if !is_array {
        return write_base(context, package, base, field, value, buf);
    }

    // unsigned 8-bit arrays are opaque byte strings, accepted either as
    // bytes or as a list of integers
    if base == "uint8" || base == "byte" {
        let bytes = coerce_bytes(field, value)?;
        match array_len {
            Some(expected) => {
                if bytes.len() != expected {
                    return Err(SerializationError::LengthMismatch {
                        field: field.to_string(),
                        expected,
                        actual: bytes.len(),
                    });
                }
            }
            None => write_length(field, bytes.len(), buf)?,
        }
        buf.put_slice(&bytes);
        return Ok(());
    }

    let elements = match value {
        Value::Array(elements) => elements,
        _ => {
            return Err(SerializationError::TypeMismatch {
                field: field.to_string(),
                expected: "array",
            })
        }
    };
    match array_len {
        Some(expected) => {
            if elements.len() != expected {
                return Err(SerializationError::LengthMismatch {
                    field: field.to_string(),
                    expected,
                    actual: elements.len(),
                });
            }
        }
        None => write_length(field, elements.len(), buf)?,
    }
    for element in elements {
        write_base(context, package, base, field, element, buf)?;
    }
    Ok(())
}

fn coerce_bytes(field: &str, value: &Value) -> Result<Vec<u8>, SerializationError> {
    match value {
        Value::Bytes(bytes) => Ok(bytes.clone()),
        Value::Array(elements) => elements
            .iter()
            .map(|element| match element {
                Value::Int(v) if (-128..=255).contains(v) => Ok(*v as u8),
                Value::UInt(v) if *v <= 255 => Ok(*v as u8),
                _ => Err(SerializationError::OutOfRange {
                    field: field.to_string(),
                    ty: "byte".to_string(),
                }),
            })
            .collect(),
        _ => Err(SerializationError::TypeMismatch {
            field: field.to_string(),
            expected: "bytes or list of integers",
        }),
    }
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Int(v) => Some(*v),
        Value::UInt(v) => i64::try_from(*v).ok(),
        _ => None,
    }
}

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::UInt(v) => Some(*v),
        Value::Int(v) => u64::try_from(*v).ok(),
        _ => None,
    }
}

fn write_base(
    context: &MsgContext,
    package: &str,
    base: &str,
    field: &str,
    value: &Value,
    buf: &mut Vec<u8>,
) -> Result<(), SerializationError> {
    let mismatch = |expected: &'static str| SerializationError::TypeMismatch {
        field: field.to_string(),
        expected,
    };
    let out_of_range = || SerializationError::OutOfRange {
        field: field.to_string(),
        ty: base.to_string(),
    };
    match base {
        "bool" => {
            let v = match value {
                Value::Bool(v) => *v,
                _ => return Err(mismatch("bool")),
            };
            buf.put_u8(v as u8);
        }
        "int8" | "byte" => {
            let v = as_i64(value).ok_or_else(|| mismatch("integer"))?;
            buf.put_i8(i8::try_from(v).map_err(|_| out_of_range())?);
        }
        "uint8" | "char" => {
            let v = as_u64(value).ok_or_else(|| mismatch("integer"))?;
            buf.put_u8(u8::try_from(v).map_err(|_| out_of_range())?);
        }
        "int16" => {
            let v = as_i64(value).ok_or_else(|| mismatch("integer"))?;
            buf.put_i16_le(i16::try_from(v).map_err(|_| out_of_range())?);
        }
        "uint16" => {
            let v = as_u64(value).ok_or_else(|| mismatch("integer"))?;
            buf.put_u16_le(u16::try_from(v).map_err(|_| out_of_range())?);
        }
        "int32" => {
            let v = as_i64(value).ok_or_else(|| mismatch("integer"))?;
            buf.put_i32_le(i32::try_from(v).map_err(|_| out_of_range())?);
        }
        "uint32" => {
            let v = as_u64(value).ok_or_else(|| mismatch("integer"))?;
            buf.put_u32_le(u32::try_from(v).map_err(|_| out_of_range())?);
        }
        "int64" => {
            let v = as_i64(value).ok_or_else(|| mismatch("integer"))?;
            buf.put_i64_le(v);
        }
        "uint64" => {
            let v = as_u64(value).ok_or_else(|| mismatch("integer"))?;
            buf.put_u64_le(v);
        }
        "float32" => {
            let v = match value {
                Value::Float(v) => *v,
                Value::Int(v) => *v as f64,
                _ => return Err(mismatch("float")),
            };
            buf.put_f32_le(v as f32);
        }
        "float64" => {
            let v = match value {
                Value::Float(v) => *v,
                Value::Int(v) => *v as f64,
                _ => return Err(mismatch("float")),
            };
            buf.put_f64_le(v);
        }
        "string" => {
            let v = match value {
                Value::Str(v) => v,
                _ => return Err(mismatch("string")),
            };
            write_length(field, v.len(), buf)?;
            buf.put_slice(v.as_bytes());
        }
        TIME => {
            let v = match value {
                Value::Time(v) => *v,
                _ => return Err(mismatch("time")),
            };
            buf.put_i32_le(v.secs);
            buf.put_i32_le(v.nsecs);
        }
        DURATION => {
            let v = match value {
                Value::Duration(v) => *v,
                _ => return Err(mismatch("duration")),
            };
            buf.put_i32_le(v.secs);
            buf.put_i32_le(v.nsecs);
        }
        other => {
            let full = context
                .resolve(package, other)
                .ok_or_else(|| SerializationError::UnknownType(other.to_string()))?;
            let sub_spec = context
                .get_registered(&full)
                .map_err(|_| SerializationError::UnknownType(full.clone()))?;
            let sub_value = match value {
                Value::Message(v) => v,
                _ => return Err(mismatch("message")),
            };
            // embedded messages are appended contiguously, no framing
            write_message(context, sub_spec, sub_value, buf)?;
        }
    }
    Ok(())
}

/// Deserialize wire bytes into a message value for `spec`.
///
/// `bool` fields are canonicalized to booleans and `time`/`duration`
/// values to canonical form; trailing bytes are ignored, matching the
/// generated deserializers.
pub fn deserialize(
    context: &MsgContext,
    spec: &MsgSpec,
    bytes: &[u8],
) -> Result<MessageValue, DeserializationError> {
    let mut buf = bytes;
    read_message(context, spec, &mut buf)
}

fn need(buf: &[u8], needed: usize) -> Result<(), DeserializationError> {
    if buf.len() < needed {
        Err(DeserializationError::Underfill {
            needed,
            remaining: buf.len(),
        })
    } else {
        Ok(())
    }
}

fn read_message(
    context: &MsgContext,
    spec: &MsgSpec,
    buf: &mut &[u8],
) -> Result<MessageValue, DeserializationError> {
    let mut message = MessageValue::new(spec.full_name.clone());
    for field in &spec.fields {
        let value = read_field(context, &spec.package, &field.ty, buf)?;
        message.set(field.name.clone(), value);
    }
    Ok(message)
}

fn read_length(buf: &mut &[u8]) -> Result<usize, DeserializationError> {
    need(buf, 4)?;
    Ok(buf.get_u32_le() as usize)
}

fn read_field(
    context: &MsgContext,
    package: &str,
    ty: &str,
    buf: &mut &[u8],
) -> Result<Value, DeserializationError> {
    let (base, is_array, array_len) =
        parse_type(ty).map_err(|_| DeserializationError::UnknownType(ty.to_string()))?;
    if !is_array {
        return read_base(context, package, base, buf);
    }

    if base == "uint8" || base == "byte" {
        let len = match array_len {
            Some(len) => len,
            None => read_length(buf)?,
        };
        need(buf, len)?;
        let mut bytes = vec![0u8; len];
        buf.copy_to_slice(&mut bytes);
        return Ok(Value::Bytes(bytes));
    }

    let len = match array_len {
        Some(len) => len,
        None => read_length(buf)?,
    };
    let mut elements = Vec::with_capacity(len.min(4096));
    for _ in 0..len {
        elements.push(read_base(context, package, base, buf)?);
    }
    Ok(Value::Array(elements))
}

fn read_base(
    context: &MsgContext,
    package: &str,
    base: &str,
    buf: &mut &[u8],
) -> Result<Value, DeserializationError> {
    match base {
        "bool" => {
            need(buf, 1)?;
            Ok(Value::Bool(buf.get_u8() != 0))
        }
        "int8" | "byte" => {
            need(buf, 1)?;
            Ok(Value::Int(buf.get_i8() as i64))
        }
        "uint8" | "char" => {
            need(buf, 1)?;
            Ok(Value::UInt(buf.get_u8() as u64))
        }
        "int16" => {
            need(buf, 2)?;
            Ok(Value::Int(buf.get_i16_le() as i64))
        }
        "uint16" => {
            need(buf, 2)?;
            Ok(Value::UInt(buf.get_u16_le() as u64))
        }
        "int32" => {
            need(buf, 4)?;
            Ok(Value::Int(buf.get_i32_le() as i64))
        }
        "uint32" => {
            need(buf, 4)?;
            Ok(Value::UInt(buf.get_u32_le() as u64))
        }
        "int64" => {
            need(buf, 8)?;
            Ok(Value::Int(buf.get_i64_le()))
        }
        "uint64" => {
            need(buf, 8)?;
            Ok(Value::UInt(buf.get_u64_le()))
        }
        "float32" => {
            need(buf, 4)?;
            Ok(Value::Float(buf.get_f32_le() as f64))
        }
        "float64" => {
            need(buf, 8)?;
            Ok(Value::Float(buf.get_f64_le()))
        }
        "string" => {
            let len = read_length(buf)?;
            need(buf, len)?;
            let mut bytes = vec![0u8; len];
            buf.copy_to_slice(&mut bytes);
            String::from_utf8(bytes)
                .map(Value::Str)
                .map_err(|_| DeserializationError::InvalidUtf8)
        }
        TIME => {
            need(buf, 8)?;
            let time = TimeVal::new(buf.get_i32_le(), buf.get_i32_le());
            Ok(Value::Time(time.canon()))
        }
        DURATION => {
            need(buf, 8)?;
            let duration = TimeVal::new(buf.get_i32_le(), buf.get_i32_le());
            Ok(Value::Duration(duration.canon()))
        }
        other => {
            debug_assert!(!is_special(other) || other == "std_msgs/Header");
            let full = context
                .resolve(package, other)
                .ok_or_else(|| DeserializationError::UnknownType(other.to_string()))?;
            let sub_spec = context
                .get_registered(&full)
                .map_err(|_| DeserializationError::UnknownType(full.clone()))?;
            Ok(Value::Message(read_message(context, sub_spec, buf)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::load_msg_from_string;
    use pretty_assertions::assert_eq;

    fn round_trip(context: &MsgContext, spec: &MsgSpec, message: &MessageValue) -> MessageValue {
        let bytes = serialize(context, spec, message).unwrap();
        deserialize(context, spec, &bytes).unwrap()
    }

    #[test]
    fn string_field_wire_layout() {
        let mut context = MsgContext::create_default();
        let spec = load_msg_from_string(&mut context, "string data\n", "w_msgs/Str").unwrap();
        let mut message = MessageValue::new("w_msgs/Str");
        message.set("data", Value::Str("foo".into()));

        let bytes = serialize(&context, &spec, &message).unwrap();
        assert_eq!(vec![0x03, 0x00, 0x00, 0x00, 0x66, 0x6f, 0x6f], bytes);
        assert_eq!(message, round_trip(&context, &spec, &message));
    }

    #[test]
    fn primitive_batch_wire_layout() {
        let mut context = MsgContext::create_default();
        let spec =
            load_msg_from_string(&mut context, "int8 a\nuint8 b\nint16 c\n", "w_msgs/Abc").unwrap();
        let mut message = MessageValue::new("w_msgs/Abc");
        message
            .set("a", Value::Int(-1))
            .set("b", Value::UInt(2))
            .set("c", Value::Int(300));

        let bytes = serialize(&context, &spec, &message).unwrap();
        assert_eq!(vec![0xff, 0x02, 0x2c, 0x01], bytes);
        assert_eq!(message, round_trip(&context, &spec, &message));
    }

    #[test]
    fn header_shape_round_trips() {
        let mut context = MsgContext::create_default();
        let spec = load_msg_from_string(
            &mut context,
            "uint32 seq\ntime stamp\nstring frame_id\n",
            "w_msgs/HeaderLike",
        )
        .unwrap();
        let mut message = MessageValue::new("w_msgs/HeaderLike");
        message
            .set("seq", Value::UInt(12390))
            .set("stamp", Value::Time(TimeVal::new(10, 20)))
            .set("frame_id", Value::Str("foo".into()));

        let bytes = serialize(&context, &spec, &message).unwrap();
        assert_eq!(4 + 8 + 4 + 3, bytes.len());
        assert_eq!(message, round_trip(&context, &spec, &message));
    }

    #[test]
    fn fixed_array_has_no_prefix() {
        let mut context = MsgContext::create_default();
        let spec = load_msg_from_string(&mut context, "int32[3] v\n", "w_msgs/Fixed").unwrap();
        let mut message = MessageValue::new("w_msgs/Fixed");
        message.set(
            "v",
            Value::Array(vec![Value::Int(1), Value::Int(2), Value::Int(3)]),
        );

        let bytes = serialize(&context, &spec, &message).unwrap();
        assert_eq!(
            vec![1, 0, 0, 0, 2, 0, 0, 0, 3, 0, 0, 0],
            bytes
        );
        assert_eq!(message, round_trip(&context, &spec, &message));

        message.set("v", Value::Array(vec![Value::Int(1)]));
        assert!(matches!(
            serialize(&context, &spec, &message),
            Err(SerializationError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn byte_arrays_are_opaque_strings() {
        let mut context = MsgContext::create_default();
        let spec = load_msg_from_string(&mut context, "uint8[] data\n", "w_msgs/Blob").unwrap();
        let mut message = MessageValue::new("w_msgs/Blob");
        message.set("data", Value::Bytes(b"ab".to_vec()));

        let bytes = serialize(&context, &spec, &message).unwrap();
        assert_eq!(vec![0x02, 0x00, 0x00, 0x00, 0x61, 0x62], bytes);

        // a list of integers produces the same wire bytes
        message.set(
            "data",
            Value::Array(vec![Value::UInt(0x61), Value::UInt(0x62)]),
        );
        assert_eq!(bytes, serialize(&context, &spec, &message).unwrap());

        // and reading always yields the byte string form
        let decoded = deserialize(&context, &spec, &bytes).unwrap();
        assert_eq!(Some(&Value::Bytes(b"ab".to_vec())), decoded.get("data"));
    }

    #[test]
    fn bool_and_time_are_canonicalized() {
        let mut context = MsgContext::create_default();
        let spec =
            load_msg_from_string(&mut context, "bool flag\ntime stamp\n", "w_msgs/Canon").unwrap();
        let mut message = MessageValue::new("w_msgs/Canon");
        message
            .set("flag", Value::Bool(true))
            .set("stamp", Value::Time(TimeVal::new(1, 1_500_000_000)));

        let bytes = serialize(&context, &spec, &message).unwrap();
        let decoded = deserialize(&context, &spec, &bytes).unwrap();
        assert_eq!(Some(&Value::Bool(true)), decoded.get("flag"));
        assert_eq!(
            Some(&Value::Time(TimeVal::new(2, 500_000_000))),
            decoded.get("stamp")
        );
    }

    #[test]
    fn embedded_messages_have_no_framing() {
        let mut context = MsgContext::create_default();
        load_msg_from_string(&mut context, "int32 x\nint32 y\n", "w_msgs/Point").unwrap();
        let spec = load_msg_from_string(
            &mut context,
            "w_msgs/Point p\nuint8 tail\n",
            "w_msgs/Wrap",
        )
        .unwrap();

        let mut point = MessageValue::new("w_msgs/Point");
        point.set("x", Value::Int(1)).set("y", Value::Int(-1));
        let mut message = MessageValue::new("w_msgs/Wrap");
        message
            .set("p", Value::Message(point))
            .set("tail", Value::UInt(9));

        let bytes = serialize(&context, &spec, &message).unwrap();
        assert_eq!(
            vec![1, 0, 0, 0, 0xff, 0xff, 0xff, 0xff, 9],
            bytes
        );
        assert_eq!(message, round_trip(&context, &spec, &message));
    }

    #[test]
    fn empty_spec_is_zero_bytes() {
        let mut context = MsgContext::create_default();
        let spec = load_msg_from_string(&mut context, "", "w_msgs/Empty").unwrap();
        let message = MessageValue::new("w_msgs/Empty");
        let bytes = serialize(&context, &spec, &message).unwrap();
        assert!(bytes.is_empty());
        let decoded = deserialize(&context, &spec, &bytes).unwrap();
        assert!(decoded.fields().is_empty());
    }

    #[test]
    fn defaults_follow_the_catalog() {
        let mut context = MsgContext::create_default();
        load_msg_from_string(&mut context, "int32 x\nint32 y\n", "w_msgs/Point").unwrap();

        assert_eq!(
            Value::Int(0),
            default_for(&context, "w_msgs", "int32").unwrap()
        );
        assert_eq!(
            Value::Float(0.0),
            default_for(&context, "w_msgs", "float64").unwrap()
        );
        assert_eq!(
            Value::Bool(false),
            default_for(&context, "w_msgs", "bool").unwrap()
        );
        assert_eq!(
            Value::Str(String::new()),
            default_for(&context, "w_msgs", "string").unwrap()
        );
        assert_eq!(
            Value::Bytes(Vec::new()),
            default_for(&context, "w_msgs", "uint8[]").unwrap()
        );
        assert_eq!(
            Value::Bytes(vec![0, 0, 0]),
            default_for(&context, "w_msgs", "byte[3]").unwrap()
        );
        assert_eq!(
            Value::Array(Vec::new()),
            default_for(&context, "w_msgs", "int16[]").unwrap()
        );
        assert_eq!(
            Value::Array(vec![Value::Int(0), Value::Int(0)]),
            default_for(&context, "w_msgs", "int16[2]").unwrap()
        );

        let point = default_for(&context, "w_msgs", "Point").unwrap();
        match point {
            Value::Message(message) => {
                assert_eq!(Some(&Value::Int(0)), message.get("x"));
                assert_eq!(Some(&Value::Int(0)), message.get("y"));
            }
            other => panic!("expected message default, got {:?}", other),
        }
    }

    #[test]
    fn default_message_round_trips() {
        let mut context = MsgContext::create_default();
        let spec = load_msg_from_string(
            &mut context,
            "Header header\nfloat64[] data\nuint8[4] raw\nbool ok\n",
            "w_msgs/Everything",
        )
        .unwrap();
        let message = default_message(&context, &spec).unwrap();
        assert_eq!(message, round_trip(&context, &spec, &message));
    }

    #[test]
    fn underfill_is_a_typed_error() {
        let mut context = MsgContext::create_default();
        let spec = load_msg_from_string(&mut context, "int32 x\n", "w_msgs/Short").unwrap();
        assert!(matches!(
            deserialize(&context, &spec, &[0x01, 0x02]),
            Err(DeserializationError::Underfill { .. })
        ));
    }

    #[test]
    fn range_violations_are_typed() {
        let mut context = MsgContext::create_default();
        let spec = load_msg_from_string(&mut context, "int8 v\n", "w_msgs/Tiny").unwrap();
        let mut message = MessageValue::new("w_msgs/Tiny");
        message.set("v", Value::Int(1000));
        assert!(matches!(
            serialize(&context, &spec, &message),
            Err(SerializationError::OutOfRange { .. })
        ));
        message.set("v", Value::Str("no".into()));
        assert!(matches!(
            serialize(&context, &spec, &message),
            Err(SerializationError::TypeMismatch { .. })
        ));
    }
}
