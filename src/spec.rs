//! Canonical in-memory representation of parsed message and service types.

use std::collections::HashMap;
use std::fmt;

use crate::base_type::{self, DURATION, HEADER_FULL_NAME, SEP, TIME};
use crate::error::{Error, Result};

/// A parsed constant value.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstantValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

impl fmt::Display for ConstantValue {
    /// Python literal form; string values are quoted by the emitter instead.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstantValue::Int(v) => write!(f, "{}", v),
            ConstantValue::Float(v) => write!(f, "{:?}", v),
            ConstantValue::Bool(true) => write!(f, "True"),
            ConstantValue::Bool(false) => write!(f, "False"),
            ConstantValue::Str(v) => write!(f, "{}", v),
        }
    }
}

/// A constant declaration, e.g. `int32 X=42`.
#[derive(Debug, Clone, PartialEq)]
pub struct Constant {
    pub ty: String,
    pub name: String,
    pub value: ConstantValue,
    /// Value exactly as written in the source text; fingerprinting uses this.
    pub raw_text: String,
}

/// A field declaration, e.g. `uint32 seq` or `geometry_msgs/Point[] pts`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub ty: String,
    pub name: String,
}

impl Field {
    pub fn new(ty: impl Into<String>, name: impl Into<String>) -> Field {
        Field {
            ty: ty.into(),
            name: name.into(),
        }
    }
}

/// Parsed representation of a single message type.
///
/// Field order is the wire order. Specs are immutable once registered in a
/// [`MsgContext`].
#[derive(Debug, Clone, PartialEq)]
pub struct MsgSpec {
    pub fields: Vec<Field>,
    pub constants: Vec<Constant>,
    /// Raw `.msg` text the spec was parsed from.
    pub text: String,
    pub package: String,
    pub short_name: String,
    pub full_name: String,
}

impl MsgSpec {
    pub fn new(
        fields: Vec<Field>,
        constants: Vec<Constant>,
        text: impl Into<String>,
        full_name: &str,
    ) -> Result<MsgSpec> {
        let (package, short_name) = base_type::package_resource_name(full_name)?;
        let mut seen = Vec::with_capacity(fields.len());
        for field in &fields {
            if seen.contains(&&field.name) {
                return Err(Error::InvalidMsgSpec(format!(
                    "duplicate field name [{}] in {}",
                    field.name, full_name
                )));
            }
            seen.push(&field.name);
        }
        Ok(MsgSpec {
            fields,
            constants,
            text: text.into(),
            package: package.to_string(),
            short_name: short_name.to_string(),
            full_name: full_name.to_string(),
        })
    }

    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.ty.as_str())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// `true` iff the first field is the well-known header.
    pub fn has_header(&self) -> bool {
        self.fields
            .first()
            .map_or(false, |f| base_type::is_header_type(&f.ty))
    }
}

/// Parsed representation of a service type: a request and a response spec.
#[derive(Debug, Clone, PartialEq)]
pub struct SrvSpec {
    pub request: MsgSpec,
    pub response: MsgSpec,
    pub text: String,
    pub package: String,
    pub short_name: String,
    pub full_name: String,
}

impl SrvSpec {
    pub fn new(
        request: MsgSpec,
        response: MsgSpec,
        text: impl Into<String>,
        full_name: &str,
    ) -> Result<SrvSpec> {
        let (package, short_name) = base_type::package_resource_name(full_name)?;
        Ok(SrvSpec {
            request,
            response,
            text: text.into(),
            package: package.to_string(),
            short_name: short_name.to_string(),
            full_name: full_name.to_string(),
        })
    }
}

/// Registry of resolved full names to specs for one generation session.
///
/// Registration is additive and the context is the sole owner of registered
/// specs; lookups of unknown names fail with [`Error::UnknownType`].
#[derive(Debug, Default)]
pub struct MsgContext {
    registered: HashMap<String, MsgSpec>,
}

impl MsgContext {
    /// An empty context with the well-known builtin shapes registered:
    /// `time` and `duration` (two `int32`s each) and `std_msgs/Header`.
    pub fn create_default() -> MsgContext {
        let mut context = MsgContext::default();
        let time = MsgSpec::new(
            vec![Field::new("int32", "secs"), Field::new("int32", "nsecs")],
            Vec::new(),
            "int32 secs\nint32 nsecs\n",
            &format!("std_msgs{}Time", SEP),
        )
        .expect("well-known time spec");
        let mut duration = time.clone();
        duration.short_name = "Duration".to_string();
        duration.full_name = format!("std_msgs{}Duration", SEP);
        let header = MsgSpec::new(
            vec![
                Field::new("uint32", "seq"),
                Field::new("time", "stamp"),
                Field::new("string", "frame_id"),
            ],
            Vec::new(),
            "uint32 seq\ntime stamp\nstring frame_id\n",
            HEADER_FULL_NAME,
        )
        .expect("well-known header spec");
        context.register(TIME, time);
        context.register(DURATION, duration);
        context.register(HEADER_FULL_NAME, header);
        context
    }

    pub fn register(&mut self, full_name: &str, spec: MsgSpec) {
        self.registered.insert(full_name.to_string(), spec);
    }

    pub fn is_registered(&self, full_name: &str) -> bool {
        self.registered.contains_key(full_name)
    }

    pub fn get_registered(&self, full_name: &str) -> Result<&MsgSpec> {
        self.registered
            .get(full_name)
            .ok_or_else(|| Error::UnknownType(full_name.to_string()))
    }

    /// Full names of every registered spec, in unspecified order.
    pub fn registered_names(&self) -> impl Iterator<Item = &str> {
        self.registered.keys().map(String::as_str)
    }

    /// Resolve a field type expression from `package` to a registered full
    /// name, if the (bare) type refers to a registered message.
    pub fn resolve(&self, package: &str, ty: &str) -> Option<String> {
        let base = base_type::bare_msg_type(ty);
        if self.is_registered(base) {
            return Some(base.to_string());
        }
        if base_type::is_builtin(base) {
            return None;
        }
        let (pkg, name) = base_type::compute_pkg_type(package, base).ok()?;
        let full = format!("{}{}{}", pkg, SEP, name);
        if self.is_registered(&full) {
            Some(full)
        } else {
            None
        }
    }
}
