//! The closed catalog of builtin scalar types and special builtin classes.

use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::error::{Error, Result};

/// Package/type separator in a full message name.
pub const SEP: char = '/';

/// Canonical full name of the well-known header type.
pub const HEADER_FULL_NAME: &str = "std_msgs/Header";

pub const TIME: &str = "time";
pub const DURATION: &str = "duration";

/// Fixed-width primitives and their binary pack codes, `struct`-module style.
///
/// `bool` is packed as one unsigned byte; `char` and `byte` are deprecated
/// aliases for `uint8` and `int8` respectively.
static SIMPLE_TYPES_DICT: Lazy<HashMap<&'static str, char>> = Lazy::new(|| {
    HashMap::from([
        ("int8", 'b'),
        ("uint8", 'B'),
        ("bool", 'B'),
        ("int16", 'h'),
        ("uint16", 'H'),
        ("int32", 'i'),
        ("uint32", 'I'),
        ("int64", 'q'),
        ("uint64", 'Q'),
        ("float32", 'f'),
        ("float64", 'd'),
        // deprecated
        ("char", 'B'),
        ("byte", 'b'),
    ])
});

/// Simple types are primitives with fixed, known serialization length.
pub const SIMPLE_TYPES: &[&str] = &[
    "int8", "uint8", "bool", "int16", "uint16", "int32", "uint32", "int64", "uint64", "float32",
    "float64", "char", "byte",
];

/// `true` if `ty` has a fixed serialization width (all primitives except
/// `string`).
pub fn is_simple(ty: &str) -> bool {
    SIMPLE_TYPES_DICT.contains_key(ty)
}

/// Pack code for a simple type.
pub fn pack_code(ty: &str) -> Option<char> {
    SIMPLE_TYPES_DICT.get(ty).copied()
}

/// Byte width of a pack code.
pub fn code_width(code: char) -> Option<usize> {
    match code {
        'b' | 'B' | 's' => Some(1),
        'h' | 'H' => Some(2),
        'i' | 'I' | 'f' => Some(4),
        'q' | 'Q' | 'd' => Some(8),
        _ => None,
    }
}

/// Builtin types require no registration: primitives, `string`, and the
/// time specials.
pub fn is_builtin(ty: &str) -> bool {
    is_simple(ty) || ty == "string" || ty == TIME || ty == DURATION
}

/// `true` for any spelling of the well-known header type.
pub fn is_header_type(ty: &str) -> bool {
    matches!(ty, "Header" | "std_msgs/Header" | "roslib/Header")
}

/// A builtin represented by a runtime class instead of a primitive.
pub struct Special {
    /// Python expression instantiating a new value for deserialization.
    pub constructor: &'static str,
    /// Method invoked on the value once deserialization completes.
    post_deserialize: Option<&'static str>,
    /// Import line required when the type is present.
    pub import_str: &'static str,
}

impl Special {
    /// Post-deserialization statement for `varname`, if the type needs one.
    pub fn get_post_deserialize(&self, varname: &str) -> Option<String> {
        self.post_deserialize
            .map(|method| format!("{}.{}()", varname, method))
    }
}

static SPECIAL_TYPES: Lazy<HashMap<&'static str, Special>> = Lazy::new(|| {
    HashMap::from([
        (
            HEADER_FULL_NAME,
            Special {
                constructor: "std_msgs.msg._Header.Header()",
                post_deserialize: None,
                import_str: "import std_msgs.msg",
            },
        ),
        (
            TIME,
            Special {
                constructor: "genpy.Time()",
                post_deserialize: Some("canon"),
                import_str: "import genpy",
            },
        ),
        (
            DURATION,
            Special {
                constructor: "genpy.Duration()",
                post_deserialize: Some("canon"),
                import_str: "import genpy",
            },
        ),
    ])
});

pub fn is_special(ty: &str) -> bool {
    SPECIAL_TYPES.contains_key(ty)
}

pub fn get_special(ty: &str) -> Option<&'static Special> {
    SPECIAL_TYPES.get(ty)
}

/// Numeric-array dtype names for the numpy emission path.
pub fn numpy_dtype(ty: &str) -> Option<&'static str> {
    match ty {
        "float32" => Some("numpy.float32"),
        "float64" => Some("numpy.float64"),
        "bool" => Some("numpy.bool"),
        "int8" | "byte" => Some("numpy.int8"),
        "int16" => Some("numpy.int16"),
        "int32" => Some("numpy.int32"),
        "int64" => Some("numpy.int64"),
        "uint8" | "char" => Some("numpy.uint8"),
        "uint16" => Some("numpy.uint16"),
        "uint32" => Some("numpy.uint32"),
        "uint64" => Some("numpy.uint64"),
        _ => None,
    }
}

/// Strip any array suffix from a type expression.
pub fn bare_msg_type(ty: &str) -> &str {
    match ty.find('[') {
        Some(idx) => &ty[..idx],
        None => ty,
    }
}

/// Parse a type expression into `(base, is_array, fixed_len)`.
///
/// `T` → `(T, false, None)`; `T[]` → `(T, true, None)`; `T[n]` →
/// `(T, true, Some(n))`.
pub fn parse_type(ty: &str) -> Result<(&str, bool, Option<usize>)> {
    if !ty.ends_with(']') {
        return Ok((ty, false, None));
    }
    let open = ty
        .find('[')
        .ok_or_else(|| Error::InvalidMsgSpec(format!("invalid type expression: {}", ty)))?;
    let base = &ty[..open];
    let len_text = &ty[open + 1..ty.len() - 1];
    if base.is_empty() || base.contains('[') {
        return Err(Error::InvalidMsgSpec(format!(
            "invalid type expression: {}",
            ty
        )));
    }
    if len_text.is_empty() {
        return Ok((base, true, None));
    }
    let len = len_text
        .parse::<usize>()
        .map_err(|_| Error::InvalidMsgSpec(format!("invalid array length in type: {}", ty)))?;
    Ok((base, true, Some(len)))
}

/// Split a `pkg/Name` resource name; a bare name yields an empty package.
pub fn package_resource_name(name: &str) -> Result<(&str, &str)> {
    let mut splits = name.split(SEP);
    match (splits.next(), splits.next(), splits.next()) {
        (Some(base), None, _) => Ok(("", base)),
        (Some(pkg), Some(base), None) => Ok((pkg, base)),
        _ => Err(Error::Generation(format!("illegal message type: {}", name))),
    }
}

/// Resolve `ty` against `package`, yielding its package and base name.
pub fn compute_pkg_type<'a>(package: &'a str, ty: &'a str) -> Result<(&'a str, &'a str)> {
    let (pkg, base) = package_resource_name(ty)?;
    if pkg.is_empty() {
        Ok((package, base))
    } else {
        Ok((pkg, base))
    }
}
