//! Utility functions for mapping schema identifiers into Python.

use crate::spec::{Constant, MsgSpec};

/// Python reserved words, plus the implicit receiver identifier.
const PYTHON_RESERVED: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class", "continue",
    "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if", "import",
    "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try", "while",
    "with", "yield", "self",
];

/// Remap `name` to a Python-safe spelling by appending `_` on collision.
pub fn remap_reserved(name: &str) -> String {
    if PYTHON_RESERVED.contains(&name) {
        format!("{}_", name)
    } else {
        name.to_string()
    }
}

/// A fresh spec with field and constant names remapped to avoid Python
/// reserved words. The input spec is left untouched; fingerprints are
/// computed on the original names.
pub fn make_python_safe(spec: &MsgSpec) -> MsgSpec {
    let mut safe = spec.clone();
    for field in &mut safe.fields {
        field.name = remap_reserved(&field.name);
    }
    safe.constants = spec
        .constants
        .iter()
        .map(|c| Constant {
            ty: c.ty.clone(),
            name: remap_reserved(&c.name),
            value: c.value.clone(),
            raw_text: c.raw_text.clone(),
        })
        .collect();
    safe
}
