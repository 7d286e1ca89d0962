//! Line-oriented loader for `.msg` and `.srv` definition text.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::base_type::{bare_msg_type, compute_pkg_type, is_builtin, is_simple, HEADER_FULL_NAME, SEP};
use crate::error::{Error, Result};
use crate::spec::{Constant, ConstantValue, Field, MsgContext, MsgSpec, SrvSpec};

/// File extensions of the two resource kinds.
pub const EXT_MSG: &str = ".msg";
pub const EXT_SRV: &str = ".srv";

const COMMENT_CHAR: char = '#';
const CONST_CHAR: char = '=';

/// Dependency search path: namespace to candidate directories.
pub type SearchPath = HashMap<String, Vec<PathBuf>>;

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").expect("identifier regex"));
static MSG_TYPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z][A-Za-z0-9_]*/)?[A-Za-z][A-Za-z0-9_]*(\[[0-9]*\])?$")
        .expect("message type regex")
});

/// `true` if `name` is usable as a package or resource base name.
pub fn is_legal_resource_base_name(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

fn strip_comments(line: &str) -> &str {
    match line.find(COMMENT_CHAR) {
        Some(idx) => &line[..idx],
        None => line,
    }
}

fn parse_constant(orig_line: &str, clean_line: &str, full_name: &str) -> Result<Constant> {
    let eq = clean_line.find(CONST_CHAR).expect("caller checked for =");
    let lhs = &clean_line[..eq];
    let mut lhs_splits = lhs.split_whitespace();
    let (ty, name) = match (lhs_splits.next(), lhs_splits.next(), lhs_splits.next()) {
        (Some(ty), Some(name), None) => (ty, name),
        _ => {
            return Err(Error::InvalidMsgSpec(format!(
                "{}: invalid constant declaration: {}",
                full_name, orig_line
            )))
        }
    };
    if !is_simple(ty) && ty != "string" {
        return Err(Error::InvalidMsgSpec(format!(
            "{}: invalid constant type: {}",
            full_name, ty
        )));
    }
    if !IDENTIFIER.is_match(name) {
        return Err(Error::InvalidMsgSpec(format!(
            "{}: invalid constant name: {}",
            full_name, name
        )));
    }

    let (raw_text, value) = if ty == "string" {
        // string constants take everything right of the equals sign, so
        // comments are not recognized there
        let eq_orig = orig_line.find(CONST_CHAR).expect("caller checked for =");
        let raw = orig_line[eq_orig + 1..].trim().to_string();
        let value = ConstantValue::Str(raw.clone());
        (raw, value)
    } else {
        let raw = clean_line[eq + 1..].trim().to_string();
        let value = convert_constant_value(ty, &raw, full_name)?;
        (raw, value)
    };

    Ok(Constant {
        ty: ty.to_string(),
        name: name.to_string(),
        value,
        raw_text,
    })
}

fn convert_constant_value(ty: &str, raw: &str, full_name: &str) -> Result<ConstantValue> {
    let invalid = || {
        Error::InvalidMsgSpec(format!(
            "{}: invalid constant value for {}: {}",
            full_name, ty, raw
        ))
    };
    match ty {
        "float32" | "float64" => raw.parse::<f64>().map(ConstantValue::Float).map_err(|_| invalid()),
        "bool" => match raw {
            "True" | "true" => Ok(ConstantValue::Bool(true)),
            "False" | "false" => Ok(ConstantValue::Bool(false)),
            _ => raw
                .parse::<i64>()
                .map(|v| ConstantValue::Bool(v != 0))
                .map_err(|_| invalid()),
        },
        _ => raw.parse::<i64>().map(ConstantValue::Int).map_err(|_| invalid()),
    }
}

fn parse_field(clean_line: &str, full_name: &str) -> Result<Field> {
    let mut splits = clean_line.split_whitespace();
    let (ty, name) = match (splits.next(), splits.next(), splits.next()) {
        (Some(ty), Some(name), None) => (ty, name),
        _ => {
            return Err(Error::InvalidMsgSpec(format!(
                "{}: invalid declaration: {}",
                full_name, clean_line
            )))
        }
    };
    if !MSG_TYPE.is_match(ty) {
        return Err(Error::InvalidMsgSpec(format!(
            "{}: invalid field type: {}",
            full_name, ty
        )));
    }
    if !IDENTIFIER.is_match(name) {
        return Err(Error::InvalidMsgSpec(format!(
            "{}: invalid field name: {}",
            full_name, name
        )));
    }
    // the header type is usable without a package prefix
    let ty = match ty {
        "Header" => HEADER_FULL_NAME.to_string(),
        "roslib/Header" => HEADER_FULL_NAME.to_string(),
        other => other.to_string(),
    };
    Ok(Field::new(ty, name.to_string()))
}

/// Parse `.msg` text into a spec and register it under `full_name`.
pub fn load_msg_from_string(
    context: &mut MsgContext,
    text: &str,
    full_name: &str,
) -> Result<MsgSpec> {
    let mut fields = Vec::new();
    let mut constants = Vec::new();
    for orig_line in text.lines() {
        let clean_line = strip_comments(orig_line).trim();
        if clean_line.is_empty() {
            continue;
        }
        if clean_line.contains(CONST_CHAR) {
            constants.push(parse_constant(orig_line, clean_line, full_name)?);
        } else {
            fields.push(parse_field(clean_line, full_name)?);
        }
    }
    let spec = MsgSpec::new(fields, constants, text, full_name)?;
    context.register(full_name, spec.clone());
    Ok(spec)
}

/// Parse a `.msg` file and register it under `full_name`.
pub fn load_msg_from_file(
    context: &mut MsgContext,
    path: &Path,
    full_name: &str,
) -> Result<MsgSpec> {
    debug!("load_msg_from_file: {:?} as {}", path, full_name);
    let text = fs::read_to_string(path)?;
    load_msg_from_string(context, &text, full_name)
}

/// Parse `.srv` text into a service spec; the request and response specs are
/// registered as `<full_name>Request` / `<full_name>Response`.
pub fn load_srv_from_string(
    context: &mut MsgContext,
    text: &str,
    full_name: &str,
) -> Result<SrvSpec> {
    let mut request_text = String::new();
    let mut response_text = String::new();
    let mut in_response = false;
    for line in text.lines() {
        if !in_response && line.starts_with("---") {
            in_response = true;
            continue;
        }
        let buff = if in_response {
            &mut response_text
        } else {
            &mut request_text
        };
        buff.push_str(line);
        buff.push('\n');
    }
    if !in_response {
        return Err(Error::InvalidMsgSpec(format!(
            "{}: service spec has no request/response separator",
            full_name
        )));
    }
    let request = load_msg_from_string(context, &request_text, &format!("{}Request", full_name))?;
    let response =
        load_msg_from_string(context, &response_text, &format!("{}Response", full_name))?;
    SrvSpec::new(request, response, text, full_name)
}

/// Parse a `.srv` file and register its request/response specs.
pub fn load_srv_from_file(
    context: &mut MsgContext,
    path: &Path,
    full_name: &str,
) -> Result<SrvSpec> {
    debug!("load_srv_from_file: {:?} as {}", path, full_name);
    let text = fs::read_to_string(path)?;
    load_srv_from_string(context, &text, full_name)
}

/// Load every transitive message dependency of `spec` into the context,
/// resolving unregistered references through the search path. Returns the
/// dependency full names in first-seen depth-first order.
pub fn load_dependencies(
    context: &mut MsgContext,
    spec: &MsgSpec,
    search_path: &SearchPath,
) -> Result<Vec<String>> {
    let mut deps = Vec::new();
    load_depends_rec(context, spec, search_path, &mut deps)?;
    Ok(deps)
}

fn load_depends_rec(
    context: &mut MsgContext,
    spec: &MsgSpec,
    search_path: &SearchPath,
    deps: &mut Vec<String>,
) -> Result<()> {
    for field in spec.fields.clone() {
        let base = bare_msg_type(&field.ty);
        if is_builtin(base) {
            continue;
        }
        let (pkg, name) = compute_pkg_type(&spec.package, base)?;
        let full = format!("{}{}{}", pkg, SEP, name);
        if deps.contains(&full) {
            continue;
        }
        if !context.is_registered(&full) {
            let path = locate_msg(search_path, pkg, name)
                .ok_or_else(|| Error::UnknownType(full.clone()))?;
            load_msg_from_file(context, &path, &full)?;
        }
        deps.push(full.clone());
        let dep_spec = context.get_registered(&full)?.clone();
        load_depends_rec(context, &dep_spec, search_path, deps)?;
    }
    Ok(())
}

fn locate_msg(search_path: &SearchPath, pkg: &str, name: &str) -> Option<PathBuf> {
    let dirs = search_path.get(pkg)?;
    dirs.iter()
        .map(|dir| dir.join(format!("{}{}", name, EXT_MSG)))
        .find(|candidate| candidate.is_file())
}
