//! Dynamic generation of message classes from a concatenated text dump.
//!
//! The input is the `gendeps --cat` format: the core `.msg` text, then each
//! dependency introduced by a line of eighty `=` and a `MSG: pkg/Name`
//! header. Every type is emitted into one Python module with rewritten
//! class names so the module can coexist with statically generated
//! siblings, and the same specs are served through the interpreted wire
//! runtime so callers can use them in-process.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use tempfile::TempDir;

use crate::base_type::package_resource_name;
use crate::code_generator::msg_generator;
use crate::error::{Error, Result};
use crate::fingerprint::compute_md5;
use crate::parser::{load_msg_from_string, SearchPath};
use crate::spec::{MsgContext, MsgSpec};
use crate::wire::{
    default_message, deserialize, serialize, DeserializationError, MessageValue,
    SerializationError,
};

/// A dynamically generated message class.
#[derive(Debug, Clone)]
pub struct DynamicMessageClass {
    pub full_name: String,
    /// Class name used inside the generated module (`_pkg__Name`).
    pub python_name: String,
    pub md5sum: String,
    pub spec: MsgSpec,
}

/// The result of [`generate_dynamic`]: generated classes plus the context
/// they resolve against. The temp directory holding the written module is
/// removed when the registry is dropped.
pub struct DynamicRegistry {
    classes: HashMap<String, DynamicMessageClass>,
    context: MsgContext,
    module_path: PathBuf,
    _tmp_dir: TempDir,
}

impl DynamicRegistry {
    pub fn get(&self, full_name: &str) -> Option<&DynamicMessageClass> {
        self.classes.get(full_name)
    }

    pub fn classes(&self) -> impl Iterator<Item = &DynamicMessageClass> {
        self.classes.values()
    }

    pub fn context(&self) -> &MsgContext {
        &self.context
    }

    /// Path of the generated Python module, importable by a host
    /// interpreter while the registry is alive.
    pub fn module_path(&self) -> &Path {
        &self.module_path
    }

    /// A default-constructed instance of `full_name`.
    pub fn instantiate(&self, full_name: &str) -> Result<MessageValue> {
        let class = self
            .get(full_name)
            .ok_or_else(|| Error::UnknownType(full_name.to_string()))?;
        default_message(&self.context, &class.spec)
    }

    /// Serialize an instance through the interpreted runtime.
    pub fn serialize(&self, message: &MessageValue) -> std::result::Result<Vec<u8>, SerializationError> {
        let class = self
            .classes
            .get(&message.type_name)
            .ok_or_else(|| SerializationError::UnknownType(message.type_name.clone()))?;
        serialize(&self.context, &class.spec, message)
    }

    /// Deserialize wire bytes into an instance of `full_name`.
    pub fn deserialize(
        &self,
        full_name: &str,
        bytes: &[u8],
    ) -> std::result::Result<MessageValue, DeserializationError> {
        let class = self
            .classes
            .get(full_name)
            .ok_or_else(|| DeserializationError::UnknownType(full_name.to_string()))?;
        deserialize(&self.context, &class.spec, bytes)
    }
}

/// Class name for `pkg/base` that can coexist with statically generated
/// modules.
fn gen_dyn_name(pkg: &str, base: &str) -> String {
    format!("_{}__{}", pkg, base)
}

/// Rewrite generated source so every class reference uses its dynamic name
/// and no sibling package imports remain.
fn gen_dyn_modify_references(text: &str, types: &[String]) -> Result<String> {
    let mut text = text.to_string();
    for full in types {
        let (pkg, base) = package_resource_name(full)?;
        let gen_name = gen_dyn_name(pkg, base);
        // remove any import statements
        text = text.replace(&format!("import {}.msg", pkg), "");
        // rewrite references to the class
        text = text.replace(&format!("{}.msg.{}", pkg, base), &gen_name);
        // class declaration
        text = text.replace(
            &format!("class {}(", base),
            &format!("class {}(", gen_name),
        );
        // super() references in __init__
        text = text.replace(&format!("super({},", base), &format!("super({},", gen_name));
    }
    // the header constructor names its module directly
    Ok(text.replace(
        "std_msgs.msg._Header.Header",
        &gen_dyn_name("std_msgs", "Header"),
    ))
}

fn parse_dependency_block(block: &str) -> Result<(String, String)> {
    let (msg_line, body) = block.split_once('\n').unwrap_or((block, ""));
    let dep_type = msg_line
        .strip_prefix("MSG: ")
        .ok_or_else(|| {
            Error::Generation(
                "invalid dynamic text dump: dependent type is missing 'MSG:' declaration"
                    .to_string(),
            )
        })?
        .trim();
    let (pkg, _) = package_resource_name(dep_type)?;
    if pkg.is_empty() {
        return Err(Error::Generation(format!(
            "invalid dynamic text dump: dependent type [{}] has no package",
            dep_type
        )));
    }
    Ok((dep_type.to_string(), body.to_string()))
}

/// Dynamically generate message classes from concatenated `.msg` text.
///
/// `core_type` is the full name of the first block; the remaining blocks
/// are its dependencies. Returns a registry covering every type in the
/// dump.
pub fn generate_dynamic(core_type: &str, msg_cat: &str) -> Result<DynamicRegistry> {
    // the header moved packages long ago; the old alias is still accepted
    let msg_cat = msg_cat.replace("roslib/Header", "std_msgs/Header");

    let separator = format!("\n{}\n", "=".repeat(80));
    let mut blocks = msg_cat.split(separator.as_str());
    let core_msg = blocks.next().unwrap_or_default();

    let mut context = MsgContext::create_default();
    let mut specs: Vec<(String, MsgSpec)> = Vec::new();
    let core_spec = load_msg_from_string(&mut context, core_msg, core_type)?;
    specs.push((core_type.to_string(), core_spec));
    for block in blocks {
        let (dep_type, dep_body) = parse_dependency_block(block)?;
        let dep_spec = load_msg_from_string(&mut context, &dep_body, &dep_type)?;
        specs.push((dep_type, dep_spec));
    }

    // generate all classes into a single module, rewriting names so they
    // cannot collide with statically generated siblings
    let type_names: Vec<String> = specs.iter().map(|(name, _)| name.clone()).collect();
    let search_path = SearchPath::new();
    let mut module_text = String::new();
    for (_, spec) in &specs {
        for line in msg_generator(&mut context, spec, &search_path)? {
            module_text.push_str(&gen_dyn_modify_references(&line, &type_names)?);
            module_text.push('\n');
        }
    }

    let tmp_dir = tempfile::Builder::new().prefix("rospygen_").tempdir()?;
    let module_path = tmp_dir.path().join("rospygen_dynamic.py");
    fs::write(&module_path, module_text)?;
    debug!("dynamic module written to {:?}", module_path);

    let mut classes = HashMap::new();
    for (full_name, spec) in specs {
        let (pkg, base) = package_resource_name(&full_name)?;
        let class = DynamicMessageClass {
            python_name: gen_dyn_name(pkg, base),
            md5sum: compute_md5(&context, &spec)?,
            spec,
            full_name: full_name.clone(),
        };
        classes.insert(full_name, class);
    }

    Ok(DynamicRegistry {
        classes,
        context,
        module_path,
        _tmp_dir: tmp_dir,
    })
}
