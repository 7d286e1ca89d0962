//! `rospygen` compiles ROS-style message and service definitions into
//! Python serialization bindings.
//!
//! The pipeline for each input type: parse and resolve the definition into
//! a canonical [`MsgSpec`], load its transitive dependencies over the
//! search path, compute the 128-bit fingerprint that identifies the type on
//! the wire, lower the spec into batched pack/unpack steps, and emit the
//! Python class implementing it.
//!
//! ## Example
//!
//! ```no_run
//! use std::collections::HashMap;
//! use std::path::{Path, PathBuf};
//!
//! use rospygen::{Generator, MessageGenerator, MsgContext};
//!
//! let mut context = MsgContext::create_default();
//! let search_path: rospygen::SearchPath =
//!     HashMap::from([("std_msgs".to_string(), vec![PathBuf::from("msg/std_msgs")])]);
//! let code = MessageGenerator.generate_messages(
//!     &mut context,
//!     "my_pkg",
//!     &[PathBuf::from("msg/Point.msg")],
//!     Path::new("out/my_pkg"),
//!     &search_path,
//! );
//! std::process::exit(code);
//! ```
//!
//! The emitted module targets the well-known `genpy` runtime
//! (`genpy.Message`, `genpy.Time`, `genpy.Duration`) and writes `Foo.msg`
//! to `_Foo.py`; the leading underscore keeps the module name from
//! colliding with the class name.

mod base_type;
mod code_generator;
mod dynamic;
mod error;
mod fingerprint;
mod flatten;
mod ident;
mod imports;
mod init_py;
mod message_graph;
mod parser;
mod pattern;
mod spec;
mod wire;

use std::path::{Path, PathBuf};

use log::{debug, info};

pub use crate::base_type::{is_builtin, is_header_type, is_simple, is_special, parse_type};
pub use crate::code_generator::{msg_generator, srv_generator};
pub use crate::dynamic::{generate_dynamic, DynamicMessageClass, DynamicRegistry};
pub use crate::error::{Error, Result};
pub use crate::fingerprint::{compute_full_text, compute_md5, compute_md5_text, compute_srv_md5};
pub use crate::flatten::flatten;
pub use crate::ident::make_python_safe;
pub use crate::imports::compute_import;
pub use crate::init_py::{ensure_outdir, write_modules};
pub use crate::message_graph::MessageGraph;
pub use crate::parser::{
    is_legal_resource_base_name, load_dependencies, load_msg_from_file, load_msg_from_string,
    load_srv_from_file, load_srv_from_string, SearchPath, EXT_MSG, EXT_SRV,
};
pub use crate::pattern::{compute_struct_pattern, reduce_pattern, struct_size};
pub use crate::spec::{Constant, ConstantValue, Field, MsgContext, MsgSpec, SrvSpec};
pub use crate::wire::{
    default_for, default_message, deserialize, serialize, DeserializationError, MessageValue,
    SerializationError, TimeVal, Value,
};

/// Assemble the dependency search path from repeatable `NS:PATH` options.
pub fn includepath_to_dict(includepath: &[String]) -> Result<SearchPath> {
    let mut search_path = SearchPath::new();
    for entry in includepath {
        let (namespace, path) = entry.split_once(':').ok_or_else(|| {
            Error::Generation(format!("invalid include path entry: {}", entry))
        })?;
        search_path
            .entry(namespace.to_string())
            .or_default()
            .push(PathBuf::from(path));
    }
    Ok(search_path)
}

/// Output file path for an input resource: `Foo.msg` maps to `_Foo.py`.
pub fn compute_outfile_name(outdir: &Path, infile_name: &str, ext: &str) -> PathBuf {
    let resource = infile_name
        .strip_suffix(ext)
        .unwrap_or(infile_name);
    // the leading _ keeps the module name from colliding with the class
    outdir.join(format!("_{}.py", resource))
}

/// One resource kind (messages or services) and how to compile a file of it.
pub trait Generator {
    /// File extension of this resource kind, e.g. `.msg`.
    fn ext(&self) -> &'static str;

    /// Compile a single input file into `outdir`, returning the output path.
    fn generate_file(
        &self,
        context: &mut MsgContext,
        package: &str,
        path: &Path,
        outdir: &Path,
        search_path: &SearchPath,
    ) -> Result<PathBuf>;

    /// Compile every input file under `package`, continuing past per-file
    /// failures. Returns the process exit code: 0 on success, otherwise the
    /// most severe per-file code.
    fn generate_messages(
        &self,
        context: &mut MsgContext,
        package: &str,
        files: &[PathBuf],
        outdir: &Path,
        search_path: &SearchPath,
    ) -> i32 {
        if !is_legal_resource_base_name(package) {
            eprintln!(
                "ERROR: package name '{}' is illegal and cannot be used in message generation",
                package
            );
            return Error::Generation(String::new()).exit_code();
        }
        let mut retcode = 0;
        for file in files {
            match self.generate_file(context, package, file, outdir, search_path) {
                Ok(outfile) => info!("generated {:?}", outfile),
                Err(err) => {
                    eprintln!(
                        "ERROR: unable to generate {} for package '{}': while processing '{}': {}",
                        self.ext().trim_start_matches('.'),
                        package,
                        file.display(),
                        err
                    );
                    retcode = retcode.max(err.exit_code());
                }
            }
        }
        retcode
    }
}

fn resource_name(path: &Path, ext: &str, package: &str) -> Result<(String, String)> {
    let infile_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| Error::Generation(format!("bad input path: {}", path.display())))?;
    let short_name = infile_name
        .strip_suffix(ext)
        .ok_or_else(|| {
            Error::Generation(format!(
                "input file '{}' does not have extension {}",
                infile_name, ext
            ))
        })?
        .to_string();
    Ok((short_name.clone(), format!("{}/{}", package, short_name)))
}

fn write_gen(outfile: &Path, lines: &[String]) -> Result<()> {
    use std::io::Write;
    let mut file = std::fs::File::create(outfile)?;
    for line in lines {
        writeln!(file, "{}", line)?;
    }
    Ok(())
}

/// Compiles `.msg` files into Python message modules.
pub struct MessageGenerator;

impl Generator for MessageGenerator {
    fn ext(&self) -> &'static str {
        EXT_MSG
    }

    fn generate_file(
        &self,
        context: &mut MsgContext,
        package: &str,
        path: &Path,
        outdir: &Path,
        search_path: &SearchPath,
    ) -> Result<PathBuf> {
        let (short_name, full_name) = resource_name(path, self.ext(), package)?;
        debug!("generating message {}", full_name);
        let spec = load_msg_from_file(context, path, &full_name)?;
        let lines = msg_generator(context, &spec, search_path)?;
        let outfile = compute_outfile_name(outdir, &format!("{}{}", short_name, EXT_MSG), EXT_MSG);
        write_gen(&outfile, &lines)?;
        Ok(outfile)
    }
}

/// Compiles `.srv` files into Python service modules.
pub struct ServiceGenerator;

impl Generator for ServiceGenerator {
    fn ext(&self) -> &'static str {
        EXT_SRV
    }

    fn generate_file(
        &self,
        context: &mut MsgContext,
        package: &str,
        path: &Path,
        outdir: &Path,
        search_path: &SearchPath,
    ) -> Result<PathBuf> {
        let (short_name, full_name) = resource_name(path, self.ext(), package)?;
        debug!("generating service {}", full_name);
        let srv = load_srv_from_file(context, path, &full_name)?;
        let lines = srv_generator(context, &srv, search_path)?;
        let outfile = compute_outfile_name(outdir, &format!("{}{}", short_name, EXT_SRV), EXT_SRV);
        write_gen(&outfile, &lines)?;
        Ok(outfile)
    }
}
