//! Package-marker (`__init__.py`) generation for output directories.

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::{Error, Result};

/// Create `outdir` if needed, tolerating the race where a concurrent
/// driver process creates it first.
pub fn ensure_outdir(outdir: &Path) -> Result<()> {
    match fs::create_dir_all(outdir) {
        Ok(()) => Ok(()),
        // somebody else snuck in and created the directory before us
        Err(_) if outdir.is_dir() => Ok(()),
        Err(err) => Err(err.into()),
    }
}

/// Write the `__init__.py` marker re-exporting every generated module in
/// `outdir`. A missing directory is a no-op; entries are sorted so the
/// output is deterministic.
pub fn write_modules(outdir: &Path) -> Result<()> {
    if !outdir.is_dir() {
        return Ok(());
    }
    let mut generated_modules = Vec::new();
    for entry in fs::read_dir(outdir)? {
        let entry = entry?;
        let file_name = entry.file_name();
        let name = match file_name.to_str() {
            Some(name) => name,
            None => continue,
        };
        if name.starts_with('_') && name.ends_with(".py") && name != "__init__.py" {
            generated_modules.push(name[..name.len() - 3].to_string());
        }
    }
    generated_modules.sort_unstable();
    write_module(outdir, &generated_modules)
}

/// Create the module file marking `basedir` as a Python package.
pub fn write_module(basedir: &Path, generated_modules: &[String]) -> Result<()> {
    if !basedir.exists() {
        ensure_outdir(basedir)?;
    } else if !basedir.is_dir() {
        return Err(Error::Generation(format!(
            "file preventing the creation of module directory: {}",
            basedir.display()
        )));
    }
    let mut file = fs::File::create(basedir.join("__init__.py"))?;
    for module in generated_modules {
        writeln!(file, "from {} import *", module)?;
    }
    Ok(())
}
