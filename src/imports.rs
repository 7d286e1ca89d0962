//! Python import closure for generated message modules.

use crate::base_type::{
    bare_msg_type, compute_pkg_type, get_special, is_builtin, is_header_type, HEADER_FULL_NAME,
};
use crate::error::Result;
use crate::spec::MsgContext;

/// Import statements required to use `ty` from `package`.
///
/// Primitives and strings need none; the specials map to their well-known
/// runtime import; a registered message reference needs its package import
/// plus, recursively, the imports of every field of that type. First-seen
/// order is preserved and duplicates are suppressed.
pub fn compute_import(context: &MsgContext, package: &str, ty: &str) -> Result<Vec<String>> {
    let orig_base = bare_msg_type(ty);
    // builtins and specials are never package-relative
    if is_builtin(orig_base) || is_header_type(orig_base) {
        let key = if is_header_type(orig_base) {
            HEADER_FULL_NAME
        } else {
            orig_base
        };
        return Ok(get_special(key)
            .map(|special| vec![special.import_str.to_string()])
            .unwrap_or_default());
    }
    let (pkg, base) = compute_pkg_type(package, orig_base)?;
    let full = format!("{}/{}", pkg, base);
    if !context.is_registered(&full) {
        return Ok(Vec::new());
    }
    let mut retval = vec![format!("import {}.msg", pkg)];
    let spec = context.get_registered(&full)?;
    let dep_package = spec.package.clone();
    for field_ty in spec.types() {
        for sub in compute_import(context, &dep_package, field_ty)? {
            if !retval.contains(&sub) {
                retval.push(sub);
            }
        }
    }
    Ok(retval)
}
