//! Stable 128-bit content hashes for message and service types.
//!
//! The fingerprint is the wire-level identity of a type: it folds in the
//! fully expanded dependency set, so two endpoints agree on it exactly when
//! their definitions match. It must be byte-stable across runs and
//! machines, which is why everything here works from declaration order and
//! never from map iteration order.

use crate::base_type::{bare_msg_type, is_builtin};
use crate::error::{Error, Result};
use crate::spec::{MsgContext, MsgSpec, SrvSpec};

/// Canonical text a message fingerprint is computed from: constants first,
/// one per line as `type name=value`, then fields as `type name`, with
/// embedded message types replaced by their own fingerprint (array
/// suffixes dropped) and builtin types kept as raw text.
pub fn compute_md5_text(context: &MsgContext, spec: &MsgSpec) -> Result<String> {
    let mut visiting = Vec::new();
    md5_text_guarded(context, spec, &mut visiting)
}

fn md5_text_guarded(
    context: &MsgContext,
    spec: &MsgSpec,
    visiting: &mut Vec<String>,
) -> Result<String> {
    if visiting.contains(&spec.full_name) {
        return Err(Error::Generation(format!(
            "cyclic dependency on [{}] while fingerprinting",
            spec.full_name
        )));
    }
    visiting.push(spec.full_name.clone());

    let mut lines = Vec::with_capacity(spec.constants.len() + spec.fields.len());
    for constant in &spec.constants {
        lines.push(format!(
            "{} {}={}",
            constant.ty, constant.name, constant.raw_text
        ));
    }
    for field in &spec.fields {
        let base = bare_msg_type(&field.ty);
        if is_builtin(base) {
            lines.push(format!("{} {}", field.ty, field.name));
        } else {
            let full = context
                .resolve(&spec.package, &field.ty)
                .ok_or_else(|| Error::UnknownType(field.ty.clone()))?;
            let sub_spec = context.get_registered(&full)?;
            let sub_text = md5_text_guarded(context, sub_spec, visiting)?;
            let sub_md5 = digest(&sub_text);
            lines.push(format!("{} {}", sub_md5, field.name));
        }
    }

    visiting.pop();
    Ok(lines.join("\n"))
}

fn digest(text: &str) -> String {
    format!("{:x}", md5::compute(text.as_bytes()))
}

/// Fingerprint of a message type as a lowercase hex digest.
pub fn compute_md5(context: &MsgContext, spec: &MsgSpec) -> Result<String> {
    Ok(digest(&compute_md5_text(context, spec)?))
}

/// Fingerprint of a service type: digest of the request canonical text
/// concatenated with the response canonical text.
pub fn compute_srv_md5(context: &MsgContext, spec: &SrvSpec) -> Result<String> {
    let text = format!(
        "{}{}",
        compute_md5_text(context, &spec.request)?,
        compute_md5_text(context, &spec.response)?
    );
    Ok(digest(&text))
}

/// Transitive message dependencies of `spec` in first-seen depth-first
/// order. Builtins (primitives, `string`, `time`, `duration`) are not
/// dependencies; the well-known header is.
pub fn transitive_depends(context: &MsgContext, spec: &MsgSpec) -> Result<Vec<String>> {
    let mut deps = Vec::new();
    collect_depends(context, spec, &mut deps)?;
    Ok(deps)
}

fn collect_depends(context: &MsgContext, spec: &MsgSpec, deps: &mut Vec<String>) -> Result<()> {
    for field in &spec.fields {
        let base = bare_msg_type(&field.ty);
        if is_builtin(base) {
            continue;
        }
        let full = context
            .resolve(&spec.package, &field.ty)
            .ok_or_else(|| Error::UnknownType(field.ty.clone()))?;
        if deps.contains(&full) {
            continue;
        }
        deps.push(full.clone());
        // bounded: the dep list only grows, so a cycle would re-hit the
        // contains() check above
        let sub_spec = context.get_registered(&full)?;
        collect_depends(context, sub_spec, deps)?;
    }
    Ok(())
}

/// Concatenated text of a spec and its transitive dependencies, each
/// dependency preceded by a separator line and a `MSG:` header.
pub fn compute_full_text(context: &MsgContext, spec: &MsgSpec) -> Result<String> {
    let sep = "=".repeat(80);
    let mut buff = String::new();
    buff.push_str(&spec.text);
    buff.push('\n');
    for dep in transitive_depends(context, spec)? {
        buff.push_str(&sep);
        buff.push('\n');
        buff.push_str(&format!("MSG: {}\n", dep));
        buff.push_str(&context.get_registered(&dep)?.text);
        buff.push('\n');
    }
    // drop the trailing separator newline added by the concatenation
    buff.pop();
    Ok(buff)
}

/// Escape full text so it reproduces byte-exactly inside a Python
/// triple-quoted string literal.
pub fn escape_full_text(text: &str) -> String {
    text.replace('\\', "\\\\").replace("\"\"\"", "\\\"\\\"\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{Constant, ConstantValue, Field};
    use pretty_assertions::assert_eq;

    fn register(context: &mut MsgContext, full_name: &str, fields: Vec<Field>, text: &str) {
        let spec = MsgSpec::new(fields, Vec::new(), text, full_name).unwrap();
        context.register(full_name, spec);
    }

    #[test]
    fn well_known_fingerprints() {
        let context = MsgContext::create_default();
        let header = context.get_registered("std_msgs/Header").unwrap();
        assert_eq!(
            "uint32 seq\ntime stamp\nstring frame_id",
            compute_md5_text(&context, header).unwrap()
        );
        assert_eq!(
            "2176decaecbce78abc3b96ef049fabed",
            compute_md5(&context, header).unwrap()
        );

        let string_spec = MsgSpec::new(
            vec![Field::new("string", "data")],
            Vec::new(),
            "string data\n",
            "std_msgs/String",
        )
        .unwrap();
        assert_eq!(
            "992ce8a1687cec8c8bd883ec73ca41d1",
            compute_md5(&context, &string_spec).unwrap()
        );
    }

    #[test]
    fn embedded_types_use_recursive_digest() {
        let mut context = MsgContext::create_default();
        register(
            &mut context,
            "fp_msgs/Inner",
            vec![Field::new("int8", "data")],
            "int8 data\n",
        );
        let outer = MsgSpec::new(
            vec![Field::new("fp_msgs/Inner", "inner")],
            Vec::new(),
            "fp_msgs/Inner inner\n",
            "fp_msgs/Outer",
        )
        .unwrap();

        let inner_md5 = digest("int8 data");
        assert_eq!(
            format!("{} inner", inner_md5),
            compute_md5_text(&context, &outer).unwrap()
        );
    }

    #[test]
    fn constants_precede_fields() {
        let context = MsgContext::create_default();
        let spec = MsgSpec::new(
            vec![Field::new("byte", "value")],
            vec![Constant {
                ty: "byte".into(),
                name: "SUCCESS".into(),
                value: ConstantValue::Int(1),
                raw_text: "1".into(),
            }],
            "byte SUCCESS=1\nbyte value\n",
            "fp_msgs/Status",
        )
        .unwrap();
        assert_eq!(
            "byte SUCCESS=1\nbyte value",
            compute_md5_text(&context, &spec).unwrap()
        );
    }

    #[test]
    fn fingerprint_is_stable() {
        let mut context = MsgContext::create_default();
        register(
            &mut context,
            "fp_msgs/Inner",
            vec![Field::new("int8", "data")],
            "int8 data\n",
        );
        let outer = MsgSpec::new(
            vec![
                Field::new("std_msgs/Header", "header"),
                Field::new("fp_msgs/Inner[]", "inners"),
                Field::new("float64", "x"),
            ],
            Vec::new(),
            "Header header\nfp_msgs/Inner[] inners\nfloat64 x\n",
            "fp_msgs/Outer",
        )
        .unwrap();
        let first = compute_md5(&context, &outer).unwrap();
        for _ in 0..8 {
            assert_eq!(first, compute_md5(&context, &outer).unwrap());
        }
    }

    #[test]
    fn unresolved_reference_is_unknown_type() {
        let context = MsgContext::create_default();
        let spec = MsgSpec::new(
            vec![Field::new("nope_msgs/Gone", "x")],
            Vec::new(),
            "",
            "fp_msgs/Bad",
        )
        .unwrap();
        assert!(matches!(
            compute_md5(&context, &spec),
            Err(Error::UnknownType(_))
        ));
    }

    #[test]
    fn full_text_concatenates_dependencies() {
        let mut context = MsgContext::create_default();
        register(
            &mut context,
            "fp_msgs/Inner",
            vec![Field::new("int8", "data")],
            "int8 data\n",
        );
        let outer = MsgSpec::new(
            vec![Field::new("fp_msgs/Inner", "inner")],
            Vec::new(),
            "fp_msgs/Inner inner\n",
            "fp_msgs/Outer",
        )
        .unwrap();
        let expected = format!(
            "fp_msgs/Inner inner\n\n{}\nMSG: fp_msgs/Inner\nint8 data\n",
            "=".repeat(80)
        );
        assert_eq!(expected, compute_full_text(&context, &outer).unwrap());
    }

    #[test]
    fn full_text_escaping_survives_triple_quotes() {
        assert_eq!("plain", escape_full_text("plain"));
        assert_eq!("a \\\\ b", escape_full_text("a \\ b"));
        assert_eq!("say \\\"\\\"\\\" loud", escape_full_text("say \"\"\" loud"));
        assert_eq!("one \" quote", escape_full_text("one \" quote"));
    }
}
