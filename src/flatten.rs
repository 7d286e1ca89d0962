//! Inlining of embedded message fields for serializer batching.

use crate::base_type::{is_special, parse_type};
use crate::error::{Error, Result};
use crate::message_graph::MessageGraph;
use crate::spec::{Field, MsgContext, MsgSpec};

/// Flattens the spec so that embedded message fields become direct,
/// dotted-name references. The result is not a true registrable spec and is
/// only used for serializer generation; wire semantics are unchanged.
///
/// Primitive, string, and array fields are retained verbatim, as are the
/// special builtins (`time`, `duration`, `std_msgs/Header`), which
/// serialize by recursive descent instead of inlining.
pub fn flatten(context: &MsgContext, graph: &MessageGraph, spec: &MsgSpec) -> Result<MsgSpec> {
    let mut flat = spec.clone();
    flat.fields = flatten_fields(context, graph, spec)?;
    Ok(flat)
}

fn flatten_fields(
    context: &MsgContext,
    graph: &MessageGraph,
    spec: &MsgSpec,
) -> Result<Vec<Field>> {
    let mut fields = Vec::with_capacity(spec.fields.len());
    for field in &spec.fields {
        let (_, is_array, _) = parse_type(&field.ty)?;
        let embedded = if is_array {
            None
        } else {
            context
                .resolve(&spec.package, &field.ty)
                .filter(|full| !is_special(full))
        };
        match embedded {
            Some(full) => {
                if graph.is_recursive(&full) {
                    return Err(Error::Generation(format!(
                        "cannot flatten recursive embedded type [{}]",
                        full
                    )));
                }
                let embedded_spec = context.get_registered(&full)?;
                for inner in flatten_fields(context, graph, embedded_spec)? {
                    fields.push(Field::new(
                        inner.ty,
                        format!("{}.{}", field.name, inner.name),
                    ));
                }
            }
            None => fields.push(field.clone()),
        }
    }
    Ok(fields)
}
