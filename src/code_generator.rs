//! Python source emission for message and service types.
//!
//! The structure descends several levels of serializer generators: a
//! message generator drives a serialize-function generator and a
//! deserialize-function generator, which both walk the flattened spec and
//! hand each field run to a type-specific generator. All output is plain
//! Python text, one line per element.

use log::debug;

use itertools::Itertools;

use crate::base_type::{
    compute_pkg_type, get_special, is_simple, is_special, parse_type, numpy_dtype, SEP,
};
use crate::error::{Error, Result};
use crate::fingerprint::{
    compute_full_text, compute_md5, compute_srv_md5, escape_full_text,
};
use crate::flatten::flatten;
use crate::ident::make_python_safe;
use crate::imports::compute_import;
use crate::message_graph::MessageGraph;
use crate::parser::{load_dependencies, SearchPath};
use crate::spec::{ConstantValue, MsgContext, MsgSpec, SrvSpec};

/// Indent width of the emitted Python.
const INDENT: &str = "  ";

/// Generate the Python module implementing `spec`.
///
/// Dependencies are loaded into `context` through `search_path` before the
/// fingerprint is computed; name sanitization happens after, so identity is
/// always derived from the original names.
pub fn msg_generator(
    context: &mut MsgContext,
    spec: &MsgSpec,
    search_path: &SearchPath,
) -> Result<Vec<String>> {
    load_dependencies(context, spec, search_path)?;
    CodeGenerator::new(context).generate_msg(spec)
}

/// Generate the Python module implementing `srv`: the request class, the
/// response class, and the thin service wrapper.
pub fn srv_generator(
    context: &mut MsgContext,
    srv: &SrvSpec,
    search_path: &SearchPath,
) -> Result<Vec<String>> {
    load_dependencies(context, &srv.request, search_path)?;
    load_dependencies(context, &srv.response, search_path)?;

    let mut lines = Vec::new();
    lines.extend(CodeGenerator::new(context).generate_msg(&srv.request)?);
    lines.extend(CodeGenerator::new(context).generate_msg(&srv.response)?);

    let md5 = compute_srv_md5(context, srv)?;
    lines.push(format!("class {}(object):", srv.short_name));
    lines.push(format!("  _type          = '{}'", srv.full_name));
    lines.push(format!("  _md5sum = '{}'", md5));
    lines.push(format!("  _request_class  = {}Request", srv.short_name));
    lines.push(format!("  _response_class = {}Response", srv.short_name));
    Ok(lines)
}

fn py_bool(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

fn serialize_expr(expr: &str) -> String {
    format!("buff.write({})", expr)
}

/// Length prefixes are so common that their struct is a shared singleton.
fn int32_pack(var: &str) -> String {
    serialize_expr(&format!("_struct_I.pack({})", var))
}

fn int32_unpack(var: &str, buff: &str) -> String {
    format!("({},) = _struct_I.unpack({})", var, buff)
}

/// `struct.pack` through a pattern held in a runtime variable.
fn pack2(pattern: &str, vars: &str) -> String {
    serialize_expr(&format!("struct.pack({}, {})", pattern, vars))
}

/// `struct.unpack` through a pattern held in a runtime variable.
fn unpack2(var: &str, pattern: &str, buff: &str) -> String {
    format!("{} = struct.unpack({}, {})", var, pattern, buff)
}

fn pack_numpy(var: &str) -> String {
    serialize_expr(&format!("{}.tostring()", var))
}

fn unpack_numpy(var: &str, count: &str, dtype: &str, buff: &str) -> String {
    format!(
        "{} = numpy.frombuffer({}, dtype={}, count={})",
        var, buff, dtype, count
    )
}

/// Python constructor expression for a message or special type, or `None`
/// when the type cannot be resolved from `package`.
pub fn compute_constructor(context: &MsgContext, package: &str, ty: &str) -> Option<String> {
    if let Some(special) = get_special(ty) {
        return Some(special.constructor.to_string());
    }
    let (pkg, base) = compute_pkg_type(package, ty).ok()?;
    if context.is_registered(&format!("{}{}{}", pkg, SEP, base)) {
        Some(format!("{}.msg.{}()", pkg, base))
    } else {
        None
    }
}

/// Python default-value expression for a field of type `ty`.
pub fn default_value(context: &MsgContext, package: &str, ty: &str) -> Result<String> {
    match ty {
        "byte" | "int8" | "int16" | "int32" | "int64" | "char" | "uint8" | "uint16" | "uint32"
        | "uint64" => Ok("0".to_string()),
        "float32" | "float64" => Ok("0.".to_string()),
        "string" => Ok("''".to_string()),
        "bool" => Ok("False".to_string()),
        array if array.ends_with(']') => {
            let (base, _, array_len) = parse_type(array)?;
            if base == "byte" || base == "uint8" {
                // byte sequences are opaque strings, not lists
                return Ok(match array_len {
                    Some(len) => format!("b'\\0'*{}", len),
                    None => "b''".to_string(),
                });
            }
            match array_len {
                None => Ok("[]".to_string()),
                Some(len) => {
                    let element = default_value(context, package, base)?;
                    Ok(format!(
                        "[{}]",
                        std::iter::repeat(element).take(len).join(",")
                    ))
                }
            }
        }
        other => compute_constructor(context, package, other)
            .ok_or_else(|| Error::UnknownType(other.to_string())),
    }
}

/// Post-deserialization statement for a field of type `ty`, if any.
fn compute_post_deserialize(ty: &str, varname: &str) -> Option<String> {
    get_special(ty).and_then(|special| special.get_post_deserialize(varname))
}

/// Walks a spec and renders Python (de)serialization code for it.
///
/// The field-access prefix is tracked as an explicit context stack
/// (`self.`, `_v1.`, `val1.`, ...), pushed when descending into an embedded
/// value and popped on the way out. Every struct pattern used along the way
/// is accumulated so the module trailer can define one compiled
/// pattern-struct singleton per distinct pattern; both the accumulator and
/// the temporary-name counter belong to this generator value and start
/// empty for each emission.
pub struct CodeGenerator<'a> {
    context: &'a MsgContext,
    serial_context: String,
    context_stack: Vec<String>,
    counter: usize,
    patterns: Vec<String>,
}

impl<'a> CodeGenerator<'a> {
    pub fn new(context: &'a MsgContext) -> CodeGenerator<'a> {
        CodeGenerator {
            context,
            serial_context: String::new(),
            context_stack: Vec::new(),
            counter: 0,
            patterns: Vec::new(),
        }
    }

    fn next_var(&mut self) -> String {
        self.counter += 1;
        format!("_v{}", self.counter)
    }

    fn push_context(&mut self, context: String) {
        self.context_stack
            .push(std::mem::replace(&mut self.serial_context, context));
    }

    fn pop_context(&mut self) {
        self.serial_context = self.context_stack.pop().unwrap_or_default();
    }

    fn add_pattern(&mut self, pattern: &str) {
        self.patterns.push(pattern.to_string());
    }

    /// `struct.pack` through a compiled pattern singleton.
    fn pack(&mut self, pattern: &str, vars: &str) -> String {
        let pattern = crate::pattern::reduce_pattern(pattern);
        self.add_pattern(&pattern);
        serialize_expr(&format!("_struct_{}.pack({})", pattern, vars))
    }

    /// `struct.unpack` through a compiled pattern singleton.
    fn unpack(&mut self, var: &str, pattern: &str, buff: &str) -> String {
        let pattern = crate::pattern::reduce_pattern(pattern);
        self.add_pattern(&pattern);
        format!("{} = _struct_{}.unpack({})", var, pattern, buff)
    }

    /// Array-length framing: a little-endian unsigned 32-bit element or
    /// byte count. String serialization skips the write here because the
    /// length and payload are packed together.
    fn len_serializer(&self, var: &str, is_string: bool, serialize: bool) -> Vec<String> {
        if serialize {
            let mut lines = vec![format!("length = len({})", var)];
            if !is_string {
                lines.push(int32_pack("length"));
            }
            lines
        } else {
            vec![
                "start = end".to_string(),
                "end += 4".to_string(),
                int32_unpack("length", "str[start:end]"),
            ]
        }
    }

    /// Strings and the byte-array types that alias to them.
    fn string_serializer(&mut self, ty: &str, name: &str, serialize: bool) -> Result<Vec<String>> {
        let mut lines = Vec::new();
        // optimize the serialization path, which accesses the field twice;
        // assignment makes this a non-starter for deserialization
        let var = if !self.serial_context.is_empty() && serialize {
            lines.push(format!("_x = {}{}", self.serial_context, name));
            "_x".to_string()
        } else {
            format!("{}{}", self.serial_context, name)
        };

        let (base, _, array_len) = parse_type(ty)?;
        let bytes_alias = base == "uint8" || base == "byte";
        // fixed-length byte arrays carry no length prefix
        if !bytes_alias || array_len.is_none() {
            lines.extend(self.len_serializer(&var, true, serialize));
        }

        if serialize {
            if bytes_alias {
                lines.push(
                    "# - if encoded as a list instead, serialize as bytes instead of string"
                        .to_string(),
                );
                match array_len {
                    None => {
                        lines.push(format!("if type({}) in [list, tuple]:", var));
                        lines.push(format!(
                            "{}{}",
                            INDENT,
                            pack2("'<I%sB'%length", &format!("length, *{}", var))
                        ));
                        lines.push("else:".to_string());
                        lines.push(format!(
                            "{}{}",
                            INDENT,
                            pack2("'<I%ss'%length", &format!("length, {}", var))
                        ));
                    }
                    Some(len) => {
                        lines.push(format!("if type({}) in [list, tuple]:", var));
                        let list_pack = self.pack(&format!("{}B", len), &format!("*{}", var));
                        lines.push(format!("{}{}", INDENT, list_pack));
                        lines.push("else:".to_string());
                        let str_pack = self.pack(&format!("{}s", len), &var);
                        lines.push(format!("{}{}", INDENT, str_pack));
                    }
                }
            } else {
                // the length prefix counts UTF-8 bytes, so re-encode first
                lines.push(format!("if python3 or type({}) == unicode:", var));
                lines.push(format!("{}{} = {}.encode('utf-8')", INDENT, var, var));
                lines.push(format!("{}length = len({})", INDENT, var));
                lines.push(pack2("'<I%ss'%length", &format!("length, {}", var)));
            }
        } else {
            lines.push("start = end".to_string());
            match array_len {
                Some(len) => lines.push(format!("end += {}", len)),
                None => lines.push("end += length".to_string()),
            }
            lines.push(format!("{} = str[start:end]", var));
        }
        Ok(lines)
    }

    /// Array types other than the byte aliases.
    fn array_serializer(
        &mut self,
        package: &str,
        ty: &str,
        name: &str,
        serialize: bool,
        is_numpy: bool,
    ) -> Result<Vec<String>> {
        let (base, is_array, array_len) = parse_type(ty)?;
        if !is_array {
            return Err(Error::Generation(format!("invalid array spec: {}", ty)));
        }
        // unsigned 8-bit arrays serialize as opaque strings
        if base == "uint8" || base == "byte" {
            return self.string_serializer(ty, name, serialize);
        }

        let var = format!("{}{}", self.serial_context, name);
        let var_length = array_len.is_none();
        let mut lines = Vec::new();
        if var_length {
            lines.extend(self.len_serializer(&var, false, serialize));
        }

        if is_simple(base) {
            let code = crate::pattern::compute_struct_pattern(&[base])
                .ok_or_else(|| Error::Generation(format!("no pack code for {}", base)))?;
            if var_length {
                lines.push(format!("pattern = '<%s{}'%length", code));
                if serialize {
                    if is_numpy {
                        lines.push(pack_numpy(&var));
                    } else {
                        lines.push(pack2("pattern", &format!("*{}", var)));
                    }
                } else {
                    lines.push("start = end".to_string());
                    lines.push("end += struct.calcsize(pattern)".to_string());
                    if is_numpy {
                        let dtype = numpy_dtype(base)
                            .ok_or_else(|| Error::Generation(format!("no dtype for {}", base)))?;
                        lines.push(unpack_numpy(&var, "length", dtype, "str[start:end]"));
                    } else {
                        lines.push(unpack2(&var, "pattern", "str[start:end]"));
                    }
                }
            } else {
                let len = array_len.unwrap_or(0);
                let pattern = format!("{}{}", len, code);
                if serialize {
                    if is_numpy {
                        lines.push(pack_numpy(&var));
                    } else {
                        let packed = self.pack(&pattern, &format!("*{}", var));
                        lines.push(packed);
                    }
                } else {
                    let width = crate::pattern::struct_size(&format!("<{}", pattern))
                        .ok_or_else(|| Error::Generation(format!("bad pattern: {}", pattern)))?;
                    lines.push("start = end".to_string());
                    lines.push(format!("end += {}", width));
                    if is_numpy {
                        let dtype = numpy_dtype(base)
                            .ok_or_else(|| Error::Generation(format!("no dtype for {}", base)))?;
                        lines.push(unpack_numpy(&var, &len.to_string(), dtype, "str[start:end]"));
                    } else {
                        let unpacked = self.unpack(&var, &pattern, "str[start:end]");
                        lines.push(unpacked);
                    }
                }
            }
            if !serialize && base == "bool" {
                // convert uint8 bytes back to bools
                lines.push(format!("{} = list(map(bool, {}))", var, var));
            }
        } else {
            // generic element-wise recursion
            let loop_var = format!("val{}", self.context_stack.len());

            let factory = if base == "string" {
                self.push_context(String::new());
                self.string_serializer(base, &loop_var, serialize)?
            } else {
                self.push_context(format!("{}.", loop_var));
                let full = self
                    .context
                    .resolve(package, base)
                    .ok_or_else(|| Error::UnknownType(base.to_string()))?;
                let element_spec = self.context.get_registered(&full)?.clone();
                self.serializer_body(&element_spec, serialize, is_numpy)?
            };

            if serialize {
                lines.push(format!("for {} in {}:", loop_var, var));
            } else {
                lines.push(format!("{} = []", var));
                match array_len {
                    None => lines.push("for i in range(0, length):".to_string()),
                    Some(len) => lines.push(format!("for i in range(0, {}):", len)),
                }
                if base != "string" {
                    let constructor = compute_constructor(self.context, package, base)
                        .ok_or_else(|| Error::UnknownType(base.to_string()))?;
                    lines.push(format!("{}{} = {}", INDENT, loop_var, constructor));
                }
            }
            for line in factory {
                lines.push(format!("{}{}", INDENT, line));
            }
            if !serialize {
                lines.push(format!("{}{}.append({})", INDENT, var, loop_var));
            }
            self.pop_context();
        }
        Ok(lines)
    }

    /// Everything that cannot join a primitive batch: arrays, strings,
    /// specials, and embedded messages.
    fn complex_serializer(
        &mut self,
        package: &str,
        ty: &str,
        name: &str,
        serialize: bool,
        is_numpy: bool,
    ) -> Result<Vec<String>> {
        let (_, is_array, _) = parse_type(ty)?;
        if is_array {
            return self.array_serializer(package, ty, name, serialize, is_numpy);
        }
        if ty == "string" {
            return self.string_serializer(ty, name, serialize);
        }
        // canonicalize to a registered name; specials already are one
        let resolved = if is_special(ty) {
            ty.to_string()
        } else {
            let (pkg, base) = compute_pkg_type(package, ty)?;
            format!("{}{}{}", pkg, SEP, base)
        };
        if !self.context.is_registered(&resolved) {
            return Err(Error::UnknownType(format!(
                "{} (package context is {})",
                ty, package
            )));
        }
        // descend with a fresh temporary holding the embedded value
        let ctx_var = self.next_var();
        let mut lines = vec![format!("{} = {}{}", ctx_var, self.serial_context, name)];
        self.push_context(format!("{}.", ctx_var));
        let sub_spec = self.context.get_registered(&resolved)?.clone();
        lines.extend(self.serializer_body(&sub_spec, serialize, is_numpy)?);
        self.pop_context();
        Ok(lines)
    }

    /// A batch of adjacent fixed-width fields packed with one pattern.
    fn simple_serializer(
        &mut self,
        spec: &MsgSpec,
        start: usize,
        end: usize,
        serialize: bool,
    ) -> Result<Vec<String>> {
        let mut lines = Vec::new();
        let names: Vec<&str> = spec.fields[start..end]
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        // hoist the member access when several fields share the prefix
        let vars = if end - start > 1 && self.serial_context.ends_with('.') {
            lines.push(format!(
                "_x = {}",
                &self.serial_context[..self.serial_context.len() - 1]
            ));
            format!("_x.{}", names.join(", _x."))
        } else {
            let separator = format!(", {}", self.serial_context);
            format!(
                "{}{}",
                self.serial_context,
                names.join(separator.as_str())
            )
        };

        let types: Vec<&str> = spec.fields[start..end]
            .iter()
            .map(|f| f.ty.as_str())
            .collect();
        let pattern = crate::pattern::compute_struct_pattern(&types)
            .ok_or_else(|| Error::Generation(format!("non-simple field in batch: {:?}", types)))?;

        if serialize {
            let packed = self.pack(&pattern, &vars);
            lines.push(packed);
        } else {
            let reduced = crate::pattern::reduce_pattern(&pattern);
            let width = crate::pattern::struct_size(&format!("<{}", reduced))
                .ok_or_else(|| Error::Generation(format!("bad pattern: {}", reduced)))?;
            lines.push("start = end".to_string());
            lines.push(format!("end += {}", width));
            let unpacked = self.unpack(&format!("({},)", vars), &pattern, "str[start:end]");
            lines.push(unpacked);

            // canonicalize unsigned bytes back to bools
            for field in &spec.fields[start..end] {
                if field.ty == "bool" {
                    let var = format!("{}{}", self.serial_context, field.name);
                    lines.push(format!("{} = bool({})", var, var));
                }
            }
        }
        Ok(lines)
    }

    /// Body of a (de)serialize method for `spec`: batches of adjacent
    /// simple fields interspersed with complex-type steps.
    fn serializer_body(
        &mut self,
        spec: &MsgSpec,
        serialize: bool,
        is_numpy: bool,
    ) -> Result<Vec<String>> {
        if serialize && spec.fields.is_empty() {
            return Ok(vec!["pass".to_string()]);
        }
        let mut lines = Vec::new();
        let mut curr = 0;
        for i in 0..spec.fields.len() {
            let field = &spec.fields[i];
            if !is_simple(&field.ty) {
                if i != curr {
                    lines.extend(self.simple_serializer(spec, curr, i, serialize)?);
                }
                curr = i + 1;
                lines.extend(self.complex_serializer(
                    &spec.package,
                    &field.ty,
                    &field.name,
                    serialize,
                    is_numpy,
                )?);
            }
        }
        if curr < spec.fields.len() {
            lines.extend(self.simple_serializer(spec, curr, spec.fields.len(), serialize)?);
        }
        Ok(lines)
    }

    /// Body of `serialize` / `serialize_numpy`.
    fn serialize_fn(
        &mut self,
        graph: &MessageGraph,
        spec: &MsgSpec,
        is_numpy: bool,
    ) -> Result<Vec<String>> {
        let flat = flatten(self.context, graph, spec)?;
        let mut lines = vec!["try:".to_string()];
        self.push_context("self.".to_string());
        for line in self.serializer_body(&flat, true, is_numpy)? {
            lines.push(format!("{}{}", INDENT, line));
        }
        self.pop_context();
        lines.push("except struct.error as se: self._check_types(se)".to_string());
        lines.push("except TypeError as te: self._check_types(te)".to_string());
        Ok(lines)
    }

    /// Body of `deserialize` / `deserialize_numpy`.
    fn deserialize_fn(
        &mut self,
        graph: &MessageGraph,
        spec: &MsgSpec,
        is_numpy: bool,
    ) -> Result<Vec<String>> {
        let mut lines = vec!["try:".to_string()];
        // embedded values may still be unset on a default-constructed
        // instance
        for field in &spec.fields {
            let (_, is_array, _) = parse_type(&field.ty)?;
            if is_array {
                continue;
            }
            if self.context.resolve(&spec.package, &field.ty).is_some() {
                let constructor = compute_constructor(self.context, &spec.package, &field.ty)
                    .ok_or_else(|| Error::UnknownType(field.ty.clone()))?;
                lines.push(format!("{}if self.{} is None:", INDENT, field.name));
                lines.push(format!(
                    "{}{}self.{} = {}",
                    INDENT, INDENT, field.name, constructor
                ));
            }
        }
        lines.push(format!("{}end = 0", INDENT));

        let flat = flatten(self.context, graph, spec)?;
        self.push_context("self.".to_string());
        for line in self.serializer_body(&flat, false, is_numpy)? {
            lines.push(format!("{}{}", INDENT, line));
        }
        self.pop_context();

        for field in &spec.fields {
            if let Some(code) = compute_post_deserialize(&field.ty, &format!("self.{}", field.name))
            {
                lines.push(format!("{}{}", INDENT, code));
            }
        }

        lines.push(format!("{}return self", INDENT));
        lines.push("except struct.error as e:".to_string());
        lines.push(format!(
            "{}raise genpy.DeserializationError(e) #most likely buffer underfill",
            INDENT
        ));
        Ok(lines)
    }

    fn constants_block(&self, spec: &MsgSpec) -> Vec<String> {
        if spec.constants.is_empty() {
            return Vec::new();
        }
        let mut lines = vec!["  # Pseudo-constants".to_string()];
        for constant in &spec.constants {
            if let ConstantValue::Str(val) = &constant.value {
                let line = if val.contains('"') && val.contains('\'') {
                    // crude escaping of \ and "
                    let escaped = val.replace('\\', "\\\\").replace('"', "\\\"");
                    format!("  {} = \"{}\"", constant.name, escaped)
                } else if val.contains('"') {
                    format!("  {} = r'{}'", constant.name, val)
                } else if val.contains('\'') {
                    format!("  {} = r\"{}\"", constant.name, val)
                } else {
                    format!("  {} = '{}'", constant.name, val)
                };
                lines.push(line);
            } else {
                lines.push(format!("  {} = {}", constant.name, constant.value));
            }
        }
        lines.push(String::new());
        lines
    }

    /// Emit the complete Python class for one message spec.
    ///
    /// All transitive dependencies must already be registered.
    pub fn generate_msg(&mut self, spec: &MsgSpec) -> Result<Vec<String>> {
        debug!("generate_msg: {}", spec.full_name);

        // identity is a wire-level property, so the digest and full text
        // come from the original names
        let md5sum = compute_md5(self.context, spec)?;
        let full_text = compute_full_text(self.context, spec)?;
        let spec = make_python_safe(spec);
        let graph = MessageGraph::new(self.context);

        self.counter = 0;
        self.patterns.clear();

        let mut lines = vec![
            format!(
                "\"\"\"autogenerated by rospygen from {}.msg. Do not edit.\"\"\"",
                spec.short_name
            ),
            "import sys".to_string(),
            "python3 = True if sys.hexversion > 0x03000000 else False".to_string(),
            "import genpy".to_string(),
            "import struct".to_string(),
            String::new(),
        ];

        let mut import_strs: Vec<String> = Vec::new();
        for ty in spec.types() {
            for import in compute_import(self.context, &spec.package, ty)? {
                if import != "import genpy" && !import_strs.contains(&import) {
                    import_strs.push(import);
                }
            }
        }
        let had_imports = !import_strs.is_empty();
        lines.extend(import_strs);
        if had_imports {
            lines.push(String::new());
        }

        lines.push(format!("class {}(genpy.Message):", spec.short_name));
        lines.push(format!("  _md5sum = \"{}\"", md5sum));
        lines.push(format!("  _type = \"{}\"", spec.full_name));
        lines.push(format!(
            "  _has_header = {} #flag to mark the presence of a Header object",
            py_bool(spec.has_header())
        ));
        // the extra newline protects the escaping from quotes in the message
        lines.push(format!(
            "  _full_text = \"\"\"{}\n\"\"\"",
            escape_full_text(&full_text)
        ));

        lines.extend(self.constants_block(&spec));

        let names: Vec<&str> = spec.names().collect();
        if names.is_empty() {
            lines.push("  __slots__ = []".to_string());
            lines.push("  _slot_types = []".to_string());
        } else {
            lines.push(format!("  __slots__ = ['{}']", names.join("','")));
            lines.push(format!(
                "  _slot_types = ['{}']",
                spec.types().collect::<Vec<_>>().join("','")
            ));
        }

        lines.push(String::new());
        lines.push("  def __init__(self, *args, **kwds):".to_string());
        lines.push("    \"\"\"".to_string());
        lines.push("    Constructor. Any message fields that are implicitly/explicitly".to_string());
        lines.push("    set to None will be assigned a default value. The recommend".to_string());
        lines.push("    use is keyword arguments as this is more robust to future message".to_string());
        lines.push("    changes.  You cannot mix in-order arguments and keyword arguments.".to_string());
        lines.push(String::new());
        lines.push("    The available fields are:".to_string());
        lines.push(format!("       {}", names.join(",")));
        lines.push(String::new());
        lines.push("    :param args: complete set of field values, in .msg order".to_string());
        lines.push("    :param kwds: use keyword arguments corresponding to message field names".to_string());
        lines.push("    to set specific fields.".to_string());
        lines.push("    \"\"\"".to_string());
        lines.push("    if args or kwds:".to_string());
        lines.push(format!(
            "      super({}, self).__init__(*args, **kwds)",
            spec.short_name
        ));
        if !names.is_empty() {
            lines.push(
                "      #message fields cannot be None, assign default values for those that are"
                    .to_string(),
            );
            for field in &spec.fields {
                let default = default_value(self.context, &spec.package, &field.ty)?;
                lines.push(format!("      if self.{} is None:", field.name));
                lines.push(format!("        self.{} = {}", field.name, default));
            }
            lines.push("    else:".to_string());
            for field in &spec.fields {
                let default = default_value(self.context, &spec.package, &field.ty)?;
                lines.push(format!("      self.{} = {}", field.name, default));
            }
        }

        lines.push(String::new());
        lines.push("  def _get_types(self):".to_string());
        lines.push("    \"\"\"".to_string());
        lines.push("    internal API method".to_string());
        lines.push("    \"\"\"".to_string());
        lines.push("    return self._slot_types".to_string());

        lines.push(String::new());
        lines.push("  def serialize(self, buff):".to_string());
        lines.push("    \"\"\"".to_string());
        lines.push("    serialize message into buffer".to_string());
        lines.push("    :param buff: buffer, ``StringIO``".to_string());
        lines.push("    \"\"\"".to_string());
        for line in self.serialize_fn(&graph, &spec, false)? {
            lines.push(format!("    {}", line));
        }

        lines.push(String::new());
        lines.push("  def deserialize(self, str):".to_string());
        lines.push("    \"\"\"".to_string());
        lines.push("    unpack serialized message in str into this message instance".to_string());
        lines.push("    :param str: byte array of serialized message, ``bytes``".to_string());
        lines.push("    \"\"\"".to_string());
        for line in self.deserialize_fn(&graph, &spec, false)? {
            lines.push(format!("    {}", line));
        }

        lines.push(String::new());
        lines.push("  def serialize_numpy(self, buff, numpy):".to_string());
        lines.push("    \"\"\"".to_string());
        lines.push("    serialize message with numpy array types into buffer".to_string());
        lines.push("    :param buff: buffer, ``StringIO``".to_string());
        lines.push("    :param numpy: numpy python module".to_string());
        lines.push("    \"\"\"".to_string());
        for line in self.serialize_fn(&graph, &spec, true)? {
            lines.push(format!("    {}", line));
        }

        lines.push(String::new());
        lines.push("  def deserialize_numpy(self, str, numpy):".to_string());
        lines.push("    \"\"\"".to_string());
        lines.push(
            "    unpack serialized message in str into this message instance using numpy for array types"
                .to_string(),
        );
        lines.push("    :param str: byte array of serialized message, ``bytes``".to_string());
        lines.push("    :param numpy: numpy python module".to_string());
        lines.push("    \"\"\"".to_string());
        for line in self.deserialize_fn(&graph, &spec, true)? {
            lines.push(format!("    {}", line));
        }

        lines.push(String::new());
        lines.push("_struct_I = genpy.struct_I".to_string());
        let patterns = std::mem::take(&mut self.patterns);
        for pattern in patterns.iter().unique() {
            // the length-prefix struct is already a shared singleton
            if pattern == "I" {
                continue;
            }
            lines.push(format!(
                "_struct_{} = struct.Struct(\"<{}\")",
                pattern, pattern
            ));
        }
        self.counter = 0;
        Ok(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::load_msg_from_string;
    use crate::spec::Field;
    use pretty_assertions::assert_eq;

    fn default_search_path() -> SearchPath {
        SearchPath::new()
    }

    #[test]
    fn test_pack_unpack_helpers() {
        let context = MsgContext::create_default();
        let mut gen = CodeGenerator::new(&context);
        assert_eq!(
            "buff.write(_struct_3lL3bB.pack(foo, bar))",
            gen.pack("lllLbbbB", "foo, bar")
        );
        assert_eq!(
            "var_x = _struct_I3if2I.unpack(bname)",
            gen.unpack("var_x", "IiiifII", "bname")
        );
        assert_eq!(
            "buff.write(struct.pack(patt_name, foo, bar))",
            pack2("patt_name", "foo, bar")
        );
        assert_eq!("x = struct.unpack(patt, b)", unpack2("x", "patt", "b"));
    }

    #[test]
    fn test_len_serializer() {
        let context = MsgContext::create_default();
        let gen = CodeGenerator::new(&context);
        assert_eq!(
            vec!["length = len(foo)".to_string()],
            gen.len_serializer("foo", true, true)
        );
        assert_eq!(
            vec![
                "length = len(foo)".to_string(),
                "buff.write(_struct_I.pack(length))".to_string(),
            ],
            gen.len_serializer("foo", false, true)
        );
        let deser = vec![
            "start = end".to_string(),
            "end += 4".to_string(),
            "(length,) = _struct_I.unpack(str[start:end])".to_string(),
        ];
        assert_eq!(deser, gen.len_serializer("foo", true, false));
        assert_eq!(deser, gen.len_serializer("foo", false, false));
    }

    #[test]
    fn test_string_serializer() {
        let context = MsgContext::create_default();
        let mut gen = CodeGenerator::new(&context);
        assert_eq!(
            vec![
                "length = len(var_name)".to_string(),
                "if python3 or type(var_name) == unicode:".to_string(),
                "  var_name = var_name.encode('utf-8')".to_string(),
                "  length = len(var_name)".to_string(),
                "buff.write(struct.pack('<I%ss'%length, length, var_name))".to_string(),
            ],
            gen.string_serializer("string", "var_name", true).unwrap()
        );

        assert_eq!(
            vec![
                "length = len(b_name)".to_string(),
                "# - if encoded as a list instead, serialize as bytes instead of string"
                    .to_string(),
                "if type(b_name) in [list, tuple]:".to_string(),
                "  buff.write(struct.pack('<I%sB'%length, length, *b_name))".to_string(),
                "else:".to_string(),
                "  buff.write(struct.pack('<I%ss'%length, length, b_name))".to_string(),
            ],
            gen.string_serializer("uint8[]", "b_name", true).unwrap()
        );

        assert_eq!(
            vec![
                "start = end".to_string(),
                "end += 4".to_string(),
                "(length,) = _struct_I.unpack(str[start:end])".to_string(),
                "start = end".to_string(),
                "end += length".to_string(),
                "var_name = str[start:end]".to_string(),
            ],
            gen.string_serializer("string", "var_name", false).unwrap()
        );
    }

    #[test]
    fn test_default_value() {
        let mut context = MsgContext::create_default();
        load_msg_from_string(&mut context, "string data\n", "fake_msgs/String").unwrap();
        load_msg_from_string(
            &mut context,
            "int32 x\nint32 y\nint32 z\n",
            "fake_msgs/ThreeNums",
        )
        .unwrap();

        for t in [
            "uint8", "int8", "uint16", "int16", "uint32", "int32", "uint64", "int64", "byte",
            "char",
        ] {
            assert_eq!("0", default_value(&context, "std_msgs", t).unwrap());
        }
        for t in ["float32", "float64"] {
            assert_eq!("0.", default_value(&context, "std_msgs", t).unwrap());
        }
        assert_eq!("''", default_value(&context, "roslib", "string").unwrap());
        assert_eq!("False", default_value(&context, "roslib", "bool").unwrap());

        assert_eq!("genpy.Time()", default_value(&context, "roslib", "time").unwrap());
        assert_eq!(
            "genpy.Duration()",
            default_value(&context, "roslib", "duration").unwrap()
        );
        assert_eq!(
            "std_msgs.msg._Header.Header()",
            default_value(&context, "roslib", "std_msgs/Header").unwrap()
        );

        for t in [
            "int8", "uint16", "int16", "uint32", "int32", "uint64", "int64", "float32", "float64",
            "char",
        ] {
            assert_eq!(
                "[]",
                default_value(&context, "std_msgs", &format!("{}[]", t)).unwrap()
            );
        }
        assert_eq!("b''", default_value(&context, "roslib", "uint8[]").unwrap());
        assert_eq!("b''", default_value(&context, "roslib", "byte[]").unwrap());
        assert_eq!(
            "b'\\0'*4",
            default_value(&context, "roslib", "uint8[4]").unwrap()
        );
        assert_eq!(
            "b'\\0'*1",
            default_value(&context, "roslib", "byte[1]").unwrap()
        );

        assert_eq!(
            "[0.,0.,0.]",
            default_value(&context, "std_msgs", "float32[3]").unwrap()
        );
        assert_eq!(
            "[0,0,0,0]",
            default_value(&context, "std_msgs", "int32[4]").unwrap()
        );

        assert_eq!(
            "fake_msgs.msg.String()",
            default_value(&context, "std_msgs", "fake_msgs/String").unwrap()
        );
        assert_eq!(
            "fake_msgs.msg.ThreeNums()",
            default_value(&context, "fake_msgs", "ThreeNums").unwrap()
        );
        assert_eq!(
            "[]",
            default_value(&context, "std_msgs", "fake_msgs/String[]").unwrap()
        );
        assert_eq!(
            "[fake_msgs.msg.String(),fake_msgs.msg.String()]",
            default_value(&context, "std_msgs", "fake_msgs/String[2]").unwrap()
        );

        assert!(matches!(
            default_value(&context, "unknown_msgs", "unknown_msgs/Foo"),
            Err(Error::UnknownType(_))
        ));
        assert!(matches!(
            default_value(&context, "std_msgs", "ThreeNums"),
            Err(Error::UnknownType(_))
        ));
    }

    #[test]
    fn test_compute_constructor() {
        let mut context = MsgContext::create_default();
        load_msg_from_string(&mut context, "string data\n", "fake_msgs/String").unwrap();

        assert_eq!(
            Some("genpy.Time()".to_string()),
            compute_constructor(&context, "roslib", "time")
        );
        assert_eq!(
            Some("genpy.Duration()".to_string()),
            compute_constructor(&context, "roslib", "duration")
        );
        assert_eq!(
            Some("std_msgs.msg._Header.Header()".to_string()),
            compute_constructor(&context, "std_msgs", "std_msgs/Header")
        );
        assert_eq!(
            Some("fake_msgs.msg.String()".to_string()),
            compute_constructor(&context, "fake_msgs", "String")
        );
        assert_eq!(None, compute_constructor(&context, "unknown_msgs", "Foo"));
    }

    #[test]
    fn simple_batch_emission() {
        let mut context = MsgContext::create_default();
        let spec = load_msg_from_string(
            &mut context,
            "int8 a\nuint8 b\nint16 c\n",
            "t_msgs/Batch",
        )
        .unwrap();
        let lines = msg_generator(&mut context, &spec, &default_search_path()).unwrap();
        let text = lines.join("\n");
        assert!(text.contains("buff.write(_struct_bBh.pack(_x.a, _x.b, _x.c))"));
        assert!(text.contains("(_x.a, _x.b, _x.c,) = _struct_bBh.unpack(str[start:end])"));
        assert!(text.contains("_struct_bBh = struct.Struct(\"<bBh\")"));
        assert!(text.contains("end += 4"));
    }

    #[test]
    fn empty_spec_serializes_nothing() {
        let mut context = MsgContext::create_default();
        let spec = load_msg_from_string(&mut context, "# nothing here\n", "t_msgs/Empty").unwrap();
        let lines = msg_generator(&mut context, &spec, &default_search_path()).unwrap();
        let text = lines.join("\n");
        assert!(text.contains("__slots__ = []"));
        assert!(text.contains("      pass"));
        assert!(text.contains("      end = 0"));
        assert!(text.contains("      return self"));
    }

    #[test]
    fn reserved_names_are_remapped_in_code_only() {
        let mut context = MsgContext::create_default();
        let spec = load_msg_from_string(&mut context, "int32 if\n", "t_msgs/Kw").unwrap();
        let lines = msg_generator(&mut context, &spec, &default_search_path()).unwrap();
        let text = lines.join("\n");
        assert!(text.contains("__slots__ = ['if_']"));
        assert!(text.contains("self.if_ = 0"));
        // the original spec is untouched
        assert_eq!("if", spec.fields[0].name);
    }

    #[test]
    fn header_spec_emission() {
        let mut context = MsgContext::create_default();
        let spec = load_msg_from_string(
            &mut context,
            "Header header\nstring child_frame_id\n",
            "t_msgs/Stamped",
        )
        .unwrap();
        let lines = msg_generator(&mut context, &spec, &default_search_path()).unwrap();
        let text = lines.join("\n");
        assert!(text.contains("_has_header = True"));
        assert!(text.contains("import std_msgs.msg"));
        assert!(text.contains("if self.header is None:"));
        assert!(text.contains("self.header = std_msgs.msg._Header.Header()"));
        assert!(text.contains("_v1 = self.header"));
        // the stamp descends one more level
        assert!(text.contains("_v2 = _v1.stamp"));
        assert!(text.contains("_struct_2i = struct.Struct(\"<2i\")"));
    }

    #[test]
    fn time_fields_get_canon_hook() {
        let mut context = MsgContext::create_default();
        let spec =
            load_msg_from_string(&mut context, "time stamp\nduration d\n", "t_msgs/Clock").unwrap();
        let lines = msg_generator(&mut context, &spec, &default_search_path()).unwrap();
        let text = lines.join("\n");
        assert!(text.contains("self.stamp.canon()"));
        assert!(text.contains("self.d.canon()"));
        assert!(text.contains("if self.stamp is None:"));
        assert!(text.contains("self.stamp = genpy.Time()"));
    }

    #[test]
    fn string_constant_quoting() {
        let mut context = MsgContext::create_default();
        let spec = load_msg_from_string(
            &mut context,
            "string PLAIN=hello\nstring WITH_DOUBLE=say \"hi\"\nstring WITH_SINGLE=it's\nstring BOTH=a \"b\" c's\nint32 x\n",
            "t_msgs/Consts",
        )
        .unwrap();
        let lines = msg_generator(&mut context, &spec, &default_search_path()).unwrap();
        let text = lines.join("\n");
        assert!(text.contains("  PLAIN = 'hello'"));
        assert!(text.contains("  WITH_DOUBLE = r'say \"hi\"'"));
        assert!(text.contains("  WITH_SINGLE = r\"it's\""));
        assert!(text.contains("  BOTH = \"a \\\"b\\\" c's\""));
    }

    #[test]
    fn variable_byte_array_emission() {
        let mut context = MsgContext::create_default();
        let spec = load_msg_from_string(&mut context, "uint8[] data\n", "t_msgs/Blob").unwrap();
        let lines = msg_generator(&mut context, &spec, &default_search_path()).unwrap();
        let text = lines.join("\n");
        assert!(text.contains("if type(_x) in [list, tuple]:"));
        assert!(text.contains("buff.write(struct.pack('<I%sB'%length, length, *_x))"));
        assert!(text.contains("buff.write(struct.pack('<I%ss'%length, length, _x))"));
        assert!(text.contains("self.data = str[start:end]"));
    }

    #[test]
    fn fixed_primitive_array_has_no_length_prefix() {
        let mut context = MsgContext::create_default();
        let spec = load_msg_from_string(&mut context, "int32[3] v\n", "t_msgs/Fixed").unwrap();
        let lines = msg_generator(&mut context, &spec, &default_search_path()).unwrap();
        let text = lines.join("\n");
        assert!(text.contains("buff.write(_struct_3i.pack(*self.v))"));
        assert!(text.contains("end += 12"));
        assert!(!text.contains("buff.write(_struct_I.pack(length))"));
        // numpy path shares the wire layout
        assert!(text.contains("self.v = numpy.frombuffer(str[start:end], dtype=numpy.int32, count=3)"));
    }

    #[test]
    fn variable_primitive_array_emission() {
        let mut context = MsgContext::create_default();
        let spec = load_msg_from_string(&mut context, "float64[] samples\n", "t_msgs/Var").unwrap();
        let lines = msg_generator(&mut context, &spec, &default_search_path()).unwrap();
        let text = lines.join("\n");
        assert!(text.contains("buff.write(_struct_I.pack(length))"));
        assert!(text.contains("pattern = '<%sd'%length"));
        assert!(text.contains("buff.write(struct.pack(pattern, *self.samples))"));
        assert!(text.contains("end += struct.calcsize(pattern)"));
        assert!(text.contains("buff.write(self.samples.tostring())"));
        assert!(text
            .contains("self.samples = numpy.frombuffer(str[start:end], dtype=numpy.float64, count=length)"));
    }

    #[test]
    fn message_array_uses_loop_descent() {
        let mut context = MsgContext::create_default();
        load_msg_from_string(&mut context, "float64 x\nfloat64 y\n", "t_msgs/Point").unwrap();
        let spec =
            load_msg_from_string(&mut context, "t_msgs/Point[] points\n", "t_msgs/Polygon").unwrap();
        let lines = msg_generator(&mut context, &spec, &default_search_path()).unwrap();
        let text = lines.join("\n");
        assert!(text.contains("for val1 in self.points:"));
        assert!(text.contains("for i in range(0, length):"));
        assert!(text.contains("  val1 = t_msgs.msg.Point()"));
        assert!(text.contains("  self.points.append(val1)"));
        assert!(text.contains("import t_msgs.msg"));
    }

    #[test]
    fn embedded_messages_are_flattened_into_batches() {
        let mut context = MsgContext::create_default();
        load_msg_from_string(&mut context, "float64 x\nfloat64 y\n", "t_msgs/Point").unwrap();
        let spec = load_msg_from_string(
            &mut context,
            "t_msgs/Point a\nt_msgs/Point b\n",
            "t_msgs/Pair",
        )
        .unwrap();
        let lines = msg_generator(&mut context, &spec, &default_search_path()).unwrap();
        let text = lines.join("\n");
        // one batch spans both embedded points
        assert!(text.contains("buff.write(_struct_4d.pack(_x.a.x, _x.a.y, _x.b.x, _x.b.y))"));
        assert!(text.contains("if self.a is None:"));
        assert!(text.contains("self.a = t_msgs.msg.Point()"));
    }

    #[test]
    fn srv_wrapper_emission() {
        let mut context = MsgContext::create_default();
        let srv = crate::parser::load_srv_from_string(
            &mut context,
            "int64 a\nint64 b\n---\nint64 sum\n",
            "t_msgs/AddTwoInts",
        )
        .unwrap();
        let lines = srv_generator(&mut context, &srv, &default_search_path()).unwrap();
        let text = lines.join("\n");
        assert!(text.contains("class AddTwoIntsRequest(genpy.Message):"));
        assert!(text.contains("class AddTwoIntsResponse(genpy.Message):"));
        assert!(text.contains("class AddTwoInts(object):"));
        assert!(text.contains("  _type          = 't_msgs/AddTwoInts'"));
        assert!(text.contains("  _request_class  = AddTwoIntsRequest"));
        assert!(text.contains("  _response_class = AddTwoIntsResponse"));
    }

    #[test]
    fn unknown_embedded_type_fails_typed() {
        let mut context = MsgContext::create_default();
        let spec = MsgSpec::new(
            vec![Field::new("missing_msgs/Gone", "g")],
            Vec::new(),
            "missing_msgs/Gone g\n",
            "t_msgs/Broken",
        )
        .unwrap();
        context.register("t_msgs/Broken", spec.clone());
        let err = msg_generator(&mut context, &spec, &default_search_path()).unwrap_err();
        assert!(matches!(err, Error::UnknownType(_)));
    }
}
