//! Binary pack-pattern computation and run-length reduction.

use crate::base_type::{code_width, pack_code};

/// Pattern string for a run of fields, if every type in `types` is simple.
///
/// An empty run yields `None`; so does the presence of `string`, an array
/// suffix, or any other non-primitive.
pub fn compute_struct_pattern<S: AsRef<str>>(types: &[S]) -> Option<String> {
    if types.is_empty() {
        return None;
    }
    types
        .iter()
        .map(|t| pack_code(t.as_ref()))
        .collect::<Option<String>>()
}

/// Run-length encode a pattern: `hhhhiiiibbb` becomes `4h4i3b`.
///
/// Patterns of length <= 1 and patterns carrying `%` format placeholders are
/// passed through unchanged. Digit characters never join a run, so `1h2h3h`
/// stays as written.
pub fn reduce_pattern(pattern: &str) -> String {
    if pattern.len() <= 1 || pattern.contains('%') {
        return pattern.to_string();
    }
    let mut chars = pattern.chars();
    let mut prev = chars.next().expect("pattern is non-empty");
    let mut count = 1usize;
    let mut reduced = String::with_capacity(pattern.len());
    for c in chars {
        if c == prev && !c.is_ascii_digit() {
            count += 1;
        } else {
            if count > 1 {
                reduced.push_str(&count.to_string());
            }
            reduced.push(prev);
            prev = c;
            count = 1;
        }
    }
    if count > 1 {
        reduced.push_str(&count.to_string());
    }
    reduced.push(prev);
    reduced
}

/// Byte width of a pattern, the `struct.calcsize` analog.
///
/// A digit run multiplies the width of the code that follows it; `s` counts
/// one byte per unit. A leading `<` byte-order mark is ignored. Returns
/// `None` for codes outside the catalog.
pub fn struct_size(pattern: &str) -> Option<usize> {
    let mut total = 0usize;
    let mut repeat: Option<usize> = None;
    for c in pattern.chars() {
        if c == '<' {
            continue;
        }
        if let Some(digit) = c.to_digit(10) {
            repeat = Some(repeat.unwrap_or(0) * 10 + digit as usize);
            continue;
        }
        let width = code_width(c)?;
        total += repeat.take().unwrap_or(1) * width;
    }
    // a trailing repeat with no code is malformed
    match repeat {
        Some(_) => None,
        None => Some(total),
    }
}
