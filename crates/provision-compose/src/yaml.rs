//! Deterministic YAML emitter for generated compose documents.
//!
//! Collections are written in block style until `inline` nesting levels have
//! been used up; deeper collections are written in flow style on one line.
//! The output depends only on the input value, so regenerating an unchanged
//! server yields a byte-identical file.

use serde_json::{Map, Value};

/// Nesting level at which collections switch to flow style.
pub const INLINE_DEPTH: usize = 5;
/// Spaces per nesting level.
pub const INDENT_WIDTH: usize = 2;

pub fn to_yaml(value: &Value) -> String {
    dump(value, INLINE_DEPTH, INDENT_WIDTH)
}

pub fn dump(value: &Value, inline: usize, indent_width: usize) -> String {
    let mut out = String::new();
    write_block(&mut out, value, inline, indent_width, 0);
    out
}

fn is_nonempty_collection(value: &Value) -> bool {
    match value {
        Value::Object(map) => !map.is_empty(),
        Value::Array(items) => !items.is_empty(),
        _ => false,
    }
}

fn write_block(out: &mut String, value: &Value, inline: usize, width: usize, indent: usize) {
    if inline == 0 || !is_nonempty_collection(value) {
        push_indent(out, indent);
        out.push_str(&inline_value(value));
        out.push('\n');
        return;
    }

    let entries: Vec<(Option<&String>, &Value)> = match value {
        Value::Object(map) => map.iter().map(|(k, v)| (Some(k), v)).collect(),
        Value::Array(items) => items.iter().map(|v| (None, v)).collect(),
        _ => return,
    };

    for (key, item) in entries {
        push_indent(out, indent);
        match key {
            Some(k) => {
                out.push_str(&scalar(k));
                out.push(':');
            }
            None => out.push('-'),
        }
        if inline - 1 == 0 || !is_nonempty_collection(item) {
            out.push(' ');
            out.push_str(&inline_value(item));
            out.push('\n');
        } else {
            out.push('\n');
            write_block(out, item, inline - 1, width, indent + width);
        }
    }
}

fn push_indent(out: &mut String, indent: usize) {
    out.extend(std::iter::repeat(' ').take(indent));
}

fn inline_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_owned(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => scalar(s),
        Value::Array(items) if items.is_empty() => "[]".to_owned(),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(inline_value).collect();
            format!("[{}]", parts.join(", "))
        }
        Value::Object(map) => inline_map(map),
    }
}

fn inline_map(map: &Map<String, Value>) -> String {
    if map.is_empty() {
        return "{}".to_owned();
    }
    let parts: Vec<String> = map
        .iter()
        .map(|(k, v)| format!("{}: {}", scalar(k), inline_value(v)))
        .collect();
    format!("{{ {} }}", parts.join(", "))
}

/// Render a string scalar, quoting whenever a plain scalar could be read
/// back as something else.
pub fn scalar(s: &str) -> String {
    if needs_double_quotes(s) {
        // JSON string escapes are valid YAML double-quoted escapes.
        return serde_json::to_string(s).unwrap_or_else(|_| format!("\"{s}\""));
    }
    if needs_single_quotes(s) {
        return format!("'{}'", s.replace('\'', "''"));
    }
    s.to_owned()
}

fn needs_double_quotes(s: &str) -> bool {
    s.chars().any(|c| c.is_control() || c == '\u{feff}')
}

fn needs_single_quotes(s: &str) -> bool {
    const INDICATORS: &[char] = &[
        ':', '#', ',', '[', ']', '{', '}', '&', '*', '!', '|', '>', '\'', '"', '%', '@', '`',
    ];
    let Some(first) = s.chars().next() else {
        return true;
    };
    if first.is_whitespace() || s.ends_with(char::is_whitespace) {
        return true;
    }
    if matches!(first, '-' | '?' | '~') || s.contains(INDICATORS) {
        return true;
    }
    is_reserved_word(s) || looks_numeric(s)
}

fn is_reserved_word(s: &str) -> bool {
    matches!(
        s.to_ascii_lowercase().as_str(),
        "null" | "true" | "false" | "yes" | "no" | "on" | "off" | "y" | "n" | ".inf" | ".nan"
            | "<<"
    )
}

fn looks_numeric(s: &str) -> bool {
    if s.parse::<f64>().is_ok() {
        return true;
    }
    // YAML 1.1 also reads octal, hex, sexagesimal, underscored numbers and
    // dates as non-strings.
    s.starts_with(|c: char| c.is_ascii_digit() || c == '+' || c == '.')
        && s.contains(|c: char| c.is_ascii_digit())
        && s
            .chars()
            .all(|c| c.is_ascii_hexdigit() || matches!(c, '.' | '_' | '-' | '+' | 'x' | 'o' | 'X' | 'O'))
}
