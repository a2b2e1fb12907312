//! Cache key rendering from a prefix and a placeholder template.

use rowcache_core::{scalar_string, RowCacheError, RowCacheResult};
use serde_json::Value;

/// Maximum length of a rendered cache key.
pub const MAX_KEY_LEN: usize = 64;

/// An insertion-ordered list of named arguments for key rendering.
///
/// Placeholder paths resolve their first segment against the argument
/// names and any further segments by direct field access into the value
/// (object fields and array indices).
#[derive(Debug, Clone, Default)]
pub struct KeyArgs {
    fields: Vec<(String, Value)>,
}

impl KeyArgs {
    /// Creates an empty argument list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a named argument.
    #[must_use]
    pub fn arg<T: Into<Value>>(mut self, name: &str, value: T) -> Self {
        self.fields.push((name.to_string(), value.into()));
        self
    }

    /// Looks up an argument by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    /// Resolves a dot-separated path against the arguments.
    fn resolve(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.get(segments.next()?)?;

        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }

        Some(current)
    }

    /// Values in insertion order, rendered as key segments.
    fn segments(&self) -> Vec<String> {
        self.fields
            .iter()
            .map(|(_, value)| scalar_string(value))
            .collect()
    }
}

/// Renders a cache key as `<prefix>:<body>`.
///
/// Without a template the body is the `:`-joined string form of all
/// arguments in insertion order. With a template, every well-formed
/// `#{path}` placeholder is substituted; a placeholder that resolves to
/// nothing substitutes the empty string and trims at most one trailing
/// `:` from the intermediate result, so trailing empty segments collapse
/// without cascading. Malformed placeholder syntax is left verbatim.
///
/// An empty body yields the bare prefix. Fails with `KeyTooLong` when the
/// final key exceeds [`MAX_KEY_LEN`] characters; callers must not reach
/// the store with an oversized key.
pub fn render(prefix: &str, template: Option<&str>, args: &KeyArgs) -> RowCacheResult<String> {
    let body = match template {
        Some(template) => render_template(template, args),
        None => args.segments().join(":"),
    };

    let key = if body.is_empty() {
        prefix.to_string()
    } else {
        format!("{}:{}", prefix, body)
    };

    if key.len() > MAX_KEY_LEN {
        return Err(RowCacheError::key_too_long(key, MAX_KEY_LEN));
    }

    Ok(key)
}

fn render_template(template: &str, args: &KeyArgs) -> String {
    let mut out = template.to_string();

    // Placeholders are collected from the original template; each one then
    // replaces its first remaining occurrence, so duplicates substitute in
    // order.
    for token in placeholders(template) {
        let path = &token[2..token.len() - 1];
        let resolved = args.resolve(path).map(scalar_string).unwrap_or_default();

        if let Some(pos) = out.find(&token) {
            out.replace_range(pos..pos + token.len(), &resolved);
            if resolved.is_empty() && out.ends_with(':') {
                out.pop();
            }
        }
    }

    out
}

/// Scans for well-formed `#{[\w.]+}` placeholders.
fn placeholders(template: &str) -> Vec<String> {
    let bytes = template.as_bytes();
    let mut found = Vec::new();
    let mut i = 0;

    while i + 1 < bytes.len() {
        if bytes[i] == b'#' && bytes[i + 1] == b'{' {
            let mut j = i + 2;
            while j < bytes.len()
                && (bytes[j].is_ascii_alphanumeric() || bytes[j] == b'_' || bytes[j] == b'.')
            {
                j += 1;
            }
            if j > i + 2 && j < bytes.len() && bytes[j] == b'}' {
                found.push(template[i..=j].to_string());
                i = j + 1;
                continue;
            }
        }
        i += 1;
    }

    found
}
