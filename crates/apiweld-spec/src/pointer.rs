//! JSON Pointer and `$ref` string helpers.

use serde_json::Value;

use crate::model::{ComponentKind, Definition};

/// Unescape a single JSON Pointer segment (`~1` → `/`, `~0` → `~`).
pub fn unescape_segment(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}

/// Escape a single JSON Pointer segment.
pub fn escape_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

/// Split a pointer (`#/a/b`, `/a/b`, `#` or empty) into unescaped segments.
pub fn segments(pointer: &str) -> Vec<String> {
    let pointer = pointer.strip_prefix('#').unwrap_or(pointer);
    let pointer = pointer.strip_prefix('/').unwrap_or(pointer);
    if pointer.is_empty() {
        return Vec::new();
    }
    pointer.split('/').map(unescape_segment).collect()
}

/// Resolve a pointer like `#/components/schemas/User` against a root value.
///
/// Array elements are addressed by their decimal index.
pub fn resolve_pointer<'a>(root: &'a Value, pointer: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in segments(pointer) {
        current = match current {
            Value::Object(map) => map.get(&segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Return the `$ref` string of a reference object, if the value is one.
pub fn ref_value(value: &Value) -> Option<&str> {
    value.as_object()?.get("$ref")?.as_str()
}

/// A `$ref` string split into its file part and its fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefTarget {
    /// Relative or absolute file location; `None` for same-file references.
    pub file: Option<String>,
    /// Fragment pointer without the leading `#` (empty for the whole file).
    pub fragment: String,
}

impl RefTarget {
    pub fn parse(raw: &str) -> Self {
        let (file, fragment) = match raw.split_once('#') {
            Some((file, fragment)) => (file, fragment),
            None => (raw, ""),
        };
        RefTarget {
            file: (!file.is_empty()).then(|| file.to_string()),
            fragment: fragment.to_string(),
        }
    }

    pub fn is_local(&self) -> bool {
        self.file.is_none()
    }
}

/// Recognise the `#/components/{kind}/{name}` shape.
pub fn definition_from_pointer(pointer: &str) -> Option<Definition> {
    let segments = segments(pointer);
    match segments.as_slice() {
        [components, section, name] if components == "components" && !name.is_empty() => {
            Some(Definition {
                kind: ComponentKind::from_section(section)?,
                name: name.clone(),
            })
        }
        _ => None,
    }
}
