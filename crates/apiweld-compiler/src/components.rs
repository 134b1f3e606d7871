//! The set of components a bundling pass writes into its output document.

use std::collections::BTreeMap;

use apiweld_spec::ComponentKind;
use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::error::CompileError;

/// Valid `in` values of a parameter object.
const PARAMETER_LOCATIONS: &[&str] = &["query", "header", "path", "cookie"];

/// A component value checked against the shape its kind requires.
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    pub kind: ComponentKind,
    pub name: String,
    pub value: Value,
}

impl Component {
    /// Validate `value` as a component of `kind`.
    ///
    /// Reference objects are accepted for every kind. Schemas may also be the
    /// boolean schemas `true`/`false`.
    pub fn build(kind: ComponentKind, name: impl Into<String>, value: Value) -> Result<Self, CompileError> {
        let name = name.into();
        let fail = |message: String| CompileError::Extract {
            kind,
            name: name.clone(),
            message,
        };

        match &value {
            Value::Bool(_) if kind == ComponentKind::Schema => {}
            Value::Object(map) if map.contains_key("$ref") => {}
            Value::Object(map) => match kind {
                ComponentKind::Parameter => {
                    if !map.get("name").is_some_and(Value::is_string) {
                        return Err(fail("parameter is missing 'name'".into()));
                    }
                    match map.get("in").and_then(Value::as_str) {
                        Some(location) if PARAMETER_LOCATIONS.contains(&location) => {}
                        Some(location) => {
                            return Err(fail(format!("invalid parameter location '{}'", location)))
                        }
                        None => return Err(fail("parameter is missing 'in'".into())),
                    }
                }
                ComponentKind::SecurityScheme if !map.contains_key("type") => {
                    return Err(fail("security scheme is missing 'type'".into()));
                }
                ComponentKind::RequestBody if !map.contains_key("content") => {
                    return Err(fail("request body is missing 'content'".into()));
                }
                _ => {}
            },
            other => {
                return Err(fail(format!("expected a mapping, found {}", type_name(other))));
            }
        }

        Ok(Component { kind, name, value })
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}

/// How [`ComponentTable::splice_into`] treats sections already present on
/// the target document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpliceMode {
    /// Add the table's entries to whatever the document already has.
    Merge,
    /// The table becomes the document's only components. Sections the table
    /// leaves empty are removed. Security schemes are always merged, since
    /// they are referenced by name rather than by `$ref`.
    Replace,
}

/// Components keyed by kind and final name, in insertion order.
///
/// Inserting a name that is already present overwrites the value but keeps
/// the original position.
#[derive(Debug, Clone, Default)]
pub struct ComponentTable {
    sections: BTreeMap<ComponentKind, IndexMap<String, Value>>,
}

impl ComponentTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, component: Component) {
        self.sections
            .entry(component.kind)
            .or_default()
            .insert(component.name, component.value);
    }

    /// Claim a slot for `name` without a value yet, so that it keeps the
    /// position of its first reference.
    pub fn reserve(&mut self, kind: ComponentKind, name: &str) {
        self.sections
            .entry(kind)
            .or_default()
            .entry(name.to_string())
            .or_insert(Value::Null);
    }

    /// Drop a reserved slot whose component could not be built.
    pub fn release(&mut self, kind: ComponentKind, name: &str) {
        if let Some(section) = self.sections.get_mut(&kind) {
            if section.get(name).is_some_and(Value::is_null) {
                section.shift_remove(name);
            }
        }
    }

    pub fn contains(&self, kind: ComponentKind, name: &str) -> bool {
        self.sections
            .get(&kind)
            .is_some_and(|section| section.contains_key(name))
    }

    pub fn get(&self, kind: ComponentKind, name: &str) -> Option<&Value> {
        self.sections.get(&kind)?.get(name)
    }

    /// Entries of one kind, in insertion order.
    pub fn section(&self, kind: ComponentKind) -> impl Iterator<Item = (&str, &Value)> {
        self.sections
            .get(&kind)
            .into_iter()
            .flat_map(|section| section.iter().map(|(k, v)| (k.as_str(), v)))
    }

    /// Total number of components across all kinds.
    pub fn len(&self) -> usize {
        self.sections.values().map(IndexMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fold another table into this one, keeping this table's order for
    /// names both contain.
    pub fn merge(&mut self, other: &ComponentTable) {
        for (kind, section) in &other.sections {
            let target = self.sections.entry(*kind).or_default();
            for (name, value) in section {
                target.insert(name.clone(), value.clone());
            }
        }
    }

    /// Write the table into `root`'s `components` object.
    ///
    /// Vendor extensions already present on `components` are left in place.
    /// No empty section, and no empty `components` object, is ever created.
    pub fn splice_into(&self, root: &mut Value, mode: SpliceMode) {
        let Some(root) = root.as_object_mut() else {
            return;
        };
        let mut components = match root.get("components") {
            Some(Value::Object(existing)) => existing.clone(),
            _ => Map::new(),
        };

        for kind in ComponentKind::ALL {
            let key = kind.section();
            let entries = self.sections.get(&kind).filter(|s| !s.is_empty());
            let replace = mode == SpliceMode::Replace && kind != ComponentKind::SecurityScheme;

            match entries {
                Some(entries) if replace => {
                    let section: Map<String, Value> = entries
                        .iter()
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect();
                    components.insert(key.to_string(), Value::Object(section));
                }
                Some(entries) => {
                    let section = components
                        .entry(key.to_string())
                        .or_insert_with(|| Value::Object(Map::new()));
                    if !section.is_object() {
                        *section = Value::Object(Map::new());
                    }
                    if let Value::Object(section) = section {
                        for (name, value) in entries {
                            section.insert(name.clone(), value.clone());
                        }
                    }
                }
                None if replace => {
                    components.shift_remove(key);
                }
                None => {}
            }
        }

        if components.is_empty() {
            root.shift_remove("components");
        } else {
            root.insert("components".to_string(), Value::Object(components));
        }
    }
}
