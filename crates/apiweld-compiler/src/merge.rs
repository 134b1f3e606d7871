//! Combination of a proxy operation with the upstream operation it fronts.
//!
//! The upstream supplies the operation body. The proxy side owns
//! `operationId`, `security` and vendor extensions, and its parameters take
//! precedence over upstream parameters with the same `(name, in)`.

use apiweld_spec::pointer::{ref_value, resolve_pointer, RefTarget};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::extension::Inject;

/// Fields that only ever come from the proxy side.
const PROXY_OWNED: &[&str] = &["operationId", "security"];

/// Longest `$ref` chain followed when keying a parameter.
const MAX_REF_DEPTH: usize = 16;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MergeError {
    /// The operation is not a mapping.
    #[error("{0} operation is not a mapping")]
    NotAMapping(&'static str),

    /// A parameter reference could not be followed to a parameter object.
    #[error("cannot resolve parameter '{0}'")]
    UnresolvedParameter(String),

    /// A parameter without `name` or `in`.
    #[error("parameter is missing 'name' or 'in'")]
    IncompleteParameter,
}

/// Parameter identity: name and location.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParameterKey {
    pub name: String,
    pub location: String,
}

/// One side of a merge: an operation and the document it lives in, used to
/// follow parameter references.
#[derive(Debug, Clone, Copy)]
pub struct Side<'a> {
    pub operation: &'a Value,
    pub root: &'a Value,
}

/// Merge a proxy-side operation with its upstream operation.
///
/// `path_parameters` are the upstream path item's parameters; they are
/// inherited unless the upstream operation overrides them.
pub fn merge(
    proxy: Side<'_>,
    upstream: Side<'_>,
    path_parameters: &[Value],
    inject: &Inject,
) -> Result<Value, MergeError> {
    let proxy_op = proxy.operation.as_object().ok_or(MergeError::NotAMapping("proxy"))?;
    let upstream_op = upstream
        .operation
        .as_object()
        .ok_or(MergeError::NotAMapping("upstream"))?;

    let own = keyed(parameters(proxy_op), proxy.root)?;

    let mut inherited = keyed(parameters(upstream_op), upstream.root)?;
    for (key, param) in keyed(path_parameters, upstream.root)? {
        if !inherited.iter().any(|(k, _)| *k == key) {
            inherited.push((key, param));
        }
    }
    inherited.retain(|(key, _)| !inject.excludes(&key.name, &key.location));
    inherited.retain(|(key, _)| !own.iter().any(|(k, _)| k == key));

    let merged_params: Vec<Value> = own
        .into_iter()
        .chain(inherited)
        .map(|(_, param)| param)
        .collect();

    let mut merged: Map<String, Value> = upstream_op
        .iter()
        .filter(|(key, _)| !key.starts_with("x-"))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    for field in PROXY_OWNED {
        match proxy_op.get(*field) {
            Some(value) => {
                merged.insert(field.to_string(), value.clone());
            }
            None => {
                merged.shift_remove(*field);
            }
        }
    }

    if merged_params.is_empty() {
        merged.shift_remove("parameters");
    } else {
        merged.insert("parameters".to_string(), Value::Array(merged_params));
    }

    for (key, value) in proxy_op.iter().filter(|(key, _)| key.starts_with("x-")) {
        merged.insert(key.clone(), value.clone());
    }

    Ok(Value::Object(merged))
}

fn parameters(operation: &Map<String, Value>) -> &[Value] {
    operation
        .get("parameters")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn keyed(params: &[Value], root: &Value) -> Result<Vec<(ParameterKey, Value)>, MergeError> {
    params
        .iter()
        .map(|param| Ok((parameter_key(param, root)?, param.clone())))
        .collect()
}

/// Key a parameter, following local references to the parameter object.
pub fn parameter_key(param: &Value, root: &Value) -> Result<ParameterKey, MergeError> {
    let mut current = param;
    for _ in 0..MAX_REF_DEPTH {
        let Some(raw) = ref_value(current) else {
            let name = current.get("name").and_then(Value::as_str);
            let location = current.get("in").and_then(Value::as_str);
            return match (name, location) {
                (Some(name), Some(location)) => Ok(ParameterKey {
                    name: name.to_string(),
                    location: location.to_string(),
                }),
                _ => Err(MergeError::IncompleteParameter),
            };
        };
        let target = RefTarget::parse(raw);
        current = target
            .is_local()
            .then(|| resolve_pointer(root, &target.fragment))
            .flatten()
            .ok_or_else(|| MergeError::UnresolvedParameter(raw.to_string()))?;
    }
    Err(MergeError::UnresolvedParameter(
        ref_value(current).unwrap_or_default().to_string(),
    ))
}
