use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::error::ParseError;
use crate::model::{Method, OperationKey};

/// A parsed OpenAPI 3.x document and the location it was loaded from.
///
/// The location is used to resolve relative `$ref` file parts and relative
/// upstream spec paths; it does not need to exist on disk for documents that
/// only contain local references.
#[derive(Debug, Clone)]
pub struct Document {
    path: PathBuf,
    version: String,
    root: Value,
}

impl Document {
    /// Parse a document from YAML or JSON bytes.
    pub fn parse(input: &[u8], path: impl AsRef<Path>) -> Result<Self, ParseError> {
        let path = absolute(path.as_ref());
        let root = parse_value(input, &path)?;
        Self::from_value(root, path)
    }

    /// Read and parse a document from disk.
    pub fn load(path: &Path) -> Result<Self, ParseError> {
        let content = std::fs::read(path).map_err(|source| ParseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let path = std::fs::canonicalize(path).unwrap_or_else(|_| absolute(path));
        Self::parse(&content, path)
    }

    /// Wrap an already parsed value, checking that it is OpenAPI 3.x.
    pub fn from_value(root: Value, path: impl AsRef<Path>) -> Result<Self, ParseError> {
        let version = detect_version(&root)?;
        Ok(Document {
            path: absolute(path.as_ref()),
            version,
            root,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory relative file references are resolved against.
    pub fn base_dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    /// The `openapi` version string (e.g. "3.0.3").
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Value {
        &mut self.root
    }

    /// The `components` object, if present.
    pub fn components(&self) -> Option<&Map<String, Value>> {
        self.root.get("components")?.as_object()
    }

    /// The `paths` object, if present.
    pub fn paths(&self) -> Option<&Map<String, Value>> {
        self.root.get("paths")?.as_object()
    }

    pub fn path_item(&self, path: &str) -> Option<&Map<String, Value>> {
        self.paths()?.get(path)?.as_object()
    }

    pub fn operation(&self, key: &OperationKey) -> Option<&Value> {
        self.path_item(&key.path)?.get(key.method.as_str())
    }

    /// Every operation, in declaration order.
    pub fn operation_keys(&self) -> Vec<OperationKey> {
        let Some(paths) = self.paths() else {
            return Vec::new();
        };
        paths
            .iter()
            .filter_map(|(path, item)| Some((path, item.as_object()?)))
            .flat_map(|(path, item)| {
                item.keys()
                    .filter_map(|key| Method::parse(key))
                    .map(move |method| OperationKey::new(path.clone(), method))
            })
            .collect()
    }

    /// Replace (or insert) the operation at `key`.
    ///
    /// Fails when the path item does not exist: operations are only ever
    /// replaced in place.
    pub fn set_operation(&mut self, key: &OperationKey, operation: Value) -> Result<(), ParseError> {
        let item = self
            .root
            .get_mut("paths")
            .and_then(|p| p.get_mut(&key.path))
            .and_then(Value::as_object_mut)
            .ok_or_else(|| ParseError::SchemaError(format!("no path item for {}", key)))?;
        item.insert(key.method.as_str().to_string(), operation);
        Ok(())
    }

    /// Remove the operation at `key`, returning it.
    pub fn clear_operation(&mut self, key: &OperationKey) -> Option<Value> {
        self.root
            .get_mut("paths")?
            .get_mut(&key.path)?
            .as_object_mut()?
            .shift_remove(key.method.as_str())
    }

    /// Remove a whole path item.
    pub fn remove_path(&mut self, path: &str) -> Option<Value> {
        self.root
            .get_mut("paths")?
            .as_object_mut()?
            .shift_remove(path)
    }

    /// Render to canonical YAML.
    pub fn render(&self) -> Result<Vec<u8>, ParseError> {
        serde_yaml::to_string(&self.root)
            .map(String::into_bytes)
            .map_err(|e| ParseError::Render(e.to_string()))
    }

    /// Parse rendered bytes into a fresh handle at the same location.
    pub fn reload(&self, bytes: &[u8]) -> Result<Document, ParseError> {
        Document::parse(bytes, &self.path)
    }
}

/// Parse YAML (or JSON, which is valid YAML) into a value, keeping key order.
pub(crate) fn parse_value(input: &[u8], path: &Path) -> Result<Value, ParseError> {
    let value: Value = serde_yaml::from_slice(input).map_err(|e| ParseError::Syntax {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    Ok(value)
}

/// Check the root is a mapping with a 3.x `openapi` field.
fn detect_version(root: &Value) -> Result<String, ParseError> {
    let root = root
        .as_object()
        .ok_or_else(|| ParseError::UnknownFormat("document root must be a mapping".into()))?;

    if let Some(version) = root.get("openapi").and_then(|v| v.as_str()) {
        if !version.starts_with("3.") {
            return Err(ParseError::UnknownFormat(format!(
                "unsupported OpenAPI version: {} (only 3.x supported)",
                version
            )));
        }
        return Ok(version.to_string());
    }
    if root.contains_key("swagger") {
        return Err(ParseError::UnknownFormat(
            "Swagger 2.0 documents are not supported".into(),
        ));
    }
    Err(ParseError::UnknownFormat("missing 'openapi' field".into()))
}

pub(crate) fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
