//! The `x-proxy` extension.
//!
//! A proxy document declares its upstreams either inline on each operation
//! or once under `components.x-proxy`, referenced by name:
//!
//! ```yaml
//! components:
//!   x-proxy:
//!     profile:
//!       spec: ./profile.yaml
//! paths:
//!   /me:
//!     get:
//!       x-proxy:
//!         name: profile
//!         path: /profile
//!         method: get
//!         inject:
//!           parameters:
//!             - name: user-id
//!               in: header
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use apiweld_spec::{Document, Method, OperationKey};
use apiweld_telemetry::log_upstream_loaded;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::components::ComponentTable;
use crate::error::CompileError;
use crate::namespace::NamespacePrefix;

/// Key of the extension, on `components` and on operations.
pub const EXTENSION_KEY: &str = "x-proxy";

/// An upstream document and the name its components are namespaced with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proxy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub spec: String,
}

impl Proxy {
    /// Namespace prefix: the declared name, or the spec file's stem.
    pub fn prefix(&self) -> NamespacePrefix {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => NamespacePrefix::from_name(name),
            _ => NamespacePrefix::from_spec_path(Path::new(&self.spec)),
        }
    }
}

/// A parameter the proxy supplies itself, so the upstream's copy is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcludedParameter {
    pub name: String,
    #[serde(rename = "in")]
    pub location: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inject {
    #[serde(default)]
    pub parameters: Vec<ExcludedParameter>,
}

impl Inject {
    pub fn excludes(&self, name: &str, location: &str) -> bool {
        self.parameters
            .iter()
            .any(|p| p.name == name && p.location == location)
    }
}

/// Operation-level `x-proxy` as written.
#[derive(Debug, Deserialize)]
struct RawProxyOperation {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    spec: Option<String>,
    path: String,
    method: String,
    #[serde(default)]
    inject: Inject,
}

/// Handle of a document inside a [`DocumentStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocId(usize);

/// Arena of upstream documents.
///
/// Loading the same canonical path twice yields the same handle. Pruned
/// documents are added as new entries and never replace the loaded ones.
#[derive(Debug, Default)]
pub struct DocumentStore {
    documents: Vec<Document>,
    by_path: HashMap<PathBuf, DocId>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the document at `path`, or return the handle it was loaded under.
    pub fn load(&mut self, path: &Path) -> Result<DocId, CompileError> {
        let key = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        if let Some(id) = self.by_path.get(&key) {
            return Ok(*id);
        }
        let document = Document::load(path)?;
        let id = self.insert(document);
        self.by_path.insert(key, id);
        log_upstream_loaded!(spec = %path.display(), "loaded upstream document");
        Ok(id)
    }

    /// Add a document that does not come from disk.
    pub fn insert(&mut self, document: Document) -> DocId {
        let id = DocId(self.documents.len());
        self.documents.push(document);
        id
    }

    pub fn get(&self, id: DocId) -> &Document {
        &self.documents[id.0]
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// A proxy document operation bound to an upstream operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyOperation {
    /// The upstream, with `spec` resolved to an absolute path.
    pub proxy: Proxy,
    /// Upstream path template.
    pub path: String,
    /// Upstream method.
    pub method: Method,
    pub inject: Inject,
    /// Upstream document handle.
    pub upstream: DocId,
}

impl ProxyOperation {
    pub fn upstream_key(&self) -> OperationKey {
        OperationKey::new(self.path.clone(), self.method)
    }

    pub fn prefix(&self) -> NamespacePrefix {
        self.proxy.prefix()
    }

    /// The same binding, pointed at another document handle.
    pub fn with_reloaded_doc(&self, upstream: DocId) -> Self {
        Self {
            upstream,
            ..self.clone()
        }
    }
}

/// A proxy document with every `x-proxy` binding resolved.
#[derive(Debug)]
pub struct ProxyExtension {
    pub(crate) document: Document,
    pub(crate) store: DocumentStore,
    /// Proxy operation → binding, in declaration order.
    pub(crate) bindings: IndexMap<OperationKey, ProxyOperation>,
    /// Upstream document → upstream operation → proxy operations bound to it.
    /// Documents are in the order they were first bound.
    pub(crate) upstreams: IndexMap<DocId, IndexMap<OperationKey, Vec<OperationKey>>>,
    /// Namespaced components of each pruned upstream document.
    pub(crate) tables: IndexMap<DocId, ComponentTable>,
}

impl ProxyExtension {
    /// Load a proxy document and every upstream it binds.
    pub fn load(path: &Path) -> Result<Self, CompileError> {
        Self::from_document(Document::load(path)?)
    }

    pub fn from_document(document: Document) -> Result<Self, CompileError> {
        let declared = declared_proxies(&document)?;
        let mut store = DocumentStore::new();
        let mut bindings = IndexMap::new();
        let mut upstreams: IndexMap<DocId, IndexMap<OperationKey, Vec<OperationKey>>> =
            IndexMap::new();

        for key in document.operation_keys() {
            let Some(raw) = document
                .operation(&key)
                .and_then(|op| op.get(EXTENSION_KEY))
            else {
                continue;
            };
            let binding = bind(&document, &declared, &mut store, &key, raw)?;
            upstreams
                .entry(binding.upstream)
                .or_default()
                .entry(binding.upstream_key())
                .or_default()
                .push(key.clone());
            bindings.insert(key, binding);
        }

        Ok(ProxyExtension {
            document,
            store,
            bindings,
            upstreams,
            tables: IndexMap::new(),
        })
    }

    /// The proxy document.
    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn binding(&self, key: &OperationKey) -> Option<&ProxyOperation> {
        self.bindings.get(key)
    }

    pub fn bindings(&self) -> impl Iterator<Item = (&OperationKey, &ProxyOperation)> {
        self.bindings.iter()
    }

    /// Upstream documents in the order they were first bound.
    pub fn upstream_docs(&self) -> impl Iterator<Item = DocId> + '_ {
        self.upstreams.keys().copied()
    }

    /// Upstream operations of one document that some proxy operation uses.
    pub fn used_operations(&self, doc: DocId) -> impl Iterator<Item = &OperationKey> {
        self.upstreams
            .get(&doc)
            .into_iter()
            .flat_map(|ops| ops.keys())
    }

    /// Components kept by a pruned upstream document.
    pub fn pruned_table(&self, doc: DocId) -> Option<&ComponentTable> {
        self.tables.get(&doc)
    }

    /// Namespace prefix of an upstream document: that of its first binding.
    pub fn upstream_prefix(&self, doc: DocId) -> NamespacePrefix {
        self.upstreams
            .get(&doc)
            .and_then(|ops| ops.values().flatten().next())
            .and_then(|key| self.bindings.get(key))
            .map(ProxyOperation::prefix)
            .unwrap_or_default()
    }
}

/// Decode `components.x-proxy`, keyed by entry name.
///
/// The entry key is the proxy's name: it is what operations refer to and
/// what upstream components are namespaced with. A `name` field inside the
/// entry is ignored.
fn declared_proxies(document: &Document) -> Result<IndexMap<String, Proxy>, CompileError> {
    let Some(raw) = document.components().and_then(|c| c.get(EXTENSION_KEY)) else {
        return Ok(IndexMap::new());
    };
    let entries: IndexMap<String, Proxy> =
        serde_json::from_value(raw.clone()).map_err(|e| CompileError::InvalidExtension {
            location: "components.x-proxy".to_string(),
            message: e.to_string(),
        })?;

    Ok(entries
        .into_iter()
        .map(|(key, proxy)| {
            let named = Proxy {
                name: Some(key.clone()),
                spec: proxy.spec,
            };
            (key, named)
        })
        .collect())
}

fn bind(
    document: &Document,
    declared: &IndexMap<String, Proxy>,
    store: &mut DocumentStore,
    key: &OperationKey,
    raw: &Value,
) -> Result<ProxyOperation, CompileError> {
    let operation = key.to_string();
    let raw: RawProxyOperation =
        serde_json::from_value(raw.clone()).map_err(|e| CompileError::InvalidExtension {
            location: operation.clone(),
            message: e.to_string(),
        })?;

    let proxy = match (raw.spec, raw.name) {
        (Some(spec), name) if !spec.is_empty() => Proxy { name, spec },
        (_, Some(name)) => declared
            .get(&name)
            .cloned()
            .ok_or_else(|| CompileError::UnknownProxy {
                operation: operation.clone(),
                name,
            })?,
        _ => return Err(CompileError::MissingUpstream { operation }),
    };
    if proxy.spec.is_empty() {
        return Err(CompileError::MissingUpstream { operation });
    }

    let method = Method::parse(&raw.method).ok_or_else(|| CompileError::InvalidExtension {
        location: operation.clone(),
        message: format!("unknown method '{}'", raw.method),
    })?;

    let spec_path = document.base_dir().join(&proxy.spec);
    let upstream = store.load(&spec_path)?;
    let upstream_doc = store.get(upstream);
    let spec = spec_path.display().to_string();

    let Some(item) = upstream_doc.path_item(&raw.path) else {
        return Err(CompileError::UpstreamPathNotFound {
            operation,
            path: raw.path,
            spec,
        });
    };
    if !item.contains_key(method.as_str()) {
        return Err(CompileError::UpstreamOperationNotFound {
            operation,
            method: method.to_string(),
            path: raw.path,
            spec,
        });
    }

    Ok(ProxyOperation {
        proxy: Proxy {
            name: proxy.name,
            spec,
        },
        path: raw.path,
        method,
        inject: raw.inject,
        upstream,
    })
}
