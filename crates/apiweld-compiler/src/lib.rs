//! Bundles multi-file OpenAPI 3.x documents and compiles proxy documents.
//!
//! A proxy document fronts operations of other ("upstream") documents
//! through the `x-proxy` extension. Compiling it prunes each upstream to the
//! operations actually used, namespaces the upstream components, merges each
//! proxied operation with its upstream counterpart and bundles everything
//! into one self-contained document.

pub mod bundle;
pub mod compile;
pub mod components;
pub mod error;
pub mod extension;
pub mod merge;
pub mod namespace;
pub mod prune;

pub use bundle::{bundle_file, BundleOptions, Bundled, Bundler};
pub use compile::{compile_proxy, compile_proxy_file, CompileOptions, CompiledProxy, UpstreamSummary};
pub use components::{Component, ComponentTable, SpliceMode};
pub use error::CompileError;
pub use extension::{
    DocId, DocumentStore, ExcludedParameter, Inject, Proxy, ProxyExtension, ProxyOperation,
};
pub use merge::{merge, MergeError, ParameterKey, Side};
pub use namespace::{namespace, NamespacePrefix};
pub use prune::{prune, PrunedUpstream};

// Re-export the document model.
pub use apiweld_spec::{ComponentKind, Document, Method, OperationKey, ParseError};
