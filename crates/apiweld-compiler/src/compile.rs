//! Proxy document compilation: load, prune, merge, bundle.

use std::path::{Path, PathBuf};

use apiweld_spec::{dangling_local_references, Document};
use apiweld_telemetry::{log_operation_merged, log_proxy_compiled};
use serde_json::Value;
use tracing::warn;

use crate::bundle::{BundleOptions, Bundler};
use crate::components::{ComponentTable, SpliceMode};
use crate::error::CompileError;
use crate::extension::ProxyExtension;
use crate::merge::{merge, Side};
use crate::namespace::NamespacePrefix;

/// Options for proxy compilation.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Fail when the compiled document contains local references that
    /// resolve to nothing (default: true).
    pub strict_refs: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self { strict_refs: true }
    }
}

/// One upstream document as it went into the compiled output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamSummary {
    pub spec: PathBuf,
    pub prefix: NamespacePrefix,
    /// Upstream operations kept after pruning.
    pub operations: usize,
    /// Components contributed to the compiled document.
    pub components: usize,
}

/// A compiled proxy document.
#[derive(Debug, Clone)]
pub struct CompiledProxy {
    /// Rendered YAML.
    pub bytes: Vec<u8>,
    pub document: Document,
    pub upstreams: Vec<UpstreamSummary>,
}

/// Compile the proxy document at `path`.
pub fn compile_proxy_file(path: &Path, options: &CompileOptions) -> Result<CompiledProxy, CompileError> {
    compile_proxy(ProxyExtension::load(path)?, options)
}

/// Compile an already loaded proxy document.
pub fn compile_proxy(
    mut extension: ProxyExtension,
    options: &CompileOptions,
) -> Result<CompiledProxy, CompileError> {
    extension.prune_upstreams()?;

    let upstreams: Vec<UpstreamSummary> = extension
        .upstream_docs()
        .map(|doc| UpstreamSummary {
            spec: extension.store().get(doc).path().to_path_buf(),
            prefix: extension.upstream_prefix(doc),
            operations: extension.used_operations(doc).count(),
            components: extension.pruned_table(doc).map_or(0, ComponentTable::len),
        })
        .collect();
    let operations = extension.bindings().count();
    let source = extension.document().path().to_path_buf();

    let document = extension.create_proxy_doc()?;

    check_references(&document, options)?;

    let bytes = document.render()?;
    let document = document.reload(&bytes)?;

    log_proxy_compiled!(
        proxy = %source.display(),
        operations,
        upstreams = upstreams.len(),
        "compiled proxy document"
    );

    Ok(CompiledProxy {
        bytes,
        document,
        upstreams,
    })
}

/// Every local reference of the output must resolve.
fn check_references(document: &Document, options: &CompileOptions) -> Result<(), CompileError> {
    let dangling = dangling_local_references(document);
    if dangling.is_empty() {
        return Ok(());
    }
    if options.strict_refs {
        return Err(CompileError::DanglingReferences(dangling));
    }
    warn!(references = ?dangling, "compiled document has dangling references");
    Ok(())
}

impl ProxyExtension {
    /// Replace every proxied operation by its merge with the upstream
    /// operation it is bound to.
    pub fn merge_operations(&mut self) -> Result<(), CompileError> {
        // Proxy-side parameters may be references into other files; hoist
        // them so every parameter resolves inside the proxy document.
        self.document = Bundler::new(BundleOptions::new())
            .bundle(&self.document)?
            .document;

        let mut merged = Vec::with_capacity(self.bindings.len());

        for (key, binding) in &self.bindings {
            let upstream = self.store.get(binding.upstream);
            let upstream_key = binding.upstream_key();
            let spec = || binding.proxy.spec.clone();

            let upstream_op = upstream.operation(&upstream_key).ok_or_else(|| {
                CompileError::UpstreamOperationNotFound {
                    operation: key.to_string(),
                    method: binding.method.to_string(),
                    path: binding.path.clone(),
                    spec: spec(),
                }
            })?;
            let proxy_op = self.document.operation(key).ok_or_else(|| {
                CompileError::UpstreamPathNotFound {
                    operation: key.to_string(),
                    path: key.path.clone(),
                    spec: self.document.path().display().to_string(),
                }
            })?;
            let path_parameters = upstream
                .path_item(&binding.path)
                .and_then(|item| item.get("parameters"))
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();

            let value = merge(
                Side {
                    operation: proxy_op,
                    root: self.document.root(),
                },
                Side {
                    operation: upstream_op,
                    root: upstream.root(),
                },
                path_parameters,
                &binding.inject,
            )
            .map_err(|source| CompileError::Merge {
                operation: key.to_string(),
                source,
            })?;

            log_operation_merged!(
                operation = %key,
                upstream = %upstream_key,
                prefix = %binding.prefix(),
                "merged proxied operation"
            );
            merged.push((key.clone(), value));
        }

        for (key, value) in merged {
            self.document.set_operation(&key, value)?;
        }
        Ok(())
    }

    /// Merge every proxied operation, fold in the pruned upstream components
    /// and bundle the result into one self-contained document.
    ///
    /// Upstreams must have been pruned first, or their components are
    /// missing from the output.
    pub fn create_proxy_doc(mut self) -> Result<Document, CompileError> {
        self.merge_operations()?;

        let mut table = ComponentTable::new();
        for doc in self.upstreams.keys() {
            if let Some(pruned) = self.tables.get(doc) {
                table.merge(pruned);
            }
        }
        table.splice_into(self.document.root_mut(), SpliceMode::Merge);

        let bundled = Bundler::new(BundleOptions::new()).bundle(&self.document)?;
        Ok(bundled.document)
    }
}
