//! Reduction of an upstream document to the operations a proxy uses.

use std::collections::HashSet;

use apiweld_spec::{Document, Method, OperationKey};
use apiweld_telemetry::log_upstream_pruned;
use indexmap::IndexMap;

use crate::bundle::{BundleOptions, Bundler};
use crate::components::ComponentTable;
use crate::error::CompileError;
use crate::extension::{DocId, ProxyExtension};
use crate::namespace::NamespacePrefix;

/// An upstream document after pruning.
#[derive(Debug, Clone)]
pub struct PrunedUpstream {
    pub document: Document,
    /// The namespaced components the pruned document keeps.
    pub table: ComponentTable,
}

/// Keep only the operations in `keep`, then collapse every reference into
/// components named `prefix + name`.
///
/// Path items left without operations are removed, and so is every
/// component no kept operation reaches.
pub fn prune(
    document: &Document,
    keep: &HashSet<OperationKey>,
    prefix: &NamespacePrefix,
) -> Result<PrunedUpstream, CompileError> {
    let mut working = document.clone();
    for key in document.operation_keys() {
        if !keep.contains(&key) {
            working.clear_operation(&key);
        }
    }

    let empty: Vec<String> = working
        .paths()
        .map(|paths| {
            paths
                .iter()
                .filter(|(_, item)| {
                    item.as_object()
                        .is_some_and(|item| !item.keys().any(|k| Method::parse(k).is_some()))
                })
                .map(|(path, _)| path.clone())
                .collect()
        })
        .unwrap_or_default();
    for path in &empty {
        working.remove_path(path);
    }

    let options = BundleOptions::new()
        .with_prefix(prefix.clone())
        .with_inline_root_local_refs(true);
    let bundled = Bundler::new(options).bundle(&working)?;

    // Fresh handle, so nothing downstream sees the pre-pruning tree.
    let bytes = bundled.document.render()?;
    let document = bundled.document.reload(&bytes)?;

    Ok(PrunedUpstream {
        document,
        table: bundled.table,
    })
}

impl ProxyExtension {
    /// Prune and namespace every upstream document, then re-bind each proxy
    /// operation to the pruned copy of its upstream.
    ///
    /// The original documents stay in the store; only the bindings move.
    pub fn prune_upstreams(&mut self) -> Result<(), CompileError> {
        let mut rebound: IndexMap<DocId, DocId> = IndexMap::new();

        for doc in self.upstream_docs().collect::<Vec<_>>() {
            let keep: HashSet<OperationKey> = self.used_operations(doc).cloned().collect();
            let prefix = self.upstream_prefix(doc);
            let source = self.store.get(doc);
            let result = prune(source, &keep, &prefix)?;

            log_upstream_pruned!(
                upstream = %source.path().display(),
                prefix = %prefix,
                operations = keep.len(),
                components = result.table.len(),
                "pruned upstream document"
            );

            let new_id = self.store.insert(result.document);
            rebound.insert(doc, new_id);
            self.tables.insert(new_id, result.table);
        }

        for binding in self.bindings.values_mut() {
            if let Some(new_id) = rebound.get(&binding.upstream) {
                *binding = binding.with_reloaded_doc(*new_id);
            }
        }
        self.upstreams = std::mem::take(&mut self.upstreams)
            .into_iter()
            .map(|(doc, ops)| (rebound.get(&doc).copied().unwrap_or(doc), ops))
            .collect();

        Ok(())
    }
}
