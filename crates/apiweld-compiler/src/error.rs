use apiweld_spec::{ComponentKind, ParseError};
use thiserror::Error;

use crate::merge::MergeError;

/// Errors produced while bundling or compiling a proxy document.
#[derive(Debug, Error)]
pub enum CompileError {
    /// Loading, indexing or rendering a document failed.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// An `x-proxy` extension could not be decoded.
    #[error("invalid x-proxy at {location}: {message}")]
    InvalidExtension { location: String, message: String },

    /// A proxy operation names a proxy that is not declared on `components`.
    #[error("{operation}: unknown proxy '{name}'")]
    UnknownProxy { operation: String, name: String },

    /// A proxy operation has neither `spec` nor `name`.
    #[error("{operation}: x-proxy needs either 'spec' or 'name'")]
    MissingUpstream { operation: String },

    /// The upstream document has no such path.
    #[error("{operation}: path '{path}' not found in upstream {spec}")]
    UpstreamPathNotFound {
        operation: String,
        path: String,
        spec: String,
    },

    /// The upstream path has no such method.
    #[error("{operation}: operation '{method} {path}' not found in upstream {spec}")]
    UpstreamOperationNotFound {
        operation: String,
        method: String,
        path: String,
        spec: String,
    },

    /// A referenced component could not be turned into a component value.
    #[error("failed to extract {kind} '{name}': {message}")]
    Extract {
        kind: ComponentKind,
        name: String,
        message: String,
    },

    /// Merging a proxied operation with its upstream failed.
    #[error("cannot merge {operation}: {source}")]
    Merge {
        operation: String,
        #[source]
        source: MergeError,
    },

    /// The compiled document still contains references that resolve to nothing.
    #[error("dangling references in compiled document: {}", .0.join(", "))]
    DanglingReferences(Vec<String>),

    /// Several errors collected during one bundling pass.
    #[error("{}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    Aggregate(Vec<CompileError>),
}

impl CompileError {
    /// Collapse a list of errors: `None` when empty, the error itself when
    /// there is only one, an aggregate otherwise.
    pub fn aggregate(mut errors: Vec<CompileError>) -> Option<CompileError> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(CompileError::Aggregate(errors)),
        }
    }
}
