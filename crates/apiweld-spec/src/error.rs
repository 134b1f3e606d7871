use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while loading, indexing or rendering a document.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Not an OpenAPI 3.x document.
    #[error("not a valid OpenAPI 3.x document: {0}")]
    UnknownFormat(String),

    /// YAML/JSON syntax error.
    #[error("parse error in {path}: {message}")]
    Syntax { path: String, message: String },

    /// A `$ref` whose target cannot be found.
    #[error("unresolved $ref '{reference}' in {origin}")]
    UnresolvedRef { reference: String, origin: String },

    /// Structurally invalid document content.
    #[error("schema error: {0}")]
    SchemaError(String),

    /// Rendering the document back to YAML failed.
    #[error("render error: {0}")]
    Render(String),

    /// I/O error reading a spec file.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Several errors collected during a single pass.
    #[error("{}", join_errors(.0))]
    Aggregate(Vec<ParseError>),
}

impl ParseError {
    /// Collapse a list of errors: `None` when empty, the error itself when
    /// there is only one, an aggregate otherwise.
    pub fn aggregate(mut errors: Vec<ParseError>) -> Option<ParseError> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(ParseError::Aggregate(errors)),
        }
    }
}

fn join_errors(errors: &[ParseError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
