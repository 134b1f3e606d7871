//! OpenAPI 3.x document model.
//!
//! Parses YAML/JSON specs into an order-preserving value tree, follows `$ref`
//! across files, indexes every reference (with circularity detection) and
//! renders documents back to YAML.

pub mod document;
pub mod error;
pub mod index;
pub mod model;
pub mod pointer;

pub use document::Document;
pub use error::ParseError;
pub use index::{
    dangling_local_references, FileId, Reference, ReferenceIndex, Rolodex, SpecFile, Target,
};
pub use model::{ComponentKind, Definition, Method, OperationKey};
