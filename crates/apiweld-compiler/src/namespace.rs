//! Component renaming.
//!
//! A component copied out of its origin document is stored under
//! `prefix + original name`. Collisions between different origins sharing
//! a prefix are not detected.

use std::fmt;
use std::path::Path;

/// Prefix prepended to every component copied out of one origin document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NamespacePrefix(String);

impl NamespacePrefix {
    /// The empty prefix: names are kept as they are.
    pub fn none() -> Self {
        Self::default()
    }

    /// Strip non-alphanumeric characters and upper-case the first letter.
    pub fn from_name(raw: &str) -> Self {
        let cleaned: String = raw.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
        let mut chars = cleaned.chars();
        let prefix = match chars.next() {
            Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
            None => String::new(),
        };
        NamespacePrefix(prefix)
    }

    /// Prefix inferred from a spec file name (`profile-api.yml` → `Profileapi`).
    pub fn from_spec_path(path: &Path) -> Self {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::from_name(&stem)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Final name of a component called `name` in the origin document.
    pub fn apply(&self, name: &str) -> String {
        namespace(&self.0, name)
    }
}

impl fmt::Display for NamespacePrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn namespace(prefix: &str, name: &str) -> String {
    format!("{}{}", prefix, name)
}
