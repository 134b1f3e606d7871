use std::fmt;

use serde::{Deserialize, Serialize};

/// The nine reusable component kinds of an OpenAPI 3.x `components` object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ComponentKind {
    Schema,
    Parameter,
    RequestBody,
    Header,
    Response,
    SecurityScheme,
    Example,
    Link,
    Callback,
}

impl ComponentKind {
    /// All kinds, in the order their sections are rendered.
    pub const ALL: [ComponentKind; 9] = [
        ComponentKind::Schema,
        ComponentKind::Parameter,
        ComponentKind::RequestBody,
        ComponentKind::Header,
        ComponentKind::Response,
        ComponentKind::SecurityScheme,
        ComponentKind::Example,
        ComponentKind::Link,
        ComponentKind::Callback,
    ];

    /// Key of this kind's section inside `components`.
    pub fn section(self) -> &'static str {
        match self {
            ComponentKind::Schema => "schemas",
            ComponentKind::Parameter => "parameters",
            ComponentKind::RequestBody => "requestBodies",
            ComponentKind::Header => "headers",
            ComponentKind::Response => "responses",
            ComponentKind::SecurityScheme => "securitySchemes",
            ComponentKind::Example => "examples",
            ComponentKind::Link => "links",
            ComponentKind::Callback => "callbacks",
        }
    }

    /// Look a kind up by its section key.
    pub fn from_section(section: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.section() == section)
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ComponentKind::Schema => "schema",
            ComponentKind::Parameter => "parameter",
            ComponentKind::RequestBody => "requestBody",
            ComponentKind::Header => "header",
            ComponentKind::Response => "response",
            ComponentKind::SecurityScheme => "securityScheme",
            ComponentKind::Example => "example",
            ComponentKind::Link => "link",
            ComponentKind::Callback => "callback",
        };
        f.write_str(name)
    }
}

/// A `#/components/{kind}/{name}` definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Definition {
    pub kind: ComponentKind,
    pub name: String,
}

impl Definition {
    /// Local pointer to this definition, with the name escaped.
    pub fn pointer(&self) -> String {
        format!(
            "#/components/{}/{}",
            self.kind.section(),
            crate::pointer::escape_segment(&self.name)
        )
    }
}

/// HTTP method slots of an OpenAPI path item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Get,
    Put,
    Post,
    Delete,
    Options,
    Head,
    Patch,
    Trace,
}

impl Method {
    pub const ALL: [Method; 8] = [
        Method::Get,
        Method::Put,
        Method::Post,
        Method::Delete,
        Method::Options,
        Method::Head,
        Method::Patch,
        Method::Trace,
    ];

    /// Key of this method inside a path item.
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "get",
            Method::Put => "put",
            Method::Post => "post",
            Method::Delete => "delete",
            Method::Options => "options",
            Method::Head => "head",
            Method::Patch => "patch",
            Method::Trace => "trace",
        }
    }

    /// Parse a method name, ignoring case.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_uppercase())
    }
}

/// Identifies one operation inside one document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationKey {
    pub path: String,
    pub method: Method,
}

impl OperationKey {
    pub fn new(path: impl Into<String>, method: Method) -> Self {
        Self {
            path: path.into(),
            method,
        }
    }
}

impl fmt::Display for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_parse_ignores_case() {
        assert_eq!(Method::parse("GET"), Some(Method::Get));
        assert_eq!(Method::parse("Patch"), Some(Method::Patch));
        assert_eq!(Method::parse("query"), None);
    }

    #[test]
    fn section_round_trip() {
        for kind in ComponentKind::ALL {
            assert_eq!(ComponentKind::from_section(kind.section()), Some(kind));
        }
        assert_eq!(ComponentKind::from_section("pathItems"), None);
    }

    #[test]
    fn definition_pointer_escapes_name() {
        let def = Definition {
            kind: ComponentKind::Schema,
            name: "a/b".into(),
        };
        assert_eq!(def.pointer(), "#/components/schemas/a~1b");
    }

    #[test]
    fn operation_key_display() {
        let key = OperationKey::new("/items/{id}", Method::Get);
        assert_eq!(key.to_string(), "GET /items/{id}");
    }
}
