//! Hoisting of cross-file references into a single document.
//!
//! A bundling pass walks the root document once and writes a fresh tree.
//! Every reference to a `#/components/{kind}/{name}` definition in another
//! file is replaced by a local reference to a copy of that component, stored
//! under its namespaced name. Any other cross-file target is inlined where it
//! is referenced.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use apiweld_spec::{ComponentKind, Definition, Document, FileId, Reference, ReferenceIndex, Rolodex, Target};
use apiweld_telemetry::{log_bundle_completed, log_circular_reference};
use serde_json::{Map, Value};
use tracing::debug;

use crate::components::{Component, ComponentTable, SpliceMode};
use crate::error::CompileError;
use crate::namespace::NamespacePrefix;

/// Options for one bundling pass.
#[derive(Debug, Clone, Default)]
pub struct BundleOptions {
    /// Prefix prepended to every copied component name.
    pub prefix: NamespacePrefix,
    /// Also copy components the root document references in itself.
    ///
    /// When set, the root's own component sections are rebuilt from what is
    /// actually referenced: anything unreferenced is dropped.
    pub inline_root_local_refs: bool,
    /// Replace every non-circular reference by a copy of its target instead
    /// of hoisting components. Takes precedence over the other options.
    pub inline_all: bool,
}

impl BundleOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(mut self, prefix: NamespacePrefix) -> Self {
        self.prefix = prefix;
        self
    }

    pub fn with_inline_root_local_refs(mut self, inline: bool) -> Self {
        self.inline_root_local_refs = inline;
        self
    }

    pub fn with_inline_all(mut self, inline: bool) -> Self {
        self.inline_all = inline;
        self
    }

    fn splice_mode(&self) -> SpliceMode {
        if self.inline_root_local_refs && !self.inline_all {
            SpliceMode::Replace
        } else {
            SpliceMode::Merge
        }
    }
}

/// Result of a bundling pass.
#[derive(Debug, Clone)]
pub struct Bundled {
    pub document: Document,
    /// The components the pass copied, under their final names.
    pub table: ComponentTable,
}

pub struct Bundler {
    options: BundleOptions,
}

impl Bundler {
    pub fn new(options: BundleOptions) -> Self {
        Self { options }
    }

    /// Bundle `document` and everything it references.
    pub fn bundle(&self, document: &Document) -> Result<Bundled, CompileError> {
        let mut rolodex = Rolodex::new(document);
        let index = ReferenceIndex::build(&mut rolodex)?;

        let mut pass = Pass {
            rolodex: &rolodex,
            index: &index,
            options: &self.options,
            table: ComponentTable::new(),
            copied: HashMap::new(),
            warned: HashSet::new(),
            errors: Vec::new(),
        };

        let mut output = Map::new();
        if let Value::Object(root) = document.root() {
            for (key, value) in root {
                let rewritten = if key == "components" && self.options.splice_mode() == SpliceMode::Replace {
                    pass.rewrite_unmanaged(value)
                } else {
                    pass.rewrite(value, FileId::ROOT)
                };
                output.insert(key.clone(), rewritten);
            }
        }

        if let Some(err) = CompileError::aggregate(pass.errors) {
            return Err(err);
        }

        let table = pass.table;
        let mut root = Value::Object(output);
        table.splice_into(&mut root, self.options.splice_mode());
        let bundled = Document::from_value(root, document.path())?;

        log_bundle_completed!(
            document = %document.path().display(),
            files = rolodex.file_count(),
            references = index.references().len(),
            components = table.len(),
            circular = pass.warned.len(),
            "bundled document"
        );

        Ok(Bundled {
            document: bundled,
            table,
        })
    }
}

/// Load, bundle and render a document.
pub fn bundle_file(path: &Path, options: &BundleOptions) -> Result<Vec<u8>, CompileError> {
    let document = Document::load(path)?;
    let bundled = Bundler::new(options.clone()).bundle(&document)?;
    Ok(bundled.document.render()?)
}

struct Pass<'a> {
    rolodex: &'a Rolodex,
    index: &'a ReferenceIndex,
    options: &'a BundleOptions,
    table: ComponentTable,
    /// Final name of every component copied so far, by target.
    copied: HashMap<Target, String>,
    /// Circular references already reported, by (origin, raw).
    warned: HashSet<(FileId, String)>,
    errors: Vec<CompileError>,
}

impl Pass<'_> {
    fn rewrite(&mut self, value: &Value, file: FileId) -> Value {
        match value {
            Value::Object(map) => {
                if let Some(raw) = map.get("$ref").and_then(Value::as_str) {
                    return self.rewrite_reference(map, raw, file);
                }
                Value::Object(
                    map.iter()
                        .map(|(key, child)| (key.clone(), self.rewrite(child, file)))
                        .collect(),
                )
            }
            Value::Array(items) => {
                Value::Array(items.iter().map(|item| self.rewrite(item, file)).collect())
            }
            other => other.clone(),
        }
    }

    /// The root's `components` object without its managed sections, which
    /// the splice rebuilds from the table. Security schemes are kept as-is.
    fn rewrite_unmanaged(&mut self, components: &Value) -> Value {
        let Value::Object(components) = components else {
            return components.clone();
        };
        let mut kept = Map::new();
        for (key, value) in components {
            match ComponentKind::from_section(key) {
                Some(ComponentKind::SecurityScheme) => {
                    kept.insert(key.clone(), value.clone());
                }
                Some(_) => {}
                None => {
                    kept.insert(key.clone(), self.rewrite(value, FileId::ROOT));
                }
            }
        }
        Value::Object(kept)
    }

    fn rewrite_reference(&mut self, node: &Map<String, Value>, raw: &str, file: FileId) -> Value {
        let index = self.index;
        let Some(reference) = index.lookup(file, raw) else {
            return Value::Object(node.clone());
        };

        if reference.circular {
            return self.keep_circular(node, reference);
        }
        if self.options.inline_all {
            return self.inline(node, reference, file);
        }
        if reference.is_local_to_root() && !self.options.inline_root_local_refs {
            return Value::Object(node.clone());
        }

        match &reference.definition {
            Some(definition) => {
                let name = self.options.prefix.apply(&definition.name);
                let name = self.copy_component(reference, definition, name);
                let local = Definition {
                    kind: definition.kind,
                    name,
                };
                with_ref(node, &local.pointer())
            }
            None => self.inline(node, reference, file),
        }
    }

    /// Copy the target of `reference` into the table under `name`, unless it
    /// was copied before. Returns the name it is stored under.
    fn copy_component(&mut self, reference: &Reference, definition: &Definition, name: String) -> String {
        if let Some(existing) = self.copied.get(&reference.target) {
            return existing.clone();
        }
        self.copied.insert(reference.target.clone(), name.clone());
        self.table.reserve(definition.kind, &name);

        let rolodex = self.rolodex;
        let Some(content) = rolodex.resolve(&reference.target) else {
            self.table.release(definition.kind, &name);
            return name;
        };
        let value = self.rewrite(content, reference.target.file);

        match Component::build(definition.kind, name.clone(), value) {
            Ok(component) => {
                debug!(
                    reference = %reference.raw,
                    kind = %definition.kind,
                    name = %name,
                    "copied component"
                );
                self.table.insert(component);
            }
            Err(err) => {
                self.table.release(definition.kind, &name);
                self.errors.push(err);
            }
        }
        name
    }

    fn inline(&mut self, node: &Map<String, Value>, reference: &Reference, file: FileId) -> Value {
        let rolodex = self.rolodex;
        let Some(content) = rolodex.resolve(&reference.target) else {
            return Value::Object(node.clone());
        };
        debug!(reference = %reference.raw, "inlining referenced value");

        let mut value = self.rewrite(content, reference.target.file);
        if let Value::Object(map) = &mut value {
            for (key, sibling) in node {
                if key != "$ref" {
                    map.insert(key.clone(), self.rewrite(sibling, file));
                }
            }
        }
        value
    }

    /// Keep a circular reference as a reference.
    ///
    /// A pruning pass copies a component target under its namespaced name
    /// and points the reference at the copy, whichever file it lives in.
    /// Otherwise the reference keeps pointing where it points, re-expressed
    /// from the root file.
    fn keep_circular(&mut self, node: &Map<String, Value>, reference: &Reference) -> Value {
        if self.warned.insert((reference.origin, reference.raw.clone())) {
            log_circular_reference!(
                reference = %reference.raw,
                file = %self.rolodex.file(reference.origin).path.display(),
                "circular reference left unresolved"
            );
        }

        let pruning = self.options.splice_mode() == SpliceMode::Replace;
        if pruning {
            if let Some(definition) = &reference.definition {
                let name = self.options.prefix.apply(&definition.name);
                let name = self.copy_component(reference, definition, name);
                let local = Definition {
                    kind: definition.kind,
                    name,
                };
                return with_ref(node, &local.pointer());
            }
        }

        if reference.origin == FileId::ROOT && !(pruning && reference.is_cross_file()) {
            Value::Object(node.clone())
        } else {
            with_ref(node, &self.relocate(&reference.target, pruning))
        }
    }

    /// Express `target` as a reference written in the root file.
    ///
    /// Other files are addressed relative to the root's directory, or by
    /// absolute path when `absolute` is set or they live outside it. A pruned
    /// document is merged into documents elsewhere, so it needs the latter.
    fn relocate(&self, target: &Target, absolute: bool) -> String {
        let fragment = format!("#{}", target.fragment);
        if target.file == FileId::ROOT {
            return fragment;
        }
        let path = &self.rolodex.file(target.file).path;
        let location = if absolute {
            path.as_path()
        } else {
            self.rolodex
                .file(FileId::ROOT)
                .path
                .parent()
                .and_then(|dir| path.strip_prefix(dir).ok())
                .unwrap_or(path)
        };
        if target.fragment.is_empty() {
            location.display().to_string()
        } else {
            format!("{}{}", location.display(), fragment)
        }
    }
}

fn with_ref(node: &Map<String, Value>, reference: &str) -> Value {
    let mut node = node.clone();
    node.insert("$ref".to_string(), Value::String(reference.to_string()));
    Value::Object(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const COMMON: &str = r#"
openapi: "3.0.3"
info:
  title: Common
  version: "1.0.0"
paths: {}
components:
  schemas:
    Error:
      type: object
      properties:
        code:
          $ref: '#/components/schemas/Code'
    Code:
      type: integer
    Node:
      type: object
      properties:
        next:
          $ref: '#/components/schemas/Node'
    Holder:
      type: object
      properties:
        head:
          $ref: '#/components/schemas/Node'
  parameters:
    Broken:
      in: query
"#;

    fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn bundle(dir: &TempDir, root: &str, options: BundleOptions) -> Result<Bundled, CompileError> {
        write(dir, "common.yaml", COMMON);
        let path = write(dir, "api.yaml", root);
        let document = Document::load(&path).unwrap();
        Bundler::new(options).bundle(&document)
    }

    fn schema_names(doc: &Document) -> Vec<String> {
        doc.root()["components"]["schemas"]
            .as_object()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    }

    #[test]
    fn hoists_external_components() {
        let dir = TempDir::new().unwrap();
        let root = r#"
openapi: "3.0.3"
info:
  title: Api
  version: "1.0.0"
paths:
  /things:
    get:
      responses:
        "400":
          description: bad
          content:
            application/json:
              schema:
                $ref: 'common.yaml#/components/schemas/Error'
        "200":
          description: ok
          content:
            application/json:
              schema:
                $ref: '#/components/schemas/Thing'
components:
  schemas:
    Thing:
      type: string
"#;
        let bundled = bundle(&dir, root, BundleOptions::new()).unwrap();
        let doc = bundled.document;
        let responses = &doc.root()["paths"]["/things"]["get"]["responses"];
        assert_eq!(
            responses["400"]["content"]["application/json"]["schema"]["$ref"],
            "#/components/schemas/Error"
        );
        assert_eq!(
            responses["200"]["content"]["application/json"]["schema"]["$ref"],
            "#/components/schemas/Thing"
        );
        assert_eq!(schema_names(&doc), vec!["Thing", "Error", "Code"]);
        assert_eq!(
            doc.root()["components"]["schemas"]["Error"]["properties"]["code"]["$ref"],
            "#/components/schemas/Code"
        );
        assert!(!String::from_utf8(doc.render().unwrap()).unwrap().contains("common.yaml"));
    }

    #[test]
    fn repeated_references_copy_once() {
        let dir = TempDir::new().unwrap();
        let root = r#"
openapi: "3.0.3"
info: {title: Api, version: "1"}
paths:
  /a:
    get:
      responses:
        default:
          description: e
          content:
            application/json:
              schema: {$ref: 'common.yaml#/components/schemas/Error'}
  /b:
    get:
      responses:
        default:
          description: e
          content:
            application/json:
              schema: {$ref: './common.yaml#/components/schemas/Error'}
"#;
        let bundled = bundle(&dir, root, BundleOptions::new()).unwrap();
        assert_eq!(schema_names(&bundled.document), vec!["Error", "Code"]);
        assert_eq!(bundled.table.len(), 2);
    }

    #[test]
    fn prefix_and_pruning_of_local_components() {
        let dir = TempDir::new().unwrap();
        let root = r#"
openapi: "3.0.3"
info: {title: Api, version: "1"}
paths:
  /a:
    get:
      responses:
        "200":
          description: ok
          content:
            application/json:
              schema: {$ref: '#/components/schemas/Used'}
components:
  schemas:
    Used: {type: string}
    Unused: {$ref: 'common.yaml#/components/schemas/Error'}
  securitySchemes:
    key: {type: apiKey, in: header, name: X-Key}
  x-owner: platform
"#;
        let options = BundleOptions::new()
            .with_prefix(NamespacePrefix::from_name("up"))
            .with_inline_root_local_refs(true);
        let doc = bundle(&dir, root, options).unwrap().document;

        assert_eq!(schema_names(&doc), vec!["UpUsed"]);
        assert_eq!(
            doc.root()["paths"]["/a"]["get"]["responses"]["200"]["content"]["application/json"]
                ["schema"]["$ref"],
            "#/components/schemas/UpUsed"
        );
        assert_eq!(doc.root()["components"]["securitySchemes"]["key"]["type"], "apiKey");
        assert_eq!(doc.root()["components"]["x-owner"], "platform");
    }

    #[test]
    fn inlines_whole_file_references() {
        let dir = TempDir::new().unwrap();
        write(&dir, "pet.yaml", "type: object\nproperties:\n  error:\n    $ref: 'common.yaml#/components/schemas/Error'\n");
        let root = r#"
openapi: "3.0.3"
info: {title: Api, version: "1"}
paths:
  /pets:
    get:
      responses:
        "200":
          description: ok
          content:
            application/json:
              schema: {$ref: 'pet.yaml'}
"#;
        let doc = bundle(&dir, root, BundleOptions::new()).unwrap().document;
        let schema = &doc.root()["paths"]["/pets"]["get"]["responses"]["200"]["content"]
            ["application/json"]["schema"];
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["error"]["$ref"], "#/components/schemas/Error");
        assert_eq!(schema_names(&doc), vec!["Error", "Code"]);
    }

    #[test]
    fn inline_all_dereferences_everything() {
        let dir = TempDir::new().unwrap();
        let root = r#"
openapi: "3.0.3"
info: {title: Api, version: "1"}
paths:
  /a:
    get:
      responses:
        "400":
          description: bad
          content:
            application/json:
              schema: {$ref: 'common.yaml#/components/schemas/Error'}
        "200":
          description: ok
          content:
            application/json:
              schema: {$ref: '#/components/schemas/Thing'}
components:
  schemas:
    Thing: {type: string}
"#;
        let doc = bundle(&dir, root, BundleOptions::new().with_inline_all(true))
            .unwrap()
            .document;
        let responses = &doc.root()["paths"]["/a"]["get"]["responses"];
        let error = &responses["400"]["content"]["application/json"]["schema"];
        assert_eq!(error["properties"]["code"]["type"], "integer");
        assert_eq!(responses["200"]["content"]["application/json"]["schema"]["type"], "string");
        assert_eq!(schema_names(&doc), vec!["Thing"]);
    }

    #[test]
    fn self_reference_is_left_local() {
        let dir = TempDir::new().unwrap();
        let root = r#"
openapi: "3.0.3"
info: {title: Api, version: "1"}
paths: {}
components:
  schemas:
    Tree:
      type: object
      properties:
        children:
          type: array
          items: {$ref: '#/components/schemas/Tree'}
"#;
        let doc = bundle(&dir, root, BundleOptions::new()).unwrap().document;
        assert_eq!(
            doc.root()["components"]["schemas"]["Tree"]["properties"]["children"]["items"]["$ref"],
            "#/components/schemas/Tree"
        );
    }

    #[test]
    fn circular_reference_survives_pruning() {
        let dir = TempDir::new().unwrap();
        let root = r#"
openapi: "3.0.3"
info: {title: Api, version: "1"}
paths:
  /tree:
    get:
      responses:
        "200":
          description: ok
          content:
            application/json:
              schema: {$ref: '#/components/schemas/Tree'}
components:
  schemas:
    Tree:
      type: object
      properties:
        child: {$ref: '#/components/schemas/Tree'}
"#;
        let options = BundleOptions::new()
            .with_prefix(NamespacePrefix::from_name("up"))
            .with_inline_root_local_refs(true);
        let doc = bundle(&dir, root, options).unwrap().document;
        assert_eq!(schema_names(&doc), vec!["UpTree"]);
        assert_eq!(
            doc.root()["paths"]["/tree"]["get"]["responses"]["200"]["content"]["application/json"]
                ["schema"]["$ref"],
            "#/components/schemas/UpTree"
        );
        assert_eq!(
            doc.root()["components"]["schemas"]["UpTree"]["properties"]["child"]["$ref"],
            "#/components/schemas/UpTree"
        );
        assert!(apiweld_spec::dangling_local_references(&doc).is_empty());
    }

    #[test]
    fn pruning_hoists_circular_component_from_another_file() {
        let dir = TempDir::new().unwrap();
        let root = r#"
openapi: "3.0.3"
info: {title: Api, version: "1"}
paths:
  /list:
    get:
      responses:
        "200":
          description: ok
          content:
            application/json:
              schema: {$ref: 'common.yaml#/components/schemas/Node'}
"#;
        let options = BundleOptions::new()
            .with_prefix(NamespacePrefix::from_name("list"))
            .with_inline_root_local_refs(true);
        let doc = bundle(&dir, root, options).unwrap().document;
        assert_eq!(schema_names(&doc), vec!["ListNode"]);
        assert_eq!(
            doc.root()["components"]["schemas"]["ListNode"]["properties"]["next"]["$ref"],
            "#/components/schemas/ListNode"
        );
        assert!(!doc.render().unwrap().windows(5).any(|w| w == b".yaml"));
    }

    #[test]
    fn pruning_addresses_circular_file_by_absolute_path() {
        let dir = TempDir::new().unwrap();
        let tree = write(
            &dir,
            "tree.yaml",
            "type: object\nproperties:\n  child:\n    $ref: '#'\n",
        );
        let root = r#"
openapi: "3.0.3"
info: {title: Api, version: "1"}
paths:
  /tree:
    get:
      responses:
        "200":
          description: ok
          content:
            application/json:
              schema: {$ref: 'tree.yaml'}
"#;
        let options = BundleOptions::new().with_inline_root_local_refs(true);
        let doc = bundle(&dir, root, options).unwrap().document;
        let expected = fs::canonicalize(&tree).unwrap().display().to_string();
        assert_eq!(
            doc.root()["paths"]["/tree"]["get"]["responses"]["200"]["content"]["application/json"]
                ["schema"]["$ref"],
            expected.as_str()
        );
    }

    #[test]
    fn circular_reference_in_external_file_is_relocated() {
        let dir = TempDir::new().unwrap();
        let root = r#"
openapi: "3.0.3"
info: {title: Api, version: "1"}
paths:
  /list:
    get:
      responses:
        "200":
          description: ok
          content:
            application/json:
              schema: {$ref: 'common.yaml#/components/schemas/Holder'}
"#;
        let doc = bundle(&dir, root, BundleOptions::new()).unwrap().document;
        assert_eq!(schema_names(&doc), vec!["Holder"]);
        assert_eq!(
            doc.root()["components"]["schemas"]["Holder"]["properties"]["head"]["$ref"],
            "common.yaml#/components/schemas/Node"
        );
    }

    #[test]
    fn malformed_component_is_an_extraction_error() {
        let dir = TempDir::new().unwrap();
        let root = r#"
openapi: "3.0.3"
info: {title: Api, version: "1"}
paths:
  /a:
    get:
      parameters:
        - $ref: 'common.yaml#/components/parameters/Broken'
      responses:
        "200": {description: ok}
"#;
        let err = bundle(&dir, root, BundleOptions::new()).unwrap_err();
        assert!(matches!(
            err,
            CompileError::Extract { kind: ComponentKind::Parameter, ref name, .. } if name == "Broken"
        ));
    }

    #[test]
    fn unresolved_reference_fails_before_rewriting() {
        let dir = TempDir::new().unwrap();
        let root = r#"
openapi: "3.0.3"
info: {title: Api, version: "1"}
paths:
  /a:
    get:
      responses:
        "200":
          description: ok
          content:
            application/json:
              schema: {$ref: 'missing.yaml#/components/schemas/X'}
"#;
        let err = bundle(&dir, root, BundleOptions::new()).unwrap_err();
        assert!(matches!(err, CompileError::Parse(_)));
    }

    #[test]
    fn bundling_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let root = r#"
openapi: "3.0.3"
info: {title: Api, version: "1"}
paths:
  /a:
    get:
      responses:
        "400":
          description: bad
          content:
            application/json:
              schema: {$ref: 'common.yaml#/components/schemas/Error'}
"#;
        let first = bundle(&dir, root, BundleOptions::new()).unwrap().document;
        let first_bytes = first.render().unwrap();
        let second = Bundler::new(BundleOptions::new()).bundle(&first).unwrap().document;
        assert_eq!(first_bytes, second.render().unwrap());
    }

    #[test]
    fn bundle_file_renders_yaml() {
        let dir = TempDir::new().unwrap();
        write(&dir, "common.yaml", COMMON);
        let path = write(
            &dir,
            "api.yaml",
            "openapi: 3.1.0\ninfo: {title: Api, version: '1'}\npaths: {}\n",
        );
        let bytes = bundle_file(&path, &BundleOptions::new()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("openapi:"));
        assert!(text.contains("3.1.0"));
        assert!(!text.contains("components"));
    }
}
