//! Multi-file loading and the reference index.
//!
//! The [`Rolodex`] owns every file reachable from a root document through
//! `$ref`. The [`ReferenceIndex`] lists every `$ref` node of those files in
//! declaration order: the root file first, then each external file in the
//! order it was discovered, each walked top to bottom.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::document::{absolute, parse_value, Document};
use crate::error::ParseError;
use crate::model::Definition;
use crate::pointer::{self, RefTarget};

/// Position of a file inside a [`Rolodex`]. The root document is always 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(pub usize);

impl FileId {
    pub const ROOT: FileId = FileId(0);
}

/// A file loaded into the rolodex.
#[derive(Debug, Clone)]
pub struct SpecFile {
    pub path: PathBuf,
    pub root: Value,
}

/// Memoising loader for the files of one document.
#[derive(Debug, Clone)]
pub struct Rolodex {
    files: Vec<SpecFile>,
    by_path: HashMap<PathBuf, FileId>,
}

impl Rolodex {
    /// Start a rolodex with `document` as its root file.
    pub fn new(document: &Document) -> Self {
        let path = document.path().to_path_buf();
        let mut by_path = HashMap::new();
        by_path.insert(canonical(&path), FileId::ROOT);
        Rolodex {
            files: vec![SpecFile {
                path,
                root: document.root().clone(),
            }],
            by_path,
        }
    }

    pub fn file(&self, id: FileId) -> &SpecFile {
        &self.files[id.0]
    }

    /// Number of files loaded so far, the root included.
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Resolve the file part of a `$ref` written in `origin`, loading the file
    /// on first use.
    pub fn resolve_file(&mut self, origin: FileId, location: &str) -> Result<FileId, ParseError> {
        if location.contains("://") {
            return Err(ParseError::UnresolvedRef {
                reference: location.to_string(),
                origin: self.file(origin).path.display().to_string(),
            });
        }

        let base = self
            .file(origin)
            .path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let path = canonical(&base.join(location));
        if let Some(id) = self.by_path.get(&path) {
            return Ok(*id);
        }

        debug!(file = %path.display(), "loading referenced file");
        let content = std::fs::read(&path).map_err(|source| ParseError::Io {
            path: path.clone(),
            source,
        })?;
        let root = parse_value(&content, &path)?;

        let id = FileId(self.files.len());
        self.files.push(SpecFile {
            path: path.clone(),
            root,
        });
        self.by_path.insert(path, id);
        Ok(id)
    }

    /// The value a target points at.
    pub fn resolve(&self, target: &Target) -> Option<&Value> {
        pointer::resolve_pointer(&self.file(target.file).root, &target.fragment)
    }
}

/// Where a reference points: a file and a fragment inside it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    pub file: FileId,
    /// Fragment pointer without the leading `#`.
    pub fragment: String,
}

/// One `$ref` node.
#[derive(Debug, Clone)]
pub struct Reference {
    /// The `$ref` string as written.
    pub raw: String,
    /// File that contains the `$ref` node.
    pub origin: FileId,
    /// Unescaped pointer segments of the `$ref` node inside its file.
    pub location: Vec<String>,
    pub target: Target,
    /// Set when the target has the `#/components/{kind}/{name}` shape.
    pub definition: Option<Definition>,
    /// The target can reach itself through further references.
    pub circular: bool,
}

impl Reference {
    /// Both ends live in the root document.
    pub fn is_local_to_root(&self) -> bool {
        self.origin == FileId::ROOT && self.target.file == FileId::ROOT
    }

    pub fn is_cross_file(&self) -> bool {
        self.origin != self.target.file
    }
}

/// Every reference of a document and the files it reaches.
#[derive(Debug, Clone)]
pub struct ReferenceIndex {
    references: Vec<Reference>,
    by_site: HashMap<(FileId, String), usize>,
}

impl ReferenceIndex {
    /// Index `rolodex`'s root file and everything reachable from it.
    ///
    /// Missing files and unresolvable fragments are collected and reported
    /// together as one error.
    pub fn build(rolodex: &mut Rolodex) -> Result<Self, ParseError> {
        let mut references = Vec::new();
        let mut errors = Vec::new();

        let mut queue = VecDeque::from([FileId::ROOT]);
        let mut queued = HashSet::from([FileId::ROOT]);

        while let Some(file) = queue.pop_front() {
            for (location, raw) in collect_refs(&rolodex.file(file).root) {
                let parsed = RefTarget::parse(&raw);
                let target_file = match &parsed.file {
                    None => file,
                    Some(location) => match rolodex.resolve_file(file, location) {
                        Ok(id) => id,
                        Err(e) => {
                            errors.push(e);
                            continue;
                        }
                    },
                };
                if queued.insert(target_file) {
                    queue.push_back(target_file);
                }

                let target = Target {
                    file: target_file,
                    fragment: parsed.fragment,
                };
                if rolodex.resolve(&target).is_none() {
                    errors.push(ParseError::UnresolvedRef {
                        reference: raw,
                        origin: rolodex.file(file).path.display().to_string(),
                    });
                    continue;
                }

                references.push(Reference {
                    definition: pointer::definition_from_pointer(&target.fragment),
                    raw,
                    origin: file,
                    location,
                    target,
                    circular: false,
                });
            }
        }

        if let Some(err) = ParseError::aggregate(errors) {
            return Err(err);
        }

        mark_circular(&mut references);

        let mut by_site = HashMap::new();
        for (i, reference) in references.iter().enumerate() {
            by_site
                .entry((reference.origin, reference.raw.clone()))
                .or_insert(i);
        }

        Ok(ReferenceIndex {
            references,
            by_site,
        })
    }

    /// All references in declaration order.
    pub fn references(&self) -> &[Reference] {
        &self.references
    }

    /// The indexed reference for a `$ref` string written in `origin`.
    pub fn lookup(&self, origin: FileId, raw: &str) -> Option<&Reference> {
        self.by_site
            .get(&(origin, raw.to_string()))
            .map(|&i| &self.references[i])
    }
}

/// Flag every reference whose target lies on a reference cycle.
///
/// A target's successors are the targets of the references located inside
/// its subtree.
fn mark_circular(references: &mut [Reference]) {
    let mut ids: HashMap<Target, usize> = HashMap::new();
    for reference in references.iter() {
        let next = ids.len();
        ids.entry(reference.target.clone()).or_insert(next);
    }

    let mut targets: Vec<Option<&Target>> = vec![None; ids.len()];
    for (target, &id) in &ids {
        targets[id] = Some(target);
    }

    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); ids.len()];
    for (id, target) in targets.iter().enumerate() {
        let Some(target) = target else { continue };
        let prefix = pointer::segments(&target.fragment);
        for reference in references.iter() {
            if reference.origin == target.file && reference.location.starts_with(&prefix) {
                let next = ids[&reference.target];
                if !successors[id].contains(&next) {
                    successors[id].push(next);
                }
            }
        }
    }

    let circular: Vec<bool> = (0..ids.len())
        .map(|start| reaches(&successors, start))
        .collect();

    let lookup: Vec<bool> = references
        .iter()
        .map(|r| circular[ids[&r.target]])
        .collect();
    for (reference, is_circular) in references.iter_mut().zip(lookup) {
        reference.circular = is_circular;
    }
}

fn reaches(successors: &[Vec<usize>], start: usize) -> bool {
    let mut seen = HashSet::new();
    let mut stack: Vec<usize> = successors[start].clone();
    while let Some(node) = stack.pop() {
        if node == start {
            return true;
        }
        if seen.insert(node) {
            stack.extend(successors[node].iter().copied());
        }
    }
    false
}

/// Collect every `$ref` node of a value as (location, raw ref), top to bottom.
pub fn collect_refs(root: &Value) -> Vec<(Vec<String>, String)> {
    let mut found = Vec::new();
    let mut path = Vec::new();
    walk(root, &mut path, &mut found);
    found
}

fn walk(value: &Value, path: &mut Vec<String>, found: &mut Vec<(Vec<String>, String)>) {
    match value {
        Value::Object(map) => {
            if let Some(raw) = map.get("$ref").and_then(Value::as_str) {
                found.push((path.clone(), raw.to_string()));
                return;
            }
            for (key, child) in map {
                path.push(key.clone());
                walk(child, path, found);
                path.pop();
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                path.push(i.to_string());
                walk(child, path, found);
                path.pop();
            }
        }
        _ => {}
    }
}

/// Local `#/...` references of a document that resolve to nothing.
pub fn dangling_local_references(document: &Document) -> Vec<String> {
    let root = document.root();
    let mut dangling: Vec<String> = Vec::new();
    for (_, raw) in collect_refs(root) {
        if raw.starts_with('#')
            && pointer::resolve_pointer(root, &raw).is_none()
            && !dangling.contains(&raw)
        {
            dangling.push(raw);
        }
    }
    dangling
}

fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| absolute(path))
}
