//! SpecWorkspace: scratch directory harness for multi-file specs.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use thiserror::Error;

use apiweld_compiler::{
    bundle_file, compile_proxy_file, BundleOptions, CompileOptions, CompiledProxy, Document,
};

/// Errors from SpecWorkspace operations.
#[derive(Debug, Error)]
pub enum TestError {
    #[error("compilation failed: {0}")]
    Compile(#[from] apiweld_compiler::CompileError),

    #[error("parse failed: {0}")]
    Parse(#[from] apiweld_compiler::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("fixture not found: {0}")]
    FixtureNotFound(String),
}

/// A temporary directory holding spec files.
///
/// Relative `$ref` and `x-proxy` spec paths resolve against this directory,
/// so fixtures can be copied in and edited per test.
pub struct SpecWorkspace {
    dir: TempDir,
}

impl SpecWorkspace {
    /// Create an empty workspace.
    pub fn new() -> Result<Self, TestError> {
        Ok(Self {
            dir: TempDir::new()?,
        })
    }

    /// Create a workspace holding a copy of a fixture directory.
    pub fn from_fixture_dir(source: &Path) -> Result<Self, TestError> {
        if !source.is_dir() {
            return Err(TestError::FixtureNotFound(source.display().to_string()));
        }
        let workspace = Self::new()?;
        copy_dir(source, workspace.root())?;
        Ok(workspace)
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Absolute path of a file in the workspace.
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Write a file, creating parent directories as needed.
    pub fn write(&self, name: &str, content: &str) -> Result<PathBuf, TestError> {
        let path = self.path(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        Ok(path)
    }

    /// Read a file back as text.
    pub fn read(&self, name: &str) -> Result<String, TestError> {
        Ok(fs::read_to_string(self.path(name))?)
    }

    /// Parse a workspace file as an OpenAPI document.
    pub fn document(&self, name: &str) -> Result<Document, TestError> {
        Ok(Document::load(&self.path(name))?)
    }

    /// Bundle a workspace file with default options.
    pub fn bundle(&self, name: &str) -> Result<Document, TestError> {
        let bytes = bundle_file(&self.path(name), &BundleOptions::default())?;
        Ok(Document::parse(&bytes, self.path(name))?)
    }

    /// Compile a proxy document in the workspace.
    pub fn compile_proxy(&self, name: &str) -> Result<CompiledProxy, TestError> {
        Ok(compile_proxy_file(&self.path(name), &CompileOptions::default())?)
    }
}

fn copy_dir(source: &Path, target: &Path) -> std::io::Result<()> {
    fs::create_dir_all(target)?;
    for entry in fs::read_dir(source)? {
        let entry = entry?;
        let destination = target.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &destination)?;
        } else {
            fs::copy(entry.path(), destination)?;
        }
    }
    Ok(())
}
