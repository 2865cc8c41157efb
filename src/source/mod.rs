//! Source tree model and ingestion.
//!
//! The ingestion collaborator (repository cloning, checkout management) is
//! external; the core consumes a [`SourceTree`] through the
//! [`SourceProvider`] trait. An ingestion failure is fatal to the job.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use ignore::{overrides::OverrideBuilder, WalkBuilder};
use tracing::{debug, warn};

use crate::error::IngestionError;

/// One file below the source root, addressed by its root-relative path.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub content: String,
}

/// A read-only snapshot of the source files for one analysis run.
///
/// Files are held in path order so downstream stages are deterministic for
/// identical input.
#[derive(Debug, Clone)]
pub struct SourceTree {
    root: PathBuf,
    commit: Option<String>,
    files: Vec<SourceFile>,
}

impl SourceTree {
    pub fn new(root: impl Into<PathBuf>, mut files: Vec<SourceFile>) -> Self {
        files.sort_by(|a, b| a.path.cmp(&b.path));
        Self {
            root: root.into(),
            commit: None,
            files,
        }
    }

    pub fn with_commit(mut self, commit: impl Into<String>) -> Self {
        self.commit = Some(commit.into());
        self
    }

    /// Builds a tree from (path, content) pairs. Primarily for tests.
    pub fn from_pairs<P, C>(root: impl Into<PathBuf>, pairs: Vec<(P, C)>) -> Self
    where
        P: Into<PathBuf>,
        C: Into<String>,
    {
        let files = pairs
            .into_iter()
            .map(|(path, content)| SourceFile {
                path: path.into(),
                content: content.into(),
            })
            .collect();
        Self::new(root, files)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn commit(&self) -> Option<&str> {
        self.commit.as_deref()
    }

    pub fn files(&self) -> &[SourceFile] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Supplies the source tree for a run.
#[async_trait]
pub trait SourceProvider: Send + Sync {
    async fn fetch(&self) -> Result<SourceTree, IngestionError>;
}

/// Directories that never contain first-party source, excluded even when no
/// `.gitignore` covers them.
const EXCLUDED_DIRS: &[&str] = &[".git", "__pycache__", ".venv", "venv", "node_modules"];

/// Reads Python sources from a local directory.
///
/// Uses the `ignore` walker, so hidden directories and anything matched by
/// `.gitignore` are skipped the same way version control skips them;
/// vendored directories ([`EXCLUDED_DIRS`]) are excluded unconditionally.
pub struct LocalSourceProvider {
    root: PathBuf,
}

impl LocalSourceProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl SourceProvider for LocalSourceProvider {
    async fn fetch(&self) -> Result<SourceTree, IngestionError> {
        if !self.root.is_dir() {
            return Err(IngestionError::RootNotFound(self.root.clone()));
        }

        let mut override_builder = OverrideBuilder::new(&self.root);
        for excluded in EXCLUDED_DIRS {
            override_builder
                .add(&format!("!{excluded}/"))
                .map_err(|e| IngestionError::Other(e.to_string()))?;
        }
        let overrides = override_builder
            .build()
            .map_err(|e| IngestionError::Other(e.to_string()))?;

        let mut files = Vec::new();
        for entry in WalkBuilder::new(&self.root).overrides(overrides).build() {
            let entry = entry.map_err(|e| IngestionError::Other(e.to_string()))?;
            let path = entry.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("py") {
                continue;
            }

            let relative = path
                .strip_prefix(&self.root)
                .unwrap_or(path)
                .to_path_buf();

            match std::fs::read_to_string(path) {
                Ok(content) => files.push(SourceFile {
                    path: relative,
                    content,
                }),
                Err(e) => {
                    // Unreadable files (permissions, invalid UTF-8) are not
                    // part of the tree; the extractor never sees them.
                    warn!(file = %relative.display(), error = %e, "skipping unreadable file");
                }
            }
        }

        debug!(
            root = %self.root.display(),
            files = files.len(),
            "source tree ingested"
        );

        Ok(SourceTree::new(&self.root, files))
    }
}
