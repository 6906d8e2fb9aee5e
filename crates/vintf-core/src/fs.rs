//! Read-only file access for `VintfObject`.
//!
//! Paths are absolute device paths (`/vendor/etc/vintf/manifest.xml`); a
//! [`RootedFileSystem`] resolves them under a host directory.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FsError {
    #[error("{0} does not exist")]
    NotFound(String),
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl FsError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    fn from_io(path: &str, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            Self::NotFound(path.to_owned())
        } else {
            Self::Io {
                path: path.to_owned(),
                source,
            }
        }
    }
}

pub trait FileSystem: Send + Sync {
    /// Whole content of the file at `path`.
    fn fetch(&self, path: &str) -> Result<String, FsError>;

    /// Names (not paths) of the regular files directly inside `dir`, sorted.
    fn list_files(&self, dir: &str) -> Result<Vec<String>, FsError>;
}

/// Device paths resolved under a host directory.
#[derive(Debug, Clone)]
pub struct RootedFileSystem {
    root: PathBuf,
}

impl RootedFileSystem {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

impl FileSystem for RootedFileSystem {
    fn fetch(&self, path: &str) -> Result<String, FsError> {
        std::fs::read_to_string(self.resolve(path)).map_err(|e| FsError::from_io(path, e))
    }

    fn list_files(&self, dir: &str) -> Result<Vec<String>, FsError> {
        let entries = std::fs::read_dir(self.resolve(dir)).map_err(|e| FsError::from_io(dir, e))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| FsError::from_io(dir, e))?;
            let file_type = entry.file_type().map_err(|e| FsError::from_io(dir, e))?;
            if file_type.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Files held in memory, keyed by absolute device path.
#[derive(Debug, Clone, Default)]
pub struct MemoryFileSystem {
    files: BTreeMap<String, String>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_file(mut self, path: &str, content: &str) -> Self {
        self.insert(path, content);
        self
    }

    pub fn insert(&mut self, path: &str, content: &str) {
        self.files.insert(path.to_owned(), content.to_owned());
    }

    pub fn remove(&mut self, path: &str) -> Option<String> {
        self.files.remove(path)
    }
}

impl FileSystem for MemoryFileSystem {
    fn fetch(&self, path: &str) -> Result<String, FsError> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| FsError::NotFound(path.to_owned()))
    }

    fn list_files(&self, dir: &str) -> Result<Vec<String>, FsError> {
        let prefix = if dir.ends_with('/') {
            dir.to_owned()
        } else {
            format!("{dir}/")
        };
        let mut found_dir = false;
        let mut names = Vec::new();
        for path in self.files.keys() {
            let Some(rest) = path.strip_prefix(&prefix) else {
                continue;
            };
            found_dir = true;
            if !rest.contains('/') {
                names.push(rest.to_owned());
            }
        }
        if !found_dir {
            return Err(FsError::NotFound(dir.to_owned()));
        }
        Ok(names)
    }
}
