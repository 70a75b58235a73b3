//! Collection discovery, name resolution and lock tracking.
//!
//! A collection is a directory of profiles, agents and modules installed
//! under one of the collection search paths. A directory only counts as a
//! collection when it contains the `pyproject.toml` marker file.
//!
//! ## Search order
//!
//! Search paths are held lowest precedence first:
//!
//! 1. Bundled collections (optional)
//! 2. User collections (`~/.amplifier/collections/`)
//! 3. Project collections (`.amplifier/collections/`)
//!
//! Name resolution walks the list in reverse and returns the first match.

use crate::paths::{AmplifierPaths, write_atomic};
use crate::{Error, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// File whose presence marks a directory as an installed collection.
pub const COLLECTION_MARKER: &str = "pyproject.toml";

/// Resolves collection names to installed directories.
#[derive(Debug, Clone, Default)]
pub struct CollectionResolver {
    /// Lowest precedence first.
    search_paths: Vec<PathBuf>,
}

impl CollectionResolver {
    /// Resolver over explicit search paths (lowest precedence first).
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        Self { search_paths }
    }

    /// Resolver over the standard user and project collection directories.
    pub fn for_paths(paths: &AmplifierPaths) -> Self {
        Self::new(vec![
            paths.user_collections_dir(),
            paths.project_collections_dir(),
        ])
    }

    /// Find the highest-precedence collection directory named `name`.
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        self.search_paths
            .iter()
            .rev()
            .map(|dir| dir.join(name))
            .find(|candidate| is_collection_dir(candidate))
    }

    /// All installed collections as `(name, path)`, sorted by name.
    ///
    /// Higher-precedence installs shadow lower ones with the same name.
    pub fn list_collections(&self) -> Vec<(String, PathBuf)> {
        let mut found: BTreeMap<String, PathBuf> = BTreeMap::new();
        for search_path in &self.search_paths {
            let Ok(entries) = fs::read_dir(search_path) else {
                continue;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if is_collection_dir(&path) {
                    let name = entry.file_name().to_string_lossy().to_string();
                    found.insert(name, path);
                }
            }
        }
        found.into_iter().collect()
    }

    /// Resolve a `collection:path` reference to a file.
    ///
    /// `path` is first tried relative to the collection root; when that fails
    /// and `path` does not already start with `<kind>/`, it is treated as a
    /// bare resource name under `<kind>/` with a `.md` extension.
    ///
    /// A `path` that is absolute or contains `..` never resolves.
    pub fn resolve_resource(&self, reference: &str, kind: &str) -> Option<PathBuf> {
        let (collection, resource) = reference.split_once(':')?;
        if !is_contained(Path::new(resource)) {
            debug!("Rejecting collection reference outside its root: {}", reference);
            return None;
        }
        let Some(root) = self.resolve(collection) else {
            debug!("Collection '{}' not installed for '{}'", collection, reference);
            return None;
        };

        let direct = root.join(resource);
        if direct.is_file() {
            return Some(direct);
        }

        if !resource.starts_with(&format!("{}/", kind)) {
            let file = if resource.ends_with(".md") {
                resource.to_string()
            } else {
                format!("{}.md", resource)
            };
            let natural = root.join(kind).join(file);
            if natural.is_file() {
                return Some(natural);
            }
        }

        debug!("Collection resource not found: {}", reference);
        None
    }

    /// Per-collection resource directories of `kind` (e.g. `agents`), in
    /// search path order, as `(collection name, directory)`.
    pub fn resource_dirs(&self, kind: &str) -> Vec<(String, PathBuf)> {
        self.list_collections()
            .into_iter()
            .map(|(name, path)| (name, path.join(kind)))
            .filter(|(_, dir)| dir.is_dir())
            .collect()
    }
}

/// Whether `path` only descends (no root, prefix or `..` components).
fn is_contained(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Whether `path` is a directory carrying the collection marker.
pub fn is_collection_dir(path: &Path) -> bool {
    path.is_dir() && path.join(COLLECTION_MARKER).is_file()
}

/// Names (file stems) of the `.md` files directly inside `dir`, sorted,
/// skipping README files.
pub fn list_markdown_names(dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "md"))
        .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().to_string()))
        .filter(|stem| !stem.eq_ignore_ascii_case("readme"))
        .collect();
    names.sort();
    names
}

// ===== Lock file =====

/// One installed collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionLockEntry {
    pub name: String,
    pub source: String,
    pub commit: Option<String>,
    pub path: String,
    /// RFC 3339 install time
    pub installed_at: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct LockFile {
    #[serde(default)]
    collections: BTreeMap<String, CollectionLockEntry>,
}

/// The `collections.lock` JSON file.
#[derive(Debug)]
pub struct CollectionLock {
    path: PathBuf,
    entries: BTreeMap<String, CollectionLockEntry>,
}

impl CollectionLock {
    /// Load the lock at `path`; a missing file is an empty lock.
    pub fn load(path: &Path) -> Result<Self> {
        let entries = match fs::read_to_string(path) {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => {
                let file: LockFile = serde_json::from_str(&content).map_err(|e| {
                    Error::Other(format!("Failed to parse {}: {}", path.display(), e))
                })?;
                file.collections
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(Error::Other(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )));
            }
        };
        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record an install (replacing any previous entry) and save.
    pub fn add(
        &mut self,
        name: &str,
        source: &str,
        commit: Option<&str>,
        install_path: &Path,
    ) -> Result<()> {
        self.entries.insert(
            name.to_string(),
            CollectionLockEntry {
                name: name.to_string(),
                source: source.to_string(),
                commit: commit.map(str::to_string),
                path: install_path.to_string_lossy().to_string(),
                installed_at: Utc::now().to_rfc3339(),
            },
        );
        self.save()
    }

    /// Remove an entry and save. Returns whether it existed.
    pub fn remove(&mut self, name: &str) -> Result<bool> {
        if self.entries.remove(name).is_none() {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    pub fn get(&self, name: &str) -> Option<&CollectionLockEntry> {
        self.entries.get(name)
    }

    pub fn is_installed(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Installed entries sorted by name.
    pub fn list_installed(&self) -> Vec<&CollectionLockEntry> {
        self.entries.values().collect()
    }

    fn save(&self) -> Result<()> {
        let file = LockFile {
            collections: self.entries.clone(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        write_atomic(&self.path, &json)
    }
}
