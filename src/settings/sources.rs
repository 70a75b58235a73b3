//! Where settings trees come from.
//!
//! The merge logic in [`AppSettings`](super::AppSettings) only sees
//! [`SettingsSource`]s; file paths are resolved at the boundary.

use crate::models::ConfigTree;
use crate::paths::write_atomic;
use crate::settings::Scope;
use crate::{Error, Result};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Bundled defaults, the lowest-precedence scope.
const BUNDLED_DEFAULTS: &str = include_str!("defaults.yaml");

/// One scope's settings tree.
pub trait SettingsSource {
    fn scope(&self) -> Scope;

    /// Load the tree. `Ok(None)` means the scope has nothing configured.
    fn load(&self) -> Result<Option<ConfigTree>>;

    /// Backing file, for sources that can be written.
    fn path(&self) -> Option<&Path> {
        None
    }
}

/// A settings file; format chosen by extension.
#[derive(Debug, Clone)]
pub struct FileSource {
    scope: Scope,
    path: PathBuf,
}

impl FileSource {
    pub fn new(scope: Scope, path: impl Into<PathBuf>) -> Self {
        Self {
            scope,
            path: path.into(),
        }
    }
}

impl SettingsSource for FileSource {
    fn scope(&self) -> Scope {
        self.scope
    }

    fn load(&self) -> Result<Option<ConfigTree>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        parse_settings(&self.path, &content).map(Some)
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

/// An in-memory tree.
#[derive(Debug, Clone)]
pub struct StaticSource {
    scope: Scope,
    tree: ConfigTree,
}

impl StaticSource {
    pub fn new(scope: Scope, tree: ConfigTree) -> Self {
        Self { scope, tree }
    }

    /// The defaults compiled into the binary.
    pub fn bundled() -> Result<Self> {
        let tree = parse_yaml(BUNDLED_DEFAULTS)?;
        Ok(Self::new(Scope::Bundled, tree))
    }
}

impl SettingsSource for StaticSource {
    fn scope(&self) -> Scope {
        self.scope
    }

    fn load(&self) -> Result<Option<ConfigTree>> {
        Ok(Some(self.tree.clone()))
    }
}

/// Parse settings text by file extension: `.toml`, `.json`, else YAML.
///
/// An empty document is an empty tree; a document whose top level is not a
/// mapping is an error.
pub fn parse_settings(path: &Path, content: &str) -> Result<ConfigTree> {
    let value = match extension(path) {
        "toml" => serde_json::to_value(toml::from_str::<toml::Value>(content)?)?,
        "json" if content.trim().is_empty() => Value::Null,
        "json" => serde_json::from_str(content)?,
        _ => return parse_yaml(content),
    };
    into_tree(path, value)
}

/// Serialise settings for `path`, matching [`parse_settings`].
pub fn render_settings(path: &Path, tree: &ConfigTree) -> Result<String> {
    match extension(path) {
        "toml" => Ok(toml::to_string_pretty(tree)?),
        "json" => Ok(serde_json::to_string_pretty(tree)?),
        _ => Ok(serde_yaml::to_string(tree)?),
    }
}

/// Write a settings tree atomically.
pub fn write_settings(path: &Path, tree: &ConfigTree) -> Result<()> {
    write_atomic(path, &render_settings(path, tree)?)
}

fn parse_yaml(content: &str) -> Result<ConfigTree> {
    if content.trim().is_empty() {
        return Ok(ConfigTree::new());
    }
    match serde_yaml::from_str::<Value>(content)? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(ConfigTree::new()),
        other => Err(Error::InvalidInput(format!(
            "settings must be a mapping, got {}",
            other
        ))),
    }
}

fn into_tree(path: &Path, value: Value) -> Result<ConfigTree> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(ConfigTree::new()),
        other => Err(Error::InvalidInput(format!(
            "{}: settings must be a mapping, got {}",
            path.display(),
            other
        ))),
    }
}

fn extension(path: &Path) -> &str {
    path.extension().and_then(|e| e.to_str()).unwrap_or("")
}
