//! Scope-precedence settings resolution.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. Session (`~/.amplifier/projects/<slug>/sessions/<id>/settings.yaml`)
//! 2. Local (`.amplifier/settings.local.yaml`)
//! 3. Project (`.amplifier/settings.yaml`)
//! 4. User (`~/.amplifier/settings.yaml`)
//! 5. Bundled defaults
//!
//! Reads never fail: a scope whose file is unreadable or malformed is
//! skipped with a warning. Writes target exactly one scope file and do fail.

use crate::merge::deep_merge;
use crate::models::{ConfigTree, ModuleEntry};
use crate::paths::AmplifierPaths;
use crate::settings::Scope;
use crate::settings::sources::{FileSource, SettingsSource, StaticSource, write_settings};
use crate::{Error, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Module that owns the write-path permission lists.
pub const FILESYSTEM_TOOL: &str = "tool-filesystem";

/// A resolved value with the scope it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T> {
    /// The resolved value
    pub value: T,
    /// Highest-precedence scope that set it
    pub source: Scope,
}

impl<T> Resolved<T> {
    pub fn new(value: T, source: Scope) -> Self {
        Self { value, source }
    }
}

/// Which filesystem permission list to operate on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePathKind {
    Allowed,
    Denied,
}

impl WritePathKind {
    pub fn config_key(&self) -> &'static str {
        match self {
            WritePathKind::Allowed => "allowed_write_paths",
            WritePathKind::Denied => "denied_write_paths",
        }
    }
}

/// Scope-aware settings over an ordered list of sources.
pub struct AppSettings {
    /// Lowest precedence first.
    sources: Vec<Box<dyn SettingsSource>>,
}

impl std::fmt::Debug for AppSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let scopes: Vec<Scope> = self.sources.iter().map(|s| s.scope()).collect();
        f.debug_struct("AppSettings").field("scopes", &scopes).finish()
    }
}

impl AppSettings {
    /// Settings over explicit sources; they are sorted into precedence order.
    pub fn new(mut sources: Vec<Box<dyn SettingsSource>>) -> Self {
        sources.sort_by_key(|s| s.scope());
        Self { sources }
    }

    /// Settings over the standard files, plus a session scope when
    /// `session_id` is given.
    pub fn for_paths(paths: &AmplifierPaths, session_id: Option<&str>) -> Self {
        let mut sources: Vec<Box<dyn SettingsSource>> = Vec::new();
        match StaticSource::bundled() {
            Ok(bundled) => sources.push(Box::new(bundled)),
            Err(e) => warn!("Ignoring bundled settings: {}", e),
        }
        sources.push(Box::new(FileSource::new(Scope::User, paths.user_settings())));
        sources.push(Box::new(FileSource::new(Scope::Project, paths.project_settings())));
        sources.push(Box::new(FileSource::new(Scope::Local, paths.local_settings())));
        if let Some(id) = session_id {
            sources.push(Box::new(FileSource::new(
                Scope::Session,
                paths.session_settings(id),
            )));
        }
        Self::new(sources)
    }

    /// Backing file of a scope, if it has one.
    pub fn scope_path(&self, scope: Scope) -> Option<&Path> {
        self.source(scope).and_then(|s| s.path())
    }

    fn source(&self, scope: Scope) -> Option<&dyn SettingsSource> {
        self.sources
            .iter()
            .find(|s| s.scope() == scope)
            .map(|s| s.as_ref())
    }

    fn load_source(source: &dyn SettingsSource) -> Option<ConfigTree> {
        match source.load() {
            Ok(tree) => tree,
            Err(e) => {
                let location = source
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| source.scope().to_string());
                warn!("Skipping malformed {} settings ({}): {}", source.scope(), location, e);
                None
            }
        }
    }

    /// One scope's tree on its own (empty when absent or malformed).
    pub fn scope_settings(&self, scope: Scope) -> ConfigTree {
        self.source(scope)
            .and_then(Self::load_source)
            .unwrap_or_default()
    }

    /// Every scope deep-merged, later scopes winning.
    pub fn get_merged_settings(&self) -> ConfigTree {
        let mut merged = ConfigTree::new();
        for source in &self.sources {
            if let Some(tree) = Self::load_source(source.as_ref()) {
                merged = deep_merge(&merged, &tree);
            }
        }
        merged
    }

    /// Look up a dotted key in the merged tree, tagged with the most specific
    /// scope that sets it.
    pub fn get(&self, key: &str) -> Option<Resolved<Value>> {
        let merged = self.get_merged_settings();
        let value = get_dotted(&merged, key)?.clone();
        let source = self
            .sources
            .iter()
            .rev()
            .find(|s| {
                Self::load_source(s.as_ref())
                    .is_some_and(|tree| get_dotted(&tree, key).is_some())
            })
            .map(|s| s.scope())
            .unwrap_or(Scope::Bundled);
        Some(Resolved::new(value, source))
    }

    fn get_string(&self, key: &str) -> Option<Resolved<String>> {
        let resolved = self.get(key)?;
        match resolved.value {
            Value::String(s) if !s.is_empty() => Some(Resolved::new(s, resolved.source)),
            _ => None,
        }
    }

    // ----- Provider -----

    /// `config.providers` from the merged settings.
    ///
    /// A malformed list is logged and treated as absent.
    pub fn provider_overrides(&self) -> Vec<ModuleEntry> {
        let merged = self.get_merged_settings();
        let Some(value) = get_dotted(&merged, "config.providers") else {
            return Vec::new();
        };
        ModuleEntry::list_from_value(value).unwrap_or_else(|e| {
            warn!("Ignoring config.providers: {}", e);
            Vec::new()
        })
    }

    // ----- Profile -----

    /// `profile.active`, falling back to the older top-level `active_profile`.
    pub fn get_active_profile(&self) -> Option<Resolved<String>> {
        self.get_string("profile.active")
            .or_else(|| self.get_string("active_profile"))
    }

    pub fn set_active_profile(&self, name: &str, scope: Scope) -> Result<()> {
        self.set(scope, "profile.active", Value::String(name.to_string()))
    }

    /// Remove both the current and the older active-profile keys.
    pub fn clear_active_profile(&self, scope: Scope) -> Result<bool> {
        let current = self.unset(scope, "profile.active")?;
        let legacy = self.unset(scope, "active_profile")?;
        Ok(current || legacy)
    }

    /// `profile.default`, read from the project scope only.
    pub fn get_project_default_profile(&self) -> Option<String> {
        get_dotted(&self.scope_settings(Scope::Project), "profile.default")
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    pub fn set_project_default_profile(&self, name: &str) -> Result<()> {
        self.set(Scope::Project, "profile.default", Value::String(name.to_string()))
    }

    /// `default_profile` from the bundled defaults.
    pub fn get_system_default_profile(&self) -> Option<String> {
        get_dotted(&self.scope_settings(Scope::Bundled), "default_profile")
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    /// The profile a session should use: active, else project default, else
    /// the bundled default.
    pub fn effective_profile(&self) -> Option<Resolved<String>> {
        self.get_active_profile()
            .or_else(|| {
                self.get_project_default_profile()
                    .map(|name| Resolved::new(name, Scope::Project))
            })
            .or_else(|| {
                self.get_system_default_profile()
                    .map(|name| Resolved::new(name, Scope::Bundled))
            })
    }

    // ----- Sources -----

    /// `sources.modules` at one scope.
    pub fn module_sources(&self, scope: Scope) -> ConfigTree {
        get_dotted(&self.scope_settings(scope), "sources.modules")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default()
    }

    // ----- Filesystem write permissions -----

    /// `(path, scope)` pairs from `tool-filesystem` config across scopes, most
    /// specific scope first. A path listed in several scopes is reported once,
    /// under the most specific.
    pub fn get_write_paths(&self, kind: WritePathKind) -> Vec<(String, Scope)> {
        let mut result: Vec<(String, Scope)> = Vec::new();
        for source in self.sources.iter().rev() {
            let Some(tree) = Self::load_source(source.as_ref()) else {
                continue;
            };
            for path in filesystem_paths(&tree, kind) {
                if !result.iter().any(|(p, _)| *p == path) {
                    result.push((path, source.scope()));
                }
            }
        }
        result
    }

    /// Add a path (made absolute) to a permission list at `scope`, returning
    /// the stored form.
    pub fn add_write_path(&self, kind: WritePathKind, path: &str, scope: Scope) -> Result<String> {
        let resolved = absolute_path_string(path)?;
        let file = self.writable_path(scope)?;
        let mut tree = read_for_update(&file)?;

        let config = filesystem_tool_config(&mut tree)?;
        let list = config
            .entry(kind.config_key())
            .or_insert_with(|| Value::Array(Vec::new()));
        if !list.is_array() {
            *list = Value::Array(Vec::new());
        }
        if let Value::Array(items) = list {
            let value = Value::String(resolved.clone());
            if !items.contains(&value) {
                items.push(value);
            }
        }

        write_settings(&file, &tree)?;
        debug!("Added {} to {} at {} scope", resolved, kind.config_key(), scope);
        Ok(resolved)
    }

    /// Remove a path from a permission list at `scope`. Matches either the
    /// absolute form or the path exactly as given. Returns whether it was
    /// present.
    pub fn remove_write_path(&self, kind: WritePathKind, path: &str, scope: Scope) -> Result<bool> {
        let resolved = absolute_path_string(path)?;
        let file = self.writable_path(scope)?;
        let mut tree = read_for_update(&file)?;

        let Some(items) = tree
            .get_mut("modules")
            .and_then(|m| m.get_mut("tools"))
            .and_then(Value::as_array_mut)
            .and_then(|tools| {
                tools
                    .iter_mut()
                    .find(|t| t.get("module").and_then(Value::as_str) == Some(FILESYSTEM_TOOL))
            })
            .and_then(|tool| tool.get_mut("config"))
            .and_then(|config| config.get_mut(kind.config_key()))
            .and_then(Value::as_array_mut)
        else {
            return Ok(false);
        };

        let before = items.len();
        items.retain(|item| {
            item.as_str()
                .is_none_or(|s| s != resolved.as_str() && s != path)
        });
        if items.len() == before {
            return Ok(false);
        }
        write_settings(&file, &tree)?;
        Ok(true)
    }

    // ----- Scoped writes -----

    fn writable_path(&self, scope: Scope) -> Result<PathBuf> {
        match self.scope_path(scope) {
            Some(path) if scope.is_writable() => Ok(path.to_path_buf()),
            _ if scope == Scope::Session => Err(Error::InvalidScope(
                "session (no session id configured)".to_string(),
            )),
            _ => Err(Error::InvalidScope(scope.to_string())),
        }
    }

    /// Set a dotted key at one scope, replacing whatever was there.
    pub fn set(&self, scope: Scope, key: &str, value: Value) -> Result<()> {
        let file = self.writable_path(scope)?;
        let mut tree = read_for_update(&file)?;
        set_dotted(&mut tree, key, value)?;
        write_settings(&file, &tree)?;
        debug!("Set {} in {} settings", key, scope);
        Ok(())
    }

    /// Remove a dotted key at one scope, pruning sections left empty.
    /// Returns whether the key was present.
    pub fn unset(&self, scope: Scope, key: &str) -> Result<bool> {
        let file = self.writable_path(scope)?;
        let mut tree = read_for_update(&file)?;
        if !remove_dotted(&mut tree, key) {
            return Ok(false);
        }
        write_settings(&file, &tree)?;
        debug!("Removed {} from {} settings", key, scope);
        Ok(true)
    }
}

/// Read a scope file for modification. Unlike reads for merging, a malformed
/// file is an error so that it is never overwritten.
fn read_for_update(path: &Path) -> Result<ConfigTree> {
    Ok(FileSource::new(Scope::User, path).load()?.unwrap_or_default())
}

/// Look up `a.b.c` in a tree.
pub fn get_dotted<'a>(tree: &'a ConfigTree, key: &str) -> Option<&'a Value> {
    let mut parts = key.split('.');
    let first = parts.next()?;
    let mut current = tree.get(first)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

/// Set `a.b.c`, creating intermediate mappings.
///
/// Fails when an intermediate key holds a non-mapping value.
pub fn set_dotted(tree: &mut ConfigTree, key: &str, value: Value) -> Result<()> {
    let parts: Vec<&str> = key.split('.').collect();
    if parts.iter().any(|p| p.is_empty()) {
        return Err(Error::InvalidInput(format!("Invalid settings key: '{}'", key)));
    }
    let (last, parents) = parts
        .split_last()
        .ok_or_else(|| Error::InvalidInput(format!("Invalid settings key: '{}'", key)))?;

    let mut current = tree;
    for part in parents {
        let entry = current
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(ConfigTree::new()));
        current = entry.as_object_mut().ok_or_else(|| {
            Error::InvalidInput(format!(
                "Cannot set '{}': '{}' is not a mapping",
                key, part
            ))
        })?;
    }
    current.insert(last.to_string(), value);
    Ok(())
}

/// Remove `a.b.c`, then drop any parent mappings it leaves empty.
pub fn remove_dotted(tree: &mut ConfigTree, key: &str) -> bool {
    match key.split_once('.') {
        None => tree.remove(key).is_some(),
        Some((head, rest)) => {
            let Some(Value::Object(child)) = tree.get_mut(head) else {
                return false;
            };
            let removed = remove_dotted(child, rest);
            if removed && child.is_empty() {
                tree.remove(head);
            }
            removed
        }
    }
}

fn filesystem_paths(tree: &ConfigTree, kind: WritePathKind) -> Vec<String> {
    let Some(tools) = get_dotted(tree, "modules.tools").and_then(Value::as_array) else {
        return Vec::new();
    };
    tools
        .iter()
        .filter(|t| t.get("module").and_then(Value::as_str) == Some(FILESYSTEM_TOOL))
        .filter_map(|t| t.get("config")?.get(kind.config_key())?.as_array())
        .flatten()
        .filter_map(|p| p.as_str().map(str::to_string))
        .collect()
}

/// The `tool-filesystem` config mapping under `modules.tools`, created on
/// demand.
fn filesystem_tool_config(tree: &mut ConfigTree) -> Result<&mut ConfigTree> {
    let modules = tree
        .entry("modules")
        .or_insert_with(|| Value::Object(ConfigTree::new()))
        .as_object_mut()
        .ok_or_else(|| Error::InvalidInput("'modules' is not a mapping".into()))?;
    let tools = modules
        .entry("tools")
        .or_insert_with(|| Value::Array(Vec::new()))
        .as_array_mut()
        .ok_or_else(|| Error::InvalidInput("'modules.tools' is not a list".into()))?;

    let index = match tools
        .iter()
        .position(|t| t.get("module").and_then(Value::as_str) == Some(FILESYSTEM_TOOL))
    {
        Some(index) => index,
        None => {
            tools.push(ModuleEntry::new(FILESYSTEM_TOOL).to_value());
            tools.len() - 1
        }
    };

    let tool = tools[index]
        .as_object_mut()
        .ok_or_else(|| Error::InvalidInput("tool-filesystem entry is not a mapping".into()))?;
    let config = tool
        .entry("config")
        .or_insert_with(|| Value::Object(ConfigTree::new()));
    if !config.is_object() {
        *config = Value::Object(ConfigTree::new());
    }
    config
        .as_object_mut()
        .ok_or_else(|| Error::InvalidInput("tool-filesystem config is not a mapping".into()))
}

fn absolute_path_string(path: &str) -> Result<String> {
    let absolute = std::path::absolute(path)?;
    Ok(absolute.to_string_lossy().to_string())
}
