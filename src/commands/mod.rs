//! Command implementations for the amp CLI.
//!
//! Each command returns a result type implementing [`Output`], rendered as
//! JSON by default or as text with `-H`. Commands are grouped by subject:
//! - `profile_*` - discovery, compilation and selection
//! - `settings_*` - scoped settings reads and writes, write-path permissions
//! - `collection_*` - search paths, lock files and lock registration
//! - `module_resolve` - module source resolution
//! - `agent_*` - agent discovery
//! - `run_dry` - full session configuration

use crate::agents::{AgentLoader, FileAgentLoader};
use crate::collections::{CollectionLock, CollectionLockEntry, CollectionResolver};
use crate::models::ConfigTree;
use crate::modules::{ModuleResolver, ResolvedModule};
use crate::paths::AmplifierPaths;
use crate::profiles::{Profile, ProfileLoader, load_profile_file};
use crate::runtime::{AppConfig, AppConfigRequest, parse_cli_overlay, resolve_app_config};
use crate::settings::{AppSettings, Scope, WritePathKind};
use crate::{Error, Result};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Command results that can be serialized to JSON or formatted for humans.
pub trait Output {
    /// Serialize to JSON string.
    fn to_json(&self) -> String;

    /// Format for human-readable output.
    fn to_human(&self) -> String;
}

fn json_string<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| format!(r#"{{"error": "{}"}}"#, e))
}

fn yaml_string(value: &impl Serialize) -> String {
    serde_yaml::to_string(value)
        .map(|s| s.trim_end().to_string())
        .unwrap_or_else(|e| format!("<unrenderable: {}>", e))
}

/// Everything a command needs about the current project.
#[derive(Debug)]
pub struct Workspace {
    pub paths: AmplifierPaths,
    pub settings: AppSettings,
    pub profiles: ProfileLoader,
}

impl Workspace {
    /// Open the workspace rooted at `project_root`, honouring `AMPLIFIER_HOME`.
    pub fn open(project_root: &Path, session_id: Option<&str>) -> Self {
        Self::with_paths(AmplifierPaths::for_project(project_root), session_id)
    }

    pub fn with_paths(paths: AmplifierPaths, session_id: Option<&str>) -> Self {
        let settings = AppSettings::for_paths(&paths, session_id);
        let profiles = ProfileLoader::for_paths(&paths);
        Self {
            paths,
            settings,
            profiles,
        }
    }

    /// The explicit profile name, else the effective one.
    fn profile_name(&self, explicit: Option<String>) -> Result<String> {
        explicit
            .or_else(|| self.settings.effective_profile().map(|r| r.value))
            .ok_or_else(|| Error::ProfileNotFound("no active or default profile".to_string()))
    }
}

fn parse_scope(scope: &str) -> Result<Scope> {
    scope.parse().map_err(Error::InvalidScope)
}

fn load_overlays(paths: &[PathBuf]) -> Result<Vec<Profile>> {
    paths.iter().map(|p| load_profile_file(p)).collect()
}

// ===== Profile =====

#[derive(Serialize)]
pub struct ProfileListEntry {
    pub name: String,
    pub location: String,
    pub active: bool,
}

#[derive(Serialize)]
pub struct ProfileList {
    pub active: Option<String>,
    pub profiles: Vec<ProfileListEntry>,
}

impl Output for ProfileList {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        if self.profiles.is_empty() {
            return "No profiles found.".to_string();
        }
        let mut lines = vec![format!("{} profile(s):", self.profiles.len())];
        for p in &self.profiles {
            let marker = if p.active { "*" } else { " " };
            lines.push(format!("{} {:<24} ({})", marker, p.name, p.location));
        }
        lines.join("\n")
    }
}

pub fn profile_list(ws: &Workspace) -> Result<ProfileList> {
    let active = ws.settings.effective_profile().map(|r| r.value);
    let profiles = ws
        .profiles
        .list_profiles()
        .into_iter()
        .map(|(name, location)| ProfileListEntry {
            active: active.as_deref() == Some(name.as_str()),
            location: location.to_string(),
            name,
        })
        .collect();
    Ok(ProfileList { active, profiles })
}

#[derive(Serialize)]
pub struct ProfileShow {
    pub name: String,
    /// Inheritance chain, root first
    pub chain: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<ConfigTree>,
}

impl Output for ProfileShow {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        let mut out = format!("Profile: {}\nChain: {}", self.name, self.chain.join(" -> "));
        if let Some(profile) = &self.profile {
            out.push_str("\n\n");
            out.push_str(&yaml_string(profile));
        }
        out
    }
}

pub fn profile_show(ws: &Workspace, name: &str, chain_only: bool) -> Result<ProfileShow> {
    let chain = ws.profiles.resolve_chain(name)?;
    let names = chain.iter().map(|p| p.name().to_string()).collect();
    let profile = if chain_only {
        None
    } else {
        Some(ws.profiles.load_profile(name)?.to_tree()?)
    };
    Ok(ProfileShow {
        name: name.to_string(),
        chain: names,
        profile,
    })
}

#[derive(Serialize)]
pub struct CompiledProfile {
    pub profile: String,
    pub mount_plan: ConfigTree,
}

impl Output for CompiledProfile {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        format!(
            "Mount plan for profile '{}':\n\n{}",
            self.profile,
            yaml_string(&self.mount_plan)
        )
    }
}

/// Compile a profile (plus overlay files) into a mount plan.
///
/// The compiled plan, overlays included, must name both an orchestrator and
/// a context.
pub fn profile_compile(
    ws: &Workspace,
    name: Option<String>,
    overlay_files: &[PathBuf],
) -> Result<CompiledProfile> {
    let name = ws.profile_name(name)?;
    let overlays = load_overlays(overlay_files)?;
    let plan = ws.profiles.compile_profile(&name, &overlays)?;
    plan.validate_complete(&name)?;
    Ok(CompiledProfile {
        profile: name,
        mount_plan: plan.to_tree(),
    })
}

#[derive(Serialize)]
pub struct ProfileSelected {
    pub name: String,
    pub scope: Scope,
    pub path: Option<PathBuf>,
}

impl Output for ProfileSelected {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        match &self.path {
            Some(path) => format!(
                "Set profile '{}' at {} scope ({})",
                self.name,
                self.scope,
                path.display()
            ),
            None => format!("Set profile '{}' at {} scope", self.name, self.scope),
        }
    }
}

pub fn profile_use(ws: &Workspace, name: &str, scope: &str) -> Result<ProfileSelected> {
    let scope = parse_scope(scope)?;
    if ws.profiles.find_profile_file(name).is_none() {
        return Err(Error::ProfileNotFound(name.to_string()));
    }
    ws.settings.set_active_profile(name, scope)?;
    Ok(ProfileSelected {
        name: name.to_string(),
        scope,
        path: ws.settings.scope_path(scope).map(Path::to_path_buf),
    })
}

#[derive(Serialize)]
pub struct ProfileReset {
    pub scope: Scope,
    pub cleared: bool,
}

impl Output for ProfileReset {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        if self.cleared {
            format!("Cleared active profile at {} scope", self.scope)
        } else {
            format!("No active profile set at {} scope", self.scope)
        }
    }
}

pub fn profile_reset(ws: &Workspace, scope: &str) -> Result<ProfileReset> {
    let scope = parse_scope(scope)?;
    let cleared = ws.settings.clear_active_profile(scope)?;
    Ok(ProfileReset { scope, cleared })
}

#[derive(Serialize)]
pub struct ProjectDefault {
    pub name: Option<String>,
    pub updated: bool,
}

impl Output for ProjectDefault {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        match (&self.name, self.updated) {
            (Some(name), true) => format!("Project default profile set to '{}'", name),
            (Some(name), false) => format!("Project default profile: {}", name),
            (None, _) => "No project default profile set".to_string(),
        }
    }
}

pub fn profile_default(ws: &Workspace, name: Option<String>) -> Result<ProjectDefault> {
    match name {
        Some(name) => {
            if ws.profiles.find_profile_file(&name).is_none() {
                return Err(Error::ProfileNotFound(name));
            }
            ws.settings.set_project_default_profile(&name)?;
            Ok(ProjectDefault {
                name: Some(name),
                updated: true,
            })
        }
        None => Ok(ProjectDefault {
            name: ws.settings.get_project_default_profile(),
            updated: false,
        }),
    }
}

#[derive(Serialize)]
pub struct CurrentProfile {
    pub name: Option<String>,
    /// Scope that selected it
    pub source: Option<Scope>,
}

impl Output for CurrentProfile {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        match (&self.name, self.source) {
            (Some(name), Some(source)) => format!("{} (from {})", name, source),
            (Some(name), None) => name.clone(),
            _ => "No profile selected".to_string(),
        }
    }
}

pub fn profile_current(ws: &Workspace) -> Result<CurrentProfile> {
    let current = ws.settings.effective_profile();
    Ok(CurrentProfile {
        name: current.as_ref().map(|r| r.value.clone()),
        source: current.map(|r| r.source),
    })
}

// ===== Settings =====

#[derive(Serialize)]
pub struct SettingsShow {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<Scope>,
    pub settings: ConfigTree,
}

impl Output for SettingsShow {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        let header = match self.scope {
            Some(scope) => format!("Settings ({} scope):", scope),
            None => "Merged settings:".to_string(),
        };
        if self.settings.is_empty() {
            return format!("{}\n  (empty)", header);
        }
        format!("{}\n{}", header, yaml_string(&self.settings))
    }
}

pub fn settings_show(ws: &Workspace, scope: Option<&str>) -> Result<SettingsShow> {
    match scope {
        Some(scope) => {
            let scope = parse_scope(scope)?;
            Ok(SettingsShow {
                scope: Some(scope),
                settings: ws.settings.scope_settings(scope),
            })
        }
        None => Ok(SettingsShow {
            scope: None,
            settings: ws.settings.get_merged_settings(),
        }),
    }
}

#[derive(Serialize)]
pub struct SettingValue {
    pub key: String,
    pub value: Option<Value>,
    /// Most specific scope defining the key
    pub scope: Option<Scope>,
}

impl Output for SettingValue {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        match (&self.value, self.scope) {
            (Some(Value::String(s)), Some(scope)) => format!("{} = {} ({})", self.key, s, scope),
            (Some(value), Some(scope)) => format!("{} = {} ({})", self.key, value, scope),
            _ => format!("{} is not set", self.key),
        }
    }
}

pub fn settings_get(ws: &Workspace, key: &str) -> Result<SettingValue> {
    let resolved = ws.settings.get(key);
    Ok(SettingValue {
        key: key.to_string(),
        scope: resolved.as_ref().map(|r| r.source),
        value: resolved.map(|r| r.value),
    })
}

#[derive(Serialize)]
pub struct SettingWritten {
    pub key: String,
    pub scope: Scope,
    /// Value written; absent for removals
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Whether a removal found the key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed: Option<bool>,
}

impl Output for SettingWritten {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        match (&self.value, self.removed) {
            (Some(value), _) => format!("Set {} = {} at {} scope", self.key, value, self.scope),
            (None, Some(true)) => format!("Removed {} from {} scope", self.key, self.scope),
            (None, _) => format!("{} was not set at {} scope", self.key, self.scope),
        }
    }
}

/// Set a dotted key. The value is parsed as YAML so `true`, `3` and
/// `[a, b]` keep their types.
pub fn settings_set(ws: &Workspace, key: &str, raw: &str, scope: &str) -> Result<SettingWritten> {
    let scope = parse_scope(scope)?;
    let value: Value = if raw.trim().is_empty() {
        Value::String(raw.to_string())
    } else {
        serde_yaml::from_str(raw)?
    };
    ws.settings.set(scope, key, value.clone())?;
    Ok(SettingWritten {
        key: key.to_string(),
        scope,
        value: Some(value),
        removed: None,
    })
}

pub fn settings_unset(ws: &Workspace, key: &str, scope: &str) -> Result<SettingWritten> {
    let scope = parse_scope(scope)?;
    let removed = ws.settings.unset(scope, key)?;
    Ok(SettingWritten {
        key: key.to_string(),
        scope,
        value: None,
        removed: Some(removed),
    })
}

// ===== Write paths =====

fn write_path_kind(denied: bool) -> WritePathKind {
    if denied {
        WritePathKind::Denied
    } else {
        WritePathKind::Allowed
    }
}

#[derive(Serialize)]
pub struct WritePathEntry {
    pub path: String,
    pub scope: Scope,
}

#[derive(Serialize)]
pub struct WritePathList {
    /// `allowed_write_paths` or `denied_write_paths`
    pub kind: &'static str,
    pub paths: Vec<WritePathEntry>,
}

impl Output for WritePathList {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        if self.paths.is_empty() {
            return format!("{}: (none)", self.kind);
        }
        let mut lines = vec![format!("{}:", self.kind)];
        for entry in &self.paths {
            lines.push(format!("  {} ({})", entry.path, entry.scope));
        }
        lines.join("\n")
    }
}

pub fn settings_paths_list(ws: &Workspace, denied: bool) -> Result<WritePathList> {
    let kind = write_path_kind(denied);
    let paths = ws
        .settings
        .get_write_paths(kind)
        .into_iter()
        .map(|(path, scope)| WritePathEntry { path, scope })
        .collect();
    Ok(WritePathList {
        kind: kind.config_key(),
        paths,
    })
}

#[derive(Serialize)]
pub struct WritePathChanged {
    pub kind: &'static str,
    pub path: String,
    pub scope: Scope,
    /// False when a removal found nothing to remove
    pub changed: bool,
}

impl Output for WritePathChanged {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        if self.changed {
            format!("Updated {} at {} scope: {}", self.kind, self.scope, self.path)
        } else {
            format!("{} not in {} at {} scope", self.path, self.kind, self.scope)
        }
    }
}

/// Add a path to `tool-filesystem`'s permission list at one scope. The path
/// is stored in absolute form.
pub fn settings_paths_add(
    ws: &Workspace,
    path: &str,
    denied: bool,
    scope: &str,
) -> Result<WritePathChanged> {
    let scope = parse_scope(scope)?;
    let kind = write_path_kind(denied);
    let stored = ws.settings.add_write_path(kind, path, scope)?;
    Ok(WritePathChanged {
        kind: kind.config_key(),
        path: stored,
        scope,
        changed: true,
    })
}

pub fn settings_paths_remove(
    ws: &Workspace,
    path: &str,
    denied: bool,
    scope: &str,
) -> Result<WritePathChanged> {
    let scope = parse_scope(scope)?;
    let kind = write_path_kind(denied);
    let changed = ws.settings.remove_write_path(kind, path, scope)?;
    Ok(WritePathChanged {
        kind: kind.config_key(),
        path: path.to_string(),
        scope,
        changed,
    })
}

// ===== Collections =====

#[derive(Serialize)]
pub struct CollectionEntry {
    pub name: String,
    pub path: PathBuf,
    /// Recorded in the user or project lock file
    pub locked: bool,
}

#[derive(Serialize)]
pub struct CollectionList {
    pub collections: Vec<CollectionEntry>,
}

impl Output for CollectionList {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        if self.collections.is_empty() {
            return "No collections found.".to_string();
        }
        self.collections
            .iter()
            .map(|c| {
                let marker = if c.locked { "" } else { " (unlocked)" };
                format!("{:<24} {}{}", c.name, c.path.display(), marker)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Installed collections, each marked with whether a lock file records it.
/// An unreadable lock file is logged and treated as empty.
pub fn collection_list(ws: &Workspace) -> Result<CollectionList> {
    let mut locks = Vec::new();
    for local in [false, true] {
        let path = ws.paths.collections_lock(local);
        match CollectionLock::load(&path) {
            Ok(lock) => locks.push(lock),
            Err(e) => warn!("Ignoring lock file {}: {}", path.display(), e),
        }
    }

    let collections = CollectionResolver::for_paths(&ws.paths)
        .list_collections()
        .into_iter()
        .map(|(name, path)| CollectionEntry {
            locked: locks.iter().any(|lock| lock.is_installed(&name)),
            name,
            path,
        })
        .collect();
    Ok(CollectionList { collections })
}

#[derive(Serialize)]
pub struct CollectionResolved {
    pub reference: String,
    pub path: PathBuf,
}

impl Output for CollectionResolved {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        format!("{} -> {}", self.reference, self.path.display())
    }
}

/// Resolve a bare collection name, or a `collection:path` reference to a
/// file inside it.
pub fn collection_resolve(ws: &Workspace, reference: &str) -> Result<CollectionResolved> {
    let resolver = CollectionResolver::for_paths(&ws.paths);
    let path = match reference.split_once(':') {
        Some((collection, rel)) => resolver
            .resolve(collection)
            .map(|dir| dir.join(rel))
            .filter(|p| p.exists()),
        None => resolver.resolve(reference),
    };
    path.map(|path| CollectionResolved {
        reference: reference.to_string(),
        path,
    })
    .ok_or_else(|| Error::CollectionNotFound(reference.to_string()))
}

#[derive(Serialize)]
pub struct CollectionLocks {
    pub path: PathBuf,
    pub collections: Vec<CollectionLockEntry>,
}

impl Output for CollectionLocks {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        if self.collections.is_empty() {
            return format!("No collections recorded in {}", self.path.display());
        }
        let mut lines = vec![format!("{}:", self.path.display())];
        for c in &self.collections {
            let commit = c.commit.as_deref().map(|s| &s[..s.len().min(8)]).unwrap_or("-");
            lines.push(format!("  {:<20} {} @ {} ({})", c.name, c.source, commit, c.installed_at));
        }
        lines.join("\n")
    }
}

pub fn collection_locks(ws: &Workspace, local: bool) -> Result<CollectionLocks> {
    let lock = CollectionLock::load(&ws.paths.collections_lock(local))?;
    Ok(CollectionLocks {
        path: lock.path().to_path_buf(),
        collections: lock.list_installed().into_iter().cloned().collect(),
    })
}

#[derive(Serialize)]
pub struct CollectionRegistered {
    pub lock: PathBuf,
    pub entry: CollectionLockEntry,
}

impl Output for CollectionRegistered {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        format!(
            "Recorded {} ({}) in {}",
            self.entry.name,
            self.entry.source,
            self.lock.display()
        )
    }
}

/// Record a collection already present in the search paths, replacing any
/// earlier entry for it.
pub fn collection_register(
    ws: &Workspace,
    name: &str,
    source: &str,
    commit: Option<&str>,
    local: bool,
) -> Result<CollectionRegistered> {
    let install = CollectionResolver::for_paths(&ws.paths)
        .resolve(name)
        .ok_or_else(|| Error::CollectionNotFound(name.to_string()))?;
    let mut lock = CollectionLock::load(&ws.paths.collections_lock(local))?;
    lock.add(name, source, commit, &install)?;
    let entry = lock
        .get(name)
        .cloned()
        .ok_or_else(|| Error::CollectionNotFound(name.to_string()))?;
    Ok(CollectionRegistered {
        lock: lock.path().to_path_buf(),
        entry,
    })
}

#[derive(Serialize)]
pub struct CollectionUnregistered {
    pub name: String,
    pub lock: PathBuf,
    pub removed: bool,
}

impl Output for CollectionUnregistered {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        if self.removed {
            format!("Removed {} from {}", self.name, self.lock.display())
        } else {
            format!("{} is not recorded in {}", self.name, self.lock.display())
        }
    }
}

pub fn collection_unregister(
    ws: &Workspace,
    name: &str,
    local: bool,
) -> Result<CollectionUnregistered> {
    let mut lock = CollectionLock::load(&ws.paths.collections_lock(local))?;
    let removed = lock.remove(name)?;
    Ok(CollectionUnregistered {
        name: name.to_string(),
        lock: lock.path().to_path_buf(),
        removed,
    })
}

// ===== Modules =====

impl Output for ResolvedModule {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        format!("{} -> {} (via {})", self.module, self.source, self.layer)
    }
}

/// Resolve where a module would load from, using the profile's `source` for
/// that module as the hint.
pub fn module_resolve(ws: &Workspace, module: &str, profile: Option<String>) -> Result<ResolvedModule> {
    let hint = match &profile {
        Some(name) => profile_source_hint(&ws.profiles.load_profile(name)?, module),
        None => match ws.settings.effective_profile() {
            Some(name) => match ws.profiles.load_profile(&name.value) {
                Ok(p) => profile_source_hint(&p, module),
                Err(e) => {
                    warn!("Ignoring profile '{}' for source hints: {}", name.value, e);
                    None
                }
            },
            None => None,
        },
    };
    ModuleResolver::new(&ws.paths, &ws.settings).resolve(module, hint.as_ref())
}

fn profile_source_hint(profile: &Profile, module: &str) -> Option<Value> {
    let listed = profile
        .providers
        .iter()
        .chain(&profile.tools)
        .chain(&profile.hooks)
        .find(|e| e.module == module)
        .and_then(|e| e.source.clone());
    listed.or_else(|| {
        [&profile.session.orchestrator, &profile.session.context]
            .into_iter()
            .flatten()
            .find(|r| r.module() == module)
            .and_then(|r| r.source().cloned())
    })
}

// ===== Agents =====

#[derive(Serialize)]
pub struct AgentList {
    pub profile: Option<String>,
    pub agents: Vec<String>,
}

impl Output for AgentList {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        if self.agents.is_empty() {
            return "No agents found.".to_string();
        }
        let mut lines = vec![format!("{} agent(s):", self.agents.len())];
        lines.extend(self.agents.iter().map(|a| format!("  {}", a)));
        lines.join("\n")
    }
}

fn agent_loader(ws: &Workspace, profile: Option<String>) -> Result<(Option<String>, FileAgentLoader)> {
    let explicit = profile.is_some();
    let Some(name) = profile.or_else(|| ws.settings.effective_profile().map(|r| r.value)) else {
        return Ok((None, FileAgentLoader::for_paths(&ws.paths, &[])));
    };
    match ws.profiles.load_profile(&name) {
        Ok(p) => {
            let dirs = ws.profiles.agent_dirs(&p, &[]);
            Ok((Some(name), FileAgentLoader::for_paths(&ws.paths, &dirs)))
        }
        Err(e) if explicit => Err(e),
        Err(e) => {
            warn!("Ignoring profile '{}' for agent dirs: {}", name, e);
            Ok((None, FileAgentLoader::for_paths(&ws.paths, &[])))
        }
    }
}

pub fn agent_list(ws: &Workspace, profile: Option<String>) -> Result<AgentList> {
    let (profile, loader) = agent_loader(ws, profile)?;
    Ok(AgentList {
        profile,
        agents: loader.list_agents(),
    })
}

#[derive(Serialize)]
pub struct AgentShow {
    pub name: String,
    pub origin: String,
    pub path: PathBuf,
    pub fragment: ConfigTree,
}

impl Output for AgentShow {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        format!(
            "Agent: {} ({}, {})\n\n{}",
            self.name,
            self.origin,
            self.path.display(),
            yaml_string(&self.fragment)
        )
    }
}

pub fn agent_show(ws: &Workspace, name: &str, profile: Option<String>) -> Result<AgentShow> {
    let (_, loader) = agent_loader(ws, profile)?;
    let resolved = loader
        .resolve(name)
        .ok_or_else(|| Error::AgentNotFound(name.to_string()))?;
    let agent = loader.load_agent(name)?;
    Ok(AgentShow {
        name: name.to_string(),
        origin: resolved.origin.to_string(),
        path: resolved.path,
        fragment: agent.to_mount_plan_fragment(),
    })
}

// ===== Run =====

/// Options for `amp run`.
#[derive(Debug, Default)]
pub struct RunOptions {
    pub profile: Option<String>,
    pub overlays: Vec<PathBuf>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub set: Vec<String>,
}

impl Output for AppConfig {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        let profile = self.profile.as_deref().unwrap_or("(none)");
        format!("Profile: {}\n\n{}", profile, yaml_string(&self.config))
    }
}

/// Resolve the configuration a session would start with.
pub fn run_dry(ws: &Workspace, options: RunOptions) -> Result<AppConfig> {
    let mut cli_overlay = parse_cli_overlay(&options.set)?;
    if options.provider.is_some() || options.model.is_some() {
        let provider = cli_overlay
            .entry("provider")
            .or_insert_with(|| Value::Object(ConfigTree::new()));
        if let Value::Object(map) = provider {
            if let Some(name) = options.provider {
                map.insert("name".into(), Value::String(name));
            }
            if let Some(model) = options.model {
                map.insert("model".into(), Value::String(model));
            }
        }
    }

    let request = AppConfigRequest {
        profile: options.profile,
        overlays: load_overlays(&options.overlays)?,
        cli_overlay,
    };
    resolve_app_config(&ws.profiles, &ws.settings, &request)
}

// ===== Version =====

#[derive(Serialize)]
pub struct VersionInfo {
    pub version: String,
    pub commit: String,
    pub built: String,
}

impl Output for VersionInfo {
    fn to_json(&self) -> String {
        json_string(self)
    }

    fn to_human(&self) -> String {
        format!("amp {} ({}, built {})", self.version, self.commit, self.built)
    }
}

pub fn version() -> VersionInfo {
    VersionInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        commit: env!("AMP_GIT_COMMIT").to_string(),
        built: env!("AMP_BUILD_TIMESTAMP").to_string(),
    }
}
