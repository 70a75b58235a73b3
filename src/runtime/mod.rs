//! Session configuration assembly.
//!
//! [`resolve_app_config`] produces the tree a session is started with:
//!
//! ```text
//! defaults < compiled profile (+ provider overrides) < settings `modules` < CLI overlay
//! ```
//!
//! followed by `${VAR}` / `${VAR:default}` expansion over every string.

use crate::merge::{
    UNION_CONFIG_FIELDS, deep_merge_pruning_nulls, merge_agent_maps, merge_module_entry,
    merge_tool_config,
};
use crate::models::{ConfigTree, ModuleEntry};
use crate::profiles::{Profile, ProfileLoader};
use crate::settings::{AppSettings, set_dotted};
use crate::Result;
use regex::{Captures, Regex};
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Canonical sources for provider ids that may be configured without one.
pub const DEFAULT_PROVIDER_SOURCES: &[(&str, &str)] = &[
    (
        "provider-anthropic",
        "git+https://github.com/microsoft/amplifier-module-provider-anthropic@main",
    ),
    (
        "provider-openai",
        "git+https://github.com/microsoft/amplifier-module-provider-openai@main",
    ),
    (
        "provider-azure-openai",
        "git+https://github.com/microsoft/amplifier-module-provider-azure-openai@main",
    ),
    (
        "provider-ollama",
        "git+https://github.com/microsoft/amplifier-module-provider-ollama@main",
    ),
];

/// Top-level keys holding module lists, merged by `module` identity.
const MODULE_LIST_KEYS: &[&str] = &["providers", "tools", "hooks"];

/// Settings `modules.*` keys copied into the overlay.
const SETTINGS_MODULE_KEYS: &[&str] = &["tools", "hooks", "agents"];

/// A fully resolved session configuration.
#[derive(Debug, Clone, Serialize)]
pub struct AppConfig {
    /// The profile that was applied, if one loaded.
    pub profile: Option<String>,
    pub config: ConfigTree,
}

/// Inputs beyond the settings and profile loader.
#[derive(Debug, Clone, Default)]
pub struct AppConfigRequest {
    /// Use this profile instead of the effective one.
    pub profile: Option<String>,
    /// Overlay profiles applied on top of the chain.
    pub overlays: Vec<Profile>,
    /// Tree from command-line flags; `null` values delete keys.
    pub cli_overlay: ConfigTree,
}

/// Built-in starting point.
pub fn default_app_config() -> ConfigTree {
    crate::models::tree(json!({
        "session": {
            "orchestrator": "loop-basic",
            "context": "context-simple",
        },
        "providers": [],
        "tools": [],
        "hooks": [],
        "agents": {},
    }))
}

/// Resolve the session configuration.
///
/// A profile that fails to load is logged and skipped; the remaining layers
/// still apply.
pub fn resolve_app_config(
    loader: &ProfileLoader,
    settings: &AppSettings,
    request: &AppConfigRequest,
) -> Result<AppConfig> {
    let mut config = default_app_config();
    let provider_overrides = settings.provider_overrides();

    let profile = request
        .profile
        .clone()
        .or_else(|| settings.effective_profile().map(|r| r.value));

    let mut applied = None;
    if let Some(name) = profile {
        match loader.compile_profile(&name, &request.overlays) {
            Ok(mut plan) => {
                if !provider_overrides.is_empty() {
                    plan.providers = apply_provider_overrides(&provider_overrides);
                }
                config = merge_app_config(&config, &plan.to_tree());
                applied = Some(name);
            }
            Err(e) => warn!("Could not load profile '{}': {}", name, e),
        }
    }

    if applied.is_none() && !provider_overrides.is_empty() {
        let providers = apply_provider_overrides(&provider_overrides);
        config.insert(
            "providers".into(),
            Value::Array(providers.iter().map(ModuleEntry::to_value).collect()),
        );
    }

    let overlay = settings_overlay(&settings.get_merged_settings());
    if !overlay.is_empty() {
        debug!("Applying settings modules overlay: {:?}", overlay.keys().collect::<Vec<_>>());
        config = merge_app_config(&config, &overlay);
    }

    if !request.cli_overlay.is_empty() {
        config = apply_cli_overlay(&config, &request.cli_overlay);
    }

    let config = match expand_env_vars(&Value::Object(config)) {
        Value::Object(map) => map,
        _ => ConfigTree::new(),
    };

    Ok(AppConfig {
        profile: applied,
        config,
    })
}

/// The provider list that replaces a profile's providers, with canonical
/// sources filled in for known ids.
pub fn apply_provider_overrides(overrides: &[ModuleEntry]) -> Vec<ModuleEntry> {
    overrides
        .iter()
        .map(|entry| {
            let mut entry = entry.clone();
            if entry.source.is_none() {
                if let Some((_, source)) = DEFAULT_PROVIDER_SOURCES
                    .iter()
                    .find(|(id, _)| *id == entry.module)
                {
                    entry.source = Some(Value::String((*source).to_string()));
                }
            }
            entry
        })
        .collect()
}

/// `modules.{tools,hooks,agents}` from merged settings, lifted to top level.
pub fn settings_overlay(merged: &ConfigTree) -> ConfigTree {
    let mut overlay = ConfigTree::new();
    let Some(modules) = merged.get("modules").and_then(Value::as_object) else {
        return overlay;
    };
    for key in SETTINGS_MODULE_KEYS {
        if let Some(value) = modules.get(*key) {
            overlay.insert((*key).to_string(), value.clone());
        }
    }
    overlay
}

/// Module-aware merge of two session configs.
///
/// `providers`/`tools`/`hooks` lists merge by module id (tool configs keep
/// permission lists additive); an `agents` mapping merges by agent name;
/// other mappings recurse; everything else is replaced.
pub fn merge_app_config(base: &ConfigTree, overlay: &ConfigTree) -> ConfigTree {
    let mut result = base.clone();
    for (key, value) in overlay {
        let merged = match (result.get(key), value) {
            (Some(Value::Array(b)), Value::Array(o)) if MODULE_LIST_KEYS.contains(&key.as_str()) => {
                Value::Array(merge_raw_module_lists(b, o, key == "tools"))
            }
            (Some(Value::Object(b)), Value::Object(o)) if key == "agents" => {
                Value::Object(merge_agent_maps(b, o))
            }
            (Some(Value::Object(b)), Value::Object(o)) => Value::Object(merge_app_config(b, o)),
            _ => value.clone(),
        };
        result.insert(key.clone(), merged);
    }
    result
}

/// CLI overlay: like [`merge_app_config`] for module lists, with `null`
/// deleting keys elsewhere.
fn apply_cli_overlay(base: &ConfigTree, overlay: &ConfigTree) -> ConfigTree {
    let (lists, rest): (ConfigTree, ConfigTree) = overlay
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .partition(|(k, v)| MODULE_LIST_KEYS.contains(&k.as_str()) && v.is_array());
    let merged = merge_app_config(base, &lists);
    deep_merge_pruning_nulls(&merged, &rest)
}

/// Merge raw JSON module lists. Items without a string `module` are logged
/// and dropped.
fn merge_raw_module_lists(base: &[Value], overlay: &[Value], union_tool_config: bool) -> Vec<Value> {
    let mut result: Vec<ModuleEntry> = Vec::new();

    for item in base.iter().chain(overlay) {
        let entry = match ModuleEntry::from_value(item) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping module list item: {}", e);
                continue;
            }
        };
        match result.iter_mut().find(|e| e.module == entry.module) {
            Some(existing) => {
                let mut merged = merge_module_entry(existing, &entry);
                if union_tool_config {
                    if let (Some(b), Some(o)) = (existing.config_tree(), entry.config_tree()) {
                        let unioned = merge_tool_config(b, o, UNION_CONFIG_FIELDS);
                        let config = merged.config_tree_mut();
                        for field in UNION_CONFIG_FIELDS {
                            if let Some(list) = unioned.get(*field) {
                                config.insert((*field).to_string(), list.clone());
                            }
                        }
                    }
                }
                *existing = merged;
            }
            None => result.push(entry),
        }
    }

    result.iter().map(ModuleEntry::to_value).collect()
}

fn env_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{([^}:]+)(?::([^}]*))?\}").expect("Invalid regex"))
}

/// Replace `${VAR}` and `${VAR:default}` in every string of `value`.
///
/// An unset variable without a default becomes the empty string.
pub fn expand_env_vars(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(expand_str(s)),
        Value::Array(items) => Value::Array(items.iter().map(expand_env_vars).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), expand_env_vars(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn expand_str(s: &str) -> String {
    env_pattern()
        .replace_all(s, |caps: &Captures| {
            std::env::var(&caps[1])
                .ok()
                .or_else(|| caps.get(2).map(|m| m.as_str().to_string()))
                .unwrap_or_default()
        })
        .into_owned()
}

/// Build a CLI overlay from `key=value` pairs; values parse as YAML, so
/// `null` deletes and `[a, b]` is a list.
pub fn parse_cli_overlay(pairs: &[String]) -> Result<ConfigTree> {
    let mut overlay = ConfigTree::new();
    for pair in pairs {
        let (key, raw) = pair.split_once('=').ok_or_else(|| {
            crate::Error::InvalidInput(format!("expected KEY=VALUE, got '{}'", pair))
        })?;
        let value: Value = if raw.is_empty() {
            Value::String(String::new())
        } else {
            serde_yaml::from_str(raw)?
        };
        set_dotted(&mut overlay, key.trim(), value)?;
    }
    Ok(overlay)
}
