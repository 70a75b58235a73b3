//! Core value types shared by the merge engine.
//!
//! - `ConfigTree` - ordered string-keyed mapping; the universal representation
//!   of profiles, settings files and mount plans
//! - `ModuleEntry` - a module reference identified by its `module` id
//! - `ModuleRef` - either a bare module id or a full `ModuleEntry`

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ordered configuration tree.
///
/// Backed by `serde_json::Map` with `preserve_order`, so key order survives
/// every merge and serialisation.
pub type ConfigTree = serde_json::Map<String, Value>;

/// Identity key for module entries.
pub const MODULE_KEY: &str = "module";

/// A module reference in a provider/tool/hook list.
///
/// Two entries with the same `module` are the same module for merge purposes,
/// regardless of differing `source` or `config`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleEntry {
    pub module: String,

    /// Where to fetch the module from (string URI or source object).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Value>,

    /// Module-specific settings. Usually a mapping, but a non-mapping
    /// overlay value is carried through unchanged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,

    /// Any other fields, preserved verbatim.
    #[serde(flatten)]
    pub extra: ConfigTree,
}

impl ModuleEntry {
    /// Create an entry with just a module id.
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            source: None,
            config: None,
            extra: ConfigTree::new(),
        }
    }

    /// Set the source.
    pub fn with_source(mut self, source: impl Into<Value>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Set the config mapping.
    pub fn with_config(mut self, config: ConfigTree) -> Self {
        self.config = Some(Value::Object(config));
        self
    }

    /// The config as a mapping, if it is one.
    pub fn config_tree(&self) -> Option<&ConfigTree> {
        self.config.as_ref().and_then(Value::as_object)
    }

    /// Mutable access to the config mapping, replacing a missing or
    /// non-mapping config with an empty one.
    pub fn config_tree_mut(&mut self) -> &mut ConfigTree {
        if !matches!(self.config, Some(Value::Object(_))) {
            self.config = Some(Value::Object(ConfigTree::new()));
        }
        match self.config {
            Some(Value::Object(ref mut map)) => map,
            _ => unreachable!("config was just set to a mapping"),
        }
    }

    /// Parse an entry from a plain tree value.
    ///
    /// Fails with [`Error::InvalidModuleEntry`] when the value is not a mapping
    /// or has no string `module` key.
    pub fn from_value(value: &Value) -> Result<Self> {
        let map = value.as_object().ok_or_else(|| {
            Error::InvalidModuleEntry(format!("expected a mapping, got {}", value))
        })?;
        match map.get(MODULE_KEY) {
            Some(Value::String(_)) => {}
            _ => {
                return Err(Error::InvalidModuleEntry(format!(
                    "missing string '{}' key in {}",
                    MODULE_KEY, value
                )));
            }
        }
        serde_json::from_value(value.clone())
            .map_err(|e| Error::InvalidModuleEntry(format!("{}: {}", e, value)))
    }

    /// Parse a list of entries from a plain sequence value.
    pub fn list_from_value(value: &Value) -> Result<Vec<Self>> {
        match value {
            Value::Array(items) => items.iter().map(Self::from_value).collect(),
            Value::Null => Ok(Vec::new()),
            other => Err(Error::InvalidModuleEntry(format!(
                "expected a list of module entries, got {}",
                other
            ))),
        }
    }

    /// Convert to the plain tree form.
    pub fn to_value(&self) -> Value {
        // Serialising a struct of strings and `Value`s cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// A session module reference: a bare id or a full entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModuleRef {
    Id(String),
    Entry(ModuleEntry),
}

impl ModuleRef {
    /// The module id.
    pub fn module(&self) -> &str {
        match self {
            ModuleRef::Id(id) => id,
            ModuleRef::Entry(entry) => &entry.module,
        }
    }

    /// The source, if the reference carries one.
    pub fn source(&self) -> Option<&Value> {
        match self {
            ModuleRef::Id(_) => None,
            ModuleRef::Entry(entry) => entry.source.as_ref(),
        }
    }

    /// The config mapping, if the reference carries one.
    pub fn config(&self) -> Option<&ConfigTree> {
        match self {
            ModuleRef::Id(_) => None,
            ModuleRef::Entry(entry) => entry.config_tree(),
        }
    }
}

impl From<&str> for ModuleRef {
    fn from(id: &str) -> Self {
        ModuleRef::Id(id.to_string())
    }
}

/// Build a `ConfigTree` from a `serde_json::json!` object literal.
///
/// Non-object values yield an empty tree.
pub fn tree(value: Value) -> ConfigTree {
    match value {
        Value::Object(map) => map,
        _ => ConfigTree::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_module_entry_from_value_full() {
        let entry = ModuleEntry::from_value(&json!({
            "module": "tool-bash",
            "source": "git+https://example.com/tool-bash@main",
            "config": {"timeout": 30},
            "priority": 5
        }))
        .unwrap();

        assert_eq!(entry.module, "tool-bash");
        assert_eq!(
            entry.source,
            Some(json!("git+https://example.com/tool-bash@main"))
        );
        assert_eq!(entry.config_tree().unwrap()["timeout"], json!(30));
        assert_eq!(entry.extra["priority"], json!(5));
    }

    #[test]
    fn test_module_entry_missing_module_fails() {
        let err = ModuleEntry::from_value(&json!({"config": {"a": 1}})).unwrap_err();
        assert!(matches!(err, Error::InvalidModuleEntry(_)));
    }

    #[test]
    fn test_module_entry_non_string_module_fails() {
        let err = ModuleEntry::from_value(&json!({"module": 7})).unwrap_err();
        assert!(matches!(err, Error::InvalidModuleEntry(_)));
    }

    #[test]
    fn test_module_entry_to_value_omits_empty_fields() {
        let value = ModuleEntry::new("hooks-logging").to_value();
        assert_eq!(value, json!({"module": "hooks-logging"}));
    }

    #[test]
    fn test_config_tree_mut_replaces_non_mapping() {
        let mut entry = ModuleEntry::new("tool-task");
        entry.config = Some(json!("not a map"));
        entry.config_tree_mut().insert("depth".into(), json!(2));
        assert_eq!(entry.config, Some(json!({"depth": 2})));
    }

    #[test]
    fn test_module_ref_untagged() {
        let id: ModuleRef = serde_json::from_value(json!("loop-basic")).unwrap();
        assert_eq!(id.module(), "loop-basic");
        assert!(id.source().is_none());

        let entry: ModuleRef = serde_json::from_value(json!({
            "module": "loop-streaming",
            "source": "git+https://example.com/loop@v1",
            "config": {"extended_thinking": true}
        }))
        .unwrap();
        assert_eq!(entry.module(), "loop-streaming");
        assert!(entry.source().is_some());
        assert_eq!(entry.config().unwrap()["extended_thinking"], json!(true));
    }

    #[test]
    fn test_list_from_value_null_is_empty() {
        assert!(ModuleEntry::list_from_value(&Value::Null).unwrap().is_empty());
        assert!(ModuleEntry::list_from_value(&json!({"module": "x"})).is_err());
    }
}
