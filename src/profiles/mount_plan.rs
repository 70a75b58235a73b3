//! The compiled mount plan handed to the session runtime.
//!
//! Serialises to:
//!
//! ```json
//! {
//!   "session": {"orchestrator": "...", "context": "...",
//!               "orchestrator_source": "...", "context_source": "..."},
//!   "orchestrator": {"config": {}},
//!   "context": {"config": {}},
//!   "providers": [], "tools": [], "hooks": [],
//!   "agents": {"name": {}}
//! }
//! ```
//!
//! `orchestrator`, `context` and the `*_source` keys are omitted when unset.

use crate::models::{ConfigTree, ModuleEntry};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which orchestrator and context manager the session mounts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orchestrator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orchestrator_source: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_source: Option<Value>,
}

/// A `{config: {...}}` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigSection {
    #[serde(default)]
    pub config: ConfigTree,
}

/// Compiled session configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MountPlan {
    pub session: SessionSection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orchestrator: Option<ConfigSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ConfigSection>,
    #[serde(default)]
    pub providers: Vec<ModuleEntry>,
    #[serde(default)]
    pub tools: Vec<ModuleEntry>,
    #[serde(default)]
    pub hooks: Vec<ModuleEntry>,
    /// Agent name to mount plan fragment
    #[serde(default)]
    pub agents: ConfigTree,
}

impl MountPlan {
    /// Plain tree form.
    pub fn to_tree(&self) -> ConfigTree {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => ConfigTree::new(),
        }
    }

    pub fn tool(&self, module: &str) -> Option<&ModuleEntry> {
        self.tools.iter().find(|e| e.module == module)
    }

    pub fn hook(&self, module: &str) -> Option<&ModuleEntry> {
        self.hooks.iter().find(|e| e.module == module)
    }

    pub fn provider(&self, module: &str) -> Option<&ModuleEntry> {
        self.providers.iter().find(|e| e.module == module)
    }

    /// Module ids of a list, in order.
    pub fn module_ids(list: &[ModuleEntry]) -> Vec<&str> {
        list.iter().map(|e| e.module.as_str()).collect()
    }

    /// Fail unless the plan names both an orchestrator and a context.
    pub fn validate_complete(&self, profile: &str) -> Result<()> {
        let missing = [
            ("session.orchestrator", self.session.orchestrator.is_none()),
            ("session.context", self.session.context.is_none()),
        ];
        match missing.iter().find(|(_, is_missing)| *is_missing) {
            Some((field, _)) => Err(Error::InvalidProfile {
                name: profile.to_string(),
                reason: format!("{} is required", field),
            }),
            None => Ok(()),
        }
    }
}
