//! Agent documents.
//!
//! Agents are partial mount plans applied on top of a parent session. They
//! have no inheritance: resolution is first-match-wins across search paths.

use crate::models::{ConfigTree, ModuleEntry};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Agent identification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentMetadata {
    pub name: String,
    pub description: String,
}

/// A complete agent definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub meta: AgentMetadata,
    #[serde(default)]
    pub providers: Vec<ModuleEntry>,
    #[serde(default)]
    pub tools: Vec<ModuleEntry>,
    #[serde(default)]
    pub hooks: Vec<ModuleEntry>,
    /// Session overrides
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<ConfigTree>,
    /// System instruction (`instruction` key)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<ConfigTree>,
}

impl Agent {
    /// Build an agent from parsed document data.
    ///
    /// Documents in the older flat format carry `name` and `description` at
    /// the top level; those are moved under `meta`, falling back to `name`
    /// and a generated description.
    pub fn from_tree(name: &str, mut data: ConfigTree) -> Result<Self> {
        if !data.contains_key("meta") {
            let mut meta = ConfigTree::new();
            let agent_name = data
                .remove("name")
                .unwrap_or_else(|| Value::String(name.to_string()));
            let description = data
                .remove("description")
                .unwrap_or_else(|| Value::String(format!("Agent: {}", name)));
            meta.insert("name".into(), agent_name);
            meta.insert("description".into(), description);
            data.insert("meta".into(), Value::Object(meta));
        }

        serde_json::from_value(Value::Object(data))
            .map_err(|e| Error::InvalidInput(format!("Invalid agent '{}': {}", name, e)))
    }

    /// Convert to the fragment stored in a mount plan's `agents` map.
    ///
    /// `name` and `description` are repeated at the top level next to `meta`
    /// for consumers that read the flat form.
    pub fn to_mount_plan_fragment(&self) -> ConfigTree {
        let mut fragment = ConfigTree::new();
        fragment.insert(
            "meta".into(),
            serde_json::json!({
                "name": self.meta.name,
                "description": self.meta.description,
            }),
        );
        fragment.insert("name".into(), Value::String(self.meta.name.clone()));
        fragment.insert(
            "description".into(),
            Value::String(self.meta.description.clone()),
        );

        let lists = [
            ("providers", &self.providers),
            ("tools", &self.tools),
            ("hooks", &self.hooks),
        ];
        for (key, list) in lists {
            if !list.is_empty() {
                let values = list.iter().map(ModuleEntry::to_value).collect();
                fragment.insert(key.into(), Value::Array(values));
            }
        }

        if let Some(session) = self.session.as_ref().filter(|s| !s.is_empty()) {
            fragment.insert("session".into(), Value::Object(session.clone()));
        }
        if let Some(system) = self.system.as_ref().filter(|s| !s.is_empty()) {
            fragment.insert("system".into(), Value::Object(system.clone()));
        }

        fragment
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tree;
    use serde_json::json;

    #[test]
    fn test_from_tree_new_format() {
        let agent = Agent::from_tree(
            "zen",
            tree(json!({
                "meta": {"name": "zen-architect", "description": "Designs systems"},
                "tools": [{"module": "tool-grep"}],
                "system": {"instruction": "Think first."}
            })),
        )
        .unwrap();
        assert_eq!(agent.meta.name, "zen-architect");
        assert_eq!(agent.tools.len(), 1);
    }

    #[test]
    fn test_from_tree_migrates_flat_format() {
        let agent = Agent::from_tree(
            "bug-hunter",
            tree(json!({"name": "bug-hunter", "description": "Finds bugs"})),
        )
        .unwrap();
        assert_eq!(agent.meta.name, "bug-hunter");
        assert_eq!(agent.meta.description, "Finds bugs");

        let agent = Agent::from_tree("anon", ConfigTree::new()).unwrap();
        assert_eq!(agent.meta.name, "anon");
        assert_eq!(agent.meta.description, "Agent: anon");
    }

    #[test]
    fn test_from_tree_rejects_bad_module_entries() {
        let err = Agent::from_tree("x", tree(json!({"tools": [{"config": {}}]}))).unwrap_err();
        assert!(err.to_string().contains("Invalid agent 'x'"));
    }

    #[test]
    fn test_mount_plan_fragment_shape() {
        let agent = Agent::from_tree(
            "explorer",
            tree(json!({
                "meta": {"name": "explorer", "description": "Explores code"},
                "tools": [{"module": "tool-grep", "config": {"max": 10}}],
                "session": {"orchestrator": "loop-basic"},
                "system": {"instruction": "Look around."}
            })),
        )
        .unwrap();

        assert_eq!(
            Value::Object(agent.to_mount_plan_fragment()),
            json!({
                "meta": {"name": "explorer", "description": "Explores code"},
                "name": "explorer",
                "description": "Explores code",
                "tools": [{"module": "tool-grep", "config": {"max": 10}}],
                "session": {"orchestrator": "loop-basic"},
                "system": {"instruction": "Look around."}
            })
        );
    }

    #[test]
    fn test_mount_plan_fragment_omits_empty_lists() {
        let agent = Agent::from_tree("a", tree(json!({"name": "a", "description": "d"}))).unwrap();
        let fragment = agent.to_mount_plan_fragment();
        assert!(!fragment.contains_key("providers"));
        assert!(!fragment.contains_key("tools"));
        assert!(!fragment.contains_key("session"));
    }
}
