//! Profile document schema and validation.
//!
//! A profile file parses into a [`Profile`]:
//!
//! ```yaml
//! profile:
//!   name: dev
//!   extends: base
//!   model: anthropic/claude-sonnet
//! session:
//!   orchestrator: loop-streaming
//!   context: context-persistent
//!   max_tokens: 200000
//! tools:
//!   - module: tool-bash
//! task:
//!   max_recursion_depth: 2
//! ```
//!
//! Every section except `profile.name` is optional so that child profiles
//! can state only what they change. The compiled plan of a session base
//! must be [complete](crate::profiles::MountPlan::validate_complete).

use crate::models::{ConfigTree, ModuleEntry, ModuleRef};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

fn default_version() -> String {
    "1.0.0".to_string()
}

/// Profile identification and inheritance edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileMetadata {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub description: String,
    /// Model in `provider/model` form
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Parent profile name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
}

impl ProfileMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: default_version(),
            description: String::new(),
            model: None,
            extends: None,
        }
    }
}

/// Session module selection and context scalars.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orchestrator: Option<ModuleRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ModuleRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compact_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_compact: Option<bool>,
}

impl SessionConfig {
    /// The context-affecting scalars that are set.
    pub fn context_config(&self) -> ConfigTree {
        let mut config = ConfigTree::new();
        if let Some(v) = self.max_tokens {
            config.insert("max_tokens".into(), Value::from(v));
        }
        if let Some(v) = self.compact_threshold {
            config.insert("compact_threshold".into(), Value::from(v));
        }
        if let Some(v) = self.auto_compact {
            config.insert("auto_compact".into(), Value::from(v));
        }
        config
    }
}

/// Orchestrator-specific configuration section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default)]
    pub config: ConfigTree,
}

/// Which agents a session should expose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentSelection {
    All,
    None,
    Names(Vec<String>),
}

/// The `agents` section: `"all"`, `"none"`, a list of names, or an inline
/// map of agent name to mount plan fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AgentsSpec {
    Keyword(String),
    Names(Vec<String>),
    Inline(ConfigTree),
}

impl AgentsSpec {
    /// The selector this section expresses, if any.
    ///
    /// Inline maps define agents rather than select them.
    pub fn selection(&self) -> Option<AgentSelection> {
        match self {
            AgentsSpec::Keyword(k) if k == "all" => Some(AgentSelection::All),
            AgentsSpec::Keyword(k) if k == "none" => Some(AgentSelection::None),
            AgentsSpec::Keyword(_) => None,
            AgentsSpec::Names(names) => Some(AgentSelection::Names(names.clone())),
            AgentsSpec::Inline(_) => None,
        }
    }

    /// Inline agent definitions, if this section is a map.
    pub fn inline(&self) -> Option<&ConfigTree> {
        match self {
            AgentsSpec::Inline(map) => Some(map),
            _ => None,
        }
    }

    pub fn from_selection(selection: &AgentSelection) -> Self {
        match selection {
            AgentSelection::All => AgentsSpec::Keyword("all".into()),
            AgentSelection::None => AgentsSpec::Keyword("none".into()),
            AgentSelection::Names(names) => AgentsSpec::Names(names.clone()),
        }
    }
}

/// Agent discovery, filtering and inline definitions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentsConfig {
    /// Directories to search for agent files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dirs: Option<Vec<String>>,
    /// Agents to load (filters discovered agents)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<Vec<String>>,
    /// Inline agent definitions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline: Option<ConfigTree>,
}

impl AgentsConfig {
    /// Field-wise overlay: fields the overlay sets replace ours, inline maps
    /// merge by name.
    pub fn overlay(&self, other: &AgentsConfig) -> AgentsConfig {
        let inline = match (&self.inline, &other.inline) {
            (Some(base), Some(over)) => Some(crate::merge::merge_agent_maps(base, over)),
            (base, None) => base.clone(),
            (None, over) => over.clone(),
        };
        AgentsConfig {
            dirs: other.dirs.clone().or_else(|| self.dirs.clone()),
            include: other.include.clone().or_else(|| self.include.clone()),
            inline,
        }
    }
}

fn default_max_recursion_depth() -> u32 {
    1
}

/// Task tool configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskConfig {
    #[serde(default = "default_max_recursion_depth")]
    pub max_recursion_depth: u32,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            max_recursion_depth: default_max_recursion_depth(),
        }
    }
}

fn default_redaction() -> Vec<String> {
    vec!["secrets".to_string(), "pii-basic".to_string()]
}

/// Session logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub capture_model_io: bool,
    #[serde(default = "default_redaction")]
    pub redaction: Vec<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            capture_model_io: false,
            redaction: default_redaction(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_show_tool_lines() -> u32 {
    5
}

/// UI display configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiConfig {
    #[serde(default = "default_true")]
    pub show_thinking_stream: bool,
    #[serde(default = "default_show_tool_lines")]
    pub show_tool_lines: u32,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            show_thinking_stream: true,
            show_tool_lines: default_show_tool_lines(),
        }
    }
}

/// A profile document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(rename = "profile")]
    pub metadata: ProfileMetadata,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orchestrator: Option<OrchestratorConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub providers: Vec<ModuleEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ModuleEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hooks: Vec<ModuleEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agents: Option<AgentsSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agents_config: Option<AgentsConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<TaskConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui: Option<UiConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
    /// System instruction (from the markdown body)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<ConfigTree>,
}

impl Profile {
    /// Create an empty profile with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            metadata: ProfileMetadata::new(name),
            session: SessionConfig::default(),
            orchestrator: None,
            providers: Vec::new(),
            tools: Vec::new(),
            hooks: Vec::new(),
            agents: None,
            agents_config: None,
            task: None,
            ui: None,
            logging: None,
            system: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn extends(&self) -> Option<&str> {
        self.metadata.extends.as_deref()
    }

    /// Parse and validate a profile from a plain tree.
    ///
    /// `origin` names the document in error messages (usually the name it
    /// was requested under).
    pub fn from_tree(origin: &str, tree: ConfigTree) -> Result<Self> {
        let profile: Profile =
            serde_json::from_value(Value::Object(tree)).map_err(|e| Error::InvalidProfile {
                name: origin.to_string(),
                reason: e.to_string(),
            })?;
        profile.validate()?;
        Ok(profile)
    }

    /// Convert back to the plain tree form.
    pub fn to_tree(&self) -> Result<ConfigTree> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            _ => Ok(ConfigTree::new()),
        }
    }

    /// Structural validation that holds for every profile, partial or not.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| Error::InvalidProfile {
            name: self.metadata.name.clone(),
            reason,
        };

        if self.metadata.name.trim().is_empty() {
            return Err(invalid("profile.name must not be empty".into()));
        }
        if let Some(model) = &self.metadata.model {
            validate_model_pair(model).map_err(invalid)?;
        }
        match &self.agents {
            Some(AgentsSpec::Keyword(k)) if k != "all" && k != "none" => {
                return Err(invalid(format!(
                    "agents must be \"all\", \"none\", a list or a map, got \"{}\"",
                    k
                )));
            }
            _ => {}
        }
        Ok(())
    }
}

/// Check that `model` has the form `provider/model` with both parts non-empty.
pub fn validate_model_pair(model: &str) -> std::result::Result<(), String> {
    match model.split_once('/') {
        Some((provider, name)) if !provider.trim().is_empty() && !name.trim().is_empty() => Ok(()),
        _ => Err(format!(
            "model must be in 'provider/model' format, got '{}'",
            model
        )),
    }
}
