//! Folding profiles into a mount plan.
//!
//! [`compile_profile_to_mount_plan`] takes a base profile and overlays in
//! increasing precedence:
//!
//! 1. The base seeds the plan: session modules (with `*_source`), context
//!    config from the session scalars, orchestrator config, module lists and
//!    inline agents.
//! 2. Each overlay replaces session modules it sets, key-updates the context
//!    and orchestrator configs, merges module lists by id and overwrites
//!    agent fragments by name.
//! 3. Profile-level fragments (`agents_config`, `task`, `ui`) are injected
//!    into their target modules when those modules are mounted.
//! 4. Selected agents are loaded through an [`AgentLoader`].
//!
//! Compilation never fails: missing injection targets and unloadable agents
//! are logged and skipped.
//!
//! Fragments that are not module lists follow "nearest profile that sets it
//! wins" across overlays, so a chain folds the same way a single flattened
//! profile does.

use crate::agents::{Agent, AgentLoader};
use crate::merge::{merge_agent_maps, merge_module_lists, shallow_update};
use crate::models::{ConfigTree, ModuleEntry, ModuleRef};
use crate::profiles::mount_plan::{ConfigSection, MountPlan};
use crate::profiles::schema::{
    AgentSelection, AgentsConfig, AgentsSpec, LoggingConfig, OrchestratorConfig, Profile,
    ProfileMetadata, SessionConfig, TaskConfig, UiConfig,
};
use serde_json::{Value, json};
use tracing::{debug, warn};

/// Hook that receives `agents_config.dirs`.
pub const AGENT_REGISTRY_HOOK: &str = "agent-registry";
/// Tool that receives `task.max_recursion_depth`.
pub const TASK_TOOL: &str = "tool-task";
/// Hook that receives the `ui` section.
pub const STREAMING_UI_HOOK: &str = "hooks-streaming-ui";

/// Profile-level sections that are not module lists, as they stand after
/// folding.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileFragments {
    pub agents: Option<AgentSelection>,
    pub agents_config: Option<AgentsConfig>,
    pub task: Option<TaskConfig>,
    pub ui: Option<UiConfig>,
    pub logging: Option<LoggingConfig>,
    pub system: Option<ConfigTree>,
}

impl ProfileFragments {
    fn apply(&mut self, profile: &Profile) {
        if let Some(selection) = profile.agents.as_ref().and_then(AgentsSpec::selection) {
            self.agents = Some(selection);
        }
        if let Some(config) = &profile.agents_config {
            self.agents_config = Some(match &self.agents_config {
                Some(existing) => existing.overlay(config),
                None => config.clone(),
            });
        }
        if profile.task.is_some() {
            self.task = profile.task.clone();
        }
        if profile.ui.is_some() {
            self.ui = profile.ui.clone();
        }
        if profile.logging.is_some() {
            self.logging = profile.logging.clone();
        }
        if profile.system.is_some() {
            self.system = profile.system.clone();
        }
    }
}

/// Incremental mount plan compiler.
#[derive(Debug, Clone)]
pub struct MountPlanBuilder {
    plan: MountPlan,
    fragments: ProfileFragments,
}

impl MountPlanBuilder {
    /// Seed a plan from the base profile.
    pub fn new(base: &Profile) -> Self {
        let mut builder = Self {
            plan: MountPlan::default(),
            fragments: ProfileFragments::default(),
        };
        builder.apply(base);
        builder
    }

    /// Fold one overlay profile into the plan.
    pub fn apply_overlay(&mut self, overlay: &Profile) -> &mut Self {
        self.apply(overlay);
        self
    }

    fn apply(&mut self, profile: &Profile) {
        let session = &mut self.plan.session;
        if let Some(orchestrator) = &profile.session.orchestrator {
            session.orchestrator = Some(orchestrator.module().to_string());
            session.orchestrator_source = orchestrator.source().cloned();
        }
        if let Some(context) = &profile.session.context {
            session.context = Some(context.module().to_string());
            session.context_source = context.source().cloned();
        }

        let context_config = context_config_of(&profile.session);
        if !context_config.is_empty() {
            update_section(&mut self.plan.context, &context_config);
        }

        let orchestrator_config = orchestrator_config_of(profile);
        if !orchestrator_config.is_empty() {
            update_section(&mut self.plan.orchestrator, &orchestrator_config);
        }

        self.plan.providers = merge_module_lists(&self.plan.providers, &profile.providers);
        self.plan.tools = merge_module_lists(&self.plan.tools, &profile.tools);
        self.plan.hooks = merge_module_lists(&self.plan.hooks, &profile.hooks);

        if let Some(inline) = profile.agents.as_ref().and_then(AgentsSpec::inline) {
            self.plan.agents = merge_agent_maps(&self.plan.agents, inline);
        }
        if let Some(inline) = profile.agents_config.as_ref().and_then(|c| c.inline.as_ref()) {
            self.plan.agents = merge_agent_maps(&self.plan.agents, inline);
        }

        self.fragments.apply(profile);
    }

    /// The fragments in effect after folding.
    pub fn fragments(&self) -> &ProfileFragments {
        &self.fragments
    }

    /// Inject profile-level fragments into their target modules.
    ///
    /// A fragment whose target module is not mounted is dropped.
    pub fn inject_fragments(&mut self) -> &mut Self {
        if let Some(agents_config) = &self.fragments.agents_config {
            let agents = json!({ "dirs": agents_config.dirs });
            inject(&mut self.plan.hooks, AGENT_REGISTRY_HOOK, "agents", agents);
        }

        if let Some(task) = &self.fragments.task {
            let depth = Value::from(task.max_recursion_depth);
            inject(&mut self.plan.tools, TASK_TOOL, "max_recursion_depth", depth);
        }

        if let Some(ui) = &self.fragments.ui {
            let ui = json!({
                "show_thinking_stream": ui.show_thinking_stream,
                "show_tool_lines": ui.show_tool_lines,
            });
            inject(&mut self.plan.hooks, STREAMING_UI_HOOK, "ui", ui);
        }

        self
    }

    /// Normalise inline agent definitions into mount plan fragments.
    ///
    /// Definitions that fail validation are dropped with a warning.
    pub fn resolve_inline_agents(&mut self) -> &mut Self {
        let inline = std::mem::take(&mut self.plan.agents);
        for (name, value) in inline {
            let data = match value {
                Value::Object(map) => map,
                Value::Null => ConfigTree::new(),
                other => {
                    warn!("Skipping inline agent '{}': expected a mapping, got {}", name, other);
                    continue;
                }
            };
            match Agent::from_tree(&name, data) {
                Ok(agent) => {
                    self.plan
                        .agents
                        .insert(name, Value::Object(agent.to_mount_plan_fragment()));
                }
                Err(e) => warn!("Skipping inline agent '{}': {}", name, e),
            }
        }
        self
    }

    /// Load the selected agents through `loader`.
    ///
    /// Names already present (inline definitions) are kept as they are.
    pub fn load_agents(&mut self, loader: &dyn AgentLoader) -> &mut Self {
        let names = self.selected_agent_names(loader);
        for name in names {
            if self.plan.agents.contains_key(&name) {
                continue;
            }
            match loader.load_agent(&name) {
                Ok(agent) => {
                    self.plan
                        .agents
                        .insert(name, Value::Object(agent.to_mount_plan_fragment()));
                }
                Err(e) => warn!("Failed to load agent '{}': {}", name, e),
            }
        }
        self
    }

    fn selected_agent_names(&self, loader: &dyn AgentLoader) -> Vec<String> {
        match &self.fragments.agents {
            Some(AgentSelection::All) => loader.list_agents(),
            Some(AgentSelection::None) => Vec::new(),
            Some(AgentSelection::Names(names)) => names.clone(),
            None => match &self.fragments.agents_config {
                Some(AgentsConfig {
                    include: Some(include),
                    ..
                }) => include.clone(),
                Some(AgentsConfig { dirs: Some(_), .. }) => loader.list_agents(),
                _ => Vec::new(),
            },
        }
    }

    /// Finish compilation.
    pub fn finish(self) -> MountPlan {
        self.plan
    }

    /// Express the folded state as a single profile carrying `metadata`.
    ///
    /// Call before injection and agent loading: the result is meant to be
    /// compiled again.
    pub fn into_profile(self, metadata: ProfileMetadata) -> Profile {
        let MountPlanBuilder { plan, fragments } = self;

        let mut context_config = plan.context.map(|c| c.config).unwrap_or_default();
        let mut session = SessionConfig {
            max_tokens: context_config.remove("max_tokens").and_then(|v| v.as_u64()),
            compact_threshold: context_config
                .remove("compact_threshold")
                .and_then(|v| v.as_f64()),
            auto_compact: context_config.remove("auto_compact").and_then(|v| v.as_bool()),
            ..SessionConfig::default()
        };
        session.orchestrator = plan
            .session
            .orchestrator
            .map(|m| module_ref(m, plan.session.orchestrator_source, ConfigTree::new()));
        session.context = plan
            .session
            .context
            .map(|m| module_ref(m, plan.session.context_source, context_config));

        let orchestrator = plan
            .orchestrator
            .filter(|o| !o.config.is_empty())
            .map(|o| OrchestratorConfig { config: o.config });

        let inline = plan.agents;
        let (agents, agents_config) = match fragments.agents {
            Some(selection) => {
                let agents_config = if inline.is_empty() {
                    fragments.agents_config
                } else {
                    let mut config = fragments.agents_config.unwrap_or_default();
                    config.inline = Some(inline);
                    Some(config)
                };
                (Some(AgentsSpec::from_selection(&selection)), agents_config)
            }
            None => {
                let agents_config = fragments.agents_config.map(|mut c| {
                    c.inline = None;
                    c
                });
                let agents = (!inline.is_empty()).then_some(AgentsSpec::Inline(inline));
                (agents, agents_config)
            }
        };

        Profile {
            metadata,
            session,
            orchestrator,
            providers: plan.providers,
            tools: plan.tools,
            hooks: plan.hooks,
            agents,
            agents_config,
            task: fragments.task,
            ui: fragments.ui,
            logging: fragments.logging,
            system: fragments.system,
        }
    }
}

/// Compile a base profile and overlays (increasing precedence) into a mount plan.
pub fn compile_profile_to_mount_plan(
    base: &Profile,
    overlays: &[Profile],
    agent_loader: Option<&dyn AgentLoader>,
) -> MountPlan {
    let mut builder = MountPlanBuilder::new(base);
    for overlay in overlays {
        builder.apply_overlay(overlay);
    }
    builder.resolve_inline_agents();
    builder.inject_fragments();
    if let Some(loader) = agent_loader {
        builder.load_agents(loader);
    }
    debug!(
        "Compiled profile '{}' with {} overlays",
        base.name(),
        overlays.len()
    );
    builder.finish()
}

/// Compile an inheritance chain (root first) plus extra overlays.
pub fn compile_chain(
    chain: &[Profile],
    overlays: &[Profile],
    agent_loader: Option<&dyn AgentLoader>,
) -> Option<MountPlan> {
    let (base, rest) = chain.split_first()?;
    let all: Vec<Profile> = rest.iter().chain(overlays).cloned().collect();
    Some(compile_profile_to_mount_plan(base, &all, agent_loader))
}

/// Fold an inheritance chain (root first) into one profile carrying the
/// most-derived profile's metadata.
pub fn flatten_chain(chain: &[Profile]) -> Option<Profile> {
    let (base, rest) = chain.split_first()?;
    let leaf = chain.last().unwrap_or(base);
    let mut builder = MountPlanBuilder::new(base);
    for profile in rest {
        builder.apply_overlay(profile);
    }
    Some(builder.into_profile(leaf.metadata.clone()))
}

fn context_config_of(session: &SessionConfig) -> ConfigTree {
    let mut config = session
        .context
        .as_ref()
        .and_then(ModuleRef::config)
        .cloned()
        .unwrap_or_default();
    for (key, value) in session.context_config() {
        config.insert(key, value);
    }
    config
}

fn orchestrator_config_of(profile: &Profile) -> ConfigTree {
    let mut config = profile
        .session
        .orchestrator
        .as_ref()
        .and_then(ModuleRef::config)
        .cloned()
        .unwrap_or_default();
    if let Some(section) = &profile.orchestrator {
        config = shallow_update(&config, &section.config);
    }
    config
}

fn update_section(section: &mut Option<ConfigSection>, config: &ConfigTree) {
    let section = section.get_or_insert_with(ConfigSection::default);
    section.config = shallow_update(&section.config, config);
}

fn inject(list: &mut [ModuleEntry], target: &str, key: &str, value: Value) {
    match list.iter_mut().find(|e| e.module == target) {
        Some(entry) => {
            entry.config_tree_mut().insert(key.to_string(), value);
        }
        None => debug!("No '{}' module mounted; dropping '{}' config", target, key),
    }
}

fn module_ref(module: String, source: Option<Value>, config: ConfigTree) -> ModuleRef {
    if source.is_none() && config.is_empty() {
        return ModuleRef::Id(module);
    }
    let mut entry = ModuleEntry::new(module);
    entry.source = source;
    if !config.is_empty() {
        entry.config = Some(Value::Object(config));
    }
    ModuleRef::Entry(entry)
}
