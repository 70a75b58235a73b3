//! Layered, first-match-wins agent resolution.
//!
//! Agent files are looked up in this order (highest priority first):
//!
//! 1. **Env** - `AMPLIFIER_AGENT_<NAME>` pointing at a file
//! 2. **User collections** (`~/.amplifier/collections/*/agents/`)
//! 3. **User** (`~/.amplifier/agents/`)
//! 4. **Project collections** (`.amplifier/collections/*/agents/`)
//! 5. **Project** (`.amplifier/agents/`)
//! 6. **Profile** - directories named by a profile's `agents_config.dirs`
//!
//! Names of the form `collection:agent` or `collection:agents/agent.md`
//! resolve inside the named collection only.

use crate::agents::schema::Agent;
use crate::collections::{CollectionResolver, list_markdown_names};
use crate::paths::AmplifierPaths;
use crate::profiles::frontmatter;
use crate::{Error, Result};
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Prefix for per-agent file override environment variables.
pub const AGENT_ENV_PREFIX: &str = "AMPLIFIER_AGENT_";

/// Source of agent definitions used during mount plan compilation.
pub trait AgentLoader {
    /// Names of every agent this loader can load.
    fn list_agents(&self) -> Vec<String>;

    /// Load one agent by name.
    fn load_agent(&self, name: &str) -> Result<Agent>;
}

/// Where an agent file was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentOrigin {
    /// Directory from a profile's `agents_config.dirs`
    Profile,
    Project,
    User,
    /// Inside a named collection
    Collection(String),
    /// From an `AMPLIFIER_AGENT_*` environment variable
    Env(String),
}

impl fmt::Display for AgentOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentOrigin::Profile => write!(f, "profile"),
            AgentOrigin::Project => write!(f, "project"),
            AgentOrigin::User => write!(f, "user"),
            AgentOrigin::Collection(name) => write!(f, "collection:{}", name),
            AgentOrigin::Env(var) => write!(f, "env:{}", var),
        }
    }
}

/// One directory searched for `<name>.md` agent files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSearchPath {
    pub dir: PathBuf,
    pub origin: AgentOrigin,
}

impl AgentSearchPath {
    pub fn new(dir: impl Into<PathBuf>, origin: AgentOrigin) -> Self {
        Self {
            dir: dir.into(),
            origin,
        }
    }

    /// The name an agent file in this directory is listed under.
    fn qualified_name(&self, stem: &str) -> String {
        match &self.origin {
            AgentOrigin::Collection(collection) => format!("{}:{}", collection, stem),
            _ => stem.to_string(),
        }
    }
}

/// A resolved agent file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAgentFile {
    pub path: PathBuf,
    pub origin: AgentOrigin,
}

/// Filesystem-backed [`AgentLoader`].
#[derive(Debug, Clone, Default)]
pub struct FileAgentLoader {
    /// Lowest precedence first.
    search_paths: Vec<AgentSearchPath>,
    collections: CollectionResolver,
}

impl FileAgentLoader {
    /// Loader over the standard locations plus profile-provided directories.
    pub fn for_paths(paths: &AmplifierPaths, profile_dirs: &[PathBuf]) -> Self {
        let mut search_paths: Vec<AgentSearchPath> = profile_dirs
            .iter()
            .map(|d| AgentSearchPath::new(d, AgentOrigin::Profile))
            .collect();

        let scopes = [
            (paths.project_agents_dir(), paths.project_collections_dir(), AgentOrigin::Project),
            (paths.user_agents_dir(), paths.user_collections_dir(), AgentOrigin::User),
        ];
        for (agents_dir, collections_dir, origin) in scopes {
            search_paths.push(AgentSearchPath::new(agents_dir, origin));
            for (name, dir) in CollectionResolver::new(vec![collections_dir]).resource_dirs("agents")
            {
                search_paths.push(AgentSearchPath::new(dir, AgentOrigin::Collection(name)));
            }
        }

        Self {
            search_paths,
            collections: CollectionResolver::for_paths(paths),
        }
    }

    /// Find the file for `name`, or `None` when no layer has it.
    pub fn resolve(&self, name: &str) -> Option<ResolvedAgentFile> {
        if let Some((collection, _)) = name.split_once(':') {
            return self
                .collections
                .resolve_resource(name, "agents")
                .map(|path| ResolvedAgentFile {
                    path,
                    origin: AgentOrigin::Collection(collection.to_string()),
                });
        }

        let env_key = agent_env_key(name);
        if let Ok(env_path) = std::env::var(&env_key) {
            let path = PathBuf::from(&env_path);
            if path.is_file() {
                debug!("Resolved agent '{}' from env var {}", name, env_key);
                return Some(ResolvedAgentFile {
                    path,
                    origin: AgentOrigin::Env(env_key),
                });
            }
            warn!("Env var {} set but path doesn't exist: {}", env_key, env_path);
        }

        self.search_paths.iter().rev().find_map(|sp| {
            let file = sp.dir.join(format!("{}.md", name));
            file.is_file().then(|| ResolvedAgentFile {
                path: file,
                origin: sp.origin.clone(),
            })
        })
    }
}

impl AgentLoader for FileAgentLoader {
    fn list_agents(&self) -> Vec<String> {
        let mut names = BTreeSet::new();
        for sp in &self.search_paths {
            for stem in list_markdown_names(&sp.dir) {
                names.insert(sp.qualified_name(&stem));
            }
        }
        names.into_iter().collect()
    }

    fn load_agent(&self, name: &str) -> Result<Agent> {
        let resolved = self
            .resolve(name)
            .ok_or_else(|| Error::AgentNotFound(name.to_string()))?;
        load_agent_file(name, &resolved.path)
    }
}

/// Parse an agent markdown file.
pub fn load_agent_file(name: &str, path: &Path) -> Result<Agent> {
    let content = fs::read_to_string(path)
        .map_err(|e| Error::Other(format!("Failed to read {}: {}", path.display(), e)))?;
    let mut doc = frontmatter::parse(&content)
        .map_err(|e| Error::InvalidInput(format!("Invalid agent file {}: {}", path.display(), e)))?;
    frontmatter::apply_body_as_instruction(&mut doc);
    let agent = Agent::from_tree(name, doc.data)
        .map_err(|e| Error::InvalidInput(format!("Invalid agent file {}: {}", path.display(), e)))?;
    debug!("Loaded agent '{}' from {}", name, path.display());
    Ok(agent)
}

/// `AMPLIFIER_AGENT_<NAME>` with dashes mapped to underscores.
pub fn agent_env_key(name: &str) -> String {
    format!("{}{}", AGENT_ENV_PREFIX, name.to_uppercase().replace('-', "_"))
}
