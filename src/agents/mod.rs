//! Agent definitions.
//!
//! An agent is a named, partial mount plan: a description, optional module
//! overrides, session overrides and a system instruction. Profiles select
//! agents by name and the compiler stores each one's fragment in the mount
//! plan's `agents` map.
//!
//! ## Resolution Order
//!
//! Unlike profiles, agents do not merge across layers. The first layer that
//! has a file wins:
//!
//! | Layer               | Location                                  |
//! |---------------------|-------------------------------------------|
//! | env                 | `AMPLIFIER_AGENT_<NAME>`                  |
//! | user collections    | `~/.amplifier/collections/*/agents/`      |
//! | user                | `~/.amplifier/agents/`                    |
//! | project collections | `.amplifier/collections/*/agents/`        |
//! | project             | `.amplifier/agents/`                      |
//! | profile             | `agents_config.dirs` of the active profile |
//!
//! ## File Format
//!
//! ```markdown
//! ---
//! meta:
//!   name: zen-architect
//!   description: Designs simple systems
//! tools:
//!   - module: tool-grep
//! ---
//! The markdown body becomes `system.instruction`.
//! ```

pub mod loader;
pub mod schema;

pub use loader::{
    AgentLoader, AgentOrigin, AgentSearchPath, FileAgentLoader, ResolvedAgentFile, agent_env_key,
    load_agent_file,
};
pub use schema::{Agent, AgentMetadata};
