//! Profiles and mount plan compilation.
//!
//! A profile names the orchestrator, context manager, providers, tools,
//! hooks and agents a session should mount. Profiles inherit through
//! `extends`; the chain is resolved root first and folded by the compiler
//! into a [`MountPlan`].
//!
//! ```text
//! load_raw(name) ─► resolve_inheritance ─► [root, .., leaf]
//!                                              │
//!                     overlays ───────────────►│ MountPlanBuilder
//!                                              ▼
//!                                          MountPlan
//! ```

pub mod compiler;
pub mod embedded;
pub mod frontmatter;
pub mod loader;
pub mod mount_plan;
pub mod schema;

pub use compiler::{
    MountPlanBuilder, ProfileFragments, compile_chain, compile_profile_to_mount_plan,
    flatten_chain,
};
pub use loader::{
    ProfileLoader, ProfileLocation, ProfileSource, load_profile_file, resolve_inheritance,
};
pub use mount_plan::MountPlan;
pub use schema::{
    AgentSelection, AgentsConfig, AgentsSpec, LoggingConfig, Profile, ProfileMetadata,
    SessionConfig, TaskConfig, UiConfig, validate_model_pair,
};
