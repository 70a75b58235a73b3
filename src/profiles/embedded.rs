//! Bundled profiles compiled into the amp binary.
//!
//! These form the lowest-precedence profile location: a user or project
//! profile with the same name shadows the bundled one.
//!
//! - **foundation**: provider plus basic orchestrator and context
//! - **base**: everyday tools and hooks (extends foundation)
//! - **dev**: streaming orchestration, web tools and sub-agents (extends base)

const FOUNDATION: &str = include_str!("embedded/foundation.md");
const BASE: &str = include_str!("embedded/base.md");
const DEV: &str = include_str!("embedded/dev.md");

/// Bundled profile documents as `(name, markdown)` pairs.
const BUNDLED_PROFILES: &[(&str, &str)] = &[("foundation", FOUNDATION), ("base", BASE), ("dev", DEV)];

/// Get a bundled profile document by name.
pub fn get_embedded_profile(name: &str) -> Option<&'static str> {
    BUNDLED_PROFILES
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, content)| *content)
}

/// Names of all bundled profiles.
pub fn embedded_profile_names() -> Vec<&'static str> {
    BUNDLED_PROFILES.iter().map(|(n, _)| *n).collect()
}
