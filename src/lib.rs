//! Amplifier - profile, settings and collection management for AI agent sessions.
//!
//! This library provides the core functionality for the `amp` CLI tool,
//! centred on the configuration merge engine that folds profiles, overlays
//! and scoped settings into a single session mount plan.

pub mod agents;
pub mod cli;
pub mod collections;
pub mod commands;
pub mod merge;
pub mod models;
pub mod modules;
pub mod paths;
pub mod profiles;
pub mod runtime;
pub mod settings;


/// Library-level error type for Amplifier operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Circular inheritance detected: {}", .chain.join(" -> "))]
    CircularInheritance { chain: Vec<String> },

    #[error("Parent profile '{parent}' not found for '{child}'")]
    MissingParent { child: String, parent: String },

    #[error("Invalid profile '{name}': {reason}")]
    InvalidProfile { name: String, reason: String },

    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Invalid module entry: {0}")]
    InvalidModuleEntry(String),

    #[error("Invalid source for module '{module}': {reason}")]
    InvalidSource { module: String, reason: String },

    #[error("Settings scope '{0}' is not writable")]
    InvalidScope(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for Amplifier operations.
pub type Result<T> = std::result::Result<T, Error>;
