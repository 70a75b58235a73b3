//! CLI argument definitions for amp.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// amp - profile, settings and collection management for Amplifier sessions.
///
/// Start with `amp profile current` to see which profile a session would use,
/// then `amp run --dry-run` to see the fully resolved configuration.
#[derive(Parser, Debug)]
#[command(name = "amp")]
#[command(author, version, about = "Resolve Amplifier profiles, settings and module sources", long_about = None)]
pub struct Cli {
    /// Output in human-readable format instead of JSON
    #[arg(short = 'H', long = "human", global = true)]
    pub human_readable: bool,

    /// Run as if amp was started in <path> instead of the current directory.
    /// The path must exist. Can also be set via AMP_PROJECT environment variable.
    #[arg(short = 'C', long = "project", global = true, env = "AMP_PROJECT")]
    pub project_path: Option<PathBuf>,

    /// Session id; enables the session settings scope
    #[arg(long = "session", global = true, env = "AMP_SESSION_ID")]
    pub session_id: Option<String>,

    /// Log debug output to stderr (RUST_LOG takes precedence)
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Profile discovery, compilation and selection
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },

    /// Read and write scoped settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommands,
    },

    /// Installed collections
    Collection {
        #[command(subcommand)]
        command: CollectionCommands,
    },

    /// Module source resolution
    Module {
        #[command(subcommand)]
        command: ModuleCommands,
    },

    /// Agent discovery
    Agent {
        #[command(subcommand)]
        command: AgentCommands,
    },

    /// Resolve the full session configuration
    ///
    /// Applies defaults, the profile, provider overrides, settings and the
    /// flags below. Only `--dry-run` is supported: amp prints the result
    /// instead of starting a session.
    Run {
        /// Profile to use instead of the active one
        #[arg(short, long)]
        profile: Option<String>,

        /// Overlay profile file(s) applied on top of the profile chain
        #[arg(long = "overlay")]
        overlays: Vec<PathBuf>,

        /// Provider name override
        #[arg(long)]
        provider: Option<String>,

        /// Model override
        #[arg(long)]
        model: Option<String>,

        /// Extra config as dotted KEY=VALUE (value parsed as YAML; `null` deletes)
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,

        /// Print the resolved configuration and exit
        #[arg(long)]
        dry_run: bool,
    },

    /// Show version information
    Version,
}

/// Profile subcommands
#[derive(Subcommand, Debug)]
pub enum ProfileCommands {
    /// List available profiles and where they come from
    List,

    /// Show a profile with inheritance applied
    Show {
        /// Profile name (or collection:profiles/name.md)
        name: String,

        /// Show the inheritance chain instead of the flattened profile
        #[arg(long)]
        chain: bool,
    },

    /// Compile a profile into a mount plan
    Compile {
        /// Profile name (defaults to the effective profile)
        name: Option<String>,

        /// Overlay profile file(s) applied on top of the chain
        #[arg(long = "overlay")]
        overlays: Vec<PathBuf>,
    },

    /// Set the active profile
    Use {
        /// Profile name
        name: String,

        /// Settings scope to write: user, project, local or session
        #[arg(long, default_value = "local")]
        scope: String,
    },

    /// Clear the active profile at a scope
    Reset {
        /// Settings scope to clear
        #[arg(long, default_value = "local")]
        scope: String,
    },

    /// Set or show the project default profile
    Default {
        /// Profile name to set (omit to show)
        name: Option<String>,
    },

    /// Show the effective profile and the scope that selected it
    Current,
}

/// Settings subcommands
#[derive(Subcommand, Debug)]
pub enum SettingsCommands {
    /// Show merged settings, or a single scope's file
    Show {
        /// Show only this scope
        #[arg(long)]
        scope: Option<String>,
    },

    /// Get a value by dotted key
    Get {
        /// Dotted key, e.g. profile.active
        key: String,
    },

    /// Set a value by dotted key
    Set {
        /// Dotted key
        key: String,
        /// Value (parsed as YAML)
        value: String,

        /// Settings scope to write
        #[arg(long, default_value = "user")]
        scope: String,
    },

    /// Remove a dotted key
    Unset {
        /// Dotted key
        key: String,

        /// Settings scope to write
        #[arg(long, default_value = "user")]
        scope: String,
    },

    /// Filesystem write permissions granted to tool-filesystem
    Paths {
        #[command(subcommand)]
        command: PathCommands,
    },
}

/// Write-path permission subcommands
#[derive(Subcommand, Debug)]
pub enum PathCommands {
    /// List paths across scopes, most specific first
    List {
        /// Show denied_write_paths instead of allowed_write_paths
        #[arg(long)]
        denied: bool,
    },

    /// Add a path (stored absolute)
    Add {
        /// Path to add
        path: String,

        /// Add to denied_write_paths
        #[arg(long)]
        denied: bool,

        /// Settings scope to write
        #[arg(long, default_value = "user")]
        scope: String,
    },

    /// Remove a path
    Remove {
        /// Path to remove, as given or in absolute form
        path: String,

        /// Remove from denied_write_paths
        #[arg(long)]
        denied: bool,

        /// Settings scope to write
        #[arg(long, default_value = "user")]
        scope: String,
    },
}

/// Collection subcommands
#[derive(Subcommand, Debug)]
pub enum CollectionCommands {
    /// List collections found in the search paths
    List,

    /// Resolve a collection name or collection:path reference
    Resolve {
        /// Collection name or reference
        reference: String,
    },

    /// Show lock file entries
    Locks {
        /// Read the project lock file instead of the user one
        #[arg(long)]
        local: bool,
    },

    /// Record an installed collection in the lock file
    Register {
        /// Collection name (a directory in the search paths)
        name: String,

        /// Source the collection was installed from
        #[arg(long)]
        source: String,

        /// Commit the installed copy corresponds to
        #[arg(long)]
        commit: Option<String>,

        /// Write the project lock file instead of the user one
        #[arg(long)]
        local: bool,
    },

    /// Remove a collection from the lock file
    Unregister {
        /// Collection name
        name: String,

        /// Write the project lock file instead of the user one
        #[arg(long)]
        local: bool,
    },
}

/// Module subcommands
#[derive(Subcommand, Debug)]
pub enum ModuleCommands {
    /// Show where a module would be loaded from
    Resolve {
        /// Module id, e.g. tool-filesystem
        module: String,

        /// Profile to take the source hint from (defaults to the effective profile)
        #[arg(short, long)]
        profile: Option<String>,
    },
}

/// Agent subcommands
#[derive(Subcommand, Debug)]
pub enum AgentCommands {
    /// List agents visible to a profile
    List {
        /// Profile whose agents_config.dirs are searched
        #[arg(short, long)]
        profile: Option<String>,
    },

    /// Show one agent's mount plan fragment
    Show {
        /// Agent name (or collection:name)
        name: String,

        /// Profile whose agents_config.dirs are searched
        #[arg(short, long)]
        profile: Option<String>,
    },
}
