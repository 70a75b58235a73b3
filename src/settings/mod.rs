//! Scoped application settings.
//!
//! Settings are plain YAML trees stored per scope:
//!
//! | Scope   | File                                                        |
//! |---------|-------------------------------------------------------------|
//! | bundled | compiled in (`defaults.yaml`)                               |
//! | user    | `~/.amplifier/settings.yaml`                                |
//! | project | `.amplifier/settings.yaml`                                  |
//! | local   | `.amplifier/settings.local.yaml`                            |
//! | session | `~/.amplifier/projects/<slug>/sessions/<id>/settings.yaml`  |
//!
//! Keys with meaning to amp:
//!
//! - `profile.active` (older files: `active_profile`) - active profile
//! - `profile.default` - project default profile (project scope only)
//! - `sources.modules` - module source overrides by id
//! - `config.providers` - provider list replacing the profile's
//! - `modules.{tools,hooks,agents}` - overlay onto the compiled mount plan
//! - `modules.tools[tool-filesystem].config.{allowed,denied}_write_paths` -
//!   filesystem permissions, edited with `amp settings paths`
//!
//! Any other key (`provider`, `active_bundle`, ...) is stored and read as-is.
//!
//! Use [`AppSettings`] for merged reads and scoped writes.

pub mod resolver;
pub mod scope;
pub mod sources;

pub use resolver::{
    AppSettings, FILESYSTEM_TOOL, Resolved, WritePathKind, get_dotted, remove_dotted, set_dotted,
};
pub use scope::Scope;
pub use sources::{FileSource, SettingsSource, StaticSource, parse_settings};
