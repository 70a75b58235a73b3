//! Module source resolution.
//!
//! Resolution order (first match wins):
//!
//! 1. **Env** - `AMPLIFIER_MODULE_<ID>` (dashes become underscores)
//! 2. **Workspace** - a non-empty `.amplifier/modules/<id>/` directory
//! 3. **Project** - `sources.modules.<id>` in `.amplifier/settings.yaml`
//! 4. **User** - `sources.modules.<id>` in `~/.amplifier/settings.yaml`
//! 5. **Profile** - the `source` the profile gave the module entry
//! 6. **Package** - fall back to an installed package named after the id
//!
//! Fetching is not done here: the result says where a module would come
//! from, for the session runtime to act on.

use crate::paths::AmplifierPaths;
use crate::settings::{AppSettings, Scope};
use crate::{Error, Result};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Prefix for per-module source override environment variables.
pub const MODULE_ENV_PREFIX: &str = "AMPLIFIER_MODULE_";

/// Where a module's code comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ModuleSource {
    Git {
        url: String,
        #[serde(rename = "ref")]
        git_ref: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        subdirectory: Option<String>,
    },
    File {
        path: PathBuf,
    },
    Package {
        name: String,
    },
}

impl ModuleSource {
    /// Parse a source given as a URI string or a `{type: ...}` object.
    ///
    /// Strings starting with `git+` are git URIs
    /// (`git+https://host/repo@ref#subdirectory=path`); `file://`, `/` and
    /// `.` prefixes are paths; anything else is a package name.
    pub fn parse(module_id: &str, source: &Value) -> Result<Self> {
        match source {
            Value::String(s) => Self::parse_str(module_id, s),
            Value::Object(map) => {
                let field = |key: &str| map.get(key).and_then(Value::as_str);
                let required = |key: &str| {
                    field(key).map(str::to_string).ok_or_else(|| Error::InvalidSource {
                        module: module_id.to_string(),
                        reason: format!("missing '{}'", key),
                    })
                };
                match field("type") {
                    Some("git") => Ok(ModuleSource::Git {
                        url: required("url")?,
                        git_ref: field("ref").unwrap_or("main").to_string(),
                        subdirectory: field("subdirectory").map(str::to_string),
                    }),
                    Some("file") => Ok(ModuleSource::File {
                        path: PathBuf::from(required("path")?),
                    }),
                    Some("package") => Ok(ModuleSource::Package {
                        name: required("name")?,
                    }),
                    other => Err(Error::InvalidSource {
                        module: module_id.to_string(),
                        reason: format!("invalid source type '{}'", other.unwrap_or("")),
                    }),
                }
            }
            other => Err(Error::InvalidSource {
                module: module_id.to_string(),
                reason: format!("expected a string or mapping, got {}", other),
            }),
        }
    }

    fn parse_str(module_id: &str, source: &str) -> Result<Self> {
        if let Some(uri) = source.strip_prefix("git+") {
            let (uri, subdirectory) = match uri.split_once("#subdirectory=") {
                Some((uri, sub)) => (uri, Some(sub.to_string())),
                None => (uri, None),
            };
            // The ref follows the last '@', so user@host URLs survive.
            let (url, git_ref) = match uri.rsplit_once('@') {
                Some((url, git_ref)) if !git_ref.contains('/') => (url, git_ref),
                _ => (uri, "main"),
            };
            if url.is_empty() {
                return Err(Error::InvalidSource {
                    module: module_id.to_string(),
                    reason: format!("empty git URL in '{}'", source),
                });
            }
            return Ok(ModuleSource::Git {
                url: url.to_string(),
                git_ref: git_ref.to_string(),
                subdirectory,
            });
        }
        if let Some(path) = source.strip_prefix("file://") {
            return Ok(ModuleSource::File {
                path: PathBuf::from(path),
            });
        }
        if source.starts_with('/') || source.starts_with('.') {
            return Ok(ModuleSource::File {
                path: PathBuf::from(source),
            });
        }
        Ok(ModuleSource::Package {
            name: source.to_string(),
        })
    }
}

impl fmt::Display for ModuleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleSource::Git {
                url,
                git_ref,
                subdirectory,
            } => {
                write!(f, "git+{}@{}", url, git_ref)?;
                if let Some(sub) = subdirectory {
                    write!(f, "#subdirectory={}", sub)?;
                }
                Ok(())
            }
            ModuleSource::File { path } => write!(f, "{}", path.display()),
            ModuleSource::Package { name } => write!(f, "{}", name),
        }
    }
}

/// Which resolution layer produced a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionLayer {
    Env,
    Workspace,
    Project,
    User,
    Profile,
    Package,
}

impl fmt::Display for ResolutionLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResolutionLayer::Env => "env",
            ResolutionLayer::Workspace => "workspace",
            ResolutionLayer::Project => "project",
            ResolutionLayer::User => "user",
            ResolutionLayer::Profile => "profile",
            ResolutionLayer::Package => "package",
        };
        f.write_str(s)
    }
}

/// A resolved module source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedModule {
    pub module: String,
    pub source: ModuleSource,
    pub layer: ResolutionLayer,
}

/// Six-layer module source resolver.
#[derive(Debug)]
pub struct ModuleResolver<'a> {
    paths: &'a AmplifierPaths,
    settings: &'a AppSettings,
}

impl<'a> ModuleResolver<'a> {
    pub fn new(paths: &'a AmplifierPaths, settings: &'a AppSettings) -> Self {
        Self { paths, settings }
    }

    /// Resolve `module_id`, using `profile_hint` (the profile entry's
    /// `source`) as the fifth layer.
    pub fn resolve(&self, module_id: &str, profile_hint: Option<&Value>) -> Result<ResolvedModule> {
        let resolved = |source, layer| {
            debug!("[module:resolve] {} -> {}", module_id, layer);
            Ok(ResolvedModule {
                module: module_id.to_string(),
                source,
                layer,
            })
        };

        let env_key = module_env_key(module_id);
        if let Ok(value) = std::env::var(&env_key) {
            if !value.is_empty() {
                let source = ModuleSource::parse_str(module_id, &value)?;
                return resolved(source, ResolutionLayer::Env);
            }
        }

        let workspace = self.paths.workspace_modules_dir().join(module_id);
        if is_populated_module_dir(&workspace) {
            return resolved(ModuleSource::File { path: workspace }, ResolutionLayer::Workspace);
        }

        let scoped = [
            (Scope::Project, ResolutionLayer::Project),
            (Scope::User, ResolutionLayer::User),
        ];
        for (scope, layer) in scoped {
            if let Some(source) = self.settings.module_sources(scope).get(module_id) {
                return resolved(ModuleSource::parse(module_id, source)?, layer);
            }
        }

        if let Some(hint) = profile_hint {
            return resolved(ModuleSource::parse(module_id, hint)?, ResolutionLayer::Profile);
        }

        resolved(
            ModuleSource::Package {
                name: module_id.to_string(),
            },
            ResolutionLayer::Package,
        )
    }
}

/// `AMPLIFIER_MODULE_<ID>` with dashes mapped to underscores.
pub fn module_env_key(module_id: &str) -> String {
    format!(
        "{}{}",
        MODULE_ENV_PREFIX,
        module_id.to_uppercase().replace('-', "_")
    )
}

/// A workspace module directory counts when it holds anything besides a
/// `.git` marker (an uninitialised submodule holds only that).
fn is_populated_module_dir(path: &Path) -> bool {
    let Ok(entries) = fs::read_dir(path) else {
        return false;
    };
    let populated = entries.flatten().any(|e| e.file_name() != ".git");
    if !populated {
        debug!("Workspace module dir {} is empty, skipping", path.display());
    }
    populated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestEnv;
    use serde_json::json;
    use serial_test::serial;

    // ===== Parsing =====

    #[test]
    fn test_parse_git_uri() {
        let source = ModuleSource::parse(
            "tool-x",
            &json!("git+https://github.com/org/repo@v1.2#subdirectory=modules/x"),
        )
        .unwrap();
        assert_eq!(
            source,
            ModuleSource::Git {
                url: "https://github.com/org/repo".into(),
                git_ref: "v1.2".into(),
                subdirectory: Some("modules/x".into()),
            }
        );
        assert_eq!(
            source.to_string(),
            "git+https://github.com/org/repo@v1.2#subdirectory=modules/x"
        );
    }

    #[test]
    fn test_parse_git_uri_default_ref() {
        let source = ModuleSource::parse("m", &json!("git+https://github.com/org/repo")).unwrap();
        assert!(matches!(source, ModuleSource::Git { ref git_ref, .. } if git_ref == "main"));
    }

    #[test]
    fn test_parse_paths_and_packages() {
        assert_eq!(
            ModuleSource::parse("m", &json!("file:///opt/m")).unwrap(),
            ModuleSource::File { path: "/opt/m".into() }
        );
        assert_eq!(
            ModuleSource::parse("m", &json!("./local/m")).unwrap(),
            ModuleSource::File { path: "./local/m".into() }
        );
        assert_eq!(
            ModuleSource::parse("m", &json!("amplifier-module-m")).unwrap(),
            ModuleSource::Package { name: "amplifier-module-m".into() }
        );
    }

    #[test]
    fn test_parse_object_forms() {
        assert_eq!(
            ModuleSource::parse("m", &json!({"type": "git", "url": "https://x/r"})).unwrap(),
            ModuleSource::Git {
                url: "https://x/r".into(),
                git_ref: "main".into(),
                subdirectory: None
            }
        );
        assert_eq!(
            ModuleSource::parse("m", &json!({"type": "package", "name": "pkg"})).unwrap(),
            ModuleSource::Package { name: "pkg".into() }
        );
        assert!(matches!(
            ModuleSource::parse("m", &json!({"type": "svn"})),
            Err(Error::InvalidSource { .. })
        ));
        assert!(matches!(
            ModuleSource::parse("m", &json!({"type": "file"})),
            Err(Error::InvalidSource { .. })
        ));
        assert!(ModuleSource::parse("m", &json!(42)).is_err());
    }

    // ===== Layers =====

    #[test]
    fn test_resolution_layers_in_order() {
        let env = TestEnv::new();
        let paths = env.paths();
        let hint = json!("git+https://x/profile@main");

        let settings = AppSettings::for_paths(&paths, None);
        let resolver = ModuleResolver::new(&paths, &settings);
        assert_eq!(
            resolver.resolve("tool-layered", None).unwrap().layer,
            ResolutionLayer::Package
        );
        assert_eq!(
            resolver.resolve("tool-layered", Some(&hint)).unwrap().layer,
            ResolutionLayer::Profile
        );

        env.write_home(
            "settings.yaml",
            "sources:\n  modules:\n    tool-layered: git+https://x/user@main\n",
        );
        let settings = AppSettings::for_paths(&paths, None);
        let resolver = ModuleResolver::new(&paths, &settings);
        assert_eq!(
            resolver.resolve("tool-layered", Some(&hint)).unwrap().layer,
            ResolutionLayer::User
        );

        env.write_project(
            ".amplifier/settings.yaml",
            "sources:\n  modules:\n    tool-layered: /opt/project/tool\n",
        );
        let settings = AppSettings::for_paths(&paths, None);
        let resolver = ModuleResolver::new(&paths, &settings);
        let resolved = resolver.resolve("tool-layered", Some(&hint)).unwrap();
        assert_eq!(resolved.layer, ResolutionLayer::Project);
        assert_eq!(resolved.source, ModuleSource::File { path: "/opt/project/tool".into() });

        env.write_project(".amplifier/modules/tool-layered/.git", "gitdir: x");
        assert_eq!(
            resolver.resolve("tool-layered", None).unwrap().layer,
            ResolutionLayer::Project
        );
        env.write_project(".amplifier/modules/tool-layered/__init__.py", "");
        assert_eq!(
            resolver.resolve("tool-layered", None).unwrap().layer,
            ResolutionLayer::Workspace
        );
    }

    #[test]
    #[serial]
    fn test_env_layer_wins() {
        let env = TestEnv::new();
        let paths = env.paths();
        env.write_project(".amplifier/modules/tool-env-probe/main.py", "");
        let settings = AppSettings::for_paths(&paths, None);
        let resolver = ModuleResolver::new(&paths, &settings);

        // SAFETY: serialised with other env-mutating tests.
        unsafe {
            std::env::set_var("AMPLIFIER_MODULE_TOOL_ENV_PROBE", "git+https://x/env@dev");
        }
        let resolved = resolver.resolve("tool-env-probe", None);
        unsafe {
            std::env::remove_var("AMPLIFIER_MODULE_TOOL_ENV_PROBE");
        }

        let resolved = resolved.unwrap();
        assert_eq!(resolved.layer, ResolutionLayer::Env);
        assert_eq!(resolved.source.to_string(), "git+https://x/env@dev");
    }

    #[test]
    fn test_module_env_key() {
        assert_eq!(module_env_key("tool-web"), "AMPLIFIER_MODULE_TOOL_WEB");
    }
}
