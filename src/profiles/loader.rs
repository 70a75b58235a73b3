//! Profile discovery, loading and inheritance resolution.
//!
//! Profiles are looked up by name across these locations (highest priority
//! first):
//!
//! 1. **Project** (`.amplifier/profiles/`)
//! 2. **User** (`~/.amplifier/profiles/`)
//! 3. **Project collections** (`.amplifier/collections/*/profiles/`)
//! 4. **User collections** (`~/.amplifier/collections/*/profiles/`)
//! 5. **Bundled** - profiles compiled into the binary
//!
//! In each directory `<name>.md` is tried before `<name>.toml`. Names of the
//! form `collection:profile` resolve inside the named collection only.
//!
//! Loading a profile with inheritance applied always goes through
//! [`resolve_inheritance`] and the compiler fold, so there is exactly one
//! definition of what `extends` means.

use crate::agents::FileAgentLoader;
use crate::collections::CollectionResolver;
use crate::models::ConfigTree;
use crate::paths::AmplifierPaths;
use crate::profiles::compiler::{compile_chain, flatten_chain};
use crate::profiles::embedded::{embedded_profile_names, get_embedded_profile};
use crate::profiles::frontmatter;
use crate::profiles::mount_plan::MountPlan;
use crate::profiles::schema::Profile;
use crate::{Error, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Extensions tried for profile files, in order.
pub const PROFILE_EXTENSIONS: &[&str] = &["md", "toml"];

/// Where a profile document was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileLocation {
    /// Compiled into the binary
    Bundled,
    /// Inside a named collection
    Collection(String),
    User,
    Project,
}

impl fmt::Display for ProfileLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileLocation::Bundled => write!(f, "bundled"),
            ProfileLocation::Collection(name) => write!(f, "collection:{}", name),
            ProfileLocation::User => write!(f, "user"),
            ProfileLocation::Project => write!(f, "project"),
        }
    }
}

/// One directory searched for profile files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileSearchPath {
    pub dir: PathBuf,
    pub location: ProfileLocation,
}

impl ProfileSearchPath {
    pub fn new(dir: impl Into<PathBuf>, location: ProfileLocation) -> Self {
        Self {
            dir: dir.into(),
            location,
        }
    }
}

/// A located profile document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileSource {
    pub location: ProfileLocation,
    /// File path, `None` for bundled profiles
    pub path: Option<PathBuf>,
}

/// Loads profiles from the standard locations.
#[derive(Debug, Clone)]
pub struct ProfileLoader {
    paths: AmplifierPaths,
    /// Lowest precedence first; bundled profiles sit below all of these.
    search_paths: Vec<ProfileSearchPath>,
    collections: CollectionResolver,
}

impl ProfileLoader {
    /// Loader over the standard user, project and collection locations.
    pub fn for_paths(paths: &AmplifierPaths) -> Self {
        let mut search_paths = Vec::new();
        for collections_dir in [paths.user_collections_dir(), paths.project_collections_dir()] {
            for (name, dir) in CollectionResolver::new(vec![collections_dir]).resource_dirs("profiles")
            {
                search_paths.push(ProfileSearchPath::new(dir, ProfileLocation::Collection(name)));
            }
        }
        search_paths.push(ProfileSearchPath::new(
            paths.user_profiles_dir(),
            ProfileLocation::User,
        ));
        search_paths.push(ProfileSearchPath::new(
            paths.project_profiles_dir(),
            ProfileLocation::Project,
        ));

        Self {
            paths: paths.clone(),
            search_paths,
            collections: CollectionResolver::for_paths(paths),
        }
    }

    /// Locate the document for `name`.
    pub fn find_profile_file(&self, name: &str) -> Option<ProfileSource> {
        if let Some((collection, _)) = name.split_once(':') {
            return self
                .collections
                .resolve_resource(name, "profiles")
                .map(|path| ProfileSource {
                    location: ProfileLocation::Collection(collection.to_string()),
                    path: Some(path),
                });
        }

        let found = self.search_paths.iter().rev().find_map(|sp| {
            PROFILE_EXTENSIONS.iter().find_map(|ext| {
                let file = sp.dir.join(format!("{}.{}", name, ext));
                file.is_file().then(|| ProfileSource {
                    location: sp.location.clone(),
                    path: Some(file),
                })
            })
        });

        found.or_else(|| {
            get_embedded_profile(name).map(|_| ProfileSource {
                location: ProfileLocation::Bundled,
                path: None,
            })
        })
    }

    /// Every loadable profile name with the location that wins for it,
    /// sorted by name.
    pub fn list_profiles(&self) -> Vec<(String, ProfileLocation)> {
        let mut found: BTreeMap<String, ProfileLocation> = embedded_profile_names()
            .into_iter()
            .map(|n| (n.to_string(), ProfileLocation::Bundled))
            .collect();
        for sp in &self.search_paths {
            for stem in list_profile_names(&sp.dir) {
                found.insert(stem, sp.location.clone());
            }
        }
        found.into_iter().collect()
    }

    /// Load one profile document without applying inheritance.
    pub fn load_raw(&self, name: &str) -> Result<Profile> {
        let source = self
            .find_profile_file(name)
            .ok_or_else(|| Error::ProfileNotFound(name.to_string()))?;

        let tree = match &source.path {
            Some(path) => {
                let content = fs::read_to_string(path)?;
                parse_profile_document(name, path, &content)?
            }
            None => {
                let content = get_embedded_profile(name)
                    .ok_or_else(|| Error::ProfileNotFound(name.to_string()))?;
                parse_markdown(name, content)?
            }
        };

        debug!("Loaded profile '{}' from {}", name, source.location);
        Profile::from_tree(name, tree)
    }

    /// The inheritance chain of `name`, root ancestor first.
    pub fn resolve_chain(&self, name: &str) -> Result<Vec<Profile>> {
        let leaf = self.load_raw(name)?;
        resolve_inheritance(leaf, |parent| self.load_raw(parent))
    }

    /// Load `name` with inheritance applied, as a single validated profile.
    pub fn load_profile(&self, name: &str) -> Result<Profile> {
        let chain = self.resolve_chain(name)?;
        let profile = flatten_chain(&chain).ok_or_else(|| Error::ProfileNotFound(name.to_string()))?;
        profile.validate()?;
        Ok(profile)
    }

    /// Compile `name` plus overlays into a mount plan, loading agents from
    /// the standard locations and the profile's `agents_config.dirs`.
    pub fn compile_profile(&self, name: &str, overlays: &[Profile]) -> Result<MountPlan> {
        let chain = self.resolve_chain(name)?;
        let flat = flatten_chain(&chain).ok_or_else(|| Error::ProfileNotFound(name.to_string()))?;
        flat.validate()?;
        let agent_loader = FileAgentLoader::for_paths(&self.paths, &self.agent_dirs(&flat, overlays));
        compile_chain(&chain, overlays, Some(&agent_loader))
            .ok_or_else(|| Error::ProfileNotFound(name.to_string()))
    }

    /// `agents_config.dirs` of a profile and its overlays, relative entries
    /// resolved against the project root.
    pub fn agent_dirs(&self, profile: &Profile, overlays: &[Profile]) -> Vec<PathBuf> {
        let mut dirs = Vec::new();
        for p in std::iter::once(profile).chain(overlays) {
            let listed = p.agents_config.as_ref().and_then(|c| c.dirs.as_ref());
            for dir in listed.into_iter().flatten() {
                let path = Path::new(dir);
                let resolved = if path.is_absolute() {
                    path.to_path_buf()
                } else {
                    self.paths.project_root.join(path)
                };
                if !dirs.contains(&resolved) {
                    dirs.push(resolved);
                }
            }
        }
        dirs
    }
}

/// Walk `extends` edges from `profile` to its root ancestor.
///
/// `load_parent` loads a profile by name. Returns the chain root first. A
/// name seen twice fails with [`Error::CircularInheritance`] listing the walk
/// up to and including the repeat; a parent that `load_parent` reports as
/// [`Error::ProfileNotFound`] fails with [`Error::MissingParent`].
pub fn resolve_inheritance<F>(profile: Profile, mut load_parent: F) -> Result<Vec<Profile>>
where
    F: FnMut(&str) -> Result<Profile>,
{
    let mut visited: Vec<String> = Vec::new();
    let mut chain: Vec<Profile> = Vec::new();
    let mut current = profile;

    loop {
        let name = current.name().to_string();
        if visited.contains(&name) {
            visited.push(name);
            return Err(Error::CircularInheritance { chain: visited });
        }
        visited.push(name.clone());

        let parent_name = current.extends().map(str::to_string);
        chain.push(current);

        let Some(parent_name) = parent_name else {
            break;
        };
        current = match load_parent(&parent_name) {
            Ok(parent) => parent,
            Err(Error::ProfileNotFound(_)) => {
                return Err(Error::MissingParent {
                    child: name,
                    parent: parent_name,
                });
            }
            Err(e) => return Err(e),
        };
    }

    chain.reverse();
    Ok(chain)
}

/// Load a standalone profile file, e.g. an overlay given on the command
/// line. The file stem is used as the name when the document sets none.
pub fn load_profile_file(path: &Path) -> Result<Profile> {
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let content = fs::read_to_string(path)
        .map_err(|e| Error::Other(format!("Failed to read {}: {}", path.display(), e)))?;
    let mut tree = parse_profile_document(&name, path, &content)?;
    if !tree.contains_key("profile") {
        tree.insert("profile".into(), serde_json::json!({ "name": name }));
    }
    Profile::from_tree(&name, tree)
}

/// Parse a profile document by file extension.
pub fn parse_profile_document(name: &str, path: &Path, content: &str) -> Result<ConfigTree> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => {
            let value: toml::Value = toml::from_str(content)?;
            match serde_json::to_value(value)? {
                Value::Object(map) => Ok(map),
                _ => Ok(ConfigTree::new()),
            }
        }
        _ => parse_markdown(name, content),
    }
}

fn parse_markdown(name: &str, content: &str) -> Result<ConfigTree> {
    let mut doc = frontmatter::parse(content).map_err(|e| Error::InvalidProfile {
        name: name.to_string(),
        reason: e.to_string(),
    })?;
    frontmatter::apply_body_as_instruction(&mut doc);
    Ok(doc.data)
}

fn list_profile_names(dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| PROFILE_EXTENSIONS.contains(&e))
        })
        .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().to_string()))
        .filter(|stem| !stem.eq_ignore_ascii_case("readme"))
        .collect();
    names.sort();
    names.dedup();
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModuleRef;
    use crate::test_utils::TestEnv;
    use serde_json::json;

    fn doc(name: &str, extends: Option<&str>, body: &str) -> String {
        let extends = extends
            .map(|e| format!("  extends: {}\n", e))
            .unwrap_or_default();
        format!("---\nprofile:\n  name: {}\n{}{}---\n", name, extends, body)
    }

    fn write_user_profile(env: &TestEnv, name: &str, extends: Option<&str>, body: &str) {
        env.write_home(&format!("profiles/{}.md", name), &doc(name, extends, body));
    }

    // ===== resolve_inheritance =====

    #[test]
    fn test_chain_ordering_root_first() {
        let env = TestEnv::new();
        let loader = ProfileLoader::for_paths(&env.paths());
        let names: Vec<String> = loader
            .resolve_chain("dev")
            .unwrap()
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        assert_eq!(names, vec!["foundation", "base", "dev"]);
    }

    #[test]
    fn test_cycle_detection_names_both() {
        let env = TestEnv::new();
        write_user_profile(&env, "a", Some("b"), "");
        write_user_profile(&env, "b", Some("a"), "");

        let loader = ProfileLoader::for_paths(&env.paths());
        match loader.resolve_chain("a") {
            Err(Error::CircularInheritance { chain }) => {
                assert_eq!(chain, vec!["a", "b", "a"]);
            }
            other => panic!("expected CircularInheritance, got {:?}", other),
        }
    }

    #[test]
    fn test_self_extension_is_a_cycle() {
        let env = TestEnv::new();
        write_user_profile(&env, "loop", Some("loop"), "");
        let loader = ProfileLoader::for_paths(&env.paths());
        assert!(matches!(
            loader.resolve_chain("loop"),
            Err(Error::CircularInheritance { .. })
        ));
    }

    #[test]
    fn test_missing_parent_names_both() {
        let env = TestEnv::new();
        write_user_profile(&env, "c", Some("nonexistent"), "");
        let loader = ProfileLoader::for_paths(&env.paths());
        match loader.resolve_chain("c") {
            Err(Error::MissingParent { child, parent }) => {
                assert_eq!(child, "c");
                assert_eq!(parent, "nonexistent");
            }
            other => panic!("expected MissingParent, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_parent_propagates() {
        let env = TestEnv::new();
        write_user_profile(&env, "child", Some("broken"), "");
        write_user_profile(&env, "broken", None, "  model: nope\n");
        let loader = ProfileLoader::for_paths(&env.paths());
        assert!(matches!(
            loader.resolve_chain("child"),
            Err(Error::InvalidProfile { .. })
        ));
    }

    #[test]
    fn test_resolve_inheritance_with_closure() {
        let leaf = Profile::from_tree(
            "leaf",
            crate::models::tree(json!({"profile": {"name": "leaf", "extends": "root"}})),
        )
        .unwrap();
        let chain = resolve_inheritance(leaf, |name| {
            assert_eq!(name, "root");
            Ok(Profile::new("root"))
        })
        .unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].name(), "root");
    }

    // ===== Lookup =====

    #[test]
    fn test_project_shadows_user_shadows_bundled() {
        let env = TestEnv::new();
        write_user_profile(&env, "base", None, "session:\n  orchestrator: user-loop\n");
        let loader = ProfileLoader::for_paths(&env.paths());
        let source = loader.find_profile_file("base").unwrap();
        assert_eq!(source.location, ProfileLocation::User);

        env.write_project(
            ".amplifier/profiles/base.md",
            &doc("base", None, "session:\n  orchestrator: project-loop\n"),
        );
        let loader = ProfileLoader::for_paths(&env.paths());
        let profile = loader.load_raw("base").unwrap();
        assert_eq!(
            profile.session.orchestrator,
            Some(ModuleRef::Id("project-loop".into()))
        );

        let source = loader.find_profile_file("foundation").unwrap();
        assert_eq!(source.location, ProfileLocation::Bundled);
        assert!(source.path.is_none());
    }

    #[test]
    fn test_markdown_preferred_over_toml() {
        let env = TestEnv::new();
        env.write_home("profiles/both.toml", "[profile]\nname = \"both\"\ndescription = \"toml\"\n");
        env.write_home(
            "profiles/both.md",
            "---\nprofile:\n  name: both\n  description: md\n---\n",
        );
        let loader = ProfileLoader::for_paths(&env.paths());
        assert_eq!(loader.load_raw("both").unwrap().metadata.description, "md");
    }

    #[test]
    fn test_load_toml_profile() {
        let env = TestEnv::new();
        env.write_home(
            "profiles/lean.toml",
            r#"
[profile]
name = "lean"
extends = "foundation"

[session]
max_tokens = 50000

[[tools]]
module = "tool-bash"
config = { timeout = 30 }
"#,
        );
        let loader = ProfileLoader::for_paths(&env.paths());
        let profile = loader.load_profile("lean").unwrap();
        assert_eq!(profile.session.max_tokens, Some(50000));
        assert_eq!(profile.tools[0].config, Some(json!({"timeout": 30})));
        assert_eq!(
            profile.session.orchestrator.as_ref().map(ModuleRef::module),
            Some("loop-basic")
        );
    }

    #[test]
    fn test_markdown_body_becomes_instruction() {
        let env = TestEnv::new();
        env.write_home("profiles/talky.md", &format!("{}Be concise.\n", doc("talky", None, "")));
        let loader = ProfileLoader::for_paths(&env.paths());
        let profile = loader.load_raw("talky").unwrap();
        assert_eq!(profile.system.unwrap()["instruction"], json!("Be concise."));
    }

    #[test]
    fn test_profile_not_found() {
        let env = TestEnv::new();
        let loader = ProfileLoader::for_paths(&env.paths());
        assert!(matches!(
            loader.load_profile("ghost"),
            Err(Error::ProfileNotFound(_))
        ));
    }

    #[test]
    fn test_collection_profiles() {
        let env = TestEnv::new();
        env.write_home("collections/design/pyproject.toml", "");
        env.write_home(
            "collections/design/profiles/designer.md",
            &doc("designer", Some("base"), ""),
        );
        let loader = ProfileLoader::for_paths(&env.paths());

        let source = loader.find_profile_file("design:designer").unwrap();
        assert_eq!(source.location, ProfileLocation::Collection("design".into()));
        assert!(loader.find_profile_file("designer").is_some());

        let chain = loader.resolve_chain("design:designer").unwrap();
        assert_eq!(chain.len(), 3);
    }

    #[test]
    fn test_list_profiles() {
        let env = TestEnv::new();
        write_user_profile(&env, "mine", None, "");
        write_user_profile(&env, "dev", Some("base"), "");
        env.write_project(".amplifier/profiles/team.toml", "[profile]\nname = \"team\"\n");
        env.write_home("profiles/README.md", "notes");

        let loader = ProfileLoader::for_paths(&env.paths());
        let listed = loader.list_profiles();
        let names: Vec<&str> = listed.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["base", "dev", "foundation", "mine", "team"]);
        assert!(listed.contains(&("dev".to_string(), ProfileLocation::User)));
        assert!(listed.contains(&("team".to_string(), ProfileLocation::Project)));
    }

    // ===== Flatten and compile =====

    #[test]
    fn test_load_profile_flattens_chain() {
        let env = TestEnv::new();
        let loader = ProfileLoader::for_paths(&env.paths());
        let dev = loader.load_profile("dev").unwrap();

        assert_eq!(dev.name(), "dev");
        assert_eq!(dev.extends(), Some("base"));
        assert!(dev.session.orchestrator.is_some());
        assert!(dev.session.context.is_some());
        let tools: Vec<&str> = dev.tools.iter().map(|t| t.module.as_str()).collect();
        assert!(tools.contains(&"tool-filesystem"));
        assert!(tools.contains(&"tool-task"));
        assert_eq!(dev.session.max_tokens, Some(200000));
    }

    #[test]
    fn test_compile_profile_three_levels() {
        let env = TestEnv::new();
        env.write_project(
            "agents/reviewer.md",
            "---\nmeta:\n  name: reviewer\n  description: Reviews code\n---\nReview carefully.\n",
        );
        let loader = ProfileLoader::for_paths(&env.paths());
        let plan = loader.compile_profile("dev", &[]).unwrap();

        assert_eq!(plan.session.orchestrator.as_deref(), Some("loop-streaming"));
        assert_eq!(plan.session.context.as_deref(), Some("context-simple"));
        let ids = MountPlan::module_ids(&plan.tools);
        let mut deduped = ids.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(ids.len(), deduped.len());
        assert!(ids.contains(&"tool-filesystem") && ids.contains(&"tool-web"));
        assert_eq!(
            plan.hook("agent-registry").unwrap().config,
            Some(json!({"agents": {"dirs": ["agents"]}}))
        );
        assert_eq!(plan.agents["reviewer"]["description"], json!("Reviews code"));
    }

    #[test]
    fn test_agent_dirs_resolved_against_project() {
        let env = TestEnv::new();
        let loader = ProfileLoader::for_paths(&env.paths());
        let mut profile = Profile::new("p");
        profile.agents_config = Some(crate::profiles::schema::AgentsConfig {
            dirs: Some(vec!["agents".into(), "/abs/agents".into()]),
            ..Default::default()
        });
        assert_eq!(
            loader.agent_dirs(&profile, &[]),
            vec![env.project().join("agents"), PathBuf::from("/abs/agents")]
        );
    }

    #[test]
    fn test_load_overlay_file_without_metadata() {
        let env = TestEnv::new();
        let path = env.write_project(
            "overlay.md",
            "---\ntools:\n  - module: tool-web\n---\n",
        );
        let overlay = load_profile_file(&path).unwrap();
        assert_eq!(overlay.name(), "overlay");
        assert_eq!(overlay.tools[0].module, "tool-web");
    }
}
