//! Standard file locations.
//!
//! User-level state lives under `~/.amplifier` (overridable with
//! `AMPLIFIER_HOME`); project-level state lives under `<project>/.amplifier`.
//! Everything else in the crate receives paths from here rather than
//! computing them, so tests can point the whole tree at temp directories.

use crate::Result;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Environment variable that overrides the user-level amplifier directory.
pub const AMPLIFIER_HOME_ENV: &str = "AMPLIFIER_HOME";

/// Name of the per-project directory.
pub const PROJECT_DIR_NAME: &str = ".amplifier";

/// Resolved user and project roots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmplifierPaths {
    /// User-level directory (`~/.amplifier`)
    pub home: PathBuf,
    /// Project root (the directory containing `.amplifier/`)
    pub project_root: PathBuf,
}

impl AmplifierPaths {
    /// Paths for a project, honouring `AMPLIFIER_HOME`.
    pub fn for_project(project_root: &Path) -> Self {
        Self {
            home: default_home(),
            project_root: project_root.to_path_buf(),
        }
    }

    /// Paths with an explicit user-level directory.
    pub fn with_home(home: &Path, project_root: &Path) -> Self {
        Self {
            home: home.to_path_buf(),
            project_root: project_root.to_path_buf(),
        }
    }

    /// `<project>/.amplifier`
    pub fn project_dir(&self) -> PathBuf {
        self.project_root.join(PROJECT_DIR_NAME)
    }

    // ----- settings -----

    pub fn user_settings(&self) -> PathBuf {
        self.home.join("settings.yaml")
    }

    pub fn project_settings(&self) -> PathBuf {
        self.project_dir().join("settings.yaml")
    }

    pub fn local_settings(&self) -> PathBuf {
        self.project_dir().join("settings.local.yaml")
    }

    /// `~/.amplifier/projects/<slug>/sessions/<id>/settings.yaml`
    pub fn session_settings(&self, session_id: &str) -> PathBuf {
        self.home
            .join("projects")
            .join(project_slug(&self.project_root))
            .join("sessions")
            .join(session_id)
            .join("settings.yaml")
    }

    // ----- profiles and agents -----

    pub fn user_profiles_dir(&self) -> PathBuf {
        self.home.join("profiles")
    }

    pub fn project_profiles_dir(&self) -> PathBuf {
        self.project_dir().join("profiles")
    }

    pub fn user_agents_dir(&self) -> PathBuf {
        self.home.join("agents")
    }

    pub fn project_agents_dir(&self) -> PathBuf {
        self.project_dir().join("agents")
    }

    // ----- collections and modules -----

    pub fn user_collections_dir(&self) -> PathBuf {
        self.home.join("collections")
    }

    pub fn project_collections_dir(&self) -> PathBuf {
        self.project_dir().join("collections")
    }

    /// Lock file tracking installed collections.
    pub fn collections_lock(&self, local: bool) -> PathBuf {
        if local {
            self.project_dir().join("collections.lock")
        } else {
            self.home.join("collections.lock")
        }
    }

    /// Workspace directory for locally checked-out modules.
    pub fn workspace_modules_dir(&self) -> PathBuf {
        self.project_dir().join("modules")
    }
}

/// The user-level directory: `$AMPLIFIER_HOME`, else `~/.amplifier`.
pub fn default_home() -> PathBuf {
    if let Ok(dir) = std::env::var(AMPLIFIER_HOME_ENV) {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }
    dirs::home_dir()
        .map(|h| h.join(PROJECT_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(PROJECT_DIR_NAME))
}

/// Deterministic slug for a project path.
///
/// `/home/user/repos/myapp` becomes `-home-user-repos-myapp`.
pub fn project_slug(project_root: &Path) -> String {
    let raw = project_root.to_string_lossy();
    let slug: String = raw
        .chars()
        .filter(|c| *c != ':')
        .map(|c| if c == '/' || c == '\\' { '-' } else { c })
        .collect();
    if slug.starts_with('-') {
        slug
    } else {
        format!("-{}", slug)
    }
}

/// Write `contents` to `path` atomically, creating parent directories.
///
/// Content goes to a temp file in the same directory, then replaces `path`.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(&parent)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_project_slug() {
        assert_eq!(
            project_slug(Path::new("/home/user/repos/myapp")),
            "-home-user-repos-myapp"
        );
        assert_eq!(project_slug(Path::new("/tmp")), "-tmp");
        assert_eq!(
            project_slug(Path::new("C:\\projects\\web-app")),
            "-C-projects-web-app"
        );
    }

    #[test]
    fn test_scope_file_locations() {
        let paths = AmplifierPaths::with_home(Path::new("/h"), Path::new("/p"));
        assert_eq!(paths.user_settings(), PathBuf::from("/h/settings.yaml"));
        assert_eq!(
            paths.project_settings(),
            PathBuf::from("/p/.amplifier/settings.yaml")
        );
        assert_eq!(
            paths.local_settings(),
            PathBuf::from("/p/.amplifier/settings.local.yaml")
        );
        assert_eq!(
            paths.session_settings("abc"),
            PathBuf::from("/h/projects/-p/sessions/abc/settings.yaml")
        );
        assert_eq!(
            paths.collections_lock(true),
            PathBuf::from("/p/.amplifier/collections.lock")
        );
    }

    #[test]
    fn test_write_atomic_creates_parents_and_replaces() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("a/b/settings.yaml");
        write_atomic(&path, "one: 1\n").unwrap();
        write_atomic(&path, "two: 2\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "two: 2\n");
    }

    #[test]
    #[serial]
    fn test_amplifier_home_env_override() {
        // SAFETY: serialised with other env-mutating tests.
        unsafe {
            std::env::set_var(AMPLIFIER_HOME_ENV, "/custom/amp");
        }
        assert_eq!(default_home(), PathBuf::from("/custom/amp"));
        unsafe {
            std::env::remove_var(AMPLIFIER_HOME_ENV);
        }
    }
}
