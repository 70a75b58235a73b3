//! Common test utilities for amp integration tests.
//!
//! Provides `TestEnv` for isolated test environments that don't touch the
//! user's `~/.amplifier/` directory.

#![allow(dead_code)]

use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
pub use tempfile::TempDir;

/// A test environment with an isolated home and project.
///
/// Each `TestEnv` creates two temporary directories:
/// - `project_dir`: Acts as the project root (holds `.amplifier/`)
/// - `home_dir`: Stands in for `~/.amplifier` (via `AMPLIFIER_HOME`)
///
/// The `amp()` method returns a `Command` that sets `AMPLIFIER_HOME` and the
/// working directory per-invocation, making tests parallel-safe.
pub struct TestEnv {
    pub project_dir: TempDir,
    pub home_dir: TempDir,
}

impl TestEnv {
    /// Create a new test environment with isolated directories.
    pub fn new() -> Self {
        Self {
            project_dir: TempDir::new().unwrap(),
            home_dir: TempDir::new().unwrap(),
        }
    }

    /// Get a Command for the amp binary with isolated directories.
    pub fn amp(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_amp"));
        cmd.current_dir(self.project_dir.path());
        cmd.env("AMPLIFIER_HOME", self.home_dir.path());
        cmd.env_remove("AMP_PROJECT");
        cmd.env_remove("AMP_SESSION_ID");
        cmd.env_remove("RUST_LOG");
        cmd
    }

    /// Run amp with `args`, assert success, and parse stdout as JSON.
    pub fn json(&self, args: &[&str]) -> serde_json::Value {
        let output = self.amp().args(args).assert().success().get_output().stdout.clone();
        serde_json::from_slice(&output).unwrap()
    }

    pub fn project_path(&self) -> &Path {
        self.project_dir.path()
    }

    pub fn home_path(&self) -> &Path {
        self.home_dir.path()
    }

    /// Write a file under the project root, creating parents.
    pub fn write_project(&self, rel: &str, contents: &str) -> PathBuf {
        write_file(self.project_path(), rel, contents)
    }

    /// Write a file under the home directory, creating parents.
    pub fn write_home(&self, rel: &str, contents: &str) -> PathBuf {
        write_file(self.home_path(), rel, contents)
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

fn write_file(root: &Path, rel: &str, contents: &str) -> PathBuf {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create parent directory");
    }
    fs::write(&path, contents).expect("Failed to write file");
    path
}
