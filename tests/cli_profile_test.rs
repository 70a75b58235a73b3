//! Integration tests for `amp profile` commands.
//!
//! Covers discovery across locations, inheritance, compilation with
//! overlays, and selection across scopes.

mod common;

use common::TestEnv;
use predicates::prelude::*;
use serde_json::json;

const CHILD_PROFILE: &str = "---
profile:
  name: child
  extends: dev
session:
  orchestrator: loop-basic
tools:
  - module: tool-filesystem
    config:
      allowed_write_paths: [/tmp/scratch]
---
You are a careful engineer.
";

// ===== Discovery =====

#[test]
fn test_list_includes_bundled_and_project() {
    let env = TestEnv::new();
    env.write_project(".amplifier/profiles/child.md", CHILD_PROFILE);

    let json = env.json(&["profile", "list"]);
    let profiles = json["profiles"].as_array().unwrap();
    let location = |name: &str| {
        profiles
            .iter()
            .find(|p| p["name"] == name)
            .map(|p| p["location"].clone())
    };
    assert_eq!(location("dev"), Some(json!("bundled")));
    assert_eq!(location("child"), Some(json!("project")));
    assert_eq!(json["active"], "dev");
}

#[test]
fn test_project_profile_shadows_user() {
    let env = TestEnv::new();
    env.write_home(
        "profiles/shared.md",
        "---\nprofile:\n  name: shared\n  description: user copy\n---\n",
    );
    env.write_project(
        ".amplifier/profiles/shared.md",
        "---\nprofile:\n  name: shared\n  description: project copy\n---\n",
    );

    let json = env.json(&["profile", "show", "shared"]);
    assert_eq!(json["profile"]["profile"]["description"], "project copy");
}

// ===== Inheritance =====

#[test]
fn test_show_chain() {
    let env = TestEnv::new();
    env.write_project(".amplifier/profiles/child.md", CHILD_PROFILE);

    let json = env.json(&["profile", "show", "child", "--chain"]);
    assert_eq!(json["chain"], json!(["foundation", "base", "dev", "child"]));
}

#[test]
fn test_circular_inheritance_reports_chain() {
    let env = TestEnv::new();
    env.write_project(
        ".amplifier/profiles/a.md",
        "---\nprofile:\n  name: a\n  extends: b\n---\n",
    );
    env.write_project(
        ".amplifier/profiles/b.md",
        "---\nprofile:\n  name: b\n  extends: a\n---\n",
    );

    env.amp()
        .args(["profile", "show", "a"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("a -> b -> a"));
}

#[test]
fn test_missing_parent_is_error() {
    let env = TestEnv::new();
    env.write_project(
        ".amplifier/profiles/orphan.md",
        "---\nprofile:\n  name: orphan\n  extends: ghost\n---\n",
    );

    env.amp()
        .args(["profile", "show", "orphan", "-H"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Parent profile 'ghost' not found for 'orphan'"));
}

// ===== Compilation =====

#[test]
fn test_compile_merges_chain() {
    let env = TestEnv::new();
    env.write_project(".amplifier/profiles/child.md", CHILD_PROFILE);

    let json = env.json(&["profile", "compile", "child"]);
    let plan = &json["mount_plan"];
    assert_eq!(plan["session"]["orchestrator"], "loop-basic");

    let tools = plan["tools"].as_array().unwrap();
    let ids: Vec<&str> = tools.iter().filter_map(|t| t["module"].as_str()).collect();
    assert_eq!(ids.iter().filter(|id| **id == "tool-filesystem").count(), 1);
    assert!(ids.contains(&"tool-bash"));

    let fs_tool = tools.iter().find(|t| t["module"] == "tool-filesystem").unwrap();
    assert!(fs_tool["source"].is_string());
    assert_eq!(fs_tool["config"]["allowed_write_paths"], json!(["/tmp/scratch"]));
}

#[test]
fn test_compile_with_overlay_file() {
    let env = TestEnv::new();
    let overlay = env.write_project(
        "overlay.md",
        "---\ntools:\n  - module: tool-notebook\n  - module: tool-search\n    config:\n      max_results: 5\n---\n",
    );

    let json = env.json(&["profile", "compile", "dev", "--overlay", overlay.to_str().unwrap()]);
    let tools = json["mount_plan"]["tools"].as_array().unwrap();
    let ids: Vec<&str> = tools.iter().filter_map(|t| t["module"].as_str()).collect();
    assert_eq!(
        ids,
        vec!["tool-filesystem", "tool-bash", "tool-web", "tool-search", "tool-task", "tool-notebook"]
    );

    let search = tools.iter().find(|t| t["module"] == "tool-search").unwrap();
    assert_eq!(search["config"]["max_results"], 5);
    assert!(search["source"].is_string());
}

#[test]
fn test_compile_overlay_completes_bare_profile() {
    let env = TestEnv::new();
    env.write_project(
        ".amplifier/profiles/bare.md",
        "---\nprofile:\n  name: bare\n---\n",
    );
    let overlay = env.write_project(
        "session.md",
        "---\nsession:\n  orchestrator: loop-basic\n  context: context-simple\n---\n",
    );

    let json = env.json(&["profile", "compile", "bare", "--overlay", overlay.to_str().unwrap()]);
    assert_eq!(json["mount_plan"]["session"]["orchestrator"], "loop-basic");
    assert_eq!(json["mount_plan"]["session"]["context"], "context-simple");
}

#[test]
fn test_compile_incomplete_profile_fails() {
    let env = TestEnv::new();
    env.write_project(
        ".amplifier/profiles/bare.md",
        "---\nprofile:\n  name: bare\n---\n",
    );

    env.amp()
        .args(["profile", "compile", "bare"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("session.orchestrator is required"));
}

// ===== Selection =====

#[test]
fn test_use_then_current() {
    let env = TestEnv::new();
    env.write_project(".amplifier/profiles/child.md", CHILD_PROFILE);

    env.amp()
        .args(["profile", "use", "child"])
        .assert()
        .success();
    assert!(env
        .project_path()
        .join(".amplifier/settings.local.yaml")
        .is_file());

    let json = env.json(&["profile", "current"]);
    assert_eq!(json, json!({"name": "child", "source": "local"}));
}

#[test]
fn test_use_unknown_profile_fails() {
    let env = TestEnv::new();
    env.amp()
        .args(["profile", "use", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Profile not found: nope"));
}

#[test]
fn test_project_default_applies_without_active() {
    let env = TestEnv::new();
    env.amp()
        .args(["profile", "default", "base"])
        .assert()
        .success();

    let json = env.json(&["profile", "current"]);
    assert_eq!(json, json!({"name": "base", "source": "project"}));

    env.amp()
        .args(["profile", "use", "foundation", "--scope", "user"])
        .assert()
        .success();
    let json = env.json(&["profile", "current"]);
    assert_eq!(json, json!({"name": "foundation", "source": "user"}));
}
