//! Integration tests for `amp settings` (including `paths`), `amp module`,
//! `amp collection`, `amp agent` and `amp run --dry-run`.

mod common;

use common::TestEnv;
use predicates::prelude::*;
use serde_json::json;

// ===== Settings =====

#[test]
fn test_set_get_across_scopes() {
    let env = TestEnv::new();
    env.amp()
        .args(["settings", "set", "provider.name", "anthropic"])
        .assert()
        .success();
    env.amp()
        .args(["settings", "set", "provider.name", "openai", "--scope", "project"])
        .assert()
        .success();

    let json = env.json(&["settings", "get", "provider.name"]);
    assert_eq!(json, json!({"key": "provider.name", "value": "openai", "scope": "project"}));

    let user = env.json(&["settings", "show", "--scope", "user"]);
    assert_eq!(user["settings"]["provider"]["name"], "anthropic");
}

#[test]
fn test_set_parses_yaml_values() {
    let env = TestEnv::new();
    env.amp()
        .args(["settings", "set", "limits", "[1, 2]", "--scope", "local"])
        .assert()
        .success();
    let json = env.json(&["settings", "get", "limits"]);
    assert_eq!(json["value"], json!([1, 2]));
    assert_eq!(json["scope"], "local");
}

#[test]
fn test_unset_removes_key() {
    let env = TestEnv::new();
    env.write_home("settings.yaml", "overrides:\n  tool-bash:\n    timeout: 30\n");

    let json = env.json(&["settings", "unset", "overrides.tool-bash.timeout"]);
    assert_eq!(json["removed"], true);

    let json = env.json(&["settings", "get", "overrides"]);
    assert_eq!(json["value"], serde_json::Value::Null);
}

#[test]
fn test_session_scope_requires_session_id() {
    let env = TestEnv::new();
    env.amp()
        .args(["settings", "set", "x", "1", "--scope", "session"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("session"));

    env.amp()
        .args(["--session", "abc", "settings", "set", "x", "1", "--scope", "session"])
        .assert()
        .success();
    let json = env.json(&["--session", "abc", "settings", "get", "x"]);
    assert_eq!(json["scope"], "session");
}

#[test]
fn test_malformed_scope_file_is_skipped_on_read() {
    let env = TestEnv::new();
    env.write_project(".amplifier/settings.yaml", "provider: [unclosed\n");
    env.write_home("settings.yaml", "provider:\n  name: openai\n");

    let json = env.json(&["settings", "get", "provider.name"]);
    assert_eq!(json["value"], "openai");
}

#[test]
fn test_write_paths_reach_resolved_config() {
    let env = TestEnv::new();
    let json = env.json(&["settings", "paths", "add", "/srv/amp-out", "--scope", "project"]);
    assert_eq!(json["kind"], "allowed_write_paths");
    assert_eq!(json["path"], "/srv/amp-out");

    let json = env.json(&["settings", "paths", "list"]);
    assert_eq!(json["paths"], json!([{"path": "/srv/amp-out", "scope": "project"}]));

    let json = env.json(&["run", "--dry-run"]);
    let fs_tool = json["config"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .find(|t| t["module"] == "tool-filesystem")
        .unwrap();
    assert!(fs_tool["config"]["allowed_write_paths"]
        .as_array()
        .unwrap()
        .contains(&json!("/srv/amp-out")));

    let json = env.json(&["settings", "paths", "remove", "/srv/amp-out", "--scope", "project"]);
    assert_eq!(json["changed"], true);
    env.amp()
        .args(["settings", "paths", "list", "-H"])
        .assert()
        .success()
        .stdout(predicate::str::contains("allowed_write_paths: (none)"));
}

// ===== Modules =====

#[test]
fn test_module_resolve_layers() {
    let env = TestEnv::new();

    let json = env.json(&["module", "resolve", "tool-bash"]);
    assert_eq!(json["layer"], "profile");
    assert_eq!(json["source"]["type"], "git");

    env.write_home(
        "settings.yaml",
        "sources:\n  modules:\n    tool-bash: /opt/tool-bash\n",
    );
    let json = env.json(&["module", "resolve", "tool-bash"]);
    assert_eq!(json["layer"], "user");
    assert_eq!(json["source"], json!({"type": "file", "path": "/opt/tool-bash"}));

    env.write_project(".amplifier/modules/tool-bash/module.py", "");
    let json = env.json(&["module", "resolve", "tool-bash"]);
    assert_eq!(json["layer"], "workspace");

    env.amp()
        .env("AMPLIFIER_MODULE_TOOL_BASH", "git+https://example.com/bash@dev")
        .args(["module", "resolve", "tool-bash", "-H"])
        .assert()
        .success()
        .stdout(predicate::str::contains("via env"));
}

// ===== Collections and agents =====

#[test]
fn test_collection_list_and_locks() {
    let env = TestEnv::new();
    env.write_home("collections/toolkit/pyproject.toml", "[project]\nname = \"toolkit\"\n");
    env.write_home(
        "collections.lock",
        r#"{"collections": {"toolkit": {"name": "toolkit", "source": "git+https://example.com/toolkit@main", "commit": "abcdef1234", "path": "collections/toolkit", "installed_at": "2026-01-01T00:00:00Z"}}}"#,
    );

    let json = env.json(&["collection", "list"]);
    assert_eq!(json["collections"][0]["name"], "toolkit");
    assert_eq!(json["collections"][0]["locked"], true);

    let json = env.json(&["collection", "locks"]);
    assert_eq!(json["collections"][0]["commit"], "abcdef1234");
}

#[test]
fn test_collection_register_then_unregister() {
    let env = TestEnv::new();
    env.write_project(".amplifier/collections/design/pyproject.toml", "[project]\n");

    let json = env.json(&[
        "collection",
        "register",
        "design",
        "--source",
        "git+https://example.com/design@v2",
        "--local",
    ]);
    assert_eq!(json["entry"]["source"], "git+https://example.com/design@v2");

    let json = env.json(&["collection", "locks", "--local"]);
    assert_eq!(json["collections"][0]["name"], "design");

    env.amp()
        .args(["collection", "register", "missing", "--source", "x"])
        .assert()
        .failure();

    let json = env.json(&["collection", "unregister", "design", "--local"]);
    assert_eq!(json["removed"], true);
}

#[test]
fn test_agent_show_from_profile_dirs() {
    let env = TestEnv::new();
    env.write_project(
        "agents/explorer.md",
        "---\nname: explorer\ndescription: Explores the codebase\n---\nLook around.\n",
    );

    let json = env.json(&["agent", "list"]);
    assert!(json["agents"].as_array().unwrap().contains(&json!("explorer")));

    let json = env.json(&["agent", "show", "explorer"]);
    assert_eq!(json["origin"], "profile");
    assert_eq!(json["fragment"]["meta"]["description"], "Explores the codebase");
}

// ===== Run =====

#[test]
fn test_run_dry_run_resolves_layers() {
    let env = TestEnv::new();
    env.write_home(
        "settings.yaml",
        "config:\n  providers:\n    - module: provider-anthropic\n      config:\n        api_key: ${AMP_IT_KEY:fallback}\n",
    );
    env.write_project(
        ".amplifier/settings.yaml",
        "modules:\n  tools:\n    - module: tool-filesystem\n      config:\n        allowed_write_paths: [/srv/data]\n",
    );

    let json = env.json(&["run", "--dry-run", "--model", "claude-x"]);
    assert_eq!(json["profile"], "dev");

    let config = &json["config"];
    assert_eq!(config["provider"]["model"], "claude-x");
    assert_eq!(config["providers"].as_array().unwrap().len(), 1);
    assert_eq!(config["providers"][0]["config"]["api_key"], "fallback");

    let fs_tool = config["tools"]
        .as_array()
        .unwrap()
        .iter()
        .find(|t| t["module"] == "tool-filesystem")
        .unwrap();
    let paths = fs_tool["config"]["allowed_write_paths"].as_array().unwrap();
    assert!(paths.contains(&json!("/srv/data")));
}

#[test]
fn test_run_dry_run_env_expansion() {
    let env = TestEnv::new();
    env.write_home(
        "settings.yaml",
        "config:\n  providers:\n    - module: provider-openai\n      config:\n        api_key: ${AMP_IT_KEY}\n",
    );

    let output = env
        .amp()
        .env("AMP_IT_KEY", "sk-test")
        .args(["run", "--dry-run"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(json["config"]["providers"][0]["config"]["api_key"], "sk-test");
}
