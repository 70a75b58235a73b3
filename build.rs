//! Stamps `amp version` with build metadata.
//!
//! - `AMP_BUILD_TIMESTAMP`: UTC build time, or `SOURCE_DATE_EPOCH` when set
//! - `AMP_GIT_COMMIT`: `git describe` of the checkout (`-dirty` suffixed), or
//!   "unknown" outside a git checkout

use chrono::{DateTime, SecondsFormat, Utc};
use std::env;
use std::process::Command;

const TIMESTAMP_ENV: &str = "AMP_BUILD_TIMESTAMP";
const COMMIT_ENV: &str = "AMP_GIT_COMMIT";

fn main() {
    for watched in [".git/HEAD", ".git/index", ".git/refs"] {
        println!("cargo:rerun-if-changed={watched}");
    }
    println!("cargo:rerun-if-env-changed=SOURCE_DATE_EPOCH");

    println!("cargo:rustc-env={TIMESTAMP_ENV}={}", build_time());
    println!(
        "cargo:rustc-env={COMMIT_ENV}={}",
        describe_checkout().as_deref().unwrap_or("unknown")
    );
}

fn build_time() -> String {
    let pinned = env::var("SOURCE_DATE_EPOCH")
        .ok()
        .and_then(|secs| secs.trim().parse::<i64>().ok())
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0));
    pinned
        .unwrap_or_else(Utc::now)
        .to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn describe_checkout() -> Option<String> {
    let out = Command::new("git")
        .args(["describe", "--always", "--dirty", "--abbrev=10"])
        .output()
        .ok()
        .filter(|out| out.status.success())?;
    let described = String::from_utf8(out.stdout).ok()?;
    let described = described.trim();
    (!described.is_empty()).then(|| described.to_string())
}
