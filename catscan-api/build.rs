//! Build script for catscan-api
//!
//! Exposes build identification to the crate as compile-time env vars,
//! logged at startup and reported by `/health`:
//! - `GIT_HASH`: short commit hash, "unknown" outside a checkout
//! - `BUILD_TIMESTAMP`: local time, RFC 3339 with offset
//! - `BUILD_PROFILE`: debug or release

use std::process::Command;

fn main() {
    let git_hash = git_short_hash().unwrap_or_else(|| "unknown".to_string());
    let build_timestamp = chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, false);
    let profile = std::env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());

    for (key, value) in [
        ("GIT_HASH", git_hash.as_str()),
        ("BUILD_TIMESTAMP", build_timestamp.as_str()),
        ("BUILD_PROFILE", profile.as_str()),
    ] {
        println!("cargo:rustc-env={}={}", key, value);
    }

    // No rerun-if-changed: the timestamp must refresh on every build
}

fn git_short_hash() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short=8", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let hash = String::from_utf8(output.stdout).ok()?;
    let hash = hash.trim();
    (!hash.is_empty()).then(|| hash.to_string())
}
