use std::fs;
use std::path::Path;
use std::process::Command;

fn main() {
    // Build counter lives next to Cargo.toml
    let build_file = Path::new("BUILD_NUMBER");
    let build_number: u64 = fs::read_to_string(build_file)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(0);

    let new_build = build_number + 1;
    fs::write(build_file, new_build.to_string()).expect("Failed to write build number");

    let profile = std::env::var("PROFILE").unwrap_or_else(|_| "debug".to_string());
    let channel = if profile == "release" {
        "release"
    } else {
        "development"
    };

    // Crate version is the single source of truth
    let version = std::env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "0.1.0".to_string());

    let git_hash = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    println!("cargo:rustc-env=TRANSCRYPT_VERSION={}", version);
    println!("cargo:rustc-env=TRANSCRYPT_BUILD={}", new_build);
    println!("cargo:rustc-env=TRANSCRYPT_PROFILE={}", channel);
    println!("cargo:rustc-env=TRANSCRYPT_GIT_HASH={}", git_hash);

    println!("cargo:rerun-if-changed=BUILD_NUMBER");
    println!("cargo:rerun-if-changed=Cargo.toml");
    println!("cargo:rerun-if-env-changed=PROFILE");
}
