//! Stamp the binary with the commit and build date printed by `drover --version`.

use std::env;
use std::process::Command;

fn main() {
    let commit = Command::new("git")
        .args(["rev-parse", "--short=9", "HEAD"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| String::from_utf8_lossy(&output.stdout).trim().to_string())
        .filter(|sha| !sha.is_empty())
        .unwrap_or_else(|| "unknown".to_string());
    let built = chrono::Utc::now().format("%Y-%m-%d");
    let target = env::var("TARGET").unwrap_or_default();

    println!("cargo:rustc-env=DROVER_COMMIT={commit}");
    println!("cargo:rustc-env=DROVER_BUILD_DATE={built}");
    println!("cargo:rustc-env=DROVER_BUILD_TARGET={target}");
    println!("cargo:rerun-if-changed=.git/HEAD");
}
