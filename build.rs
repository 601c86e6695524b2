use std::process::Command;

fn main() {
    println!("cargo:rerun-if-env-changed=GIT_COMMIT_INFO");
    println!("cargo:rerun-if-changed=.git/HEAD");

    if std::env::var("GIT_COMMIT_INFO").is_ok() {
        return;
    }

    // Outside a git checkout the identifier is left empty.
    let commit = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .filter(|out| out.status.success())
        .and_then(|out| String::from_utf8(out.stdout).ok())
        .map(|s| s.trim().to_string())
        .unwrap_or_default();

    println!("cargo:rustc-env=GIT_COMMIT_INFO={}", commit);
}
