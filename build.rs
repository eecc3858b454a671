use std::process::Command;

/// `--version` に出すビルド識別子。git が無ければクレートのバージョン。
fn git_describe() -> Option<String> {
    let output = Command::new("git")
        .args(["describe", "--always", "--dirty", "--tags"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!version.is_empty()).then_some(version)
}

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/index");

    let pkg = env!("CARGO_PKG_VERSION");
    let version = match git_describe() {
        Some(describe) => format!("{} ({})", pkg, describe),
        None => pkg.to_string(),
    };
    println!("cargo:rustc-env=GIT_VERSION={}", version);
}
