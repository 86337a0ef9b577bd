fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/");

    let git = |args: &[&str]| {
        std::process::Command::new("git")
            .args(args)
            .output()
            .ok()
            .filter(|o| o.status.success())
    };

    let on_tag = git(&["describe", "--exact-match", "--tags", "HEAD"]).is_some();
    let hash = git(&["rev-parse", "--short", "HEAD"])
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
        .unwrap_or_default();

    // Release builds report the crate version, everything else the commit.
    let version = if on_tag {
        std::env::var("CARGO_PKG_VERSION").unwrap_or_default()
    } else if hash.is_empty() {
        "dev@unknown".to_string()
    } else {
        format!("dev@{hash}")
    };

    println!("cargo:rustc-env=STREETSPHERE_VERSION={version}");
}
