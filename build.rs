fn main() {
    // The binary's --version string carries the short commit hash on dev builds.
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/");

    let git = |args: &[&str]| std::process::Command::new("git").args(args).output().ok();

    let hash = git(&["rev-parse", "--short", "HEAD"])
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
        .unwrap_or_default();

    let on_tag = git(&["describe", "--exact-match", "--tags", "HEAD"])
        .is_some_and(|o| o.status.success());

    println!("cargo:rustc-env=FITVIEW_GIT_HASH={hash}");
    println!("cargo:rustc-env=FITVIEW_ON_TAG={on_tag}");
}
