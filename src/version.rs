//! Build version

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package version, suffixed with the git commit when `DIRECTOR_GIT_COMMIT` is set at build time
pub fn version() -> String {
    match option_env!("DIRECTOR_GIT_COMMIT") {
        Some(commit) if !commit.is_empty() => format!("{}-{}", VERSION, commit),
        _ => VERSION.to_string(),
    }
}
