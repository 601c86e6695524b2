//! Build identity injected at compile time.

/// Identifies the binary that is running.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildInfo {
    /// Git commit the binary was built from. Empty when unknown.
    pub git_commit: String,
}

impl BuildInfo {
    pub fn new(git_commit: impl Into<String>) -> Self {
        Self {
            git_commit: git_commit.into(),
        }
    }

    /// The identifier `build.rs` embedded via `GIT_COMMIT_INFO`.
    pub fn from_build_env() -> Self {
        Self::new(option_env!("GIT_COMMIT_INFO").unwrap_or(""))
    }
}
