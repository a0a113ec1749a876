use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable overriding the session database location.
pub const DB_ENV_VAR: &str = "COMMIT_REVIEW_DB";

const STATE_DIR: &str = "review-state";
const FALLBACK_STATE_DIR: &str = ".review-state";
const DB_FILE: &str = "session.db";

/// Find the closest ancestor of `start` (itself included) holding a `.git` directory.
pub fn find_repo_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(".git").is_dir())
        .map(Path::to_path_buf)
}

/// Resolve where the session database lives.
///
/// An explicit path wins. Otherwise the database goes into
/// `.git/review-state/` of the enclosing repository, or `.review-state/`
/// under `cwd` when there is no repository.
pub fn state_db_path(explicit: Option<&Path>, cwd: &Path) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }

    match find_repo_root(cwd) {
        Some(root) => root.join(".git").join(STATE_DIR).join(DB_FILE),
        None => cwd.join(FALLBACK_STATE_DIR).join(DB_FILE),
    }
}

/// Root that relative diff paths are joined onto when none is given.
pub fn default_review_root(cwd: &Path) -> PathBuf {
    find_repo_root(cwd).unwrap_or_else(|| cwd.to_path_buf())
}

pub fn current_dir() -> Result<PathBuf> {
    std::env::current_dir().context("Failed to determine the current directory")
}
