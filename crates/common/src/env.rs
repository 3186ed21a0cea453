//! Environment variable helpers
//!
//! Configuration in this workspace comes mostly from environment variables.
//! An empty or whitespace-only value is treated the same as an unset one, so
//! `FOO=` in a shell profile never activates a code path.

use std::path::PathBuf;

/// Read an environment variable, returning `None` when unset, empty, or not UTF-8.
pub fn var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

/// Read an environment variable as a filesystem path.
pub fn path(name: &str) -> Option<PathBuf> {
    var(name).map(PathBuf::from)
}

/// Read a path variable, falling back to `default` when unset.
pub fn path_or(name: &str, default: &str) -> PathBuf {
    path(name).unwrap_or_else(|| PathBuf::from(default))
}
