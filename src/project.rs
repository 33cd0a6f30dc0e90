//! Project root detection and path resolution
//!
//! Relative paths handed to the integration façade are resolved against the
//! project root, not the process working directory.

use std::path::{Path, PathBuf};

/// Markers that identify a project root, in priority order.
const ROOT_MARKERS: &[&str] = &[
    ".panflow.yaml",  // Explicit panflow project
    "Cargo.toml",     // Rust
    "package.json",   // Node.js
    "pyproject.toml", // Python (modern)
    "setup.py",       // Python (legacy)
    "go.mod",         // Go
    ".git",           // Git repository root (fallback)
];

/// Find the project root by walking up from `start` looking for markers.
///
/// Falls back to `start` itself when no marker is found.
pub fn find_project_root_from(start: &Path) -> PathBuf {
    let mut current = start;
    loop {
        if ROOT_MARKERS.iter().any(|m| current.join(m).exists()) {
            return current.to_path_buf();
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => break,
        }
    }

    tracing::warn!(start = %start.display(), "No project root found, using start directory");
    start.to_path_buf()
}

/// Find the project root starting at the current directory.
pub fn find_project_root() -> PathBuf {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    find_project_root_from(&cwd)
}

/// Resolve `path` against `root`. Absolute paths pass through unchanged.
///
/// Existing paths are canonicalized (without Windows UNC prefixes); paths that
/// do not exist yet, such as output files, are joined lexically.
pub fn resolve_project_path(root: &Path, path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    };
    dunce::canonicalize(&joined).unwrap_or(joined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_finds_marker_in_ancestor() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".panflow.yaml"), "").unwrap();
        let nested = dir.path().join("docs/guides");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(find_project_root_from(&nested), dir.path());
    }

    #[test]
    fn test_resolve_relative_and_absolute() {
        let dir = TempDir::new().unwrap();
        let root = dunce::canonicalize(dir.path()).unwrap();
        std::fs::write(root.join("page.html"), "<body></body>").unwrap();

        assert_eq!(
            resolve_project_path(&root, Path::new("page.html")),
            root.join("page.html")
        );
        // Not yet created: lexical join
        assert_eq!(
            resolve_project_path(&root, Path::new("out/page.md")),
            root.join("out/page.md")
        );
        let abs = root.join("page.html");
        assert_eq!(resolve_project_path(Path::new("/elsewhere"), &abs), abs);
    }
}
