//! Shared path containment utilities for the guard and file tools

use std::path::{Component, Path, PathBuf};

use ignore::WalkBuilder;

pub const OUTSIDE_ROOT: &str = "Access outside project root is forbidden.";

/// Directories never walked, whatever the ignore files say.
pub const SKIPPED_DIRS: &[&str] = &[".git", "node_modules", "target", ".flowcoder"];

/// Absolute, lexically normalized form of a project root.
pub fn normalize_root(root: &Path) -> PathBuf {
    let absolute = std::path::absolute(root).unwrap_or_else(|_| root.to_path_buf());
    normalize_lexically(&absolute).unwrap_or(absolute)
}

/// Resolve `.` and `..` without touching the filesystem.
///
/// Returns `None` when `..` climbs above the filesystem root.
pub fn normalize_lexically(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(p) => out.push(p.as_os_str()),
            Component::RootDir => out.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    return None;
                }
            }
            Component::Normal(name) => out.push(name),
        }
    }
    Some(out)
}

/// Resolve `path` against `root` and require the result to stay inside it.
///
/// Absolute paths are accepted only when they point inside the root. When
/// part of the target already exists, its canonical form must also stay
/// inside the canonical root, so symlinks cannot be used to escape.
pub fn resolve_within(root: &Path, path: &str) -> Result<PathBuf, String> {
    let root = normalize_root(root);
    let candidate = if Path::new(path).is_absolute() {
        PathBuf::from(path)
    } else {
        root.join(path)
    };

    let resolved = normalize_lexically(&candidate).ok_or_else(|| OUTSIDE_ROOT.to_string())?;
    if !resolved.starts_with(&root) {
        return Err(OUTSIDE_ROOT.to_string());
    }

    if let Ok(canonical_root) = root.canonicalize() {
        let mut existing = resolved.as_path();
        while !existing.exists() {
            match existing.parent() {
                Some(parent) => existing = parent,
                None => break,
            }
        }
        if let Ok(canonical) = existing.canonicalize() {
            if !canonical.starts_with(&canonical_root) {
                return Err(OUTSIDE_ROOT.to_string());
            }
        }
    }

    Ok(resolved)
}

/// Walk builder over `root`: ignore files honored, [`SKIPPED_DIRS`] pruned,
/// siblings visited in path order.
pub fn project_walker(root: &Path) -> WalkBuilder {
    let mut builder = WalkBuilder::new(root);
    builder
        .hidden(false)
        .follow_links(false)
        .require_git(false)
        .sort_by_file_path(|a, b| a.cmp(b))
        .filter_entry(|entry| {
            entry.depth() == 0
                || !entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| SKIPPED_DIRS.contains(&name))
        });
    builder
}

/// Regular files under `root`, as visited by [`project_walker`].
pub fn walk_files(root: &Path) -> impl Iterator<Item = PathBuf> {
    project_walker(root).build().filter_map(|entry| {
        let entry = entry.ok()?;
        entry
            .file_type()
            .is_some_and(|ft| ft.is_file())
            .then(|| entry.into_path())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_parent_components() {
        assert_eq!(
            normalize_lexically(Path::new("/a/b/../c/./d")),
            Some(PathBuf::from("/a/c/d"))
        );
        assert_eq!(normalize_lexically(Path::new("/..")), None);
    }

    #[test]
    fn accepts_paths_inside_root() {
        let root = Path::new("/project");
        for path in ["src/main.rs", ".", "a/../b", "./nested/deep/file", "/project/src"] {
            let resolved = resolve_within(root, path).unwrap();
            assert!(resolved.starts_with("/project"), "{path} -> {resolved:?}");
        }
    }

    #[test]
    fn rejects_paths_escaping_root() {
        let root = Path::new("/project");
        for path in ["..", "../other", "src/../../etc/passwd", "/etc/passwd", "/projectx/file", "/"] {
            assert_eq!(resolve_within(root, path), Err(OUTSIDE_ROOT.to_string()), "{path}");
        }
    }

    #[test]
    fn walk_skips_vendor_and_ignored_dirs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::create_dir_all(dir.path().join("node_modules/pkg")).unwrap();
        std::fs::create_dir_all(dir.path().join(".flowcoder/context")).unwrap();
        std::fs::write(dir.path().join("src/main.rs"), "fn main() {}").unwrap();
        std::fs::write(dir.path().join("node_modules/pkg/index.js"), "x").unwrap();
        std::fs::write(dir.path().join(".flowcoder/context/scratchpad.md"), "x").unwrap();

        let files: Vec<PathBuf> = walk_files(dir.path()).collect();
        assert_eq!(files, vec![dir.path().join("src/main.rs")]);
    }

    #[cfg(unix)]
    #[test]
    fn rejects_symlink_escape() {
        let outside = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path(), root.path().join("link")).unwrap();

        assert!(resolve_within(root.path(), "link/secret.txt").is_err());
        assert!(resolve_within(root.path(), "real/new.txt").is_ok());
    }
}
