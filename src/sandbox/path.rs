//! Path resolution against a workspace root.
//!
//! Paths requested by a tool are resolved to an absolute, symlink-free form
//! and must land inside the canonical workspace root.

use crate::sandbox::violation::PathViolation;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Resolves requested paths against a canonical root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathResolver {
    /// Canonical workspace root.
    root: PathBuf,
}

impl PathResolver {
    /// Creates a resolver for an already-canonicalized root.
    #[must_use]
    pub fn new(canonical_root: PathBuf) -> Self {
        Self {
            root: canonical_root,
        }
    }

    /// Returns the canonical root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a path whose parent directory must already exist.
    ///
    /// Resolution steps:
    /// 1. Reject empty input
    /// 2. Join relative paths onto the root
    /// 3. Canonicalize the path, or its parent when the leaf does not exist
    /// 4. Verify the result is the root or a descendant of it
    ///
    /// # Errors
    ///
    /// Returns `PathViolation` for every failure, whatever the cause.
    pub fn resolve(&self, requested: &str) -> Result<PathBuf, PathViolation> {
        let candidate = self.candidate(requested)?;

        let resolved = match candidate.canonicalize() {
            Ok(canonical) => canonical,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                // A dangling symlink would be followed on write
                if candidate.symlink_metadata().is_ok() {
                    return Err(deny(requested, "leaf is a dangling symlink"));
                }
                let file_name = match candidate.components().next_back() {
                    Some(Component::Normal(name)) => name.to_os_string(),
                    _ => return Err(deny(requested, "leaf is not a plain name")),
                };
                let parent = candidate
                    .parent()
                    .ok_or_else(|| deny(requested, "path has no parent"))?;
                let canonical_parent = parent
                    .canonicalize()
                    .map_err(|e| deny(requested, &e.to_string()))?;
                canonical_parent.join(file_name)
            }
            Err(e) => return Err(deny(requested, &e.to_string())),
        };

        self.contain(requested, resolved)
    }

    /// Resolves a path that may have missing intermediate directories.
    ///
    /// The deepest existing ancestor is canonicalized; every component after
    /// it must be a plain name, so the missing tail cannot climb back out.
    ///
    /// # Errors
    ///
    /// Returns `PathViolation` for every failure, whatever the cause.
    pub fn resolve_new(&self, requested: &str) -> Result<PathBuf, PathViolation> {
        let candidate = self.candidate(requested)?;

        let mut tail = Vec::new();
        let mut ancestor = candidate.as_path();
        while ancestor.symlink_metadata().is_err() {
            match ancestor.components().next_back() {
                Some(Component::Normal(name)) => tail.push(name.to_os_string()),
                _ => return Err(deny(requested, "missing tail is not a plain name")),
            }
            ancestor = ancestor
                .parent()
                .ok_or_else(|| deny(requested, "no existing ancestor"))?;
        }

        let mut resolved = ancestor
            .canonicalize()
            .map_err(|e| deny(requested, &e.to_string()))?;
        for name in tail.into_iter().rev() {
            resolved.push(name);
        }

        self.contain(requested, resolved)
    }

    fn candidate(&self, requested: &str) -> Result<PathBuf, PathViolation> {
        if requested.trim().is_empty() {
            return Err(deny(requested, "empty path"));
        }
        let path = Path::new(requested);
        Ok(if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        })
    }

    fn contain(&self, requested: &str, resolved: PathBuf) -> Result<PathBuf, PathViolation> {
        if resolved.starts_with(&self.root) {
            Ok(resolved)
        } else {
            Err(deny(requested, "resolves outside the workspace root"))
        }
    }
}

fn deny(requested: &str, reason: &str) -> PathViolation {
    tracing::debug!(requested = %requested, reason = %reason, "Path rejected");
    PathViolation::new(requested)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn resolver(dir: &TempDir) -> PathResolver {
        PathResolver::new(dir.path().canonicalize().unwrap())
    }

    #[test]
    fn resolves_existing_relative_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), "x").unwrap();

        let resolved = resolver(&dir).resolve("a.txt").unwrap();
        assert_eq!(resolved, dir.path().canonicalize().unwrap().join("a.txt"));
    }

    #[test]
    fn resolves_missing_leaf_with_existing_parent() {
        let dir = TempDir::new().unwrap();
        let resolved = resolver(&dir).resolve("new.txt").unwrap();
        assert!(resolved.ends_with("new.txt"));
    }

    #[test]
    fn root_itself_is_allowed() {
        let dir = TempDir::new().unwrap();
        let r = resolver(&dir);
        assert_eq!(r.resolve(".").unwrap(), r.root());
    }

    #[test]
    fn rejects_empty_and_whitespace() {
        let dir = TempDir::new().unwrap();
        let r = resolver(&dir);
        assert_eq!(r.resolve(""), Err(PathViolation::new("")));
        assert_eq!(r.resolve("  "), Err(PathViolation::new("  ")));
    }

    #[test]
    fn rejects_parent_traversal() {
        let dir = TempDir::new().unwrap();
        let r = resolver(&dir);
        assert!(r.resolve("../outside.txt").is_err());
        assert!(r.resolve("sub/../../outside.txt").is_err());
        assert!(r.resolve("..").is_err());
    }

    #[test]
    fn rejects_absolute_path_outside_root() {
        let dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("secret"), "s").unwrap();

        let requested = outside.path().join("secret");
        assert!(resolver(&dir).resolve(requested.to_str().unwrap()).is_err());
    }

    #[test]
    fn accepts_absolute_path_inside_root() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("in.txt"), "x").unwrap();

        let requested = dir.path().join("in.txt");
        assert!(resolver(&dir).resolve(requested.to_str().unwrap()).is_ok());
    }

    #[test]
    fn missing_parent_is_a_violation() {
        let dir = TempDir::new().unwrap();
        assert!(resolver(&dir).resolve("missing/dir/file.txt").is_err());
    }

    #[test]
    #[allow(enum_intrinsics_non_enums)]
    fn all_failures_share_one_kind() {
        let dir = TempDir::new().unwrap();
        let r = resolver(&dir);
        let empty = r.resolve("").unwrap_err();
        let escape = r.resolve("../x").unwrap_err();
        assert_eq!(std::mem::discriminant(&empty), std::mem::discriminant(&escape));
    }

    #[test]
    fn resolve_new_allows_missing_directories() {
        let dir = TempDir::new().unwrap();
        let r = resolver(&dir);
        let resolved = r.resolve_new("a/b/c.txt").unwrap();
        assert_eq!(resolved, r.root().join("a").join("b").join("c.txt"));
    }

    #[test]
    fn resolve_new_rejects_traversal_in_missing_tail() {
        let dir = TempDir::new().unwrap();
        let r = resolver(&dir);
        assert!(r.resolve_new("missing/../../escape.txt").is_err());
        assert!(r.resolve_new("../escape/new.txt").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn rejects_symlink_escaping_root() {
        let dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("secret.txt"), "s").unwrap();
        std::os::unix::fs::symlink(outside.path().join("secret.txt"), dir.path().join("link"))
            .unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("dirlink")).unwrap();

        let r = resolver(&dir);
        assert!(r.resolve("link").is_err());
        assert!(r.resolve("dirlink/new.txt").is_err());
        assert!(r.resolve_new("dirlink/deeper/new.txt").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn rejects_dangling_symlink_leaf() {
        let dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path().join("not-yet"), dir.path().join("dangling"))
            .unwrap();

        let r = resolver(&dir);
        assert!(r.resolve("dangling").is_err());
        assert!(r.resolve_new("dangling").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn follows_symlink_within_root() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("real.txt"), "x").unwrap();
        std::os::unix::fs::symlink(dir.path().join("real.txt"), dir.path().join("link.txt"))
            .unwrap();

        let r = resolver(&dir);
        assert_eq!(r.resolve("link.txt").unwrap(), r.root().join("real.txt"));
    }
}
