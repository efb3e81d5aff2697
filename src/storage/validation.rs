//! Path validation
//!
//! Turns untrusted client paths into filesystem locations confined to the
//! configured prefix, or to the working directory when no prefix is set. Both
//! the listing and the upload flows go through [`PathResolver`], so there is a
//! single traversal gate for every entry point.
//!
//! All path arithmetic here is lexical. Containment is decided by computing the
//! relative path from the base to the candidate and checking that it does not
//! climb out with `..`, never by comparing string prefixes.

use log::warn;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::error::PathError;
use crate::storage::results::ResolvedPath;

/// Resolves client paths against an optional prefix.
///
/// The prefix is fixed at construction but its existence is re-checked on
/// every call, since the filesystem may change between requests.
#[derive(Debug, Clone, Default)]
pub struct PathResolver {
    prefix: Option<PathBuf>,
}

impl PathResolver {
    /// Creates a resolver. An empty, `.` or `/` prefix means no restriction.
    pub fn new(prefix: Option<&str>) -> Self {
        let prefix = prefix
            .map(|p| clean_path(Path::new(p)))
            .filter(|p| !is_unrestricted(p));
        Self { prefix }
    }

    pub fn prefix(&self) -> Option<&Path> {
        self.prefix.as_deref()
    }

    /// Resolves a requested path to its filesystem location and display path.
    pub fn resolve(&self, requested: &str) -> Result<ResolvedPath, PathError> {
        let subpath = self.effective_subpath(requested)?;
        let base = self.base_dir()?;

        let real = clean_path(&base.join(&subpath));
        if !is_within(&base, &real) {
            warn!(
                "Rejected path '{}': resolved to {} outside {}",
                requested,
                real.display(),
                base.display()
            );
            return Err(PathError::Forbidden(format!(
                "{requested} (resolved path outside allowed root)"
            )));
        }

        // Always names the directory that was actually resolved.
        let display = to_virtual(&relative_to(&base, &real));
        Ok(ResolvedPath {
            real,
            display,
            base,
        })
    }

    /// Resolves the destination directory of an upload.
    ///
    /// Without a prefix the destination must name a directory below the
    /// working directory; with a prefix an empty destination is the prefix
    /// root.
    pub fn resolve_upload_target(&self, destination: &str) -> Result<ResolvedPath, PathError> {
        if self.prefix.is_none() && destination.trim().is_empty() {
            return Err(PathError::InvalidInput(
                "target directory cannot be empty".into(),
            ));
        }

        let resolved = self.resolve(destination)?;
        if self.prefix.is_none() && resolved.is_root() {
            return Err(PathError::InvalidInput(format!(
                "target directory '{destination}' cannot be the working directory without a prefix"
            )));
        }

        // Uploads accept both prefix-relative and absolute-within-prefix
        // destinations, so the result is checked against the base once more.
        if !resolved.real.starts_with(&resolved.base) || !is_within(&resolved.base, &resolved.real)
        {
            return Err(PathError::Forbidden(format!(
                "target directory '{destination}' attempts to traverse outside its allowed scope"
            )));
        }

        Ok(resolved)
    }

    /// Strips the prefix from absolute requests and rejects traversal before
    /// anything touches the filesystem.
    fn effective_subpath(&self, requested: &str) -> Result<PathBuf, PathError> {
        let cleaned = clean_path(Path::new(requested));
        if starts_with_parent(&cleaned) {
            warn!("Rejected path traversal attempt: '{}'", requested);
            return Err(PathError::Forbidden(format!(
                "{requested} (path traversal attempt)"
            )));
        }

        match &self.prefix {
            Some(_) if requested == "/" => Ok(PathBuf::new()),
            Some(prefix) if cleaned.has_root() => match cleaned.strip_prefix(prefix) {
                Ok(rest) => Ok(rest.to_path_buf()),
                Err(_) => {
                    warn!(
                        "Rejected absolute path '{}' outside prefix {}",
                        requested,
                        prefix.display()
                    );
                    Err(PathError::Forbidden(format!(
                        "{requested} (outside path prefix)"
                    )))
                }
            },
            Some(_) => Ok(cleaned),
            None => Ok(strip_root(&cleaned)),
        }
    }

    /// The prefix, verified to exist as a directory, or the working directory.
    fn base_dir(&self) -> Result<PathBuf, PathError> {
        let Some(prefix) = &self.prefix else {
            return current_dir();
        };

        let metadata = fs::metadata(prefix).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                PathError::PrefixNotFound(prefix.clone())
            } else {
                PathError::Io {
                    path: prefix.clone(),
                    source,
                }
            }
        })?;
        if !metadata.is_dir() {
            return Err(PathError::PrefixNotADirectory(prefix.clone()));
        }

        if prefix.is_absolute() {
            Ok(prefix.clone())
        } else {
            Ok(clean_path(&current_dir()?.join(prefix)))
        }
    }
}

/// Validates an uploaded file name, returning its cleaned form.
pub fn validate_filename(file_name: &str) -> Result<PathBuf, PathError> {
    if file_name.is_empty() {
        return Err(PathError::InvalidInput("filename not specified".into()));
    }

    let raw = Path::new(file_name);
    let cleaned = clean_path(raw);
    let traverses = raw.components().any(|c| c == Component::ParentDir);
    if traverses || has_root_or_prefix(&cleaned) || cleaned == Path::new(".") {
        return Err(PathError::InvalidInput(format!(
            "invalid characters or traversal attempt in filename '{file_name}'"
        )));
    }

    Ok(cleaned)
}

/// Lexically normalizes a path: collapses separators, drops `.`, and folds
/// `..` into the preceding component. Leading `..` of a relative path are
/// kept; `..` above the root of an absolute path are dropped. An empty result
/// is `.`.
pub fn clean_path(path: &Path) -> PathBuf {
    let mut parts: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }

    if parts.is_empty() {
        PathBuf::from(".")
    } else {
        parts.iter().collect()
    }
}

/// Lexical relative path from `base` to `target`. The result starts with `..`
/// when `target` is not below `base`, and is `.` when they are equal.
pub fn relative_to(base: &Path, target: &Path) -> PathBuf {
    let base = clean_path(base);
    let target = clean_path(target);
    let base_parts: Vec<_> = base
        .components()
        .filter(|c| *c != Component::CurDir)
        .collect();
    let target_parts: Vec<_> = target
        .components()
        .filter(|c| *c != Component::CurDir)
        .collect();

    let common = base_parts
        .iter()
        .zip(&target_parts)
        .take_while(|(a, b)| a == b)
        .count();

    let mut relative = PathBuf::new();
    for _ in common..base_parts.len() {
        relative.push("..");
    }
    for part in &target_parts[common..] {
        relative.push(part.as_os_str());
    }

    if relative.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        relative
    }
}

/// Whether `target` is `base` itself or one of its descendants.
pub fn is_within(base: &Path, target: &Path) -> bool {
    !starts_with_parent(&relative_to(base, target))
}

/// Joins a relative name onto `base`, returning `None` if the result would
/// leave `base`.
pub fn join_within(base: &Path, name: &Path) -> Option<PathBuf> {
    let cleaned = clean_path(name);
    if has_root_or_prefix(&cleaned) || starts_with_parent(&cleaned) {
        return None;
    }

    let joined = clean_path(&base.join(cleaned));
    is_within(base, &joined).then_some(joined)
}

fn starts_with_parent(path: &Path) -> bool {
    matches!(path.components().next(), Some(Component::ParentDir))
}

fn has_root_or_prefix(path: &Path) -> bool {
    path.components()
        .any(|c| matches!(c, Component::RootDir | Component::Prefix(_)))
}

fn is_unrestricted(prefix: &Path) -> bool {
    prefix == Path::new(".") || prefix == Path::new("/")
}

fn strip_root(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
        .collect()
}

fn to_virtual(path: &Path) -> String {
    let parts: Vec<_> = clean_path(path)
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    format!("/{}", parts.join("/"))
}

fn current_dir() -> Result<PathBuf, PathError> {
    std::env::current_dir().map_err(|source| PathError::Io {
        path: PathBuf::from("."),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn prefixed(dir: &Path) -> PathResolver {
        PathResolver::new(Some(dir.to_str().unwrap()))
    }

    #[test]
    fn test_clean_path() {
        assert_eq!(clean_path(Path::new("a//b/./c/")), Path::new("a/b/c"));
        assert_eq!(clean_path(Path::new("a/../b")), Path::new("b"));
        assert_eq!(clean_path(Path::new("a/../../b")), Path::new("../b"));
        assert_eq!(clean_path(Path::new("/../etc")), Path::new("/etc"));
        assert_eq!(clean_path(Path::new("")), Path::new("."));
        assert_eq!(clean_path(Path::new("./")), Path::new("."));
        assert_eq!(clean_path(Path::new("/")), Path::new("/"));
    }

    #[test]
    fn test_relative_to() {
        let srv = Path::new("/srv");
        assert_eq!(relative_to(srv, Path::new("/srv/a/b")), Path::new("a/b"));
        assert_eq!(relative_to(srv, srv), Path::new("."));
        assert_eq!(
            relative_to(Path::new("/srv/data"), Path::new("/srv/data2")),
            Path::new("../data2")
        );
        assert!(!is_within(Path::new("/srv/data"), Path::new("/srv/data2/x")));
        assert!(is_within(Path::new("/srv/data"), Path::new("/srv/data/x")));
    }

    #[test]
    fn test_join_within() {
        let base = Path::new("/srv/site");
        assert_eq!(
            join_within(base, Path::new("a/b.txt")),
            Some(PathBuf::from("/srv/site/a/b.txt"))
        );
        assert_eq!(join_within(base, Path::new(".")), Some(base.to_path_buf()));
        assert_eq!(join_within(base, Path::new("../escape.txt")), None);
        assert_eq!(join_within(base, Path::new("/etc/passwd")), None);
    }

    #[test]
    fn test_empty_dot_and_slash_prefix_are_unrestricted() {
        assert!(PathResolver::new(Some("")).prefix().is_none());
        assert!(PathResolver::new(Some(".")).prefix().is_none());
        assert!(PathResolver::new(Some("/")).prefix().is_none());
        assert!(PathResolver::new(None).prefix().is_none());
    }

    #[test]
    fn test_resolve_root_variants_with_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = prefixed(dir.path());
        let prefix = dir.path().to_str().unwrap();
        let with_slash = format!("{prefix}/");

        for requested in ["", ".", "/", "./", prefix, with_slash.as_str()] {
            let resolved = resolver.resolve(requested).unwrap();
            assert_eq!(resolved.real, dir.path(), "requested {requested:?}");
            assert_eq!(resolved.display, "/", "requested {requested:?}");
            assert!(resolved.is_root());
        }
    }

    #[test]
    fn test_resolve_subdirectories_with_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = prefixed(dir.path());
        let prefix = dir.path().to_str().unwrap();

        let resolved = resolver.resolve("a//b/./c/").unwrap();
        assert_eq!(resolved.real, dir.path().join("a/b/c"));
        assert_eq!(resolved.display, "/a/b/c");

        let resolved = resolver.resolve(&format!("{prefix}/sub")).unwrap();
        assert_eq!(resolved.real, dir.path().join("sub"));
        assert_eq!(resolved.display, "/sub");

        let resolved = resolver.resolve("a/../b").unwrap();
        assert_eq!(resolved.real, dir.path().join("b"));
        assert_eq!(resolved.display, "/b");
    }

    #[test]
    fn test_resolve_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = prefixed(dir.path());
        let prefix = dir.path().to_str().unwrap();
        let sibling = format!("{prefix}2/file");
        let climbing = format!("{prefix}/../other");

        for requested in [
            "..",
            "../",
            "../outside",
            "a/../../outside",
            "../../../../etc/passwd",
            "/etc",
            "/..",
            sibling.as_str(),
            climbing.as_str(),
        ] {
            let err = resolver.resolve(requested).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Forbidden, "requested {requested:?}");
        }
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = prefixed(dir.path());
        let first = resolver.resolve("x/y/../z").unwrap();
        let second = resolver.resolve("x/y/../z").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_prefix_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        let resolver = prefixed(&missing);

        let err = resolver.resolve("").unwrap_err();
        assert!(matches!(err, PathError::PrefixNotFound(_)));
        assert_eq!(err.kind(), ErrorKind::NotFound);

        // Re-checked on every call.
        fs::create_dir(&missing).unwrap();
        assert!(resolver.resolve("").is_ok());
    }

    #[test]
    fn test_prefix_that_is_a_file_is_wrong_type() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain.txt");
        fs::write(&file, b"x").unwrap();

        let err = prefixed(&file).resolve("").unwrap_err();
        assert!(matches!(err, PathError::PrefixNotADirectory(_)));
        assert_eq!(err.kind(), ErrorKind::WrongType);
    }

    #[test]
    fn test_resolve_without_prefix_stays_in_working_directory() {
        let resolver = PathResolver::new(None);
        let cwd = std::env::current_dir().unwrap();

        let root = resolver.resolve("").unwrap();
        assert_eq!(root.real, clean_path(&cwd));
        assert_eq!(root.display, "/");

        let nested = resolver.resolve("/a/b/").unwrap();
        assert_eq!(nested.real, clean_path(&cwd.join("a/b")));
        assert_eq!(nested.display, "/a/b");

        let err = resolver.resolve("../sibling").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[test]
    fn test_relative_prefix_display_matches_resolved_directory() {
        let dir = tempfile::tempdir_in(".").unwrap();
        let name = dir.path().file_name().unwrap().to_str().unwrap().to_string();
        let resolver = PathResolver::new(Some(&name));

        // A relative request is taken relative to the prefix, even when it
        // repeats the prefix name.
        let nested = resolver.resolve(&format!("{name}/x")).unwrap();
        let base = clean_path(&std::env::current_dir().unwrap().join(&name));
        assert_eq!(nested.real, base.join(&name).join("x"));
        assert_eq!(nested.display, format!("/{name}/x"));
        assert_eq!(
            nested.display,
            to_virtual(&relative_to(&nested.base, &nested.real))
        );

        let plain = resolver.resolve("x").unwrap();
        assert_eq!(plain.real, base.join("x"));
        assert_eq!(plain.display, "/x");
    }

    #[test]
    fn test_upload_target_requires_destination_without_prefix() {
        let resolver = PathResolver::new(None);
        for destination in ["", ".", "/", "a/.."] {
            let err = resolver.resolve_upload_target(destination).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InputInvalid, "destination {destination:?}");
        }
    }

    #[test]
    fn test_upload_target_with_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = prefixed(dir.path());
        let prefix = dir.path().to_str().unwrap();

        assert_eq!(resolver.resolve_upload_target("").unwrap().real, dir.path());
        assert_eq!(
            resolver.resolve_upload_target(&format!("{prefix}/site")).unwrap().real,
            dir.path().join("site")
        );
        assert_eq!(
            resolver.resolve_upload_target("/elsewhere").unwrap_err().kind(),
            ErrorKind::Forbidden
        );
    }

    #[test]
    fn test_validate_filename() {
        assert_eq!(validate_filename("site.tar.gz").unwrap(), Path::new("site.tar.gz"));
        assert_eq!(validate_filename("docs/readme.md").unwrap(), Path::new("docs/readme.md"));

        for name in ["", ".", "..", "../x.txt", "a/../b.txt", "/etc/passwd"] {
            let err = validate_filename(name).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InputInvalid, "name {name:?}");
        }
    }
}
