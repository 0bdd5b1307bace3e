use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use crate::core::config::Config;

/// Errors that can occur during path validation
#[derive(Debug, thiserror::Error)]
pub enum PathSecurityError {
    #[error("Path '{path}' is outside allowed root directory '{root}'")]
    OutsideRootDirectory { path: PathBuf, root: PathBuf },

    #[error("Symlink '{path}' points outside allowed root directory")]
    SymlinkOutsideRoot { path: PathBuf },

    #[error("Symlink '{path}' rejected: symlinks are disabled")]
    SymlinkNotAllowed { path: PathBuf },

    #[error("Cannot canonicalize path '{path}': {error}")]
    CannotCanonicalize { path: PathBuf, error: io::Error },

    #[error("Path does not exist: '{path}'")]
    PathNotFound { path: PathBuf },

    #[error("IO error for path '{path}': {error}")]
    IoError { path: PathBuf, error: io::Error },
}

/// Validates that a given path is within the configured security boundaries.
///
/// This function performs the following checks:
/// 1. Canonicalizes the input path to resolve `.`, `..`, and symlinks
/// 2. If a root path is configured, ensures the canonical path is within that root
/// 3. Handles symlinks according to the configured policy
///
/// # Arguments
///
/// * `input_path` - The path to validate (can be relative or absolute)
/// * `config` - The server configuration containing security settings
///
/// # Returns
///
/// * `Ok(PathBuf)` - The canonicalized, validated path
/// * `Err(PathSecurityError)` - If validation fails
///
/// # Examples
///
/// ```rust,ignore
/// let config = Config::from_env();
/// let safe_path = validate_path("/srv/data/report.csv", &config)?;
/// ```
pub fn validate_path(input_path: &str, config: &Config) -> Result<PathBuf, PathSecurityError> {
    let path = Path::new(input_path);

    // If no root path is configured, only do basic canonicalization
    let Some(ref root) = config.security.root_path else {
        // No restrictions - just ensure path exists and canonicalize if possible
        return canonicalize_path(path);
    };

    let canonical_root = canonical_root(root)?;

    // A dangling link is reported as missing, whatever it points at
    if !path.exists() {
        return Err(PathSecurityError::PathNotFound {
            path: path.to_path_buf(),
        });
    }

    if is_symlink(path) {
        return check_symlink(path, &canonical_root, config);
    }

    // Canonicalize the input path
    let canonical_path = path.canonicalize().map_err(|e| PathSecurityError::CannotCanonicalize {
        path: path.to_path_buf(),
        error: e,
    })?;

    // Verify the canonical path is within the root
    if !is_within_root(&canonical_path, &canonical_root) {
        return Err(PathSecurityError::OutsideRootDirectory {
            path: canonical_path,
            root: canonical_root,
        });
    }

    Ok(canonical_path)
}

/// Validates a path that is about to be created or overwritten.
///
/// The target itself may not exist yet, so the nearest existing ancestor is
/// canonicalized and checked against the root instead, and the remaining
/// components are rejected if they try to climb back out with `..`.
/// A symlink at the target, dangling or not, goes through the symlink
/// policy and is resolved to the file it would actually write.
///
/// Returns the path the caller should write to.
pub fn validate_write_path(
    input_path: &str,
    config: &Config,
) -> Result<PathBuf, PathSecurityError> {
    let path = Path::new(input_path);

    if is_symlink(path) {
        let Some(ref root) = config.security.root_path else {
            return resolve_link(path);
        };
        return check_symlink(path, &canonical_root(root)?, config);
    }

    if entry_exists(path) {
        return validate_path(input_path, config);
    }

    let (ancestor, pending) = split_existing(path)?;

    let base = match ancestor.to_str() {
        Some(s) => validate_path(s, config)?,
        None => canonicalize_path(ancestor)?,
    };

    Ok(pending.into_iter().rev().fold(base, |mut target, component| {
        target.push(component);
        target
    }))
}

/// Upper bound on chained links followed while resolving a symlink.
const MAX_LINK_HOPS: usize = 32;

/// Applies the symlink policy to `link` and returns its resolved target.
///
/// With `allow_symlinks` off every link is refused. Otherwise the chain is
/// followed and the final target, which may not exist yet, must be inside
/// the root.
fn check_symlink(
    link: &Path,
    canonical_root: &Path,
    config: &Config,
) -> Result<PathBuf, PathSecurityError> {
    if !config.security.allow_symlinks {
        return Err(PathSecurityError::SymlinkNotAllowed {
            path: link.to_path_buf(),
        });
    }

    let target = resolve_link(link).map_err(|_| PathSecurityError::SymlinkOutsideRoot {
        path: link.to_path_buf(),
    })?;

    if !is_within_root(&target, canonical_root) {
        return Err(PathSecurityError::SymlinkOutsideRoot {
            path: link.to_path_buf(),
        });
    }
    Ok(target)
}

/// Follows a symlink chain to a canonical path, tolerating a missing tail.
fn resolve_link(link: &Path) -> Result<PathBuf, PathSecurityError> {
    let mut current = link.to_path_buf();
    for _ in 0..MAX_LINK_HOPS {
        let target = current.read_link().map_err(|e| PathSecurityError::IoError {
            path: current.clone(),
            error: e,
        })?;
        // Relative targets are relative to the directory holding the link
        let next = match current.parent() {
            Some(parent) if target.is_relative() => parent.join(target),
            _ => target,
        };
        if !is_symlink(&next) {
            return resolve_missing(&next);
        }
        current = next;
    }
    Err(PathSecurityError::IoError {
        path: link.to_path_buf(),
        error: io::Error::other("too many levels of symbolic links"),
    })
}

/// Canonicalizes the existing part of `path` and re-attaches the rest.
fn resolve_missing(path: &Path) -> Result<PathBuf, PathSecurityError> {
    if path.exists() {
        return canonicalize_path(path);
    }
    let (ancestor, pending) = split_existing(path)?;
    let base = canonicalize_path(ancestor)?;
    Ok(pending.into_iter().rev().fold(base, |mut target, component| {
        target.push(component);
        target
    }))
}

/// Splits `path` into its nearest existing ancestor and the missing
/// components below it (innermost first).
///
/// `file_name` yields None for `..`, so a traversal in the missing tail
/// fails here. A dangling link counts as existing and is left for the
/// caller to reject.
fn split_existing(path: &Path) -> Result<(&Path, Vec<OsString>), PathSecurityError> {
    let mut ancestor = path;
    let mut pending = Vec::new();
    loop {
        if ancestor.as_os_str().is_empty() {
            return Ok((Path::new("."), pending));
        }
        if entry_exists(ancestor) {
            return Ok((ancestor, pending));
        }
        match (ancestor.file_name(), ancestor.parent()) {
            (Some(name), Some(parent)) => {
                pending.push(name.to_os_string());
                ancestor = parent;
            }
            _ => {
                return Err(PathSecurityError::PathNotFound {
                    path: path.to_path_buf(),
                });
            }
        }
    }
}

fn canonical_root(root: &Path) -> Result<PathBuf, PathSecurityError> {
    root.canonicalize().map_err(|e| PathSecurityError::IoError {
        path: root.to_path_buf(),
        error: e,
    })
}

/// True for a symlink itself, without following it.
fn is_symlink(path: &Path) -> bool {
    path.symlink_metadata()
        .map(|meta| meta.file_type().is_symlink())
        .unwrap_or(false)
}

/// True if anything, including a dangling link, occupies `path`.
fn entry_exists(path: &Path) -> bool {
    path.symlink_metadata().is_ok()
}

/// Checks if a path is within (or equal to) a root directory
fn is_within_root(path: &Path, root: &Path) -> bool {
    path.starts_with(root)
}

/// Attempts to canonicalize a path, returning it as-is if canonicalization fails
/// (e.g., for non-existent paths)
fn canonicalize_path(path: &Path) -> Result<PathBuf, PathSecurityError> {
    path.canonicalize().map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            PathSecurityError::PathNotFound {
                path: path.to_path_buf(),
            }
        } else {
            PathSecurityError::CannotCanonicalize {
                path: path.to_path_buf(),
                error: e,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_config(root: Option<PathBuf>, allow_symlinks: bool) -> Config {
        use crate::core::config::SecurityConfig;

        let mut config = Config::default();
        config.security = SecurityConfig {
            root_path: root,
            allow_symlinks,
        };
        config
    }

    #[test]
    fn test_no_root_allows_existing_paths() {
        let temp_dir = TempDir::new().unwrap();
        let test_file = temp_dir.path().join("test.txt");
        fs::write(&test_file, "test").unwrap();

        let config = create_test_config(None, true);
        let result = validate_path(test_file.to_str().unwrap(), &config);

        assert!(result.is_ok());
    }

    #[test]
    fn test_path_within_root() {
        let temp_dir = TempDir::new().unwrap();
        let test_file = temp_dir.path().join("test.txt");
        fs::write(&test_file, "test").unwrap();

        let config = create_test_config(Some(temp_dir.path().to_path_buf()), true);
        let result = validate_path(test_file.to_str().unwrap(), &config);

        assert!(result.is_ok());
    }

    #[test]
    fn test_path_outside_root() {
        let root_dir = TempDir::new().unwrap();
        let outside_dir = TempDir::new().unwrap();
        let outside_file = outside_dir.path().join("outside.txt");
        fs::write(&outside_file, "test").unwrap();

        let config = create_test_config(Some(root_dir.path().to_path_buf()), true);
        let result = validate_path(outside_file.to_str().unwrap(), &config);

        assert!(matches!(
            result,
            Err(PathSecurityError::OutsideRootDirectory { .. })
        ));
    }

    #[test]
    fn test_path_traversal_blocked() {
        let temp_dir = TempDir::new().unwrap();
        let subdir = temp_dir.path().join("subdir");
        fs::create_dir(&subdir).unwrap();

        let test_file = temp_dir.path().join("test.txt");
        fs::write(&test_file, "test").unwrap();

        // Try to access parent directory file from subdir using ../
        let config = create_test_config(Some(subdir.clone()), true);
        let traversal_path = subdir.join("../test.txt");

        let result = validate_path(traversal_path.to_str().unwrap(), &config);

        // Should fail because canonical path resolves to temp_dir/test.txt
        // which is outside the subdir root
        assert!(matches!(
            result,
            Err(PathSecurityError::OutsideRootDirectory { .. })
        ));
    }

    #[test]
    fn test_nonexistent_path() {
        let temp_dir = TempDir::new().unwrap();
        let nonexistent = temp_dir.path().join("does_not_exist.txt");

        let config = create_test_config(Some(temp_dir.path().to_path_buf()), true);
        let result = validate_path(nonexistent.to_str().unwrap(), &config);

        assert!(matches!(result, Err(PathSecurityError::PathNotFound { .. })));
    }

    #[test]
    fn test_write_path_new_file_within_root() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("new_dir").join("out.txt");

        let config = create_test_config(Some(temp_dir.path().to_path_buf()), true);
        let result = validate_write_path(target.to_str().unwrap(), &config).unwrap();

        assert!(result.ends_with("new_dir/out.txt"));
        assert!(result.starts_with(temp_dir.path().canonicalize().unwrap()));
    }

    #[test]
    fn test_write_path_outside_root() {
        let root_dir = TempDir::new().unwrap();
        let outside_dir = TempDir::new().unwrap();
        let target = outside_dir.path().join("escape.txt");

        let config = create_test_config(Some(root_dir.path().to_path_buf()), true);
        let result = validate_write_path(target.to_str().unwrap(), &config);

        assert!(matches!(
            result,
            Err(PathSecurityError::OutsideRootDirectory { .. })
        ));
    }

    #[test]
    fn test_write_path_traversal_in_missing_tail() {
        let temp_dir = TempDir::new().unwrap();
        let subdir = temp_dir.path().join("subdir");
        fs::create_dir(&subdir).unwrap();

        let config = create_test_config(Some(subdir.clone()), true);
        let sneaky = subdir.join("missing/../../escape.txt");

        assert!(validate_write_path(sneaky.to_str().unwrap(), &config).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_write_path_dangling_symlink_outside_root() {
        use std::os::unix::fs::symlink;

        let root_dir = TempDir::new().unwrap();
        let outside_dir = TempDir::new().unwrap();
        let link = root_dir.path().join("link.txt");
        symlink(outside_dir.path().join("created.txt"), &link).unwrap();

        for allow_symlinks in [false, true] {
            let config = create_test_config(Some(root_dir.path().to_path_buf()), allow_symlinks);
            assert!(validate_write_path(link.to_str().unwrap(), &config).is_err());
        }
        assert!(!outside_dir.path().join("created.txt").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_write_path_dangling_symlink_inside_root() {
        use std::os::unix::fs::symlink;

        let temp_dir = TempDir::new().unwrap();
        let link = temp_dir.path().join("link.txt");
        symlink("later.txt", &link).unwrap();

        let config = create_test_config(Some(temp_dir.path().to_path_buf()), true);
        let resolved = validate_write_path(link.to_str().unwrap(), &config).unwrap();
        assert_eq!(
            resolved,
            temp_dir.path().canonicalize().unwrap().join("later.txt")
        );

        let config = create_test_config(Some(temp_dir.path().to_path_buf()), false);
        assert!(matches!(
            validate_write_path(link.to_str().unwrap(), &config),
            Err(PathSecurityError::SymlinkNotAllowed { .. })
        ));
    }

    #[test]
    fn test_write_path_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let existing = temp_dir.path().join("existing.txt");
        fs::write(&existing, "old").unwrap();

        let config = create_test_config(Some(temp_dir.path().to_path_buf()), true);
        assert!(validate_write_path(existing.to_str().unwrap(), &config).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_within_root() {
        use std::os::unix::fs::symlink;

        let temp_dir = TempDir::new().unwrap();
        let target_file = temp_dir.path().join("target.txt");
        let link_file = temp_dir.path().join("link.txt");

        fs::write(&target_file, "test").unwrap();
        symlink(&target_file, &link_file).unwrap();

        let config = create_test_config(Some(temp_dir.path().to_path_buf()), true);
        let result = validate_path(link_file.to_str().unwrap(), &config);

        assert!(result.is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_outside_root_blocked() {
        use std::os::unix::fs::symlink;

        let root_dir = TempDir::new().unwrap();
        let outside_dir = TempDir::new().unwrap();

        let target_file = outside_dir.path().join("target.txt");
        let link_file = root_dir.path().join("link.txt");

        fs::write(&target_file, "test").unwrap();
        symlink(&target_file, &link_file).unwrap();

        let config = create_test_config(Some(root_dir.path().to_path_buf()), true);
        let result = validate_path(link_file.to_str().unwrap(), &config);

        assert!(matches!(
            result,
            Err(PathSecurityError::SymlinkOutsideRoot { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_disallowed_by_config() {
        use std::os::unix::fs::symlink;

        let temp_dir = TempDir::new().unwrap();
        let target_file = temp_dir.path().join("target.txt");
        let link_file = temp_dir.path().join("link.txt");

        fs::write(&target_file, "test").unwrap();
        symlink(&target_file, &link_file).unwrap();

        let config = create_test_config(Some(temp_dir.path().to_path_buf()), false);
        let result = validate_path(link_file.to_str().unwrap(), &config);

        // Should fail because symlinks are not allowed by config
        assert!(result.is_err());
    }
}
