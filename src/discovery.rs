//! Repository discovery: find the repository root, the documentation root,
//! and the markup files below it.

use crate::error::{Error, Result};
use crate::types::{DocConfig, FileExceptions, base_name};
use std::path::{Component, Path, PathBuf};

/// Find the repository root by walking up from `start` to the nearest `.git`.
pub fn find_repo_root(start: &Path) -> Result<PathBuf> {
    let start = absolute(start)?;
    let mut dir = start.as_path();
    loop {
        if dir.join(".git").exists() {
            return Ok(dir.to_path_buf());
        }
        match dir.parent() {
            Some(p) if p != dir => dir = p,
            _ => return Err(Error::NoRepository(start)),
        }
    }
}

/// Select the documentation root inside a repository.
///
/// - Translated builds: `<repo>/generated/<language>`
/// - Otherwise: `<repo>/<config.doc_subdir>` or the repository itself
///
/// The root must exist.
pub fn doc_root(repo_root: &Path, config: &DocConfig, language: Option<&str>) -> Result<PathBuf> {
    let root = match (language, config.doc_subdir) {
        (Some(lang), _) => repo_root.join("generated").join(lang),
        (None, Some(sub)) => repo_root.join(sub),
        (None, None) => repo_root.to_path_buf(),
    };
    if !root.is_dir() {
        return Err(Error::MissingRoot(root));
    }
    Ok(root)
}

/// Discover all XML-like files under `root`, sorted.
///
/// Skips dot directories, `config.skip_dirs`, manifests and excepted names.
pub fn find_markup_files(
    root: &Path,
    config: &DocConfig,
    exceptions: &FileExceptions,
) -> Vec<PathBuf> {
    fn walk(
        dir: &Path,
        config: &DocConfig,
        exceptions: &FileExceptions,
        found: &mut Vec<PathBuf>,
    ) {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let name = base_name(&path);
            let Ok(kind) = entry.file_type() else {
                continue;
            };
            if kind.is_symlink() && path.is_dir() {
                continue;
            }
            if kind.is_dir() {
                if name.starts_with('.') || config.skip_dirs.contains(&name) {
                    continue;
                }
                walk(&path, config, exceptions, found);
            } else if config.is_xml_like(name) && !exceptions.matches(name) {
                found.push(path);
            }
        }
    }

    let mut found = Vec::new();
    walk(root, config, exceptions, &mut found);
    found.sort();
    found
}

/// Make a path absolute against the current directory and normalize it.
pub fn absolute(path: &Path) -> Result<PathBuf> {
    Ok(normalize(&std::path::absolute(path)?))
}

/// Resolve `.` and `..` components lexically, without touching the filesystem.
///
/// Referenced files may not exist, so `canonicalize` is not an option.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {},
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Path of `path` relative to `root` for display.
pub fn display_rel(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .to_string()
}
