//! Change sources: which files changed between two revisions.

use crate::discovery::normalize;
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Files touched by the change under test.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Added, copied, modified, renamed or type-changed files below the
    /// documentation root, absolute.
    pub modified: Vec<PathBuf>,
    /// Deleted files below the documentation root, absolute.
    pub deleted: Vec<PathBuf>,
    /// Every changed path, relative to the repository root.
    pub repo_paths: Vec<String>,
}

impl ChangeSet {
    /// Whether any repository path lies below `dir`.
    pub fn touches(&self, dir: &str) -> bool {
        self.repo_paths.iter().any(|p| Path::new(p).starts_with(dir))
    }

    /// Whether every repository path lies below `dir` (and there is at least one).
    pub fn only_touches(&self, dir: &str) -> bool {
        !self.repo_paths.is_empty() && self.repo_paths.iter().all(|p| Path::new(p).starts_with(dir))
    }
}

/// Something that can list the files changed by the revision under test.
pub trait ChangeSource {
    fn changes(&self) -> Result<ChangeSet>;
}

/// A fixed change set, for callers that already know what changed.
impl ChangeSource for ChangeSet {
    fn changes(&self) -> Result<ChangeSet> {
        Ok(self.clone())
    }
}

/// Changes from `git diff` between two revisions.
///
/// Every command runs with an explicit working directory; the process
/// working directory is never changed.
#[derive(Debug, Clone)]
pub struct GitChangeSource {
    pub repo_root: PathBuf,
    pub doc_root: PathBuf,
    pub base: String,
    pub head: String,
}

impl GitChangeSource {
    /// Compare `HEAD~1` with `HEAD`.
    pub fn new(repo_root: &Path, doc_root: &Path) -> Self {
        Self {
            repo_root: repo_root.to_path_buf(),
            doc_root: doc_root.to_path_buf(),
            base: "HEAD~1".to_string(),
            head: "HEAD".to_string(),
        }
    }

    pub fn with_range(mut self, base: impl Into<String>, head: impl Into<String>) -> Self {
        self.base = base.into();
        self.head = head.into();
        self
    }

    /// Paths below the documentation root, relative to it, made absolute.
    fn doc_paths(&self, filter: &str) -> Result<Vec<PathBuf>> {
        let filter = format!("--diff-filter={filter}");
        let out = git(
            &self.doc_root,
            &["diff", "--name-only", "--relative", &self.base, &self.head, &filter],
        )?;
        Ok(out.lines().map(|l| normalize(&self.doc_root.join(l))).collect())
    }
}

impl ChangeSource for GitChangeSource {
    fn changes(&self) -> Result<ChangeSet> {
        // Deletions cannot affect a build by inclusion.
        let modified = self.doc_paths("ACMRT")?;
        let deleted = self.doc_paths("D")?;
        let repo_paths = git(&self.repo_root, &["diff", "--name-only", &self.base, &self.head])?
            .lines()
            .map(str::to_string)
            .collect();
        Ok(ChangeSet {
            modified,
            deleted,
            repo_paths,
        })
    }
}

/// Run git in `dir` and return trimmed stdout, one path per line.
fn git(dir: &Path, args: &[&str]) -> Result<String> {
    let fail = |message: String| Error::Git {
        args: args.join(" "),
        message,
    };
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .map_err(|e| fail(e.to_string()))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(fail(format!("{}: {}", output.status, stderr.trim())));
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n"))
}
