//! Affected-book resolution: which books must be rebuilt for a set of changes.

use crate::scan::TreeScan;
use crate::types::{DocConfig, base_name, is_book_master};
use std::collections::{BTreeSet, VecDeque};
use std::fmt;
use std::path::PathBuf;

/// Why a resolution produced its book set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reason {
    /// Specific books were named by the caller.
    Selected,
    /// The caller forced a full build.
    Forced,
    /// A file that affects every book was modified.
    SpecialFile(String),
    /// Books reached through the inclusion closure.
    Affected,
    /// Nothing was reached; every book is rebuilt as a precaution.
    NothingAffected,
}

impl Reason {
    /// Whether the closure was skipped and every discovered book is built.
    pub fn builds_everything(&self) -> bool {
        !matches!(self, Reason::Affected)
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::Selected => write!(f, "Building specified books."),
            Reason::Forced => write!(f, "Building all books."),
            Reason::SpecialFile(file) => {
                write!(f, "File {file} modified, this affects all books.")
            },
            Reason::Affected => write!(f, "Building affected books."),
            Reason::NothingAffected => {
                write!(f, "No books are affected by modified files. Building all books.")
            },
        }
    }
}

/// Books to build and the reason they were chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub books: BTreeSet<PathBuf>,
    pub reason: Reason,
}

/// Result of following inclusion edges upward from the changed files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Closure {
    pub books: BTreeSet<PathBuf>,
    /// Every file that was placed on the frontier, changed files included.
    pub files: BTreeSet<PathBuf>,
}

/// Decide whether the closure can be skipped entirely.
///
/// `repo_changes` are repository-relative paths, compared verbatim against
/// `config.special_files`.
pub fn build_everything_trigger(
    force: bool,
    selected: bool,
    repo_changes: &[String],
    config: &DocConfig,
) -> Option<Reason> {
    if selected {
        return Some(Reason::Selected);
    }
    if force {
        return Some(Reason::Forced);
    }
    repo_changes
        .iter()
        .find(|f| config.special_files.contains(&f.as_str()))
        .map(|f| Reason::SpecialFile(f.clone()))
}

/// Breadth-first closure from `changed` (absolute, normalized paths).
///
/// Master files are terminals: they name their book and are not expanded.
/// Every file enters the frontier at most once, so cycles terminate.
pub fn compute_closure(scan: &TreeScan, changed: &[PathBuf], config: &DocConfig) -> Closure {
    let mut closure = Closure::default();

    if let Some(book) = &scan.plain_text_book {
        if changed.iter().any(|f| f.starts_with(book)) {
            closure.books.insert(book.clone());
        }
    }

    let mut frontier = VecDeque::new();
    for f in changed {
        if closure.files.insert(f.clone()) {
            frontier.push_back(f.clone());
        }
    }

    while let Some(f) = frontier.pop_front() {
        if is_book_master(base_name(&f), config) {
            if let Some(book) = scan.book_of_master.get(&f) {
                closure.books.insert(book.clone());
                continue;
            }
        }
        for g in scan.includers(&f) {
            if closure.files.insert(g.clone()) {
                frontier.push_back(g.clone());
            }
        }
    }

    closure
}

/// Resolve the books to build.
///
/// With a trigger every discovered book is returned; the scan already applied
/// any book selection. An empty closure falls back to every book.
pub fn resolve(
    scan: &TreeScan,
    changed: &[PathBuf],
    trigger: Option<Reason>,
    config: &DocConfig,
) -> Resolution {
    if let Some(reason) = trigger {
        return Resolution {
            books: scan.books.clone(),
            reason,
        };
    }

    let closure = compute_closure(scan, changed, config);
    tracing::debug!(
        files = closure.files.len(),
        books = closure.books.len(),
        "inclusion closure computed"
    );
    if closure.books.is_empty() {
        return Resolution {
            books: scan.books.clone(),
            reason: Reason::NothingAffected,
        };
    }
    Resolution {
        books: closure.books,
        reason: Reason::Affected,
    }
}
