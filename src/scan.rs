//! Tree scanning: books, inclusion graph and master-file ownership in one walk.

use crate::discovery::{absolute, normalize};
use crate::error::{Error, Result};
use crate::markup::parse_references;
use crate::types::{DocConfig, FileExceptions, base_name, is_book_master};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Filters applied while walking the documentation tree.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Directory names whose whole subtree is skipped.
    pub book_exceptions: BTreeSet<String>,
    /// Directory names pruned from traversal.
    pub ignore_dirs: BTreeSet<String>,
    /// When non-empty, only directories with these names become books.
    pub only_books: BTreeSet<String>,
    /// File names never parsed.
    pub file_exceptions: FileExceptions,
}

/// Everything learned from one walk of the tree.
///
/// Built fresh for every resolution and dropped afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeScan {
    /// Book root directories.
    pub books: BTreeSet<PathBuf>,
    /// Included file -> files including it.
    pub included_by: BTreeMap<PathBuf, BTreeSet<PathBuf>>,
    /// Master file -> root of the book owning it.
    pub book_of_master: BTreeMap<PathBuf, PathBuf>,
    /// Root of the plain-text book, when it is one of `books`.
    pub plain_text_book: Option<PathBuf>,
    /// Markup files successfully parsed for references.
    pub files_parsed: usize,
    /// Files skipped because they could not be read or parsed.
    pub invalid_files: Vec<PathBuf>,
}

impl TreeScan {
    /// Files including `target` directly.
    pub fn includers(&self, target: &Path) -> impl Iterator<Item = &PathBuf> {
        self.included_by.get(target).into_iter().flatten()
    }
}

/// Walks a documentation tree and builds a [`TreeScan`].
pub struct TreeScanner<'a> {
    config: &'a DocConfig,
    options: &'a ScanOptions,
    index_includes: bool,
    full_tree: bool,
}

impl<'a> TreeScanner<'a> {
    pub fn new(config: &'a DocConfig, options: &'a ScanOptions) -> Self {
        Self {
            config,
            options,
            index_includes: true,
            full_tree: false,
        }
    }

    /// Only collect books; no markup is parsed.
    pub fn books_only(mut self) -> Self {
        self.index_includes = false;
        self
    }

    /// Index references across the whole tree.
    ///
    /// Only dot directories and `config.skip_dirs` are pruned. Excluded and
    /// ignored directories, the plain-text book and files directly in the
    /// root are all parsed.
    pub fn full_tree(mut self) -> Self {
        self.full_tree = true;
        self
    }

    /// Scan the tree under `root`.
    ///
    /// Files directly in `root` are not part of any book and are not scanned.
    pub fn scan(&self, root: &Path) -> Result<TreeScan> {
        if !root.is_dir() {
            return Err(Error::MissingRoot(root.to_path_buf()));
        }
        let root = absolute(root)?;
        let mut scan = TreeScan::default();
        self.walk(&root, &root, None, &mut scan);
        Ok(scan)
    }

    fn walk(&self, root: &Path, dir: &Path, book: Option<&Path>, scan: &mut TreeScan) {
        let is_root = dir == root;
        let mut book = book.map(Path::to_path_buf);

        if !is_root {
            let name = base_name(dir);
            if !self.full_tree && self.options.book_exceptions.contains(name) {
                tracing::debug!(dir = %dir.display(), "skipping excluded book");
                return;
            }
            if dir.join(self.config.manifest_name).is_file()
                && (self.options.only_books.is_empty() || self.options.only_books.contains(name))
            {
                scan.books.insert(dir.to_path_buf());
                book = Some(dir.to_path_buf());
            }
            if let Some(suffix) = self.config.plain_text_book {
                // Not markup: tracked as one opaque unit.
                if dir.ends_with(suffix) && scan.books.contains(dir) {
                    scan.plain_text_book = Some(dir.to_path_buf());
                    if !self.full_tree {
                        return;
                    }
                }
            }
        }

        let Ok(entries) = std::fs::read_dir(dir) else {
            tracing::warn!(dir = %dir.display(), "cannot read directory");
            return;
        };
        // Symlinks are never followed into directories.
        let mut dirs = Vec::new();
        let mut files = Vec::new();
        for entry in entries.flatten() {
            let Ok(kind) = entry.file_type() else {
                continue;
            };
            let path = entry.path();
            if kind.is_dir() {
                dirs.push(path);
            } else if !(kind.is_symlink() && path.is_dir()) {
                files.push(path);
            }
        }
        dirs.sort();
        files.sort();

        if !is_root || self.full_tree {
            for file in &files {
                self.scan_file(dir, file, book.as_deref(), scan);
            }
        }

        for sub in &dirs {
            let name = base_name(sub);
            if name.starts_with('.')
                || self.config.skip_dirs.contains(&name)
                || (!self.full_tree && self.options.ignore_dirs.contains(name))
            {
                continue;
            }
            self.walk(root, sub, book.as_deref(), scan);
        }
    }

    fn scan_file(&self, dir: &Path, path: &Path, book: Option<&Path>, scan: &mut TreeScan) {
        let name = base_name(path);
        if !self.config.is_markup(name)
            || name == self.config.manifest_name
            || (!self.full_tree && self.config.skip_files.contains(&name))
            || self.options.file_exceptions.matches(name)
        {
            return;
        }

        if is_book_master(name, self.config) {
            if let Some(book) = book {
                scan.book_of_master.insert(path.to_path_buf(), book.to_path_buf());
            }
        }

        if !self.index_includes {
            return;
        }

        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "cannot read file, skipping");
                scan.invalid_files.push(path.to_path_buf());
                return;
            },
        };
        let refs = match parse_references(&text) {
            Ok(refs) => refs,
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "invalid XML, skipping");
                scan.invalid_files.push(path.to_path_buf());
                return;
            },
        };

        scan.files_parsed += 1;
        for r in refs {
            let target = normalize(&dir.join(&r.href));
            scan.included_by
                .entry(target)
                .or_default()
                .insert(path.to_path_buf());
        }
    }
}
