//! Validation and incremental building for multi-book DocBook documentation trees.
//!
//! A run checks the files changed by the revision under test, verifies that
//! no removed file is still referenced, and rebuilds only the books whose
//! sources reach a changed file through `xi:include` or `imagedata` chains.

mod build;
mod changes;
mod closure;
mod config;
mod deletions;
mod discovery;
mod error;
mod markup;
mod publish;
mod scan;
mod types;
mod validate;

pub use build::{BookBuilder, BuildOutcome, MavenBuilder, build_books, build_books_serial, ensure_program, max_jobs};
pub use changes::{ChangeSet, ChangeSource, GitChangeSource};
pub use closure::{Closure, Reason, Resolution, build_everything_trigger, compute_closure, resolve};
pub use config::{BookMappings, Checks, ConfFile, RunOptions};
pub use deletions::check_deleted_files;
pub use discovery::{doc_root, find_markup_files, find_repo_root};
pub use error::{Error, Result};
pub use markup::{Attribute, Element, MarkupError, Reference, ReferenceKind, check_well_formed, parse_elements, parse_references};
pub use publish::Publisher;
pub use scan::{ScanOptions, TreeScan, TreeScanner};
pub use types::{DocConfig, FileExceptions, Issue, is_book_master};
pub use validate::{FileChecks, Structure, Validation, check_niceness, check_structure, check_syntax};

use anyhow::Context;
use std::path::Path;

/// Run the selected checks for the repository at `repo_root`.
///
/// Returns `Ok(true)` when every check passed (or failures are ignored),
/// `Ok(false)` when a check failed, and `Err` for fatal conditions: a missing
/// root, a failing change source, or a missing build tool.
pub fn run(
    config: &DocConfig,
    options: &RunOptions,
    repo_root: &Path,
    source: &dyn ChangeSource,
) -> anyhow::Result<bool> {
    if let Some(repo) = &options.repo_name {
        println!("Testing repository '{}'\n", repo);
    }

    let root = doc_root(repo_root, config, options.language.as_deref())?;
    tracing::debug!(root = %root.display(), "using documentation root");

    let changes = source.changes().context("cannot determine modified files")?;
    let publisher = Publisher::new(repo_root, options);

    if let Some(www) = config.www_dir {
        if options.checks.build && changes.touches(www) {
            let dest = publisher
                .publish_www(&repo_root.join(www))
                .context("cannot publish www")?;
            tracing::info!(dest = %dest.display(), "published www");
        }
        if !options.force && changes.only_touches(www) {
            println!("Only files in {www} directory changed, nothing to do.\n");
            return Ok(true);
        }
    }

    let mut passed = true;

    let checks = FileChecks {
        syntax: options.checks.syntax,
        niceness: options.checks.niceness,
    };
    if checks.syntax || checks.niceness {
        passed &= run_file_checks(config, options, &root, &changes, checks);
    }

    if options.checks.deletions {
        println!("Checking that no removed files are referenced...");
        if changes.deleted.is_empty() {
            println!("No files were removed.\n");
        } else {
            // Excluded books and ignored directories may still reference removed files.
            let scan = TreeScanner::new(config, &options.scan).full_tree().scan(&root)?;
            let issues = check_deleted_files(&scan, &changes.deleted, &root);
            let unchecked: Vec<_> = scan
                .invalid_files
                .iter()
                .map(|f| {
                    let rel = discovery::display_rel(f, &root);
                    Issue::warning(rel, 0, "Not parsed, references unchecked")
                })
                .collect();
            print_issues(&unchecked);
            print_issues(&issues);
            if issues.is_empty() {
                println!("Removed file check passed, {} files were removed.\n", changes.deleted.len());
            } else {
                println!(
                    "Failed removed file check, {} files were removed, {} files checked.\n",
                    changes.deleted.len(),
                    scan.files_parsed
                );
                passed = false;
            }
        }
    }

    if options.checks.build {
        ensure_program("mvn")?;
        let resolution = resolve_books(config, options, &root, &changes)?;
        passed &= run_builds(options, repo_root, &publisher, &resolution);
    }

    Ok(passed || options.ignore_errors)
}

/// Decide which books to build for `changes` under `root`.
///
/// Scans only for books when a build-everything trigger holds.
pub fn resolve_books(
    config: &DocConfig,
    options: &RunOptions,
    root: &Path,
    changes: &ChangeSet,
) -> Result<Resolution> {
    let trigger = build_everything_trigger(
        options.force,
        !options.scan.only_books.is_empty(),
        &changes.repo_paths,
        config,
    );
    let scanner = TreeScanner::new(config, &options.scan);
    let scan = match trigger {
        Some(_) => scanner.books_only().scan(root)?,
        None => scanner.scan(root)?,
    };
    Ok(resolve(&scan, &changes.modified, trigger, config))
}

fn run_file_checks(
    config: &DocConfig,
    options: &RunOptions,
    root: &Path,
    changes: &ChangeSet,
    checks: FileChecks,
) -> bool {
    let what = match (checks.syntax, checks.niceness) {
        (true, true) => "syntax and niceness",
        (true, false) => "syntax",
        _ => "niceness",
    };
    println!("Checking {what} of XML files...");

    let files = if options.force {
        find_markup_files(root, config, &options.scan.file_exceptions)
    } else {
        validate::select_files(&changes.modified, config, &options.scan.file_exceptions)
    };
    let result = validate::validate_files(&files, root, config, checks);
    print_issues(&result.issues);

    if result.failed > 0 {
        println!(
            "Check failed, validated {} XML files with {} failures.\n",
            result.checked, result.failed
        );
        false
    } else {
        println!("Check passed, validated {} XML files.\n", result.checked);
        true
    }
}

fn run_builds(options: &RunOptions, repo_root: &Path, publisher: &Publisher, resolution: &Resolution) -> bool {
    println!("{}", resolution.reason);

    let books: Vec<_> = resolution.books.iter().cloned().collect();
    println!("Queuing the following books for building:");
    for book in &books {
        println!("  {}", types::base_name(book));
    }

    let builder = MavenBuilder::new(options, repo_root, Some(publisher.clone()));
    println!("Building all queued {} books now...", books.len());
    let mut outcomes = if options.debug {
        build_books_serial(&books, &builder)
    } else {
        build_books(&books, &builder, max_jobs())
    };
    outcomes.sort_by(|a, b| a.book.cmp(&b.book));

    for outcome in outcomes.iter().filter(|o| o.success) {
        println!(">>> Build of book {} succeeded.", outcome.book);
    }

    if options.create_index {
        match publisher.write_index() {
            Ok(path) => tracing::debug!(index = %path.display(), "wrote index"),
            Err(e) => tracing::warn!(error = %e, "cannot write index"),
        }
    }

    let failures: Vec<_> = outcomes.iter().filter(|o| !o.success).collect();
    if failures.is_empty() {
        println!("Building of books finished successfully.\n");
        return true;
    }
    for outcome in failures {
        let code = outcome
            .returncode
            .map(|c| c.to_string())
            .unwrap_or_else(|| "none".to_string());
        println!(">>> Build of book {} failed (returncode = {}).", outcome.book, code);
        println!("\n{}", outcome.output);
    }
    println!("Building of books finished with failures.\n");
    false
}

fn print_issues(issues: &[Issue]) {
    for issue in issues {
        let mut loc = format!("  {}", issue.file);
        if issue.line > 0 {
            loc.push_str(&format!(":{}", issue.line));
        }
        let marker = if issue.warning { "\u{26a0}" } else { "\u{2717}" };
        println!("{:<50} {} {}", loc, marker, issue.message);
    }
}
