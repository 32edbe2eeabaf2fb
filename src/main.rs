//! Command-line entry point: check and build the books touched by a change.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use doc_checkbuild::{
    BookMappings, Checks, ConfFile, DocConfig, FileExceptions, GitChangeSource, RunOptions, doc_root,
    find_repo_root,
};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Validate DocBook sources and rebuild only the books a change affects.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Use the API site layout: books at the repository root
    #[arg(long)]
    api_site: bool,

    /// Run every check (the default when no check is selected here or in doc-test.conf)
    #[arg(long)]
    check_all: bool,

    /// Build the affected books
    #[arg(long)]
    check_build: bool,

    /// Check that removed files are no longer referenced
    #[arg(long)]
    check_deletions: bool,

    /// Check whitespace niceness of modified XML files
    #[arg(long)]
    check_niceness: bool,

    /// Check that modified XML files are well-formed
    #[arg(long)]
    check_syntax: bool,

    /// Do not write publish-docs/index.html after building
    #[arg(long)]
    no_index: bool,

    /// Build books one at a time in-process
    #[arg(long)]
    debug: bool,

    /// Check and build everything, regardless of what changed
    #[arg(long)]
    force: bool,

    /// Exit successfully even when checks fail
    #[arg(long)]
    ignore_errors: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// File name (or glob) never checked or scanned; repeatable
    #[arg(long = "file-exception", value_name = "NAME")]
    file_exceptions: Vec<String>,

    /// Directory name never scanned; repeatable
    #[arg(long = "ignore-dir", value_name = "DIR")]
    ignore_dirs: Vec<String>,

    /// Book directory name never built; repeatable
    #[arg(long = "exceptions-book", value_name = "BOOK")]
    book_exceptions: Vec<String>,

    /// Build only these books; repeatable
    #[arg(long = "only-book", value_name = "BOOK")]
    only_books: Vec<String>,

    /// Translated build: use generated/<LANG> as the documentation root
    #[arg(short, long, env = "DOC_LANGUAGE")]
    language: Option<String>,

    /// Book with a non-standard output directory; pairs with --target-dir
    #[arg(long = "book", value_name = "BOOK")]
    books: Vec<String>,

    /// Output directory of the matching --book, relative to it
    #[arg(long = "target-dir", value_name = "DIR")]
    target_dirs: Vec<String>,

    /// Publish directory of the matching --book
    #[arg(long = "publish-dir", value_name = "DIR")]
    publish_dirs: Vec<String>,

    /// Repository name printed in the report
    #[arg(long)]
    repo_name: Option<String>,

    /// Release path name passed to the build (overrides the properties file)
    #[arg(long)]
    release_path: Option<String>,

    /// Value passed to the build as comments.enabled (overrides the properties file)
    #[arg(long)]
    comments_enabled: Option<String>,

    /// Base revision of the change under test
    #[arg(long, default_value = "HEAD~1")]
    base: String,

    /// Head revision of the change under test
    #[arg(long, default_value = "HEAD")]
    head: String,

    /// Any path inside the repository (defaults to the current directory)
    path: Option<PathBuf>,
}

impl Cli {
    /// Explicit check flags, if any were given.
    fn checks(&self) -> Option<Checks> {
        if self.check_all {
            return Some(Checks::all());
        }
        let checks = Checks {
            build: self.check_build,
            deletions: self.check_deletions,
            syntax: self.check_syntax,
            niceness: self.check_niceness,
        };
        (checks != Checks::default()).then_some(checks)
    }

    fn config(&self, conf: &ConfFile) -> DocConfig {
        if self.api_site || conf.api_site == Some(true) {
            DocConfig::api_site()
        } else {
            DocConfig::manuals()
        }
    }

    /// Defaults, then `doc-test.conf`, then `gerrit-doc.properties`, then
    /// the command line.
    fn run_options(&self, repo_root: &Path, conf: &ConfFile) -> Result<RunOptions> {
        let mut options = RunOptions::default();
        options.apply_conf(conf)?;
        options.apply_properties(repo_root)?;

        if let Some(checks) = self.checks() {
            options.checks = checks;
        }
        options.force |= self.force;
        options.ignore_errors |= self.ignore_errors;
        options.debug |= self.debug;
        if self.no_index {
            options.create_index = false;
        }
        if self.language.is_some() {
            options.language = self.language.clone();
        }
        if self.repo_name.is_some() {
            options.repo_name = self.repo_name.clone();
        }
        if let Some(release) = &self.release_path {
            options.release_path = release.clone();
        }
        if let Some(comments) = &self.comments_enabled {
            options.comments_enabled = comments.clone();
        }
        if !self.file_exceptions.is_empty() {
            options.scan.file_exceptions =
                FileExceptions::new(&self.file_exceptions).context("invalid --file-exception pattern")?;
        }
        if !self.ignore_dirs.is_empty() {
            options.scan.ignore_dirs = self.ignore_dirs.iter().cloned().collect();
        }
        if !self.book_exceptions.is_empty() {
            options.scan.book_exceptions = self.book_exceptions.iter().cloned().collect::<BTreeSet<_>>();
        }
        if !self.only_books.is_empty() {
            options.scan.only_books = self.only_books.iter().cloned().collect();
        }
        if !self.books.is_empty() || !self.target_dirs.is_empty() || !self.publish_dirs.is_empty() {
            options.mappings = BookMappings::from_lists(&self.books, &self.target_dirs, &self.publish_dirs)?;
        }
        options.base = self.base.clone();
        options.head = self.head.clone();
        Ok(options)
    }
}

fn init_logging(cli: &Cli) -> Result<()> {
    let level = if cli.verbose || cli.debug {
        Level::DEBUG
    } else if cli.quiet {
        Level::ERROR
    } else {
        Level::WARN
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn execute(cli: &Cli) -> Result<bool> {
    let start = match &cli.path {
        Some(p) => p.clone(),
        None => std::env::current_dir().context("cannot read current directory")?,
    };
    let repo_root = find_repo_root(&start)?;
    let conf = ConfFile::load(&repo_root)?;
    let config = cli.config(&conf);
    let options = cli.run_options(&repo_root, &conf)?;

    let root = doc_root(&repo_root, &config, options.language.as_deref())?;
    let source = GitChangeSource::new(&repo_root, &root).with_range(&options.base, &options.head);

    doc_checkbuild::run(&config, &options, &repo_root, &source)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = init_logging(&cli) {
        eprintln!("cannot initialize logging: {e}");
    }

    match execute(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        },
    }
}
