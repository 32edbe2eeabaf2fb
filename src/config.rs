//! Run options and the repository-level overrides applied to them.

use crate::error::{Error, Result};
use crate::scan::ScanOptions;
use crate::types::FileExceptions;
use std::collections::BTreeMap;
use std::path::Path;

/// Name of the optional properties file at the repository root.
pub const PROPERTIES_FILE: &str = "gerrit-doc.properties";

/// Name of the optional option file at the repository root.
pub const CONF_FILE: &str = "doc-test.conf";

/// Which checks a run performs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Checks {
    pub build: bool,
    pub deletions: bool,
    pub syntax: bool,
    pub niceness: bool,
}

impl Checks {
    pub fn all() -> Self {
        Self {
            build: true,
            deletions: true,
            syntax: true,
            niceness: true,
        }
    }

    /// No explicit selection means every check.
    pub fn or_all(self) -> Self {
        if self == Self::default() { Self::all() } else { self }
    }
}

/// Where a book's build output lives and where it is published.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookMappings {
    /// Book name -> output directory, relative to the book directory.
    pub target_dirs: BTreeMap<String, String>,
    /// Book name -> directory name under the publish root.
    pub publish_dirs: BTreeMap<String, String>,
}

impl BookMappings {
    /// Pair up `--book`, `--target-dir` and `--publish-dir` values.
    ///
    /// `books` and `target_dirs` must have equal length; `publish_dirs`
    /// is either empty or of the same length.
    pub fn from_lists(books: &[String], target_dirs: &[String], publish_dirs: &[String]) -> Result<Self> {
        if books.len() != target_dirs.len() {
            return Err(Error::Config(
                "book and target-dir options need to have a 1:1 relationship".to_string(),
            ));
        }
        if !publish_dirs.is_empty() && publish_dirs.len() != target_dirs.len() {
            return Err(Error::Config(
                "publish-dir and target-dir need to have a 1:1 relationship if publish-dir is specified"
                    .to_string(),
            ));
        }
        let target_dirs = books.iter().cloned().zip(target_dirs.iter().cloned()).collect();
        let publish_dirs = books.iter().cloned().zip(publish_dirs.iter().cloned()).collect();
        Ok(Self {
            target_dirs,
            publish_dirs,
        })
    }

    /// Directory name the book is published under.
    pub fn publish_dir<'a>(&'a self, book: &'a str) -> &'a str {
        self.publish_dirs.get(book).map(String::as_str).unwrap_or(book)
    }
}

/// Options for a whole run, assembled by the command line.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub checks: Checks,
    pub force: bool,
    pub ignore_errors: bool,
    /// Build serially in-process instead of on the worker pool.
    pub debug: bool,
    pub create_index: bool,
    pub language: Option<String>,
    pub repo_name: Option<String>,
    pub scan: ScanOptions,
    pub release_path: String,
    pub comments_enabled: String,
    pub mappings: BookMappings,
    /// Revision range for the change source.
    pub base: String,
    pub head: String,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            checks: Checks::all(),
            force: false,
            ignore_errors: false,
            debug: false,
            create_index: true,
            language: None,
            repo_name: None,
            scan: ScanOptions::default(),
            release_path: "trunk".to_string(),
            comments_enabled: "0".to_string(),
            mappings: BookMappings::default(),
            base: "HEAD~1".to_string(),
            head: "HEAD".to_string(),
        }
    }
}

impl RunOptions {
    /// Take every value set in `conf`.
    pub fn apply_conf(&mut self, conf: &ConfFile) -> Result<()> {
        self.checks = conf.checks();
        self.force = conf.force.unwrap_or(self.force);
        self.ignore_errors = conf.ignore_errors.unwrap_or(self.ignore_errors);
        self.debug = conf.debug.unwrap_or(self.debug);
        self.create_index = conf.create_index.unwrap_or(self.create_index);
        if conf.language.is_some() {
            self.language = conf.language.clone();
        }
        if conf.repo_name.is_some() {
            self.repo_name = conf.repo_name.clone();
        }
        if let Some(release) = &conf.release_path {
            self.release_path = release.clone();
        }
        if let Some(comments) = &conf.comments_enabled {
            self.comments_enabled = comments.clone();
        }
        if !conf.file_exceptions.is_empty() {
            self.scan.file_exceptions = FileExceptions::new(&conf.file_exceptions)
                .map_err(|e| Error::Config(format!("file-exception in {CONF_FILE}: {e}")))?;
        }
        self.scan.ignore_dirs.extend(conf.ignore_dirs.iter().cloned());
        self.scan.book_exceptions.extend(conf.book_exceptions.iter().cloned());
        self.scan.only_books.extend(conf.only_books.iter().cloned());
        if !conf.books.is_empty() || !conf.target_dirs.is_empty() || !conf.publish_dirs.is_empty() {
            self.mappings = BookMappings::from_lists(&conf.books, &conf.target_dirs, &conf.publish_dirs)?;
        }
        Ok(())
    }

    /// Apply `DOC_RELEASE_PATH` and `DOC_COMMENTS_ENABLED` from the
    /// properties file in `repo_root`, if present.
    pub fn apply_properties(&mut self, repo_root: &Path) -> Result<()> {
        let path = repo_root.join(PROPERTIES_FILE);
        if !path.is_file() {
            return Ok(());
        }
        let content = std::fs::read_to_string(&path)?;
        for (key, value) in parse_properties(&content) {
            match key {
                "DOC_RELEASE_PATH" => self.release_path = value.to_string(),
                "DOC_COMMENTS_ENABLED" => self.comments_enabled = value.to_string(),
                _ => {},
            }
        }
        Ok(())
    }
}

/// Option defaults read from `doc-test.conf`.
///
/// The file is INI-style. Keys are the long command-line option names
/// (`repo-name` or `repo_name`) under `[DEFAULT]` or before any section.
/// Repeating a list key adds a value. Command-line options win over the file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfFile {
    pub api_site: Option<bool>,
    pub check_all: Option<bool>,
    pub check_build: Option<bool>,
    pub check_deletions: Option<bool>,
    pub check_niceness: Option<bool>,
    pub check_syntax: Option<bool>,
    pub create_index: Option<bool>,
    pub debug: Option<bool>,
    pub force: Option<bool>,
    pub ignore_errors: Option<bool>,
    pub language: Option<String>,
    pub repo_name: Option<String>,
    pub release_path: Option<String>,
    pub comments_enabled: Option<String>,
    pub file_exceptions: Vec<String>,
    pub ignore_dirs: Vec<String>,
    pub book_exceptions: Vec<String>,
    pub only_books: Vec<String>,
    pub books: Vec<String>,
    pub target_dirs: Vec<String>,
    pub publish_dirs: Vec<String>,
}

impl ConfFile {
    /// Read `doc-test.conf` from `repo_root`; a missing file is empty.
    pub fn load(repo_root: &Path) -> Result<Self> {
        let path = repo_root.join(CONF_FILE);
        if !path.is_file() {
            return Ok(Self::default());
        }
        Self::parse(&std::fs::read_to_string(&path)?)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let mut conf = Self::default();
        let mut in_default = true;
        for (idx, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if let Some(section) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                in_default = section.trim() == "DEFAULT";
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(Error::Config(format!("{CONF_FILE} line {}: expected key = value", idx + 1)));
            };
            if !in_default {
                continue;
            }
            let key = key.trim().replace('-', "_");
            conf.set(&key, value.trim(), idx + 1)?;
        }
        Ok(conf)
    }

    fn set(&mut self, key: &str, value: &str, line: usize) -> Result<()> {
        let flag = |slot: &mut Option<bool>| -> Result<()> {
            *slot = Some(parse_bool(value).ok_or_else(|| {
                Error::Config(format!("{CONF_FILE} line {line}: '{value}' is not a boolean for {key}"))
            })?);
            Ok(())
        };
        match key {
            "api_site" => flag(&mut self.api_site)?,
            "check_all" => flag(&mut self.check_all)?,
            "check_build" => flag(&mut self.check_build)?,
            "check_deletions" => flag(&mut self.check_deletions)?,
            "check_niceness" => flag(&mut self.check_niceness)?,
            "check_syntax" => flag(&mut self.check_syntax)?,
            "create_index" => flag(&mut self.create_index)?,
            "debug" => flag(&mut self.debug)?,
            "force" => flag(&mut self.force)?,
            "ignore_errors" => flag(&mut self.ignore_errors)?,
            "language" => self.language = Some(value.to_string()),
            "repo_name" => self.repo_name = Some(value.to_string()),
            "release_path" => self.release_path = Some(value.to_string()),
            "comments_enabled" => self.comments_enabled = Some(value.to_string()),
            "file_exception" => self.file_exceptions.push(value.to_string()),
            "ignore_dir" => self.ignore_dirs.push(value.to_string()),
            "exceptions_book" => self.book_exceptions.push(value.to_string()),
            "only_book" => self.only_books.push(value.to_string()),
            "book" => self.books.push(value.to_string()),
            "target_dir" => self.target_dirs.push(value.to_string()),
            "publish_dir" => self.publish_dirs.push(value.to_string()),
            _ => tracing::warn!(key, line, "unknown option in {CONF_FILE}"),
        }
        Ok(())
    }

    /// Checks selected in the file, all of them when none is.
    pub fn checks(&self) -> Checks {
        if self.check_all == Some(true) {
            return Checks::all();
        }
        Checks {
            build: self.check_build == Some(true),
            deletions: self.check_deletions == Some(true),
            syntax: self.check_syntax == Some(true),
            niceness: self.check_niceness == Some(true),
        }
        .or_all()
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// `KEY=value` pairs, one per line. Blank lines and `#` comments are skipped.
pub fn parse_properties(content: &str) -> Vec<(&str, &str)> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .filter_map(|l| l.split_once('='))
        .map(|(k, v)| (k.trim(), v.trim()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn checks_default_to_all() {
        assert_eq!(Checks::default().or_all(), Checks::all());
        let only_build = Checks {
            build: true,
            ..Default::default()
        };
        assert_eq!(only_build.or_all(), only_build);
    }

    #[test]
    fn parse_properties_basic() {
        let content = "# comment\nDOC_RELEASE_PATH=icehouse\n\nDOC_COMMENTS_ENABLED = 1\nbogus\n";
        assert_eq!(
            parse_properties(content),
            vec![("DOC_RELEASE_PATH", "icehouse"), ("DOC_COMMENTS_ENABLED", "1")]
        );
    }

    #[test]
    fn apply_properties_overrides() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(PROPERTIES_FILE),
            "DOC_RELEASE_PATH=juno\nDOC_COMMENTS_ENABLED=1\nOTHER=x\n",
        )
        .unwrap();
        let mut options = RunOptions::default();
        options.apply_properties(tmp.path()).unwrap();
        assert_eq!(options.release_path, "juno");
        assert_eq!(options.comments_enabled, "1");
    }

    #[test]
    fn apply_properties_missing_file() {
        let tmp = TempDir::new().unwrap();
        let mut options = RunOptions::default();
        options.apply_properties(tmp.path()).unwrap();
        assert_eq!(options.release_path, "trunk");
        assert_eq!(options.comments_enabled, "0");
    }

    #[test]
    fn conf_file_parses_default_section() {
        let content = "\
# doc-test.conf
[DEFAULT]
repo-name = openstack-manuals
api_site = False
create-index = no
file-exception = legacy.xml
file-exception = *.wadl
book = api-ref
target-dir = target/docbkx/html
publish-dir = api-ref
ignore-dir = incubation

[other]
repo-name = ignored
";
        let conf = ConfFile::parse(content).unwrap();
        assert_eq!(conf.repo_name.as_deref(), Some("openstack-manuals"));
        assert_eq!(conf.api_site, Some(false));
        assert_eq!(conf.create_index, Some(false));
        assert_eq!(conf.file_exceptions, vec!["legacy.xml", "*.wadl"]);
        assert_eq!(conf.books, vec!["api-ref"]);
        assert_eq!(conf.ignore_dirs, vec!["incubation"]);
        assert_eq!(conf.checks(), Checks::all());
    }

    #[test]
    fn conf_file_rejects_bad_values() {
        let err = ConfFile::parse("force = maybe\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(ConfFile::parse("[DEFAULT]\njust a line\n").is_err());
        assert_eq!(ConfFile::parse("unknown-option = 1\n").unwrap(), ConfFile::default());
    }

    #[test]
    fn conf_file_selects_checks() {
        let conf = ConfFile::parse("check-syntax = true\ncheck-niceness = yes\n").unwrap();
        assert_eq!(
            conf.checks(),
            Checks {
                syntax: true,
                niceness: true,
                ..Default::default()
            }
        );
    }

    #[test]
    fn apply_conf_then_properties() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONF_FILE),
            "[DEFAULT]\nrelease-path = kilo\ncomments-enabled = 1\nrepo-name = manuals\n\
             book = api-ref\ntarget-dir = target/docbkx/html\nonly-book = api-ref\nfile-exception = skip.xml\n",
        )
        .unwrap();
        fs::write(tmp.path().join(PROPERTIES_FILE), "DOC_RELEASE_PATH=liberty\n").unwrap();

        let conf = ConfFile::load(tmp.path()).unwrap();
        let mut options = RunOptions::default();
        options.apply_conf(&conf).unwrap();
        options.apply_properties(tmp.path()).unwrap();

        assert_eq!(options.release_path, "liberty");
        assert_eq!(options.comments_enabled, "1");
        assert_eq!(options.repo_name.as_deref(), Some("manuals"));
        assert_eq!(options.mappings.target_dirs["api-ref"], "target/docbkx/html");
        assert!(options.scan.only_books.contains("api-ref"));
        assert!(options.scan.file_exceptions.matches("skip.xml"));
    }

    #[test]
    fn apply_conf_rejects_unpaired_books() {
        let conf = ConfFile::parse("book = a\nbook = b\ntarget-dir = out\n").unwrap();
        let err = RunOptions::default().apply_conf(&conf).unwrap_err();
        assert!(err.to_string().contains("1:1"));
    }

    #[test]
    fn conf_file_missing_is_empty() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(ConfFile::load(tmp.path()).unwrap(), ConfFile::default());
    }

    #[test]
    fn book_mappings_pair_up() {
        let books = vec!["api-ref".to_string(), "api-quick-start".to_string()];
        let targets = vec!["target/docbkx/html".to_string(), "target/docbkx/webhelp/qs".to_string()];
        let publish = vec!["api-ref".to_string(), "quick-start".to_string()];
        let m = BookMappings::from_lists(&books, &targets, &publish).unwrap();
        assert_eq!(m.target_dirs["api-ref"], "target/docbkx/html");
        assert_eq!(m.publish_dir("api-quick-start"), "quick-start");
        assert_eq!(m.publish_dir("unmapped"), "unmapped");
    }

    #[test]
    fn book_mappings_without_publish_dirs() {
        let m = BookMappings::from_lists(&["a".to_string()], &["out".to_string()], &[]).unwrap();
        assert!(m.publish_dirs.is_empty());
        assert_eq!(m.publish_dir("a"), "a");
    }

    #[test]
    fn book_mappings_length_mismatch() {
        let err = BookMappings::from_lists(&["a".to_string()], &[], &[]).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        let err = BookMappings::from_lists(
            &["a".to_string()],
            &["t".to_string()],
            &["p".to_string(), "q".to_string()],
        )
        .unwrap_err();
        assert!(err.to_string().contains("publish-dir"));
    }
}
