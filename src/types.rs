//! Core types for documentation tree checking.

use std::path::Path;

/// Layout conventions of a documentation repository.
///
/// Different repositories can customize behavior by providing different configs.
#[derive(Debug, Clone)]
pub struct DocConfig {
    /// File whose presence marks a directory as a buildable book.
    pub manifest_name: &'static str,

    /// Extensions of files parsed for inclusion directives.
    pub markup_extensions: Vec<&'static str>,

    /// Extensions of files covered by the syntax and niceness checks.
    /// Wider than `markup_extensions`: schemas and stylesheets are XML too.
    pub xml_like_extensions: Vec<&'static str>,

    /// Name prefixes of book master files (`bk-install.xml`).
    pub master_prefixes: Vec<&'static str>,

    /// Exact names that are always master files.
    pub master_names: Vec<&'static str>,

    /// Repository-relative paths whose modification affects every book.
    pub special_files: Vec<&'static str>,

    /// Path suffix of the book authored in plain text instead of markup.
    /// manuals: the HA guide (asciidoc); api-site: none.
    pub plain_text_book: Option<&'static str>,

    /// File names never parsed, independent of user exceptions.
    pub skip_files: Vec<&'static str>,

    /// Directory names never descended into.
    pub skip_dirs: Vec<&'static str>,

    /// Repository-relative directory holding the static website.
    pub www_dir: Option<&'static str>,

    /// Extensions of files that get structural checks after parsing.
    pub structure_extensions: Vec<&'static str>,

    /// Directory names whose `.xml` files are samples, not DocBook.
    pub structure_exempt_dirs: Vec<&'static str>,

    /// Subdirectory of the repository root holding the documentation tree.
    /// manuals: "doc"; api-site: the repository root itself.
    pub doc_subdir: Option<&'static str>,
}

impl DocConfig {
    /// Config for the manuals repository: books under `doc/`, one asciidoc
    /// book, and a static website under `www/`.
    pub fn manuals() -> Self {
        Self {
            manifest_name: "pom.xml",
            markup_extensions: vec!["xml"],
            xml_like_extensions: vec!["xml", "xsd", "xsl", "wadl", "xjb"],
            master_prefixes: vec!["bk-", "bk_", "st-"],
            master_names: vec!["openstack-glossary.xml"],
            special_files: vec!["tools/test.py", "doc/pom.xml"],
            plain_text_book: Some("doc/high-availability-guide"),
            skip_files: vec!["pom.xml", "ha-guide-docinfo.xml"],
            skip_dirs: vec!["target"],
            www_dir: Some("www"),
            structure_extensions: vec!["xml", "xsd", "xsl", "wadl", "xjb"],
            structure_exempt_dirs: vec![],
            doc_subdir: Some("doc"),
        }
    }

    /// Config for the API reference site: books live at the repository root
    /// and WADL files sit next to the DocBook sources.
    pub fn api_site() -> Self {
        Self {
            plain_text_book: None,
            special_files: vec!["tools/test.py", "pom.xml"],
            structure_extensions: vec!["xml", "wadl"],
            structure_exempt_dirs: vec!["wadls", "samples"],
            doc_subdir: None,
            ..Self::manuals()
        }
    }

    /// Whether a file name carries one of the XML-like extensions.
    pub fn is_xml_like(&self, name: &str) -> bool {
        name != self.manifest_name && has_extension(name, &self.xml_like_extensions)
    }

    /// Whether a file name carries one of the scanned markup extensions.
    pub fn is_markup(&self, name: &str) -> bool {
        has_extension(name, &self.markup_extensions)
    }
}

fn has_extension(name: &str, extensions: &[&str]) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.contains(&ext))
}

/// User-supplied file name patterns excluded from scanning and checks.
#[derive(Debug, Clone, Default)]
pub struct FileExceptions {
    patterns: Vec<glob::Pattern>,
}

impl FileExceptions {
    /// Compile the given glob patterns. Plain names match only themselves.
    pub fn new<I, S>(patterns: I) -> Result<Self, glob::PatternError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| glob::Pattern::new(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Whether a file base name is excluded.
    pub fn matches(&self, name: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(name))
    }
}

/// An issue found while checking the documentation tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub file: String,
    pub line: usize,
    pub message: String,
    pub warning: bool,
}

impl Issue {
    pub fn error(file: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line,
            message: message.into(),
            warning: false,
        }
    }

    pub fn warning(file: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        Self {
            warning: true,
            ..Self::error(file, line, message)
        }
    }
}

/// Check if a file name is one of the special names used for book master files.
///
/// Manifests are not parsed for their entry points, so master files are
/// recognised by name alone.
pub fn is_book_master(name: &str, config: &DocConfig) -> bool {
    if config.master_names.contains(&name) {
        return true;
    }
    config.master_prefixes.iter().any(|p| name.starts_with(p)) && config.is_markup(name)
}

/// Base name of a path as UTF-8, empty when absent.
pub(crate) fn base_name(path: &Path) -> &str {
    path.file_name().and_then(|n| n.to_str()).unwrap_or("")
}
