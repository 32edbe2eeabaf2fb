//! Per-file checks: well-formedness and whitespace niceness.

use crate::discovery::display_rel;
use crate::markup::{DOCBOOK_NS, Element, WADL_NS, parse_elements};
use crate::types::{DocConfig, FileExceptions, Issue, base_name};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

/// Inline elements whose content must not start or end with whitespace.
const TIGHT_ELEMENTS: &[&str] = &[
    "listitem",
    "para",
    "td",
    "th",
    "command",
    "literal",
    "title",
    "caption",
    "filename",
    "userinput",
    "programlisting",
];

/// Recognized values of the `os` profiling attribute.
pub const KNOWN_OS_VALUES: &[&str] = &["debian", "centos", "fedora", "opensuse", "rhel", "sles", "ubuntu"];

/// Recognized values of the `audience` profiling attribute.
pub const KNOWN_AUDIENCE_VALUES: &[&str] = &["enduser", "adminuser", "installer", "webpage"];

static TRAILING_WS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+$").unwrap());

static TIGHT_ELEMENT_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    TIGHT_ELEMENTS
        .iter()
        .flat_map(|el| {
            [
                format!(r"<{el}>\s+[\w\-().:!?{{}}\[\]]+"),
                format!(r"[\w\-().:!?{{}}\[\]]+\s+</{el}>"),
            ]
        })
        .map(|re| Regex::new(&re).unwrap())
        .collect()
});

/// Structural rules applied on top of well-formedness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Structure {
    /// Well-formedness only.
    None,
    /// DocBook rules: section ids and profiling.
    DocBook,
    /// DocBook rules plus ids on WADL `resources`.
    Wadl,
}

impl Structure {
    /// Rules that apply to `path` under `config`.
    ///
    /// `.xml` files below a `config.structure_exempt_dirs` directory hold
    /// samples rather than DocBook and get none.
    pub fn of(path: &Path, config: &DocConfig) -> Self {
        let name = base_name(path);
        let ext = Path::new(name).extension().and_then(|e| e.to_str()).unwrap_or("");
        if !config.structure_extensions.contains(&ext) {
            return Structure::None;
        }
        let exempt = path
            .components()
            .any(|c| c.as_os_str().to_str().is_some_and(|c| config.structure_exempt_dirs.contains(&c)));
        match ext {
            "wadl" => Structure::Wadl,
            "xml" if exempt => Structure::None,
            _ => Structure::DocBook,
        }
    }
}

/// Which per-file checks to run.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileChecks {
    pub syntax: bool,
    pub niceness: bool,
}

/// Outcome of checking a batch of files.
#[derive(Debug, Default)]
pub struct Validation {
    pub issues: Vec<Issue>,
    pub checked: usize,
    pub failed: usize,
}

/// Check that a file is well-formed XML and follows the `structure` rules.
pub fn check_syntax(rel: &str, content: &str, structure: Structure) -> Vec<Issue> {
    match parse_elements(content) {
        Ok(elements) => check_structure(rel, &elements, structure),
        Err(e) => vec![Issue::error(rel, e.line, e.message)],
    }
}

/// Structural rules over the elements of a well-formed document.
pub fn check_structure(rel: &str, elements: &[Element], structure: Structure) -> Vec<Issue> {
    let mut issues = Vec::new();
    if structure == Structure::None {
        return issues;
    }
    for el in elements {
        let missing_id = (el.is(DOCBOOK_NS, "section")
            || (structure == Structure::Wadl && el.is(WADL_NS, "resources")))
            && !el.has_xml_id();
        if missing_id {
            issues.push(Issue::error(
                rel,
                el.line,
                format!("{} missing xml:id attribute, line {}", el.name, el.line),
            ));
        }
    }
    issues.extend(check_profiling(rel, elements, "os", KNOWN_OS_VALUES));
    issues.extend(check_profiling(rel, elements, "audience", KNOWN_AUDIENCE_VALUES));
    issues
}

/// Profiling values must be known, and a profiled DocBook element must not
/// hold descendants profiled for values outside its own.
fn check_profiling(rel: &str, elements: &[Element], attribute: &str, known: &[&str]) -> Vec<Issue> {
    let mut issues = Vec::new();
    // Profiled ancestors of the current element: (depth, name, values).
    let mut ancestors: Vec<(usize, &str, Vec<&str>)> = Vec::new();

    for el in elements {
        while ancestors.last().is_some_and(|(depth, ..)| *depth >= el.depth) {
            ancestors.pop();
        }
        if el.namespace.as_deref() != Some(DOCBOOK_NS) {
            continue;
        }
        let Some(value) = el.attr(attribute) else {
            continue;
        };
        let values: Vec<&str> = value.split(';').collect();

        for v in values.iter().filter(|v| !known.contains(v)) {
            issues.push(Issue::error(
                rel,
                el.line,
                format!("'{v}' is not a recognized {attribute} profile on line {}.", el.line),
            ));
        }
        for (_, parent, parent_values) in &ancestors {
            if values.iter().any(|v| !parent_values.contains(v)) {
                issues.push(Issue::error(
                    rel,
                    el.line,
                    format!(
                        "{parent} {attribute} profiling ({}) conflicts with {attribute} profiling of {} on line {}.",
                        parent_values.join(";"),
                        el.name,
                        el.line
                    ),
                ));
            }
        }
        ancestors.push((el.depth, el.name.as_str(), values));
    }
    issues
}

/// Check for trailing whitespace, padded inline elements and tabs.
pub fn check_niceness(rel: &str, content: &str) -> Vec<Issue> {
    let mut ws_lines = Vec::new();
    let mut tab_lines = Vec::new();

    // Split on '\n' only, so a trailing '\r' counts as whitespace.
    for (i, line) in content.split_terminator('\n').enumerate() {
        let line_no = i + 1;
        if line.contains('\t') {
            tab_lines.push(line_no);
        }
        if TRAILING_WS_RE.is_match(line) || TIGHT_ELEMENT_RES.iter().any(|re| re.is_match(line)) {
            ws_lines.push(line_no);
        }
    }

    let join = |lines: &[usize]| {
        lines
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut issues = Vec::new();
    if let Some(&first) = ws_lines.first() {
        issues.push(Issue::error(
            rel,
            first,
            format!("Trailing or unnecessary whitespace in lines: {}", join(&ws_lines)),
        ));
    }
    if let Some(&first) = tab_lines.first() {
        issues.push(Issue::error(
            rel,
            first,
            format!("Tabs in lines: {}", join(&tab_lines)),
        ));
    }
    issues
}

/// Keep the modified files that the checks apply to.
pub fn select_files(
    modified: &[PathBuf],
    config: &DocConfig,
    exceptions: &FileExceptions,
) -> Vec<PathBuf> {
    modified
        .iter()
        .filter(|f| {
            let name = base_name(f);
            config.is_xml_like(name) && !exceptions.matches(name)
        })
        .cloned()
        .collect()
}

/// Run the selected checks over `files`.
pub fn validate_files(files: &[PathBuf], root: &Path, config: &DocConfig, checks: FileChecks) -> Validation {
    let mut result = Validation::default();
    for path in files {
        let rel = display_rel(path, root);
        tracing::debug!(file = %rel, "validating");
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                result.checked += 1;
                result.failed += 1;
                result.issues.push(Issue::error(&rel, 0, format!("Cannot read file: {e}")));
                continue;
            },
        };

        let mut issues = Vec::new();
        if checks.syntax {
            issues.extend(check_syntax(&rel, &content, Structure::of(path, config)));
        }
        if checks.niceness {
            issues.extend(check_niceness(&rel, &content));
        }

        result.checked += 1;
        if !issues.is_empty() {
            result.failed += 1;
        }
        result.issues.extend(issues);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    // --- check_syntax ---

    #[test]
    fn check_syntax_ok() {
        assert!(check_syntax("a.xml", "<para>fine</para>", Structure::DocBook).is_empty());
    }

    #[test]
    fn check_syntax_reports_line() {
        let issues = check_syntax("a.xml", "<section>\n<para>\n</section>\n", Structure::None);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].line, 3);
        assert!(!issues[0].warning);
    }

    #[test]
    fn check_syntax_rejects_bare_ampersand() {
        let issues = check_syntax("a.xml", "<para>Tom & Jerry</para>", Structure::None);
        assert_eq!(issues.len(), 1);
    }

    // --- check_structure ---

    const DB: &str = r#"xmlns="http://docbook.org/ns/docbook""#;

    #[test]
    fn section_needs_xml_id() {
        let xml = format!("<chapter {DB} xml:id=\"c\">\n<section xml:id=\"s1\"/>\n<section>\n</section>\n</chapter>");
        let issues = check_syntax("a.xml", &xml, Structure::DocBook);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].line, 3);
        assert_eq!(issues[0].message, "section missing xml:id attribute, line 3");
        assert!(check_syntax("a.xml", &xml, Structure::None).is_empty());
    }

    #[test]
    fn section_outside_docbook_is_ignored() {
        assert!(check_syntax("a.xml", "<doc><section/></doc>", Structure::DocBook).is_empty());
    }

    #[test]
    fn wadl_resources_need_xml_id() {
        let xml = r#"<application xmlns="http://wadl.dev.java.net/2009/02"><resources base="x"/><resources xml:id="r" base="y"/></application>"#;
        let issues = check_syntax("api.wadl", xml, Structure::Wadl);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.starts_with("resources missing xml:id"));
        assert!(check_syntax("api.wadl", xml, Structure::DocBook).is_empty());
    }

    #[test]
    fn profiling_unknown_value() {
        let xml = format!("<para {DB} os=\"ubuntu;beos\" audience=\"hacker\">t</para>");
        let issues = check_syntax("a.xml", &xml, Structure::DocBook);
        let messages: Vec<_> = issues.iter().map(|i| i.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "'beos' is not a recognized os profile on line 1.",
                "'hacker' is not a recognized audience profile on line 1.",
            ]
        );
    }

    #[test]
    fn profiling_child_must_be_subset() {
        let xml = format!(
            "<chapter {DB} xml:id=\"c\" os=\"ubuntu;debian\">\n<para os=\"debian\">ok</para>\n<note>\n<para os=\"fedora\">bad</para>\n</note>\n</chapter>"
        );
        let issues = check_syntax("a.xml", &xml, Structure::DocBook);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].line, 4);
        assert_eq!(
            issues[0].message,
            "chapter os profiling (ubuntu;debian) conflicts with os profiling of para on line 4."
        );
    }

    #[test]
    fn profiling_siblings_do_not_conflict() {
        let xml = format!("<chapter {DB} xml:id=\"c\"><para os=\"debian\"/><para os=\"fedora\"/></chapter>");
        assert!(check_syntax("a.xml", &xml, Structure::DocBook).is_empty());
    }

    #[test]
    fn structure_of_paths() {
        let manuals = DocConfig::manuals();
        let api = DocConfig::api_site();
        assert_eq!(Structure::of(Path::new("/r/doc/a/ch.xml"), &manuals), Structure::DocBook);
        assert_eq!(Structure::of(Path::new("/r/doc/a/api.wadl"), &manuals), Structure::Wadl);
        assert_eq!(Structure::of(Path::new("/r/api/samples/req.xml"), &api), Structure::None);
        assert_eq!(Structure::of(Path::new("/r/api/wadls/x/ref.xml"), &api), Structure::None);
        assert_eq!(Structure::of(Path::new("/r/api/wadls/compute.wadl"), &api), Structure::Wadl);
        assert_eq!(Structure::of(Path::new("/r/api/common.xsd"), &api), Structure::None);
        assert_eq!(Structure::of(Path::new("/r/api/ch.xml"), &api), Structure::DocBook);
    }

    // --- check_niceness ---

    #[test]
    fn check_niceness_clean() {
        let content = "<para>Use <command>nova</command> here.</para>\n";
        assert!(check_niceness("a.xml", content).is_empty());
    }

    #[test]
    fn check_niceness_trailing_whitespace() {
        let content = "<para>ok</para>\n<para>bad</para>  \n";
        let issues = check_niceness("a.xml", content);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].line, 2);
        assert!(issues[0].message.contains("lines: 2"));
    }

    #[test]
    fn check_niceness_padded_elements() {
        let content = "<para> leading</para>\n<title>trailing </title>\n<literal>ok</literal>\n";
        let issues = check_niceness("a.xml", content);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.ends_with("lines: 1, 2"));
    }

    #[test]
    fn check_niceness_tabs() {
        let content = "<para>\tindent</para>\n";
        let issues = check_niceness("a.xml", content);
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().any(|i| i.message.starts_with("Tabs in lines: 1")));
    }

    #[test]
    fn check_niceness_crlf_is_trailing_whitespace() {
        let issues = check_niceness("a.xml", "<para>ok</para>\n<para>dos</para>\r\n<para>ok</para>\n");
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.ends_with("lines: 2"));
    }

    #[test]
    fn check_niceness_ignores_unlisted_elements() {
        assert!(check_niceness("a.xml", "<emphasis> x </emphasis>\n").is_empty());
    }

    // --- select_files / validate_files ---

    #[test]
    fn select_files_filters() {
        let config = DocConfig::manuals();
        let ex = FileExceptions::new(["skip.xml"]).unwrap();
        let modified = vec![
            PathBuf::from("/doc/a/ch1.xml"),
            PathBuf::from("/doc/a/pom.xml"),
            PathBuf::from("/doc/a/skip.xml"),
            PathBuf::from("/doc/a/figure.png"),
            PathBuf::from("/doc/api/compute.wadl"),
        ];
        let selected = select_files(&modified, &config, &ex);
        assert_eq!(
            selected,
            vec![PathBuf::from("/doc/a/ch1.xml"), PathBuf::from("/doc/api/compute.wadl")]
        );
    }

    #[test]
    fn validate_files_counts_failures() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::write(root.join("good.xml"), "<para>ok</para>\n").unwrap();
        fs::write(root.join("bad.xml"), "<para>ok</section>\n").unwrap();
        fs::write(root.join("ugly.xml"), "<para>ok</para> \n").unwrap();

        let files = vec![root.join("good.xml"), root.join("bad.xml"), root.join("ugly.xml")];
        let checks = FileChecks {
            syntax: true,
            niceness: true,
        };
        let v = validate_files(&files, root, &DocConfig::manuals(), checks);
        assert_eq!(v.checked, 3);
        assert_eq!(v.failed, 2);
        assert_eq!(v.issues.len(), 2);
        assert_eq!(v.issues[0].file, "bad.xml");
        assert_eq!(v.issues[1].file, "ugly.xml");
    }

    #[test]
    fn validate_files_syntax_only() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::write(root.join("ugly.xml"), "<para>ok</para> \n").unwrap();
        let checks = FileChecks {
            syntax: true,
            niceness: false,
        };
        let v = validate_files(&[root.join("ugly.xml")], root, &DocConfig::manuals(), checks);
        assert_eq!(v.failed, 0);
    }
}
