//! DocBook markup parsing: elements, inclusion directives and well-formedness.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use quick_xml::NsReader;
use quick_xml::escape::unescape_with;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, QName, ResolveResult};
use regex::Regex;
use thiserror::Error;

pub const DOCBOOK_NS: &str = "http://docbook.org/ns/docbook";
pub const XINCLUDE_NS: &str = "http://www.w3.org/2001/XInclude";
pub const WADL_NS: &str = "http://wadl.dev.java.net/2009/02";
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

static ENTITY_DECL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<!ENTITY\s+([^\s%]+)\s").unwrap());

/// How one markup file pulls in another file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    /// `<imagedata fileref="..."/>`
    Image,
    /// `<xi:include href="..."/>`
    Include,
}

/// A reference from a markup file to another file, href as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub kind: ReferenceKind,
    pub href: String,
    pub line: usize,
}

/// The document is not well-formed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("line {line}: {message}")]
pub struct MarkupError {
    pub line: usize,
    pub message: String,
}

/// An attribute with its resolved namespace and unescaped value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub namespace: Option<String>,
    /// Local name.
    pub name: String,
    /// Name as written, prefix included.
    pub qname: String,
    pub value: String,
}

/// A start or empty element tag in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub namespace: Option<String>,
    /// Local name.
    pub name: String,
    pub attributes: Vec<Attribute>,
    pub line: usize,
    /// Nesting depth, 0 for the root element.
    pub depth: usize,
}

impl Element {
    pub fn is(&self, namespace: &str, name: &str) -> bool {
        self.namespace.as_deref() == Some(namespace) && self.name == name
    }

    /// Value of an attribute without namespace.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.namespace.is_none() && a.name == name && !a.qname.contains(':'))
            .map(|a| a.value.as_str())
    }

    pub fn has_xml_id(&self) -> bool {
        self.attributes
            .iter()
            .any(|a| a.qname == "xml:id" || (a.namespace.as_deref() == Some(XML_NS) && a.name == "id"))
    }
}

/// Parse a document into its elements.
///
/// Fails on any well-formedness error: mismatched or unclosed tags, bad or
/// duplicate attributes, unbound prefixes, undeclared entities, a bare `&`,
/// and content outside a single root element.
pub fn parse_elements(xml: &str) -> Result<Vec<Element>, MarkupError> {
    let mut reader = NsReader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut elements = Vec::new();
    let mut entities = BTreeSet::new();
    let mut depth = 0usize;
    let mut seen_root = false;

    loop {
        let event = reader.read_event();
        let pos = reader.buffer_position() as usize;
        let fail = |message: String| MarkupError {
            line: line_at(xml, pos),
            message,
        };

        match event {
            Ok(Event::DocType(t)) => {
                let decl = String::from_utf8_lossy(&t);
                for cap in ENTITY_DECL_RE.captures_iter(&decl) {
                    entities.insert(cap[1].to_string());
                }
            },
            Ok(Event::Start(_) | Event::Empty(_)) if depth == 0 && seen_root => {
                return Err(fail("content after the root element".to_string()));
            },
            Ok(Event::Start(e)) => {
                elements.push(element_of(&reader, &e, &entities, depth, line_at(xml, pos)).map_err(fail)?);
                depth += 1;
                seen_root = true;
            },
            Ok(Event::Empty(e)) => {
                elements.push(element_of(&reader, &e, &entities, depth, line_at(xml, pos)).map_err(fail)?);
                seen_root = true;
            },
            Ok(Event::End(_)) => {
                if depth == 0 {
                    return Err(fail("closing tag without opening tag".to_string()));
                }
                depth -= 1;
            },
            Ok(Event::Text(t)) => {
                if depth == 0 {
                    return Err(fail("text outside the root element".to_string()));
                }
                let raw = std::str::from_utf8(&t).map_err(|e| fail(e.to_string()))?;
                unescape(raw, &entities).map_err(fail)?;
            },
            Ok(Event::CData(_)) if depth == 0 => {
                return Err(fail("CDATA outside the root element".to_string()));
            },
            Ok(Event::Eof) => {
                if depth > 0 {
                    return Err(fail("premature end of document, unclosed element".to_string()));
                }
                if !seen_root {
                    return Err(fail("document has no root element".to_string()));
                }
                return Ok(elements);
            },
            Ok(_) => {},
            Err(e) => return Err(fail(e.to_string())),
        }
    }
}

/// Parse a document and collect its image and transclusion references.
pub fn parse_references(xml: &str) -> Result<Vec<Reference>, MarkupError> {
    Ok(parse_elements(xml)?.iter().filter_map(reference_of).collect())
}

/// Check a document for well-formedness only.
pub fn check_well_formed(xml: &str) -> Result<(), MarkupError> {
    parse_elements(xml).map(|_| ())
}

fn element_of(
    reader: &NsReader<&[u8]>,
    e: &BytesStart,
    entities: &BTreeSet<String>,
    depth: usize,
    line: usize,
) -> Result<Element, String> {
    let (ns, local) = reader.resolve_element(e.name());
    let namespace = match ns {
        ResolveResult::Unknown(prefix) => {
            return Err(format!(
                "namespace prefix {} is not defined",
                String::from_utf8_lossy(&prefix)
            ));
        },
        other => bound(other),
    };

    let mut attributes = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        let qname = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let raw = std::str::from_utf8(&attr.value).map_err(|e| e.to_string())?;
        let value = unescape(raw, entities)?;
        let (namespace, name) = attribute_name(reader, attr.key, &qname)?;
        attributes.push(Attribute {
            namespace,
            name,
            qname,
            value,
        });
    }

    Ok(Element {
        namespace,
        name: String::from_utf8_lossy(local.as_ref()).into_owned(),
        attributes,
        line,
        depth,
    })
}

fn attribute_name(reader: &NsReader<&[u8]>, key: QName, qname: &str) -> Result<(Option<String>, String), String> {
    // Namespace declarations and the reserved xml prefix need no binding.
    if qname == "xmlns" || qname.starts_with("xmlns:") || qname.starts_with("xml:") {
        let local = qname.split_once(':').map(|(_, l)| l).unwrap_or(qname);
        let ns = qname.starts_with("xml:").then(|| XML_NS.to_string());
        return Ok((ns, local.to_string()));
    }
    let (ns, local) = reader.resolve_attribute(key);
    let namespace = match ns {
        ResolveResult::Unknown(prefix) => {
            return Err(format!(
                "namespace prefix {} is not defined",
                String::from_utf8_lossy(&prefix)
            ));
        },
        other => bound(other),
    };
    Ok((namespace, String::from_utf8_lossy(local.as_ref()).into_owned()))
}

fn bound(ns: ResolveResult) -> Option<String> {
    match ns {
        ResolveResult::Bound(Namespace(n)) => Some(String::from_utf8_lossy(n).into_owned()),
        _ => None,
    }
}

/// Replace character and entity references. Only the five predefined
/// entities and entities declared in the DOCTYPE are known; declared ones
/// expand to nothing since only validity matters here.
fn unescape(raw: &str, declared: &BTreeSet<String>) -> Result<String, String> {
    unescape_with(raw, |name| match name {
        "amp" => Some("&"),
        "lt" => Some("<"),
        "gt" => Some(">"),
        "apos" => Some("'"),
        "quot" => Some("\""),
        other if declared.contains(other) => Some(""),
        _ => None,
    })
    .map(|v| v.into_owned())
    .map_err(|e| e.to_string())
}

fn reference_of(e: &Element) -> Option<Reference> {
    let (kind, attr) = if e.is(DOCBOOK_NS, "imagedata") {
        (ReferenceKind::Image, "fileref")
    } else if e.is(XINCLUDE_NS, "include") {
        (ReferenceKind::Include, "href")
    } else {
        return None;
    };
    let href = e.attr(attr)?.trim();
    if href.is_empty() {
        return None;
    }
    Some(Reference {
        kind,
        href: href.to_string(),
        line: e.line,
    })
}

/// 1-based line number of a byte offset.
fn line_at(text: &str, pos: usize) -> usize {
    let end = pos.min(text.len());
    text.as_bytes()[..end].iter().filter(|&&b| b == b'\n').count() + 1
}
