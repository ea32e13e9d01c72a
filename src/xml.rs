//! XML query service.
//!
//! Metadata documents are small, so the whole file is parsed into an
//! element tree once and queried by element path. A [`NodePath`] is a
//! validated, slash-separated chain of element names rooted at the document
//! element (`"extensionMetadata/outputs/output"`). Queries return attribute
//! maps in document order.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{PrepResult, PreprocError};

/// Attribute name → value mapping for one element.
pub type AttributeMap = BTreeMap<String, String>;

/// A validated element path, rooted at the document element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodePath {
    segments: Vec<String>,
}

impl NodePath {
    /// Parse a slash-separated element path. Empty paths and empty segments
    /// are rejected so misconfigured queries fail at load time, not at
    /// query time.
    pub fn parse(raw: &str) -> PrepResult<Self> {
        let trimmed = raw.trim().trim_matches('/');
        if trimmed.is_empty() {
            return Err(PreprocError::configuration("empty element path"));
        }
        let segments: Vec<String> = trimmed.split('/').map(str::to_string).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(PreprocError::configuration(format!(
                "element path '{}' contains an empty segment",
                raw
            )));
        }
        Ok(Self { segments })
    }

    /// Path segments, root first.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl std::fmt::Display for NodePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

/// One element of the parsed tree.
#[derive(Debug, Clone)]
struct XmlElement {
    tag: String,
    attributes: AttributeMap,
    children: Vec<XmlElement>,
}

/// A parsed XML document, queryable by element path.
#[derive(Debug, Clone)]
pub struct XmlDocument {
    root: XmlElement,
    source: PathBuf,
}

impl XmlDocument {
    /// Read and parse a document from disk.
    pub fn open(path: &Path) -> PrepResult<Self> {
        if !path.is_file() {
            return Err(PreprocError::file_not_found(path));
        }
        let text = std::fs::read_to_string(path)?;
        let root = parse_tree(&text)
            .map_err(|e| annotate_parse_error(e, path))?;
        Ok(Self {
            root,
            source: path.to_path_buf(),
        })
    }

    /// Parse a document from a string. The label is used in error messages.
    pub fn from_str_labeled(text: &str, label: &str) -> PrepResult<Self> {
        let root = parse_tree(text)
            .map_err(|e| annotate_parse_error(e, Path::new(label)))?;
        Ok(Self {
            root,
            source: PathBuf::from(label),
        })
    }

    /// The file this document was read from.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Attribute maps of all elements matching the path, in document order.
    /// An empty result is not an error; callers decide whether absence is
    /// fatal.
    pub fn select(&self, path: &NodePath) -> Vec<AttributeMap> {
        let mut found = Vec::new();
        collect_matches(&self.root, path.segments(), &mut |el| {
            found.push(el.attributes.clone())
        });
        found
    }

    /// Value of `attribute` on the first element matching the path.
    pub fn attribute(&self, path: &NodePath, attribute: &str) -> Option<String> {
        let mut found = None;
        collect_matches(&self.root, path.segments(), &mut |el| {
            if found.is_none() {
                found = el.attributes.get(attribute).cloned();
            }
        });
        found
    }

    /// Like [`select`](Self::select), but an empty result is a
    /// configuration error naming this document and the path.
    pub fn select_required(&self, path: &NodePath) -> PrepResult<Vec<AttributeMap>> {
        let found = self.select(path);
        if found.is_empty() {
            return Err(PreprocError::configuration_in(
                &self.source,
                format!("no '{}' element found", path),
            ));
        }
        Ok(found)
    }
}

fn collect_matches<'a>(
    root: &'a XmlElement,
    segments: &[String],
    visit: &mut impl FnMut(&'a XmlElement),
) {
    fn walk<'a>(
        element: &'a XmlElement,
        segments: &[String],
        visit: &mut impl FnMut(&'a XmlElement),
    ) {
        match segments {
            [] => {}
            [last] if element.tag == *last => visit(element),
            [first, rest @ ..] if element.tag == *first => {
                for child in &element.children {
                    walk(child, rest, visit);
                }
            }
            _ => {}
        }
    }
    walk(root, segments, visit);
}

fn parse_tree(text: &str) -> Result<XmlElement, PreprocError> {
    let mut reader = Reader::from_str(text);
    reader.trim_text(true);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                stack.push(element_from_start(&start)?);
            }
            Event::Empty(start) => {
                let element = element_from_start(&start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack.pop().ok_or_else(|| {
                    PreprocError::configuration("unbalanced closing tag")
                })?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Eof => break,
            // Text, comments and declarations carry no queryable attributes.
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(PreprocError::configuration(format!(
            "unclosed element '{}'",
            stack.last().map(|e| e.tag.as_str()).unwrap_or("?")
        )));
    }
    root.ok_or_else(|| PreprocError::configuration("document has no root element"))
}

fn element_from_start(start: &BytesStart<'_>) -> Result<XmlElement, PreprocError> {
    let tag = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attributes = AttributeMap::new();
    for attr in start.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map(|v| v.into_owned())?;
        attributes.insert(key, value);
    }
    Ok(XmlElement {
        tag,
        attributes,
        children: Vec::new(),
    })
}

fn attach(
    stack: &mut Vec<XmlElement>,
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<(), PreprocError> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(element);
            Ok(())
        }
        None => {
            if root.is_some() {
                return Err(PreprocError::configuration(
                    "document has more than one root element",
                ));
            }
            *root = Some(element);
            Ok(())
        }
    }
}

fn annotate_parse_error(err: PreprocError, path: &Path) -> PreprocError {
    match err {
        PreprocError::Xml(inner) => {
            PreprocError::configuration_in(path, format!("XML parse failure: {}", inner))
        }
        PreprocError::Configuration { message } => PreprocError::configuration_in(path, message),
        other => other,
    }
}
