//! Reading OOXML package parts that calamine and docx-rs do not expose:
//! workbook styles and relationships, and `docProps/core.xml` of any package.
//!
//! A package is a zip archive of XML parts linked by relationship files.
//! Parts are small enough to be parsed into an in-memory element tree.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use quick_xml::Reader;
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesRef, BytesStart, Event};
use serde::Serialize;
use zip::ZipArchive;
use zip::result::ZipError;

const OFFICE_DOCUMENT_REL: &str = "/officeDocument";
const CORE_PROPERTIES_REL: &str = "/core-properties";

/// An XML element with its attributes and children, names kept qualified
#[derive(Debug, Clone, PartialEq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

fn local(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

impl XmlElement {
    pub(crate) fn from_start(start: &BytesStart) -> Self {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let attributes = start
            .attributes()
            .filter_map(|attr| attr.ok())
            .map(|attr| {
                let value = match attr.decode_and_unescape_value(start.decoder()) {
                    Ok(value) => value.into_owned(),
                    Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
                };
                (String::from_utf8_lossy(attr.key.as_ref()).into_owned(), value)
            })
            .collect();
        Self {
            name,
            attributes,
            children: Vec::new(),
        }
    }

    /// Element name without its namespace prefix
    pub fn local_name(&self) -> &str {
        local(&self.name)
    }

    pub fn is(&self, local_name: &str) -> bool {
        self.local_name() == local_name
    }

    /// Attribute value looked up by local name (`w:val` matches `"val"`)
    pub fn attr(&self, local_name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| local(key) == local_name)
            .map(|(_, value)| value.as_str())
    }

    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(element) => Some(element),
            XmlNode::Text(_) => None,
        })
    }

    pub fn child(&self, local_name: &str) -> Option<&XmlElement> {
        self.elements().find(|element| element.is(local_name))
    }

    pub fn children_named<'a>(&'a self, local_name: &'a str) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.elements().filter(move |element| element.is(local_name))
    }

    /// Concatenated text of this element and all of its descendants
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for node in &self.children {
            match node {
                XmlNode::Text(text) => out.push_str(text),
                XmlNode::Element(element) => element.collect_text(out),
            }
        }
    }
}

/// Interpret an OOXML on/off property such as `<w:b/>` or `<w:i w:val="0"/>`.
///
/// `None` means the property is not set on this element.
pub fn on_off(element: Option<&XmlElement>) -> Option<bool> {
    let element = element?;
    Some(!matches!(
        element.attr("val").map(|v| v.to_ascii_lowercase()).as_deref(),
        Some("0" | "false" | "off" | "none")
    ))
}

/// Text that a `&name;` reference stands for; unknown entities are kept verbatim
pub(crate) fn general_ref_text(reference: &BytesRef) -> Result<String> {
    if let Some(ch) = reference.resolve_char_ref()? {
        return Ok(ch.to_string());
    }
    let name = reference.decode()?;
    Ok(match resolve_predefined_entity(&name) {
        Some(text) => text.to_string(),
        None => format!("&{};", name),
    })
}

fn attach(stack: &mut [XmlElement], root: &mut Option<XmlElement>, element: XmlElement) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(XmlNode::Element(element)),
        None => {
            if root.is_none() {
                *root = Some(element);
            }
        }
    }
}

fn push_text(stack: &mut [XmlElement], text: String) {
    if text.is_empty() {
        return;
    }
    if let Some(parent) = stack.last_mut() {
        match parent.children.last_mut() {
            Some(XmlNode::Text(existing)) => existing.push_str(&text),
            _ => parent.children.push(XmlNode::Text(text)),
        }
    }
}

/// Parse an XML document into its root element
pub fn parse_xml(xml: &str) -> Result<XmlElement> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => stack.push(XmlElement::from_start(e)),
            Ok(Event::Empty(ref e)) => attach(&mut stack, &mut root, XmlElement::from_start(e)),
            Ok(Event::End(_)) => {
                if let Some(element) = stack.pop() {
                    attach(&mut stack, &mut root, element);
                }
            }
            Ok(Event::Text(ref e)) => {
                push_text(&mut stack, e.xml_content()?.into_owned());
            }
            Ok(Event::CData(ref e)) => {
                push_text(&mut stack, e.decode()?.into_owned());
            }
            Ok(Event::GeneralRef(ref e)) => {
                push_text(&mut stack, general_ref_text(e)?);
            }
            Ok(Event::Eof) => break,
            Err(e) => bail!("Malformed XML at byte {}: {}", reader.buffer_position(), e),
            _ => {}
        }
        buf.clear();
    }

    if !stack.is_empty() {
        bail!("Malformed XML: unclosed element <{}>", stack[stack.len() - 1].name);
    }
    root.ok_or_else(|| anyhow!("XML document has no root element"))
}

/// One entry of a `.rels` part
#[derive(Debug, Clone, PartialEq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    /// Target resolved to an absolute part name inside the package
    pub target: String,
    pub external: bool,
}

/// Name of the relationship part that belongs to `part` (`""` for the package)
pub fn rels_part_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None if part.is_empty() => "_rels/.rels".to_string(),
        None => format!("_rels/{}.rels", part),
    }
}

/// Resolve a relationship target relative to the part that owns it
pub fn resolve_target(source_part: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut segments: Vec<&str> = match source_part.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Document metadata from `docProps/core.xml`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CoreProperties {
    pub title: Option<String>,
    pub creator: Option<String>,
    pub last_modified_by: Option<String>,
    pub created: Option<String>,
    pub modified: Option<String>,
}

impl CoreProperties {
    fn from_xml(root: &XmlElement) -> Self {
        let field = |name: &str| {
            root.child(name)
                .map(|element| element.text().trim().to_string())
                .filter(|text| !text.is_empty())
        };
        Self {
            title: field("title"),
            creator: field("creator"),
            last_modified_by: field("lastModifiedBy"),
            created: field("created"),
            modified: field("modified"),
        }
    }
}

/// An opened OOXML package; the file handle lives as long as this value
pub struct OoxmlPackage {
    archive: ZipArchive<File>,
}

impl OoxmlPackage {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open file: {}", path.display()))?;
        let archive = ZipArchive::new(file)
            .with_context(|| format!("{} is not a valid Office Open XML package", path.display()))?;
        Ok(Self { archive })
    }

    /// Raw text of a part, `None` when the package does not contain it
    pub fn read_part(&mut self, name: &str) -> Result<Option<String>> {
        let mut entry = match self.archive.by_name(name) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("Failed to read package part {}", name)),
        };
        let mut bytes = Vec::new();
        entry
            .read_to_end(&mut bytes)
            .with_context(|| format!("Failed to decompress package part {}", name))?;
        let text = String::from_utf8(bytes)
            .with_context(|| format!("Package part {} is not valid UTF-8", name))?;
        Ok(Some(text.trim_start_matches('\u{feff}').to_string()))
    }

    pub fn read_xml(&mut self, name: &str) -> Result<Option<XmlElement>> {
        match self.read_part(name)? {
            Some(text) => parse_xml(&text)
                .with_context(|| format!("Failed to parse package part {}", name))
                .map(Some),
            None => Ok(None),
        }
    }

    /// Relationships owned by `part`; empty when the part has none
    pub fn relationships(&mut self, part: &str) -> Result<Vec<Relationship>> {
        let Some(root) = self.read_xml(&rels_part_for(part))? else {
            return Ok(Vec::new());
        };
        Ok(root
            .children_named("Relationship")
            .filter_map(|rel| {
                let id = rel.attr("Id")?.to_string();
                let rel_type = rel.attr("Type").unwrap_or_default().to_string();
                let raw_target = rel.attr("Target")?;
                let external = rel
                    .attr("TargetMode")
                    .is_some_and(|mode| mode.eq_ignore_ascii_case("External"));
                let target = if external {
                    raw_target.to_string()
                } else {
                    resolve_target(part, raw_target)
                };
                Some(Relationship {
                    id,
                    rel_type,
                    target,
                    external,
                })
            })
            .collect())
    }

    fn package_target(&mut self, type_suffix: &str) -> Result<Option<String>> {
        Ok(self
            .relationships("")?
            .into_iter()
            .find(|rel| !rel.external && rel.rel_type.ends_with(type_suffix))
            .map(|rel| rel.target))
    }

    /// Name of the main part (`word/document.xml`, `xl/workbook.xml`, ...)
    pub fn main_part(&mut self, fallback: &str) -> Result<String> {
        Ok(self
            .package_target(OFFICE_DOCUMENT_REL)?
            .unwrap_or_else(|| fallback.to_string()))
    }

    pub fn core_properties(&mut self) -> Result<CoreProperties> {
        let part = self
            .package_target(CORE_PROPERTIES_REL)?
            .unwrap_or_else(|| "docProps/core.xml".to_string());
        Ok(self
            .read_xml(&part)?
            .map(|root| CoreProperties::from_xml(&root))
            .unwrap_or_default())
    }
}
