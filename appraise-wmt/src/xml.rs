//! HIT XML schema validation and small XML helpers
//!
//! Two document shapes are accepted:
//!
//! ```xml
//! <hits>
//!   <hit block-id="1" source-language="eng" target-language="deu" systems="a,b,c,d,e">
//!     <seg id="1"> ... </seg>   (exactly 3)
//!   </hit>
//! </hits>
//! ```
//!
//! and a single `<hit>` element on top-level. Every `<seg>` holds one
//! `<source>`, an optional `<reference>` and exactly 5 `<translation>`
//! elements, each with a text value.

use crate::error::SchemaError;
use indexmap::IndexMap;
use roxmltree::{Attribute, Document, Namespace, Node};

/// Attributes every `<hit>` element must carry
pub const HIT_REQUIRED_ATTRIBUTES: [&str; 4] =
    ["block-id", "source-language", "target-language", "systems"];

pub const SEGMENTS_PER_HIT: usize = 3;

pub const TRANSLATIONS_PER_SEGMENT: usize = 5;

/// Ordered attribute map; iteration order is document order
pub type Attributes = IndexMap<String, String>;

/// Bound to the `xml` prefix in every document
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Which of the two accepted document shapes a text uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentForm {
    /// `<hits>` on top-level
    Batch,
    /// `<hit>` on top-level
    Task,
}

type SchemaResult<T> = std::result::Result<T, SchemaError>;

fn ensure(condition: bool, message: impl FnOnce() -> String) -> SchemaResult<()> {
    if condition {
        Ok(())
    } else {
        Err(SchemaError::new(message()))
    }
}

/// Parse XML text, wrapping parse failures as [`SchemaError`]
pub fn parse(text: &str) -> SchemaResult<Document<'_>> {
    Ok(Document::parse(text)?)
}

/// Element children of a node; text and comments are skipped
pub fn element_children<'a, 'input>(
    node: Node<'a, 'input>,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(|n| n.is_element())
}

fn children_named<'a, 'input>(
    node: Node<'a, 'input>,
    name: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    element_children(node).filter(move |n| n.tag_name().name() == name)
}

/// Copy an element's attributes under their qualified names, in document order.
///
/// Namespace declarations come first as `xmlns`/`xmlns:<prefix>` entries: the
/// ones made on the element itself plus any inherited one its attributes use,
/// so the rendered map is a self-contained start tag.
pub fn attributes(node: Node) -> Attributes {
    let mut map = Attributes::new();
    for ns in node.namespaces().filter(|ns| ns.name() != Some("xml")) {
        let used = node.attributes().any(|a| a.namespace() == Some(ns.uri()));
        if used || !inherited(node, ns) {
            map.insert(declaration_key(ns.name()), ns.uri().to_string());
        }
    }
    for attr in node.attributes() {
        map.insert(qualified_name(node, &attr), attr.value().to_string());
    }
    map
}

/// `prefix:name` for namespaced attributes, the bare name otherwise
fn qualified_name(node: Node, attr: &Attribute) -> String {
    match attr.namespace().and_then(|uri| prefix_for(node, uri)) {
        Some(prefix) => format!("{}:{}", prefix, attr.name()),
        None => attr.name().to_string(),
    }
}

fn prefix_for<'a>(node: Node<'a, '_>, uri: &str) -> Option<&'a str> {
    if uri == XML_NAMESPACE {
        return Some("xml");
    }
    node.namespaces().filter(|ns| ns.uri() == uri).find_map(|ns| ns.name())
}

fn declaration_key(prefix: Option<&str>) -> String {
    match prefix {
        Some(prefix) => format!("xmlns:{}", prefix),
        None => "xmlns".to_string(),
    }
}

/// Whether the same binding is already in scope at the parent element
fn inherited(node: Node, ns: &Namespace) -> bool {
    node.parent_element().map_or(false, |parent| {
        parent
            .namespaces()
            .any(|p| p.name() == ns.name() && p.uri() == ns.uri())
    })
}

/// Byte length of the start tag at the beginning of `source`
fn start_tag_len(source: &str) -> usize {
    let mut quote = None;
    for (i, c) in source.char_indices() {
        match (quote, c) {
            (None, '"' | '\'') => quote = Some(c),
            (Some(q), c) if c == q => quote = None,
            (None, '>') => return i + 1,
            _ => {}
        }
    }
    source.len()
}

/// Whether a start tag spells out an attribute named `key`
fn declares(start_tag: &str, key: &str) -> bool {
    start_tag.match_indices(key).any(|(i, _)| {
        start_tag[..i].ends_with(char::is_whitespace)
            && start_tag[i + key.len()..].trim_start().starts_with('=')
    })
}

/// Source text of an element from `text`, parseable on its own.
///
/// Namespace declarations the element inherits from its ancestors are copied
/// onto its start tag; everything else is kept byte for byte.
pub fn standalone_element(text: &str, node: Node) -> String {
    let source = &text[node.range()];
    let start_tag = &source[..start_tag_len(source)];

    let declarations: String = node
        .namespaces()
        .filter(|ns| ns.name() != Some("xml") && inherited(node, ns))
        .map(|ns| (declaration_key(ns.name()), ns.uri()))
        .filter(|(key, _)| !declares(start_tag, key))
        .map(|(key, uri)| format!(" {}=\"{}\"", key, escape_attribute(uri)))
        .collect();
    if declarations.is_empty() {
        return source.to_string();
    }

    let name_end = source
        .char_indices()
        .skip(1)
        .find(|&(_, c)| c.is_whitespace() || c == '>' || c == '/')
        .map_or(source.len(), |(i, _)| i);
    format!("{}{}{}", &source[..name_end], declarations, &source[name_end..])
}

/// Detect the document shape from the top-level tag
pub fn detect_form(text: &str) -> SchemaResult<DocumentForm> {
    let doc = parse(text)?;
    Ok(form_of(doc.root_element()))
}

pub(crate) fn form_of(root: Node) -> DocumentForm {
    if root.tag_name().name() == "hits" {
        DocumentForm::Batch
    } else {
        DocumentForm::Task
    }
}

/// Validate a batch document (`<hits>` on top-level)
pub fn validate_batch(text: &str) -> SchemaResult<()> {
    let doc = parse(text)?;
    validate_batch_node(doc.root_element())
}

/// Validate a single-task document (`<hit>` on top-level)
pub fn validate_task(text: &str) -> SchemaResult<()> {
    let doc = parse(text)?;
    let root = doc.root_element();
    ensure(root.tag_name().name() == "hit", || {
        "expected <hit> on top-level".to_string()
    })?;
    validate_hit_node(root)
}

pub fn validate_batch_node(root: Node) -> SchemaResult<()> {
    ensure(root.tag_name().name() == "hits", || {
        "expected <hits> on top-level".to_string()
    })?;

    for child in element_children(root) {
        ensure(child.tag_name().name() == "hit", || {
            "expected <hit> on second level".to_string()
        })?;
        validate_hit_node(child)?;
    }
    Ok(())
}

/// Check required attributes and the 3 `<seg>` children of a `<hit>`
pub fn validate_hit_node(hit: Node) -> SchemaResult<()> {
    for attr in HIT_REQUIRED_ATTRIBUTES {
        ensure(hit.attribute(attr).is_some(), || {
            format!("missing required <hit> attribute {}", attr)
        })?;
    }

    let mut count = 0;
    for seg in element_children(hit) {
        validate_segment(seg)?;
        count += 1;
    }
    ensure(count == SEGMENTS_PER_HIT, || {
        format!("required {} <seg> children", SEGMENTS_PER_HIT)
    })
}

/// Check that a `<seg>` element has source, optional reference and 5 translations
pub fn validate_segment(seg: Node) -> SchemaResult<()> {
    let tag = seg.tag_name().name();
    ensure(tag == "seg", || format!("illegal tag: {}", tag))?;

    let sources: Vec<Node> = children_named(seg, "source").collect();
    ensure(sources.len() == 1, || {
        "exactly one <source> element expected".to_string()
    })?;
    ensure(sources[0].text().is_some(), || {
        "missing required <source> text value".to_string()
    })?;

    let references: Vec<Node> = children_named(seg, "reference").collect();
    ensure(references.len() <= 1, || {
        "at most one <reference> element expected".to_string()
    })?;
    if let Some(reference) = references.first() {
        ensure(reference.text().is_some(), || {
            "missing required <reference> text value".to_string()
        })?;
    }

    let translations: Vec<Node> = children_named(seg, "translation").collect();
    ensure(translations.len() == TRANSLATIONS_PER_SEGMENT, || {
        format!(
            "exactly {} <translation> elements expected",
            TRANSLATIONS_PER_SEGMENT
        )
    })?;
    for translation in translations {
        ensure(translation.text().is_some(), || {
            "missing required <translation> text value".to_string()
        })?;
    }
    Ok(())
}

/// Validate a `<seg>` given as XML text
pub fn validate_segment_xml(text: &str) -> SchemaResult<()> {
    let doc = parse(text)?;
    validate_segment(doc.root_element())
}

/// Escape character data
pub fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape an attribute value for use inside double quotes
pub fn escape_attribute(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}

/// Render attributes as space-separated `key="value"` pairs, in map order
pub fn render_attributes(attributes: &Attributes) -> String {
    attributes
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_attribute(v)))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Build an opening tag from pre-rendered attribute chunks, skipping empty ones
pub(crate) fn open_tag(name: &str, chunks: &[&str]) -> String {
    let mut tag = format!("<{}", name);
    for chunk in chunks.iter().filter(|c| !c.is_empty()) {
        tag.push(' ');
        tag.push_str(chunk);
    }
    tag.push('>');
    tag
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(translations: usize) -> String {
        let mut s = String::from("<seg id=\"1\"><source>Hallo</source><reference>Hello</reference>");
        for i in 0..translations {
            s.push_str(&format!("<translation system=\"s{}\">t{}</translation>", i, i));
        }
        s.push_str("</seg>");
        s
    }

    #[test]
    fn test_valid_segment() {
        assert!(validate_segment_xml(&seg(5)).is_ok());
    }

    #[test]
    fn test_segment_wrong_translation_count() {
        let err = validate_segment_xml(&seg(4)).unwrap_err();
        assert!(err.message().contains("<translation>"));
        assert!(validate_segment_xml(&seg(6)).is_err());
    }

    #[test]
    fn test_segment_illegal_tag() {
        let err = validate_segment_xml("<item><source>x</source></item>").unwrap_err();
        assert_eq!(err.message(), "illegal tag: item");
    }

    #[test]
    fn test_segment_empty_source() {
        let xml = seg(5).replace("<source>Hallo</source>", "<source></source>");
        let err = validate_segment_xml(&xml).unwrap_err();
        assert_eq!(err.message(), "missing required <source> text value");
    }

    #[test]
    fn test_segment_reference_optional_but_needs_text() {
        let without = seg(5).replace("<reference>Hello</reference>", "");
        assert!(validate_segment_xml(&without).is_ok());

        let empty = seg(5).replace("<reference>Hello</reference>", "<reference/>");
        assert!(validate_segment_xml(&empty).is_err());
    }

    #[test]
    fn test_segment_empty_translation() {
        let xml = seg(5).replace("<translation system=\"s2\">t2</translation>", "<translation system=\"s2\"/>");
        assert!(validate_segment_xml(&xml).is_err());
    }

    #[test]
    fn test_malformed_xml_is_schema_error() {
        assert!(validate_batch("<hits><hit>").is_err());
        assert!(validate_task("not xml at all").is_err());
    }

    #[test]
    fn test_attributes_keep_document_order() {
        let doc = parse(r#"<seg z="1" a="2" m="3"/>"#).unwrap();
        let attrs = attributes(doc.root_element());
        let keys: Vec<&str> = attrs.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_render_attributes_escapes_values() {
        let mut attrs = Attributes::new();
        attrs.insert("id".to_string(), "1".to_string());
        attrs.insert("note".to_string(), "a \"b\" & <c>".to_string());
        assert_eq!(
            render_attributes(&attrs),
            r#"id="1" note="a &quot;b&quot; &amp; &lt;c&gt;""#
        );
    }

    #[test]
    fn test_open_tag_skips_empty_chunks() {
        assert_eq!(open_tag("seg", &["", "user=\"a\""]), "<seg user=\"a\">");
    }

    #[test]
    fn test_attributes_keep_prefixes() {
        let doc = parse(r#"<seg id="1" lang="en" xml:lang="de"/>"#).unwrap();
        let attrs = attributes(doc.root_element());
        assert_eq!(render_attributes(&attrs), r#"id="1" lang="en" xml:lang="de""#);
    }

    #[test]
    fn test_attributes_carry_namespace_declarations() {
        let doc = parse(r#"<hits xmlns:m="urn:meta"><hit m:src="a" n="1"/><hit n="2"/></hits>"#).unwrap();
        let mut hits = element_children(doc.root_element());

        let used = attributes(hits.next().unwrap());
        assert_eq!(render_attributes(&used), r#"xmlns:m="urn:meta" m:src="a" n="1""#);
        let unused = attributes(hits.next().unwrap());
        assert_eq!(render_attributes(&unused), r#"n="2""#);
    }

    #[test]
    fn test_standalone_element() {
        let text = r#"<hits xmlns:m="urn:meta"><hit n="1"><seg m:o="a"/></hit><hit xmlns:m="urn:meta" n="2"/></hits>"#;
        let doc = parse(text).unwrap();
        let mut hits = element_children(doc.root_element());

        let first = hits.next().unwrap();
        let cut = standalone_element(text, first);
        assert_eq!(cut, r#"<hit xmlns:m="urn:meta" n="1"><seg m:o="a"/></hit>"#);
        assert!(parse(&cut).is_ok());

        let seg = element_children(first).next().unwrap();
        assert_eq!(standalone_element(text, seg), r#"<seg xmlns:m="urn:meta" m:o="a"/>"#);

        // already declared on the element itself
        let second = hits.next().unwrap();
        assert_eq!(standalone_element(text, second), r#"<hit xmlns:m="urn:meta" n="2"/>"#);

        assert_eq!(standalone_element(text, doc.root_element()), text);
    }
}
