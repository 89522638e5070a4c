//! Segment codec: `<seg>` element to structured segment

use crate::error::SchemaError;
use crate::xml::{self, Attributes};
use roxmltree::Node;
use serde::Serialize;

/// Text content of an element together with its attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextElement {
    pub text: String,
    pub attributes: Attributes,
}

impl TextElement {
    fn from_node(node: Node) -> Option<Self> {
        node.text().map(|text| TextElement {
            text: text.to_string(),
            attributes: xml::attributes(node),
        })
    }
}

/// One source sentence with optional reference and 5 candidate translations
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub attributes: Attributes,
    pub source: TextElement,
    pub reference: Option<TextElement>,
    /// Document order; exports refer to translations by index
    pub translations: Vec<TextElement>,
}

impl Segment {
    /// Decode a `<seg>` element, validating it first
    pub fn from_node(node: Node) -> Result<Self, SchemaError> {
        xml::validate_segment(node)?;

        let child = |name: &str| xml::element_children(node).find(|n| n.tag_name().name() == name);

        let source = child("source")
            .and_then(TextElement::from_node)
            .ok_or_else(|| SchemaError::new("missing required <source> text value"))?;
        let reference = child("reference").and_then(TextElement::from_node);
        let translations = xml::element_children(node)
            .filter(|n| n.tag_name().name() == "translation")
            .filter_map(TextElement::from_node)
            .collect();

        Ok(Segment {
            attributes: xml::attributes(node),
            source,
            reference,
            translations,
        })
    }

    /// Parse and decode a `<seg>` given as XML text
    pub fn from_xml(text: &str) -> Result<Self, SchemaError> {
        let doc = xml::parse(text)?;
        Self::from_node(doc.root_element())
    }

    /// Look up a segment attribute
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

/// A persisted segment owned by a HIT
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentRecord {
    /// Store-assigned id; 0 until the owning HIT is inserted
    pub id: i64,
    pub hit_id: String,
    /// The `<seg>` element's source text, decoded again on every load
    pub item_xml: String,
    #[serde(flatten)]
    pub segment: Segment,
}

impl SegmentRecord {
    pub fn from_item_xml(
        id: i64,
        hit_id: impl Into<String>,
        item_xml: impl Into<String>,
    ) -> Result<Self, SchemaError> {
        let item_xml = item_xml.into();
        let segment = Segment::from_xml(&item_xml)?;
        Ok(Self {
            id,
            hit_id: hit_id.into(),
            item_xml,
            segment,
        })
    }
}
