//! HIT model: creation from XML and derived-field reload

use crate::error::SchemaError;
use crate::judgment::ResultRecord;
use crate::segment::SegmentRecord;
use crate::task_type::TaskType;
use crate::xml::{self, Attributes, DocumentForm};
use appraise_common::LanguagePair;
use roxmltree::Node;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::warn;

/// A human-annotation task bundling 3 segments
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hit {
    /// 8 hex characters
    pub id: String,
    pub block_id: i64,
    pub language_pair: LanguagePair,
    pub task_type: TaskType,
    /// The validated XML document retained for this HIT
    pub hit_xml: String,
    /// Key of the external XML blob this HIT was read from
    pub source_file: Option<String>,
    pub users: BTreeSet<String>,
    pub active: bool,
    pub segments: Vec<SegmentRecord>,
    /// Derived from `hit_xml`, never persisted
    #[serde(skip)]
    attributes: Attributes,
}

impl Hit {
    /// Create a HIT shell without segments; attributes are derived immediately
    pub fn new(
        id: impl Into<String>,
        block_id: i64,
        language_pair: LanguagePair,
        task_type: TaskType,
        hit_xml: impl Into<String>,
    ) -> Self {
        let mut hit = Self {
            id: id.into(),
            block_id,
            language_pair,
            task_type,
            hit_xml: hit_xml.into(),
            source_file: None,
            users: BTreeSet::new(),
            active: true,
            segments: Vec::new(),
            attributes: Attributes::new(),
        };
        hit.reload_dynamic_fields();
        hit
    }

    /// Validate `text` (batch or task form) and build an unsaved HIT with its 3 segments.
    ///
    /// A batch document must contain exactly one `<hit>`; use [`split_batch`]
    /// for batches holding several.
    pub fn from_xml(
        id: impl Into<String>,
        text: &str,
        block_id: i64,
        language_pair: LanguagePair,
        task_type: TaskType,
    ) -> Result<Self, SchemaError> {
        let id = id.into();
        let doc = xml::parse(text)?;
        let root = doc.root_element();

        let hit_node = match xml::form_of(root) {
            DocumentForm::Batch => {
                xml::validate_batch_node(root)?;
                single_hit(root)?
            }
            DocumentForm::Task => {
                if root.tag_name().name() != "hit" {
                    return Err(SchemaError::new("expected <hit> on top-level"));
                }
                xml::validate_hit_node(root)?;
                root
            }
        };

        let segments = xml::element_children(hit_node)
            .map(|seg| SegmentRecord::from_item_xml(0, id.clone(), xml::standalone_element(text, seg)))
            .collect::<Result<Vec<_>, _>>()?;

        let mut hit = Self::new(id, block_id, language_pair, task_type, text);
        hit.segments = segments;
        Ok(hit)
    }

    /// The `<hit>` element's attributes as of the last reload
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Recompute derived fields from `hit_xml`.
    ///
    /// If the document no longer parses, the attributes carry a `note` with the
    /// parse error (and `filename` when the source file is known).
    pub fn reload_dynamic_fields(&mut self) {
        self.attributes = match xml::parse(&self.hit_xml) {
            Ok(doc) => {
                let root = doc.root_element();
                let hit_node = match xml::form_of(root) {
                    DocumentForm::Batch => xml::element_children(root).next(),
                    DocumentForm::Task => Some(root),
                };
                hit_node.map(xml::attributes).unwrap_or_default()
            }
            Err(e) => {
                warn!("Cannot reload attributes for HIT {}: {}", self.id, e);
                let mut attributes = Attributes::new();
                if let Some(file) = &self.source_file {
                    attributes.insert("filename".to_string(), file.clone());
                }
                attributes.insert("note".to_string(), e.message().to_string());
                attributes
            }
        };
    }

    pub fn has_user(&self, user: &str) -> bool {
        self.users.contains(user)
    }

    pub fn segment(&self, segment_id: i64) -> Option<&SegmentRecord> {
        self.segments.iter().find(|s| s.id == segment_id)
    }
}

fn single_hit<'a, 'input>(root: Node<'a, 'input>) -> Result<Node<'a, 'input>, SchemaError> {
    let mut hits = xml::element_children(root);
    match (hits.next(), hits.next()) {
        (Some(hit), None) => Ok(hit),
        _ => Err(SchemaError::new("expected exactly one <hit> in batch")),
    }
}

/// One `<hit>` cut out of a batch document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEntry {
    /// Source text of the `<hit>` element, a valid task-form document
    pub xml: String,
    pub attributes: Attributes,
}

impl BatchEntry {
    /// The `block-id` attribute as an integer
    pub fn block_id(&self) -> Option<i64> {
        self.attributes.get("block-id")?.trim().parse().ok()
    }
}

/// Validate a batch document and split it into its `<hit>` elements
pub fn split_batch(text: &str) -> Result<Vec<BatchEntry>, SchemaError> {
    let doc = xml::parse(text)?;
    let root = doc.root_element();
    xml::validate_batch_node(root)?;

    Ok(xml::element_children(root)
        .map(|hit| BatchEntry {
            xml: xml::standalone_element(text, hit),
            attributes: xml::attributes(hit),
        })
        .collect())
}

/// A HIT together with every result submitted for it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HitSnapshot {
    pub hit: Hit,
    pub results: Vec<ResultRecord>,
}

impl HitSnapshot {
    pub fn new(hit: Hit, results: Vec<ResultRecord>) -> Self {
        Self { hit, results }
    }

    pub fn results_for_user<'a>(&'a self, user: &'a str) -> impl Iterator<Item = &'a ResultRecord> + 'a {
        self.results.iter().filter(move |r| r.user == user)
    }

    /// Results paired with the segment they belong to, in result order
    pub fn results_with_segments(&self) -> impl Iterator<Item = (&SegmentRecord, &ResultRecord)> + '_ {
        self.results
            .iter()
            .filter_map(move |r| self.hit.segment(r.segment_id).map(|s| (s, r)))
    }
}
