//! XML, CSV and APF exports
//!
//! Exports run over snapshots and never fail as a whole: a result whose raw
//! value cannot be decoded is logged at debug level and left out.

use crate::agreement::ranking_annotations;
use crate::codec::encode_result;
use crate::error::DecodeError;
use crate::hit::{Hit, HitSnapshot};
use crate::judgment::{DecodedValue, Judgment, ResultRecord};
use crate::segment::{Segment, SegmentRecord};
use crate::task_type::TaskType;
use crate::xml::{self, open_tag};
use tracing::debug;

pub const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>";

pub const RESULTS_CSV_HEADER: &str = "srclang,trglang,srcIndex,documentId,segmentId,judgeId,\
system1Number,system1Id,system2Number,system2Id,system3Number,system3Id,\
system4Number,system4Id,system5Number,system5Id,\
system1rank,system2rank,system3rank,system4rank,system5rank";

pub const TASK_IDS_CSV_HEADER: &str = "appraise_id,srclang,trglang";

/// Placeholder for an absent CSV field
const MISSING_FIELD: &str = "-1";

/// One result as an XML fragment
pub fn export_result_xml(
    task_type: TaskType,
    segment: &Segment,
    result: &ResultRecord,
) -> Result<String, DecodeError> {
    encode_result(task_type, segment, result).map(|fragment| fragment.to_xml())
}

fn indent(text: &str, prefix: &str) -> String {
    text.lines()
        .map(|line| format!("{}{}", prefix, line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Results grouped by segment, in segment order
fn results_by_segment(snapshot: &HitSnapshot) -> impl Iterator<Item = (&SegmentRecord, &ResultRecord)> + '_ {
    snapshot.hit.segments.iter().flat_map(move |segment| {
        snapshot
            .results
            .iter()
            .filter(move |r| r.segment_id == segment.id)
            .map(move |r| (segment, r))
    })
}

/// A HIT and every exportable result fragment
pub fn export_hit_xml(snapshot: &HitSnapshot) -> String {
    let hit = &snapshot.hit;
    let id = format!("id=\"{}\"", xml::escape_attribute(&hit.id));
    let task_type = format!("task-type=\"{}\"", hit.task_type.slug());
    let attributes = xml::render_attributes(hit.attributes());

    let mut out = open_tag("hit", &[&id, &task_type, &attributes]);
    out.push('\n');
    for (segment, result) in results_by_segment(snapshot) {
        match export_result_xml(hit.task_type, &segment.segment, result) {
            Ok(fragment) => {
                out.push_str(&indent(&fragment, "  "));
                out.push('\n');
            }
            Err(e) => debug!("Skipping result {} of HIT {} in XML export: {}", result.id, hit.id, e),
        }
    }
    out.push_str("</hit>");
    out
}

/// A complete `<hits>` document
pub fn export_hits_xml<'a, I>(snapshots: I) -> String
where
    I: IntoIterator<Item = &'a HitSnapshot>,
{
    let mut out = format!("{}\n<hits>\n", XML_DECLARATION);
    for snapshot in snapshots {
        out.push_str(&indent(&export_hit_xml(snapshot), "  "));
        out.push('\n');
    }
    out.push_str("</hits>\n");
    out
}

/// CSV row of one ranking result; `None` for skipped or undecodable results.
///
/// Fields are neither quoted nor escaped.
pub fn export_result_csv_row(hit: &Hit, segment: &SegmentRecord, result: &ResultRecord) -> Option<String> {
    let ranks = match result.judgment(TaskType::Ranking) {
        Judgment::Value(DecodedValue::Ranking(ranks)) => ranks,
        Judgment::Value(_) => return None,
        Judgment::Skipped => {
            debug!("Skipped result {} has no CSV row", result.id);
            return None;
        }
        Judgment::Failed(e) => {
            debug!("Cannot decode result {} for CSV export: {}", result.id, e);
            return None;
        }
    };

    let seg = &segment.segment;
    let segment_id = seg.attribute("id").unwrap_or(MISSING_FIELD);
    let src_index = seg
        .source
        .attributes
        .get("id")
        .map(String::as_str)
        .unwrap_or(segment_id);

    let mut fields: Vec<String> = vec![
        hit.language_pair.source().name().to_string(),
        hit.language_pair.target().name().to_string(),
        src_index.to_string(),
        seg.attribute("doc-id").unwrap_or(MISSING_FIELD).to_string(),
        segment_id.to_string(),
        result.user.clone(),
    ];
    for (index, translation) in seg.translations.iter().enumerate() {
        fields.push(index.to_string());
        fields.push(
            translation
                .attributes
                .get("system")
                .cloned()
                .unwrap_or_else(|| MISSING_FIELD.to_string()),
        );
    }
    fields.extend(ranks.iter().map(i64::to_string));

    Some(fields.join(","))
}

/// CSV rows of every ranking result of one HIT; other task types have none
pub fn export_task_csv(snapshot: &HitSnapshot) -> Vec<String> {
    if snapshot.hit.task_type != TaskType::Ranking {
        return Vec::new();
    }
    snapshot
        .results_with_segments()
        .filter_map(|(segment, result)| export_result_csv_row(&snapshot.hit, segment, result))
        .collect()
}

/// Header plus one row per ranking result, joined by newlines
pub fn export_results_csv<'a, I>(snapshots: I) -> String
where
    I: IntoIterator<Item = &'a HitSnapshot>,
{
    std::iter::once(RESULTS_CSV_HEADER.to_string())
        .chain(snapshots.into_iter().flat_map(export_task_csv))
        .collect::<Vec<_>>()
        .join("\n")
}

/// `appraise_id,srclang,trglang` header plus one row per HIT, no trailing newline
pub fn export_task_ids_csv<'a, I>(hits: I) -> String
where
    I: IntoIterator<Item = &'a Hit>,
{
    let mut lines = vec![TASK_IDS_CSV_HEADER.to_string()];
    for hit in hits {
        lines.push(format!(
            "{},{},{}",
            hit.id,
            hit.attribute("source-language").unwrap_or_default(),
            hit.attribute("target-language").unwrap_or_default()
        ));
    }
    lines.join("\n")
}

/// Ranking triples of one HIT as Artstein & Poesio (2007) lines
pub fn export_apf(snapshot: &HitSnapshot) -> String {
    ranking_annotations(snapshot)
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// APF export of several HITs; HITs without triples are left out
pub fn export_hits_apf<'a, I>(snapshots: I) -> String
where
    I: IntoIterator<Item = &'a HitSnapshot>,
{
    snapshots
        .into_iter()
        .map(export_apf)
        .filter(|apf| !apf.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
