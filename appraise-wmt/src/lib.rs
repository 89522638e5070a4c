//! appraise-wmt library - WMT HIT annotation pipeline
//!
//! Validates HIT XML, decodes judges' raw results per task type, exports
//! results as XML, CSV and APF, and computes inter-annotator agreement and
//! completion status. Storage is reached through [`store::HitStore`] and
//! [`store::BlobStore`].

pub mod agreement;
pub mod codec;
pub mod error;
pub mod export;
pub mod hit;
pub mod judgment;
pub mod segment;
pub mod service;
pub mod status;
pub mod store;
pub mod task_type;
pub mod xml;

pub use error::{DecodeError, DegenerateInputError, Error, Result, SchemaError};
pub use hit::{Hit, HitSnapshot};
pub use judgment::{Judgment, NewResult, ResultRecord, SKIP_SENTINEL};
pub use segment::{Segment, SegmentRecord};
pub use service::HitService;
pub use task_type::TaskType;

#[cfg(test)]
pub(crate) mod test_support {
    use crate::judgment::ResultRecord;

    pub const SYSTEMS: [&str; 5] = ["sys-a", "sys-b", "sys-c", "sys-d", "sys-e"];

    /// A valid `<seg>` with `id="n"`, one reference and five translations
    pub fn segment_xml(n: usize) -> String {
        let mut xml = format!(
            "<seg id=\"{n}\" doc-id=\"doc-1\">\n  <source>Quelle {n}</source>\n  <reference>Reference {n}</reference>\n"
        );
        for system in SYSTEMS {
            xml.push_str(&format!(
                "  <translation system=\"{system}\">Translation {n} by {system}</translation>\n"
            ));
        }
        xml.push_str("</seg>");
        xml
    }

    /// A valid task-form document with three segments
    pub fn hit_xml(block_id: i64) -> String {
        let mut xml = format!(
            "<hit block-id=\"{block_id}\" source-language=\"eng\" target-language=\"deu\" systems=\"{}\">\n",
            SYSTEMS.join(",")
        );
        for n in 1..=3 {
            xml.push_str(&segment_xml(n));
            xml.push('\n');
        }
        xml.push_str("</hit>");
        xml
    }

    /// A valid batch with `hits` HITs numbered from block 1
    pub fn batch_xml(hits: i64) -> String {
        let mut xml = String::from("<hits>\n");
        for block_id in 1..=hits {
            xml.push_str(&hit_xml(block_id));
            xml.push('\n');
        }
        xml.push_str("</hits>");
        xml
    }

    pub fn result_record(segment_id: i64, user: &str, raw_result: &str) -> ResultRecord {
        ResultRecord {
            id: segment_id,
            segment_id,
            hit_id: "ab12cd34".to_string(),
            user: user.to_string(),
            duration: None,
            raw_result: raw_result.to_string(),
            created_at: appraise_common::time::now(),
        }
    }
}
