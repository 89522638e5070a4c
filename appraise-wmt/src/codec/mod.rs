//! Raw result codec
//!
//! Every task type owns one decode/encode pair. [`codec_for`] is the only
//! place that maps a [`TaskType`] to its pair, so adding a task type fails to
//! compile until it has a codec.

mod decode;
mod fragment;

pub use decode::{
    decode_error_classification, decode_post_edit, decode_ranking, FROM_SCRATCH, MISSING_WORDS,
    TOO_MANY_ERRORS,
};
pub use fragment::{FragmentPayload, RankedTranslation, ResultFragment};

use crate::error::DecodeError;
use crate::judgment::{DecodedValue, Judgment, ResultRecord, SKIP_SENTINEL};
use crate::segment::Segment;
use crate::task_type::TaskType;
use crate::xml::{self, Attributes};
use appraise_common::time::format_optional_duration;

type DecodeFn = fn(&str) -> Result<DecodedValue, DecodeError>;
type AttributesFn = fn(&Segment) -> String;
type PayloadFn = fn(&DecodedValue, &Segment) -> Result<FragmentPayload, DecodeError>;

/// Decode/encode functions for one task type
pub struct TaskCodec {
    pub task_type: TaskType,
    /// Raw result (never the skip sentinel) to structured value
    pub decode: DecodeFn,
    /// Rendered `<seg>` attributes for the result fragment
    pub attributes: AttributesFn,
    /// Task-specific part of the result fragment
    pub payload: PayloadFn,
}

static QUALITY_CHECKING: TaskCodec = TaskCodec {
    task_type: TaskType::QualityChecking,
    decode: decode_quality_checking,
    attributes: segment_attributes,
    payload: text_payload,
};

static RANKING: TaskCodec = TaskCodec {
    task_type: TaskType::Ranking,
    decode: decode_ranking_value,
    attributes: segment_attributes,
    payload: ranking_payload,
};

static POST_EDITING: TaskCodec = TaskCodec {
    task_type: TaskType::PostEditing,
    decode: decode_post_edit_value,
    attributes: segment_attributes,
    payload: post_edit_payload,
};

static ERROR_CLASSIFICATION: TaskCodec = TaskCodec {
    task_type: TaskType::ErrorClassification,
    decode: decode_error_classification_value,
    attributes: error_classification_attributes,
    payload: error_payload,
};

static THREE_WAY_RANKING: TaskCodec = TaskCodec {
    task_type: TaskType::ThreeWayRanking,
    decode: decode_three_way_ranking,
    attributes: segment_attributes,
    payload: text_payload,
};

/// The dispatch table
pub fn codec_for(task_type: TaskType) -> &'static TaskCodec {
    match task_type {
        TaskType::QualityChecking => &QUALITY_CHECKING,
        TaskType::Ranking => &RANKING,
        TaskType::PostEditing => &POST_EDITING,
        TaskType::ErrorClassification => &ERROR_CLASSIFICATION,
        TaskType::ThreeWayRanking => &THREE_WAY_RANKING,
    }
}

/// Decode a raw result; `Ok(None)` means the judge skipped the item
pub fn decode_result(task_type: TaskType, raw_result: &str) -> Result<Option<DecodedValue>, DecodeError> {
    if raw_result == SKIP_SENTINEL {
        return Ok(None);
    }
    (codec_for(task_type).decode)(raw_result).map(Some)
}

/// Build the XML result fragment for one stored result.
///
/// Fails with the decode error when the raw result cannot be decoded.
pub fn encode_result(
    task_type: TaskType,
    segment: &Segment,
    result: &ResultRecord,
) -> Result<ResultFragment, DecodeError> {
    let codec = codec_for(task_type);
    let payload = match result.judgment(task_type) {
        Judgment::Value(value) => Some((codec.payload)(&value, segment)?),
        Judgment::Skipped => None,
        Judgment::Failed(e) => return Err(e),
    };

    Ok(ResultFragment {
        task_type,
        attributes: (codec.attributes)(segment),
        user: result.user.clone(),
        duration: format_optional_duration(result.duration),
        skipped: payload.is_none(),
        payload,
    })
}

fn decode_quality_checking(raw: &str) -> Result<DecodedValue, DecodeError> {
    Ok(DecodedValue::QualityChecking(raw.to_string()))
}

fn decode_ranking_value(raw: &str) -> Result<DecodedValue, DecodeError> {
    decode_ranking(raw).map(DecodedValue::Ranking)
}

fn decode_post_edit_value(raw: &str) -> Result<DecodedValue, DecodeError> {
    decode_post_edit(raw).map(DecodedValue::PostEditing)
}

fn decode_error_classification_value(raw: &str) -> Result<DecodedValue, DecodeError> {
    decode_error_classification(raw).map(DecodedValue::ErrorClassification)
}

fn decode_three_way_ranking(raw: &str) -> Result<DecodedValue, DecodeError> {
    Ok(DecodedValue::ThreeWayRanking(raw.to_string()))
}

fn segment_attributes(segment: &Segment) -> String {
    xml::render_attributes(&segment.attributes)
}

/// Segment attributes followed by the first translation's attributes.
/// Keys already present on the segment are not repeated.
fn error_classification_attributes(segment: &Segment) -> String {
    let mut merged: Attributes = segment.attributes.clone();
    if let Some(first) = segment.translations.first() {
        for (key, value) in &first.attributes {
            merged.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }
    xml::render_attributes(&merged)
}

fn mismatch(expected: TaskType) -> DecodeError {
    DecodeError::TaskTypeMismatch(expected.label())
}

fn text_payload(value: &DecodedValue, _segment: &Segment) -> Result<FragmentPayload, DecodeError> {
    match value {
        DecodedValue::QualityChecking(text) | DecodedValue::ThreeWayRanking(text) => {
            Ok(FragmentPayload::Text(text.clone()))
        }
        _ => Err(mismatch(TaskType::QualityChecking)),
    }
}

fn ranking_payload(value: &DecodedValue, segment: &Segment) -> Result<FragmentPayload, DecodeError> {
    let DecodedValue::Ranking(ranks) = value else {
        return Err(mismatch(TaskType::Ranking));
    };
    if ranks.len() != segment.translations.len() {
        return Err(DecodeError::RankCount {
            expected: segment.translations.len(),
            found: ranks.len(),
        });
    }

    Ok(FragmentPayload::Ranks(
        segment
            .translations
            .iter()
            .zip(ranks)
            .map(|(translation, rank)| RankedTranslation {
                attributes: xml::render_attributes(&translation.attributes),
                rank: *rank,
            })
            .collect(),
    ))
}

fn post_edit_payload(value: &DecodedValue, segment: &Segment) -> Result<FragmentPayload, DecodeError> {
    let DecodedValue::PostEditing(edit) = value else {
        return Err(mismatch(TaskType::PostEditing));
    };
    let translation = segment
        .translations
        .get(edit.translation_index)
        .ok_or(DecodeError::IndexOutOfRange(edit.translation_index))?;

    Ok(FragmentPayload::PostEdit {
        edit_id: edit.translation_index,
        from_scratch: edit.from_scratch,
        translation_attributes: xml::render_attributes(&translation.attributes),
        text: edit.text.clone(),
    })
}

fn error_payload(value: &DecodedValue, _segment: &Segment) -> Result<FragmentPayload, DecodeError> {
    match value {
        DecodedValue::ErrorClassification(annotation) => Ok(FragmentPayload::Errors(annotation.clone())),
        _ => Err(mismatch(TaskType::ErrorClassification)),
    }
}
