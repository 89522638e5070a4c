//! Grammars of the raw result strings

use crate::error::DecodeError;
use crate::judgment::{ErrorAnnotation, PostEdit, WordError};
use crate::xml::TRANSLATIONS_PER_SEGMENT;

/// First post-editing field when the judge rewrote the sentence from scratch
pub const FROM_SCRATCH: &str = "FROM_SCRATCH";

pub const MISSING_WORDS: &str = "MISSING_WORDS";

pub const TOO_MANY_ERRORS: &str = "TOO_MANY_ERRORS";

fn parse_int<T: std::str::FromStr>(field: &str) -> Result<T, DecodeError> {
    field
        .trim()
        .parse()
        .map_err(|_| DecodeError::InvalidInteger(field.to_string()))
}

/// `3,1,2,5,4` → one rank per translation, in translation order
pub fn decode_ranking(raw: &str) -> Result<Vec<i64>, DecodeError> {
    let ranks = raw.split(',').map(parse_int::<i64>).collect::<Result<Vec<i64>, _>>()?;
    if ranks.len() != TRANSLATIONS_PER_SEGMENT {
        return Err(DecodeError::RankCount {
            expected: TRANSLATIONS_PER_SEGMENT,
            found: ranks.len(),
        });
    }
    Ok(ranks)
}

/// `FROM_SCRATCH\n<index>\n<text>` or `<index>\n<text>`.
///
/// The edited text is everything after the index line.
pub fn decode_post_edit(raw: &str) -> Result<PostEdit, DecodeError> {
    let (from_scratch, rest) = match raw.split_once('\n') {
        Some((first, rest)) if first.trim_end_matches('\r') == FROM_SCRATCH => (true, rest),
        _ => (false, raw),
    };

    let (index, text) = rest
        .split_once('\n')
        .ok_or(DecodeError::MissingField("edited text"))?;
    let translation_index: usize = parse_int(index)?;
    if translation_index >= TRANSLATIONS_PER_SEGMENT {
        return Err(DecodeError::IndexOutOfRange(translation_index));
    }

    Ok(PostEdit {
        from_scratch,
        translation_index,
        text: text.to_string(),
    })
}

/// One entry per line: `<word_id>=<class>:<severity>[,<class>:<severity>...]`,
/// `MISSING_WORDS` or `TOO_MANY_ERRORS`. Blank lines are ignored.
pub fn decode_error_classification(raw: &str) -> Result<ErrorAnnotation, DecodeError> {
    let mut annotation = ErrorAnnotation::default();

    for line in raw.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match line.split_once('=') {
            Some((word_id, details)) => {
                let word_id: i64 = parse_int(word_id)?;
                for detail in details.split(',') {
                    let (class, severity) = detail
                        .split_once(':')
                        .filter(|(_, severity)| !severity.contains(&[':', '='][..]))
                        .ok_or_else(|| DecodeError::MalformedAnnotation(line.to_string()))?;
                    annotation.errors.push(WordError {
                        word_id,
                        class: class.trim().to_string(),
                        severity: severity.trim().to_string(),
                    });
                }
            }
            None if line == MISSING_WORDS => annotation.missing_words = true,
            None if line == TOO_MANY_ERRORS => annotation.too_many_errors = true,
            None => return Err(DecodeError::UnknownMarker(line.to_string())),
        }
    }

    // sort_by_key is stable: equal word ids keep submission order
    annotation.errors.sort_by_key(|e| e.word_id);
    Ok(annotation)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word_error(word_id: i64, class: &str, severity: &str) -> WordError {
        WordError {
            word_id,
            class: class.to_string(),
            severity: severity.to_string(),
        }
    }

    #[test]
    fn test_decode_ranking() {
        assert_eq!(decode_ranking("3,1,2,5,4"), Ok(vec![3, 1, 2, 5, 4]));
        assert_eq!(decode_ranking(" 1, 1,2 ,2,-1"), Ok(vec![1, 1, 2, 2, -1]));
    }

    #[test]
    fn test_decode_ranking_failures() {
        assert_eq!(
            decode_ranking("3,1,2"),
            Err(DecodeError::RankCount { expected: 5, found: 3 })
        );
        assert_eq!(
            decode_ranking("3,1,two,5,4"),
            Err(DecodeError::InvalidInteger("two".to_string()))
        );
        assert!(decode_ranking("").is_err());
    }

    #[test]
    fn test_decode_post_edit_plain() {
        let edit = decode_post_edit("1\nThe edited sentence.").unwrap();
        assert!(!edit.from_scratch);
        assert_eq!(edit.translation_index, 1);
        assert_eq!(edit.text, "The edited sentence.");
    }

    #[test]
    fn test_decode_post_edit_from_scratch() {
        let edit = decode_post_edit("FROM_SCRATCH\n4\nWritten anew.").unwrap();
        assert!(edit.from_scratch);
        assert_eq!(edit.translation_index, 4);
        assert_eq!(edit.text, "Written anew.");
    }

    #[test]
    fn test_decode_post_edit_keeps_multiline_text() {
        let edit = decode_post_edit("0\nline one\nline two").unwrap();
        assert_eq!(edit.text, "line one\nline two");
    }

    #[test]
    fn test_decode_post_edit_failures() {
        assert_eq!(decode_post_edit("2"), Err(DecodeError::MissingField("edited text")));
        assert_eq!(decode_post_edit("FROM_SCRATCH\n3"), Err(DecodeError::MissingField("edited text")));
        assert_eq!(decode_post_edit("5\ntext"), Err(DecodeError::IndexOutOfRange(5)));
        assert!(matches!(decode_post_edit("x\ntext"), Err(DecodeError::InvalidInteger(_))));
    }

    #[test]
    fn test_decode_error_classification() {
        let annotation = decode_error_classification("2=POS:CRITICAL,AGR:MINOR\nMISSING_WORDS").unwrap();
        assert_eq!(
            annotation.errors,
            vec![word_error(2, "POS", "CRITICAL"), word_error(2, "AGR", "MINOR")]
        );
        assert!(annotation.missing_words);
        assert!(!annotation.too_many_errors);
    }

    #[test]
    fn test_error_classification_sorted_by_word_id_stable() {
        let annotation =
            decode_error_classification("7=LEX:MINOR\n3=POS:CRITICAL,AGR:MINOR\n3=ORD:MINOR\nTOO_MANY_ERRORS\n")
                .unwrap();
        let order: Vec<(i64, &str)> = annotation
            .errors
            .iter()
            .map(|e| (e.word_id, e.class.as_str()))
            .collect();
        assert_eq!(order, vec![(3, "POS"), (3, "AGR"), (3, "ORD"), (7, "LEX")]);
        assert!(annotation.too_many_errors);
    }

    #[test]
    fn test_error_classification_failures() {
        assert!(matches!(
            decode_error_classification("x=POS:MINOR"),
            Err(DecodeError::InvalidInteger(_))
        ));
        assert!(matches!(
            decode_error_classification("2=POS"),
            Err(DecodeError::MalformedAnnotation(_))
        ));
        assert!(matches!(
            decode_error_classification("2=POS:MINOR:EXTRA"),
            Err(DecodeError::MalformedAnnotation(_))
        ));
        assert_eq!(
            decode_error_classification("SOMETHING_ELSE"),
            Err(DecodeError::UnknownMarker("SOMETHING_ELSE".to_string()))
        );
    }
}
