//! XML result fragments

use crate::judgment::ErrorAnnotation;
use crate::task_type::TaskType;
use crate::xml::{escape_attribute, escape_text, open_tag};
use serde::Serialize;
use std::fmt;

/// One translation's rendered attributes and the rank it received
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedTranslation {
    pub attributes: String,
    pub rank: i64,
}

/// Task-specific part of a result fragment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FragmentPayload {
    /// Quality checking and 3-way ranking
    Text(String),
    Ranks(Vec<RankedTranslation>),
    PostEdit {
        edit_id: usize,
        from_scratch: bool,
        translation_attributes: String,
        text: String,
    },
    Errors(ErrorAnnotation),
}

/// A result ready to be rendered as a `<seg>` element
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultFragment {
    pub task_type: TaskType,
    /// Rendered `key="value"` pairs
    pub attributes: String,
    pub user: String,
    pub duration: String,
    pub skipped: bool,
    /// `None` for skipped results
    pub payload: Option<FragmentPayload>,
}

impl ResultFragment {
    pub fn to_xml(&self) -> String {
        let user = format!("user=\"{}\"", escape_attribute(&self.user));
        let duration = format!("duration=\"{}\"", escape_attribute(&self.duration));
        let mut out = open_tag("seg", &[&self.attributes, &user, &duration]);
        out.push('\n');

        match &self.payload {
            None => out.push_str("  <skipped />\n"),
            Some(payload) => render_payload(payload, &mut out),
        }

        out.push_str("</seg>");
        out
    }
}

impl fmt::Display for ResultFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_xml())
    }
}

fn empty_element(name: &str, chunks: &[&str]) -> String {
    let mut tag = open_tag(name, chunks);
    tag.pop();
    tag.push_str(" />");
    tag
}

fn render_payload(payload: &FragmentPayload, out: &mut String) {
    match payload {
        FragmentPayload::Text(text) => {
            out.push_str(&format!("  <result>{}</result>\n", escape_text(text)));
        }
        FragmentPayload::Ranks(ranks) => {
            for ranked in ranks {
                let rank = format!("rank=\"{}\"", ranked.rank);
                out.push_str("  ");
                out.push_str(&empty_element("translation", &[&ranked.attributes, &rank]));
                out.push('\n');
            }
        }
        FragmentPayload::PostEdit {
            edit_id,
            from_scratch,
            translation_attributes,
            text,
        } => {
            let id = format!("id=\"{}\"", edit_id);
            let scratch = format!("from-scratch=\"{}\"", from_scratch);
            out.push_str("  ");
            out.push_str(&open_tag("post-edit", &[&id, &scratch, translation_attributes]));
            out.push_str(&escape_text(text));
            out.push_str("</post-edit>\n");
        }
        FragmentPayload::Errors(annotation) => {
            for error in &annotation.errors {
                let word = format!("word-id=\"{}\"", error.word_id);
                let class = format!("type=\"{}\"", escape_attribute(&error.class));
                let severity = format!("severity=\"{}\"", escape_attribute(&error.severity));
                out.push_str("  ");
                out.push_str(&empty_element("error", &[&word, &class, &severity]));
                out.push('\n');
            }
            if annotation.missing_words {
                out.push_str("  <missing-words />\n");
            }
            if annotation.too_many_errors {
                out.push_str("  <too-many-errors />\n");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judgment::WordError;

    fn fragment(payload: Option<FragmentPayload>) -> ResultFragment {
        ResultFragment {
            task_type: TaskType::Ranking,
            attributes: "id=\"1\" doc-id=\"d\"".to_string(),
            user: "alice".to_string(),
            duration: "00:00:42".to_string(),
            skipped: payload.is_none(),
            payload,
        }
    }

    #[test]
    fn test_render_skipped() {
        assert_eq!(
            fragment(None).to_xml(),
            "<seg id=\"1\" doc-id=\"d\" user=\"alice\" duration=\"00:00:42\">\n  <skipped />\n</seg>"
        );
    }

    #[test]
    fn test_render_ranks() {
        let xml = fragment(Some(FragmentPayload::Ranks(vec![
            RankedTranslation {
                attributes: "system=\"a\"".to_string(),
                rank: 2,
            },
            RankedTranslation {
                attributes: String::new(),
                rank: 1,
            },
        ])))
        .to_xml();
        assert!(xml.contains("  <translation system=\"a\" rank=\"2\" />\n"));
        assert!(xml.contains("  <translation rank=\"1\" />\n"));
    }

    #[test]
    fn test_render_text_is_escaped() {
        let xml = fragment(Some(FragmentPayload::Text("a < b & c".to_string()))).to_xml();
        assert!(xml.contains("<result>a &lt; b &amp; c</result>"));
    }

    #[test]
    fn test_render_post_edit() {
        let xml = fragment(Some(FragmentPayload::PostEdit {
            edit_id: 3,
            from_scratch: false,
            translation_attributes: "system=\"x\"".to_string(),
            text: "Edited".to_string(),
        }))
        .to_xml();
        assert!(xml.contains("<post-edit id=\"3\" from-scratch=\"false\" system=\"x\">Edited</post-edit>"));
    }

    #[test]
    fn test_render_errors() {
        let xml = fragment(Some(FragmentPayload::Errors(ErrorAnnotation {
            errors: vec![WordError {
                word_id: 2,
                class: "POS".to_string(),
                severity: "CRITICAL".to_string(),
            }],
            missing_words: true,
            too_many_errors: false,
        })))
        .to_xml();
        assert!(xml.contains("<error word-id=\"2\" type=\"POS\" severity=\"CRITICAL\" />"));
        assert!(xml.contains("<missing-words />"));
        assert!(!xml.contains("<too-many-errors />"));
    }
}
