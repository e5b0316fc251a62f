//! Replacement-node extraction from a parsed component output.
//!
//! Component output is parsed as a complete document, so the parser wraps it
//! in implicit `html`/`head`/`body` structure. The replacement node is taken
//! from the body of that wrapper.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::domain::arena::{Document, NodeData, NodeId};
use crate::domain::error::{DomainError, DomainResult};

/// How the replacement node is chosen from the parsed body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractionPolicy {
    /// First child of `<body>`, whatever its kind. Leading text in the
    /// component output is extracted instead of the intended element.
    #[default]
    FirstChild,
    /// Exactly one element in `<body>`; whitespace and comments around it
    /// are ignored, any other text is an error.
    SingleElement,
}

/// Locate the replacement node inside the document rooted at `root`.
///
/// Precondition: `root` holds a parsed document with an `html` element whose
/// `body` is non-empty. Violations are reported, never dereferenced.
pub fn extract_body_root(
    document: &Document,
    root: NodeId,
    policy: ExtractionPolicy,
) -> DomainResult<NodeId> {
    let html = find_element(document, document.children(root), "html")
        .ok_or(DomainError::MissingHtml)?;
    let body = document
        .children(html)
        .iter()
        .rev()
        .copied()
        .find(|&id| document.local_name(id) == Some("body"))
        .ok_or(DomainError::MissingBody)?;

    let extracted = match policy {
        ExtractionPolicy::FirstChild => document
            .children(body)
            .first()
            .copied()
            .ok_or(DomainError::EmptyBody)?,
        ExtractionPolicy::SingleElement => single_element(document, body)?,
    };
    trace!(?extracted, ?policy, "extracted replacement node");
    Ok(extracted)
}

fn find_element(document: &Document, candidates: &[NodeId], tag: &str) -> Option<NodeId> {
    candidates
        .iter()
        .copied()
        .find(|&id| document.local_name(id) == Some(tag))
}

fn single_element(document: &Document, body: NodeId) -> DomainResult<NodeId> {
    let mut elements = Vec::new();
    for &child in document.children(body) {
        match document.data(child) {
            Some(NodeData::Element { .. }) => elements.push(child),
            Some(NodeData::Text { contents }) if !contents.trim().is_empty() => {
                return Err(DomainError::StrayText(contents.trim().to_string()));
            }
            _ => {}
        }
    }
    match elements.as_slice() {
        [] => Err(DomainError::EmptyBody),
        [only] => Ok(*only),
        many => Err(DomainError::MultipleRoots(many.len())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::html::parse_str;
    use rstest::rstest;

    fn extract(html: &str, policy: ExtractionPolicy) -> (Document, DomainResult<NodeId>) {
        let document = parse_str(html);
        let result = extract_body_root(&document, document.root(), policy);
        (document, result)
    }

    #[rstest]
    #[case(ExtractionPolicy::FirstChild)]
    #[case(ExtractionPolicy::SingleElement)]
    fn given_single_root_element_when_extracting_then_returns_it(#[case] policy: ExtractionPolicy) {
        let (document, result) = extract("<div class=\"x\">hi</div>", policy);

        let id = result.unwrap();
        assert_eq!(document.local_name(id), Some("div"));
    }

    #[test]
    fn given_leading_text_when_first_child_then_text_node_extracted() {
        let (document, result) = extract("oops <div>hi</div>", ExtractionPolicy::FirstChild);

        let id = result.unwrap();
        assert!(matches!(document.data(id), Some(NodeData::Text { .. })));
    }

    #[test]
    fn given_leading_text_when_single_element_then_stray_text() {
        let (_, result) = extract("oops <div>hi</div>", ExtractionPolicy::SingleElement);

        assert_eq!(result, Err(DomainError::StrayText("oops".to_string())));
    }

    #[test]
    fn given_two_roots_when_single_element_then_multiple_roots() {
        let (_, result) = extract("<p>a</p>\n<p>b</p>\n", ExtractionPolicy::SingleElement);

        assert_eq!(result, Err(DomainError::MultipleRoots(2)));
    }

    #[rstest]
    #[case(ExtractionPolicy::FirstChild)]
    #[case(ExtractionPolicy::SingleElement)]
    fn given_empty_output_when_extracting_then_empty_body(#[case] policy: ExtractionPolicy) {
        let (_, result) = extract("", policy);

        assert_eq!(result, Err(DomainError::EmptyBody));
    }

    #[test]
    fn given_detached_root_without_html_when_extracting_then_missing_html() {
        let mut document = Document::new();
        let container = document.create_container();

        let result = extract_body_root(&document, container, ExtractionPolicy::FirstChild);

        assert_eq!(result, Err(DomainError::MissingHtml));
    }

    #[test]
    fn given_frameset_output_when_extracting_then_missing_body() {
        let (_, result) = extract(
            "<frameset><frame src=\"a.html\"></frameset>",
            ExtractionPolicy::FirstChild,
        );

        assert_eq!(result, Err(DomainError::MissingBody));
    }
}
