//! Code extraction from generation-service responses.
//!
//! A response is free-form text: reasoning traces wrapped in `<think>` tags,
//! leftovers of a SEARCH/REPLACE patch format, prose, and (usually) one fenced
//! `javascript` block holding the test file. Extraction runs in two passes over
//! small token streams instead of one large regular expression:
//!
//! 1. sanitation: marker tokens are removed until none are left,
//! 2. isolation: fence tokens are scanned and the first `javascript` block wins.
//!
//! Only raw responses should be extracted. Plain code has no fence, so running
//! [`extract`] on its own output yields an empty string.

use std::ops::Range;

use serde_json::Value;
use tracing::debug;

/// Language tag a fenced block must carry to be extracted.
pub const LANGUAGE_TAG: &str = "javascript";

const FENCE: &str = "```";

/// Key under which JSON payloads from the generation endpoint carry the text.
const PAYLOAD_KEY: &str = "generatedTest";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    Search,
    Separator,
    Replace,
    ThinkOpen,
    ThinkClose,
}

impl Marker {
    const ALL: [Marker; 5] = [
        Marker::Search,
        Marker::Separator,
        Marker::Replace,
        Marker::ThinkOpen,
        Marker::ThinkClose,
    ];

    fn literal(self) -> &'static str {
        match self {
            Marker::Search => "<<<<<<< SEARCH",
            Marker::Separator => "=======",
            Marker::Replace => ">>>>>>> REPLACE",
            Marker::ThinkOpen => "<think>",
            Marker::ThinkClose => "</think>",
        }
    }

    fn at(text: &str, pos: usize) -> Option<Marker> {
        let rest = &text[pos..];
        Marker::ALL
            .into_iter()
            .find(|marker| rest.starts_with(marker.literal()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Span {
    Text(Range<usize>),
    Marker(Marker),
}

/// Split `text` into text spans and marker tokens, left to right.
fn marker_spans(text: &str) -> Vec<Span> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    let mut text_start = 0;
    let mut pos = 0;

    while pos < bytes.len() {
        // every marker starts with one of these ASCII bytes, so `pos` is a char boundary
        let candidate = matches!(bytes[pos], b'<' | b'=' | b'>');
        match candidate.then(|| Marker::at(text, pos)).flatten() {
            Some(marker) => {
                if text_start < pos {
                    spans.push(Span::Text(text_start..pos));
                }
                spans.push(Span::Marker(marker));
                pos += marker.literal().len();
                text_start = pos;
            }
            None => pos += 1,
        }
    }

    if text_start < bytes.len() {
        spans.push(Span::Text(text_start..bytes.len()));
    }
    spans
}

/// Remove every marker token. Removing one marker can join its neighbours into
/// a new one (`<thi=======nk>`), so the pass repeats until nothing changes.
fn sanitize(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let spans = marker_spans(&current);
        if !spans.iter().any(|s| matches!(s, Span::Marker(_))) {
            return current;
        }
        current = spans
            .iter()
            .filter_map(|span| match span {
                Span::Text(range) => Some(&current[range.clone()]),
                Span::Marker(_) => None,
            })
            .collect();
    }
}

/// A run of three backticks and the language tag glued to it (possibly empty).
#[derive(Debug, Clone, PartialEq, Eq)]
struct Fence {
    at: usize,
    tag: Range<usize>,
}

fn is_tag_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+' | '#' | '.')
}

/// Every position where a backtick triple starts. Positions may overlap inside
/// longer backtick runs.
fn fence_tokens(text: &str) -> Vec<Fence> {
    let mut fences = Vec::new();
    let mut from = 0;
    while let Some(offset) = text[from..].find(FENCE) {
        let at = from + offset;
        let tag_start = at + FENCE.len();
        let tag_len: usize = text[tag_start..]
            .chars()
            .take_while(|c| is_tag_char(*c))
            .map(char::len_utf8)
            .sum();
        fences.push(Fence {
            at,
            tag: tag_start..tag_start + tag_len,
        });
        from = at + 1;
    }
    fences
}

/// The trimmed body of the first fenced block tagged [`LANGUAGE_TAG`].
fn first_tagged_block<'a>(text: &'a str, fences: &[Fence]) -> Option<&'a str> {
    let open = fences.iter().find(|fence| {
        &text[fence.tag.clone()] == LANGUAGE_TAG
            && text[fence.tag.end..]
                .chars()
                .next()
                .is_some_and(char::is_whitespace)
    })?;
    let close = fences.iter().find(|fence| fence.at >= open.tag.end)?;
    Some(text[open.tag.end..close.at].trim())
}

/// Extract the test source from a raw generation response.
///
/// Returns an empty string when the response holds no `javascript` block.
pub fn extract(text: &str) -> String {
    let sanitized = sanitize(text);
    let sanitized = sanitized.trim();
    let fences = fence_tokens(sanitized);

    match first_tagged_block(sanitized, &fences) {
        Some(code) => {
            debug!(
                "Extracted {} bytes of {} from a {}-byte response",
                code.len(),
                LANGUAGE_TAG,
                text.len()
            );
            code.to_string()
        }
        None => {
            debug!(
                "No ```{} block in response ({} fence tokens)",
                LANGUAGE_TAG,
                fences.len()
            );
            String::new()
        }
    }
}

/// Extract from a JSON payload: either the response string itself or an
/// object carrying it under `generatedTest`. Anything else extracts nothing.
pub fn extract_from_payload(payload: &Value) -> String {
    match payload {
        Value::String(text) => extract(text),
        Value::Object(map) => map
            .get(PAYLOAD_KEY)
            .and_then(Value::as_str)
            .map(extract)
            .unwrap_or_default(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_fenced_block() {
        let response = r#"Here are your tests:

```javascript
const { expect } = require("chai");

describe("Token", function () {
  it("deploys", async function () {});
});
```

Let me know if you need more."#;

        let code = extract(response);
        assert!(code.starts_with("const { expect }"));
        assert!(code.ends_with("});"));
        assert!(!code.contains("```"));
    }

    #[test]
    fn test_extract_without_fence_is_empty() {
        assert_eq!(extract("const x = 1;"), "");
        assert_eq!(extract(""), "");
    }

    #[test]
    fn test_extract_ignores_other_languages() {
        let response = "```python\nprint('hi')\n```\n\n```javascript\nlet a = 1;\n```";
        assert_eq!(extract(response), "let a = 1;");
    }

    #[test]
    fn test_extract_requires_whitespace_after_tag() {
        assert_eq!(extract("```javascriptreact\nlet a;\n```"), "");
        assert_eq!(extract("```javascript let a;```"), "let a;");
    }

    #[test]
    fn test_extract_unclosed_fence_is_empty() {
        assert_eq!(extract("```javascript\nlet a = 1;"), "");
    }

    #[test]
    fn test_extract_strips_think_tags_but_keeps_contents() {
        let response = "<think>plan the tests</think>\n```javascript\nlet a = 1;\n```";
        assert_eq!(extract(response), "let a = 1;");
        assert_eq!(sanitize("<think>plan</think>"), "plan");
        assert_eq!(sanitize("a</think>b<think>"), "ab");
    }

    #[test]
    fn test_extract_strips_patch_markers_inside_block() {
        let response = "<<<<<<< SEARCH\n```javascript\nold();\n=======\nnew();\n>>>>>>> REPLACE\n```";
        let code = extract(response);
        assert!(!code.contains("SEARCH"));
        assert!(!code.contains("======="));
        assert!(!code.contains("REPLACE"));
        assert!(code.contains("old();"));
        assert!(code.contains("new();"));
    }

    #[test]
    fn test_sanitize_reaches_fixpoint() {
        assert_eq!(sanitize("<thi=======nk>"), "");
        assert_eq!(sanitize("====<think>==="), "");
        assert_eq!(sanitize("=========="), "===");
    }

    #[test]
    fn test_marker_spans() {
        let spans = marker_spans("a<think>b");
        assert_eq!(
            spans,
            vec![
                Span::Text(0..1),
                Span::Marker(Marker::ThinkOpen),
                Span::Text(8..9)
            ]
        );
    }

    #[test]
    fn test_fence_tokens_overlap_in_long_runs() {
        let fences = fence_tokens("````javascript\nx\n```");
        let text = "````javascript\nx\n```";
        assert!(first_tagged_block(text, &fences).is_some());
        assert_eq!(extract(text), "x");
    }

    #[test]
    fn test_extract_multibyte_text() {
        let response = "Voilà — les tests ✓\n```javascript\nconst s = \"é\";\n```";
        assert_eq!(extract(response), "const s = \"é\";");
    }

    #[test]
    fn test_reextracting_plain_code_is_empty() {
        let once = extract("```javascript\nlet a = 1;\n```");
        assert_eq!(once, "let a = 1;");
        assert_eq!(extract(&once), "");
    }

    #[test]
    fn test_extract_from_payload() {
        let raw = "```javascript\nlet a;\n```";
        assert_eq!(extract_from_payload(&json!(raw)), "let a;");
        assert_eq!(
            extract_from_payload(&json!({ "generatedTest": raw })),
            "let a;"
        );
        assert_eq!(extract_from_payload(&json!({ "other": raw })), "");
        assert_eq!(extract_from_payload(&json!(42)), "");
    }
}
