//! Proposal text parser
//!
//! Turns freeform, usually generated, proposal text into a [`ChangeProposal`].
//! Labeled spans (`MODIFICATION:`, `REASON:`) give description and rationale.
//! Code comes from fenced blocks, parsed with pulldown-cmark, or from a bare
//! `CODE:` section when the text has no usable fence.
//!
//! Parsing never fails. Text without code produces a proposal with no
//! fragments.

use evo_artifact::{ChangeProposal, CodeFragment, ImprovementCategory};
use pulldown_cmark::{CodeBlockKind, Event, Parser as MdParser, Tag, TagEnd};

/// Label introducing the change description
pub const MODIFICATION_LABEL: &str = "MODIFICATION:";
/// Label introducing the rationale
pub const REASON_LABEL: &str = "REASON:";
/// Label introducing unfenced code
pub const CODE_LABEL: &str = "CODE:";

const FENCE: &str = "```";

/// Fence info strings accepted as Python code
const PYTHON_FENCES: &[&str] = &["", "python", "py", "python3"];

/// Proposal parser
#[derive(Debug, Clone, Copy, Default)]
pub struct ProposalParser;

impl ProposalParser {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Parse proposal text
    #[must_use]
    pub fn parse(&self, text: &str) -> ChangeProposal {
        let text = dedent(text);

        let description = labeled_span(
            &text,
            MODIFICATION_LABEL,
            &[REASON_LABEL, CODE_LABEL, FENCE],
        );
        let rationale = labeled_span(
            &text,
            REASON_LABEL,
            &[MODIFICATION_LABEL, CODE_LABEL, FENCE],
        );

        let mut blocks = fenced_blocks(&text);
        if blocks.is_empty() {
            blocks.extend(code_section(&text));
        }

        let fragments: Vec<CodeFragment> = blocks
            .into_iter()
            .map(|block| clean_fragment(&block))
            .filter(|code| !code.is_empty())
            .map(CodeFragment::new)
            .collect();

        tracing::debug!(
            fragments = fragments.len(),
            has_description = !description.is_empty(),
            "parsed proposal"
        );

        ChangeProposal {
            category: ImprovementCategory::from_text(&text),
            description,
            rationale,
            fragments,
        }
    }
}

/// Text after `label` up to the nearest terminator or end of text, trimmed
fn labeled_span(text: &str, label: &str, terminators: &[&str]) -> String {
    let Some(start) = text.find(label) else {
        return String::new();
    };
    let rest = &text[start + label.len()..];
    let end = terminators
        .iter()
        .filter_map(|t| rest.find(t))
        .min()
        .unwrap_or(rest.len());
    rest[..end].trim().to_string()
}

/// Contents of fenced code blocks tagged as Python (or untagged)
fn fenced_blocks(text: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current: Option<String> = None;

    for event in MdParser::new(text) {
        match event {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))) => {
                let language = info
                    .split_whitespace()
                    .next()
                    .unwrap_or("")
                    .to_lowercase();
                if PYTHON_FENCES.contains(&language.as_str()) {
                    current = Some(String::new());
                }
            }
            Event::Text(chunk) => {
                if let Some(buffer) = current.as_mut() {
                    buffer.push_str(&chunk);
                }
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some(code) = current.take() {
                    blocks.push(code);
                }
            }
            _ => {}
        }
    }

    blocks
}

/// Unfenced code after the first `CODE:` label, up to the first blank line
fn code_section(text: &str) -> Option<String> {
    let start = text.find(CODE_LABEL)?;
    let rest = &text[start + CODE_LABEL.len()..];
    let section = rest.split("\n\n").next().unwrap_or("");
    let trimmed = section.trim();

    if trimmed.is_empty() || trimmed.starts_with(FENCE) || trimmed.starts_with("MODIFICATION") {
        return None;
    }
    Some(section.to_string())
}

/// Drop surrounding blank lines and common indentation
fn clean_fragment(code: &str) -> String {
    let lines: Vec<&str> = code.lines().collect();
    let first = lines.iter().position(|l| !l.trim().is_empty());
    let last = lines.iter().rposition(|l| !l.trim().is_empty());

    match (first, last) {
        (Some(first), Some(last)) => dedent(&lines[first..=last].join("\n"))
            .trim_end()
            .to_string(),
        _ => String::new(),
    }
}

/// Strip the indentation shared by all non-blank lines
fn dedent(text: &str) -> String {
    let indent = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start_matches([' ', '\t']).len())
        .min()
        .unwrap_or(0);

    if indent == 0 {
        return text.to_string();
    }

    text.lines()
        .map(|l| if l.trim().is_empty() { "" } else { &l[indent..] })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_labeled_proposal_with_fence() {
        let text = "MODIFICATION: add cache\nREASON: speed\nCODE:\n```\ndef f(): return 1\n```";
        let proposal = ProposalParser::new().parse(text);

        assert_eq!(proposal.description, "add cache");
        assert_eq!(proposal.rationale, "speed");
        assert_eq!(proposal.fragments.len(), 1);
        assert_eq!(proposal.fragments[0].raw_text, "def f(): return 1");
        assert!(proposal.fragments[0].parses);
        assert_eq!(proposal.category, ImprovementCategory::Caching);
    }

    #[test]
    fn missing_labels_yield_empty_strings() {
        let proposal = ProposalParser::new().parse("```python\nimport os\n```");
        assert_eq!(proposal.description, "");
        assert_eq!(proposal.rationale, "");
        assert_eq!(proposal.fragments.len(), 1);
    }

    #[test]
    fn multiple_fences_keep_order_and_skip_other_languages() {
        let text = "\
MODIFICATION: two changes
```python
import math
```
```bash
echo hi
```
```py
def area(r):
    return math.pi * r * r
```
";
        let proposal = ProposalParser::new().parse(text);
        let texts: Vec<_> = proposal.fragments.iter().map(|f| f.raw_text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["import math", "def area(r):\n    return math.pi * r * r"]
        );
        assert_eq!(proposal.description, "two changes");
    }

    #[test]
    fn falls_back_to_code_label() {
        let text = "MODIFICATION: tweak\nREASON: better\nCODE:\ndef g(x):\n    return x * 2\n\nThat is all.";
        let proposal = ProposalParser::new().parse(text);
        assert_eq!(proposal.fragments.len(), 1);
        assert_eq!(proposal.fragments[0].raw_text, "def g(x):\n    return x * 2");
    }

    #[test]
    fn indented_proposal_is_dedented() {
        let text = "
    MODIFICATION: Add caching to improve performance
    REASON: Reduces redundant computation
    CODE:
    ```python
    from functools import lru_cache

    @lru_cache(maxsize=128)
    def expensive_function(x):
        return x * 2
    ```
    ";
        let proposal = ProposalParser::new().parse(text);
        assert_eq!(proposal.description, "Add caching to improve performance");
        assert_eq!(proposal.fragments.len(), 1);
        assert!(proposal.fragments[0].raw_text.starts_with("from functools import lru_cache"));
        assert!(proposal.fragments[0].parses);
    }

    #[test]
    fn text_without_code_has_no_fragments() {
        let proposal = ProposalParser::new().parse("MODIFICATION: think harder\nREASON: because");
        assert!(!proposal.has_code());
        assert_eq!(proposal.rationale, "because");
    }

    #[test]
    fn empty_code_label_has_no_fragments() {
        let proposal = ProposalParser::new().parse("CODE:\n\nnothing here");
        assert!(proposal.fragments.is_empty());
    }
}
