//! Textual declaration spans
//!
//! Locates a function or class in file content without requiring the file to
//! parse. A span starts at the declaration header, extended upward over
//! directly attached decorator lines, and ends before the next non-blank,
//! non-comment line indented at or left of the header. Trailing blank lines
//! and outdented comments stay outside the span.

use regex::Regex;

/// Which header to look for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HeaderKind {
    Function,
    Class,
}

/// Located declaration, byte offsets into the searched content
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DeclSpan {
    /// Start of the first decorator line, or of the header line
    pub(crate) start: usize,
    /// Start of the header line
    pub(crate) header: usize,
    /// End of the span (start of the following line, or end of content)
    pub(crate) end: usize,
    /// Header indentation
    pub(crate) indent: String,
    /// Attached decorator lines, trimmed
    pub(crate) decorators: Vec<String>,
}

struct Line<'a> {
    start: usize,
    text: &'a str,
}

impl Line<'_> {
    fn indent(&self) -> &str {
        let trimmed = self.text.trim_start_matches([' ', '\t']);
        &self.text[..self.text.len() - trimmed.len()]
    }

    fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    fn is_comment(&self) -> bool {
        self.text.trim_start().starts_with('#')
    }
}

fn lines(content: &str) -> Vec<Line<'_>> {
    let mut out = Vec::new();
    let mut start = 0;
    for raw in content.split_inclusive('\n') {
        let text = raw.trim_end_matches(['\n', '\r']);
        out.push(Line { start, text });
        start += raw.len();
    }
    out
}

fn header_regex(kind: HeaderKind, name: &str) -> Option<Regex> {
    let name = regex::escape(name);
    let pattern = match kind {
        HeaderKind::Function => format!(r"^[ \t]*(?:async[ \t]+)?def[ \t]+{name}[ \t]*\("),
        HeaderKind::Class => format!(r"^[ \t]*class[ \t]+{name}[ \t]*[(:]"),
    };
    Regex::new(&pattern).ok()
}

/// Find the declaration named `name`
///
/// The least indented match wins, then the first in file order.
pub(crate) fn find(content: &str, kind: HeaderKind, name: &str) -> Option<DeclSpan> {
    let regex = header_regex(kind, name)?;
    let lines = lines(content);

    let header = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| regex.is_match(line.text))
        .min_by_key(|(i, line)| (line.indent().len(), *i))
        .map(|(i, _)| i)?;

    let indent = lines[header].indent();

    let mut first = header;
    while first > 0 {
        let above = &lines[first - 1];
        if above.indent() == indent && above.text.trim_start().starts_with('@') {
            first -= 1;
        } else {
            break;
        }
    }

    let mut last = lines[header + 1..]
        .iter()
        .position(|line| !line.is_blank() && !line.is_comment() && line.indent().len() <= indent.len())
        .map_or(lines.len(), |offset| header + 1 + offset);

    while last > header + 1 {
        let line = &lines[last - 1];
        if line.is_blank() || (line.is_comment() && line.indent().len() <= indent.len()) {
            last -= 1;
        } else {
            break;
        }
    }

    let end = lines.get(last).map_or(content.len(), |line| line.start);

    Some(DeclSpan {
        start: lines[first].start,
        header: lines[header].start,
        end,
        indent: indent.to_string(),
        decorators: lines[first..header]
            .iter()
            .map(|line| line.text.trim().to_string())
            .collect(),
    })
}

/// Shift `text` so its least indented lines sit at `indent`
pub(crate) fn reindent(text: &str, indent: &str) -> String {
    let common = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start_matches([' ', '\t']).len())
        .min()
        .unwrap_or(0);

    text.lines()
        .map(|l| {
            if l.trim().is_empty() {
                String::new()
            } else {
                format!("{indent}{}", &l[common..])
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
