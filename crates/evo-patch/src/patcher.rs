//! Patcher
//!
//! Applies one [`ClassifiedFragment`] to one allow-listed file. The strategy
//! is picked by matching the fragment's [`ChangeKind`]:
//!
//! | kind | strategy |
//! |---|---|
//! | function, class, unclassified | replace the existing span, else append |
//! | import | insert after the last top-level import, unless present |
//! | decorator | insert above the function, adding a known supporting import |
//!
//! The full candidate content is validated before anything is written; a
//! candidate that does not parse is rejected and the file stays untouched.
//! Writes go through a temporary file in the target's directory and a rename.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use evo_artifact::syntax::{self, Declaration, DeclarationKind};
use evo_artifact::{ChangeKind, ClassifiedFragment, SyntaxError};
use evo_proposal::normalize_import;
use serde::{Deserialize, Serialize};

use crate::error::PatchError;
use crate::scope::MutableFiles;
use crate::span::{self, HeaderKind};

/// Decorators whose supporting import the patcher knows how to add
pub const KNOWN_DECORATOR_IMPORTS: &[(&str, &str)] = &[
    ("lru_cache", "functools"),
    ("cache", "functools"),
    ("wraps", "functools"),
    ("total_ordering", "functools"),
    ("cached_property", "functools"),
    ("singledispatch", "functools"),
    ("dataclass", "dataclasses"),
    ("contextmanager", "contextlib"),
];

/// How a patch was (or was not) applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchMethod {
    /// Existing declaration span replaced
    Replace,
    /// New content added (end of file, or an import block)
    Append,
    /// Nothing to do; the change is already in the file
    AlreadyPresent,
    /// Decorator line inserted above an existing function
    DecoratorInsert,
    /// Candidate failed validation; file untouched
    Rejected,
}

/// Outcome of one patch call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchResult {
    pub applied: bool,
    pub method: PatchMethod,
    pub error: Option<String>,
}

impl PatchResult {
    #[inline]
    #[must_use]
    pub fn applied(method: PatchMethod) -> Self {
        Self {
            applied: true,
            method,
            error: None,
        }
    }

    #[must_use]
    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            applied: false,
            method: PatchMethod::Rejected,
            error: Some(error.into()),
        }
    }
}

/// Validated candidate content for a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// New content; equals the input when nothing changes or on rejection
    pub content: String,
    pub result: PatchResult,
}

/// Applies classified fragments to allow-listed files
#[derive(Debug, Clone)]
pub struct Patcher {
    scope: Arc<MutableFiles>,
}

impl Patcher {
    #[inline]
    #[must_use]
    pub fn new(scope: Arc<MutableFiles>) -> Self {
        Self { scope }
    }

    #[inline]
    #[must_use]
    pub fn scope(&self) -> &MutableFiles {
        &self.scope
    }

    /// Apply `fragment` to `target`
    ///
    /// # Errors
    /// - [`PatchError::OutsideScope`] if `target` is not allow-listed; nothing
    ///   is read or written
    /// - [`PatchError::Io`] if the file cannot be read or written
    /// - [`PatchError::Syntax`] if the parser cannot be initialized
    pub fn apply(
        &self,
        target: impl AsRef<Path>,
        fragment: &ClassifiedFragment,
    ) -> Result<PatchResult, PatchError> {
        let path = self.scope.resolve(target)?;
        let original =
            std::fs::read_to_string(&path).map_err(|e| PatchError::io_error(&path, e))?;

        let candidate = Self::candidate(&original, fragment)?;
        let result = candidate.result;

        if !result.applied {
            tracing::warn!(
                file = %path.display(),
                tag = fragment.kind.tag(),
                error = result.error.as_deref().unwrap_or(""),
                "patch rejected"
            );
            return Ok(result);
        }

        if candidate.content != original {
            write_atomic(&path, candidate.content.as_bytes())
                .map_err(|e| PatchError::io_error(&path, e))?;
        }

        tracing::info!(
            file = %path.display(),
            tag = fragment.kind.tag(),
            method = ?result.method,
            "patch applied"
        );
        Ok(result)
    }

    /// Compute and validate the patched content without touching disk
    ///
    /// # Errors
    /// Only parser initialization failures; invalid candidates come back as
    /// rejected results.
    pub fn candidate(content: &str, fragment: &ClassifiedFragment) -> Result<Candidate, SyntaxError> {
        let (patched, method) = plan(content, fragment)?;

        if method == PatchMethod::AlreadyPresent {
            return Ok(Candidate {
                content: content.to_string(),
                result: PatchResult::applied(method),
            });
        }

        match syntax::validate(&patched) {
            Ok(()) => Ok(Candidate {
                content: patched,
                result: PatchResult::applied(method),
            }),
            Err(e @ SyntaxError::Invalid { .. }) => Ok(Candidate {
                content: content.to_string(),
                result: PatchResult::rejected(format!("candidate does not parse: {e}")),
            }),
            Err(e) => Err(e),
        }
    }
}

fn plan(content: &str, fragment: &ClassifiedFragment) -> Result<(String, PatchMethod), SyntaxError> {
    let text = fragment.text();

    let planned = match &fragment.kind {
        ChangeKind::Function { name } => replace_or_append(content, HeaderKind::Function, name, text),
        ChangeKind::Class { name } => replace_or_append(content, HeaderKind::Class, name, text),
        ChangeKind::Import { .. } => insert_imports(content, text)?,
        ChangeKind::Decorator {
            decorator_text,
            function_name,
        } => insert_decorator(content, decorator_text, function_name, text)?,
        ChangeKind::Unclassified => {
            let key = text.trim();
            if !key.is_empty() && content.contains(key) {
                (content.to_string(), PatchMethod::AlreadyPresent)
            } else {
                (append(content, text), PatchMethod::Append)
            }
        }
    };

    tracing::debug!(tag = fragment.kind.tag(), method = ?planned.1, "planned patch");
    Ok(planned)
}

fn replace_or_append(content: &str, kind: HeaderKind, name: &str, text: &str) -> (String, PatchMethod) {
    match span::find(content, kind, name) {
        Some(found) => {
            let mut out = String::with_capacity(content.len() + text.len());
            out.push_str(&content[..found.start]);
            out.push_str(&span::reindent(text, &found.indent));
            out.push('\n');
            out.push_str(&content[found.end..]);
            (out, PatchMethod::Replace)
        }
        None => (append(content, text), PatchMethod::Append),
    }
}

fn append(content: &str, text: &str) -> String {
    let body = text.trim_end();
    let head = content.trim_end();
    if head.is_empty() {
        format!("{body}\n")
    } else {
        format!("{head}\n\n\n{body}\n")
    }
}

fn imports(source: &str) -> Result<Vec<Declaration>, SyntaxError> {
    Ok(syntax::top_level_declarations(source)?
        .into_iter()
        .filter(|d| d.kind == DeclarationKind::Import)
        .collect())
}

/// Insert each import of `text` not yet in `content`
///
/// An import is present when its normalized text occurs verbatim in the
/// file, or equals a normalized existing import.
fn insert_imports(content: &str, text: &str) -> Result<(String, PatchMethod), SyntaxError> {
    let existing = imports(content)?;
    let present: Vec<String> = existing.iter().map(|d| normalize_import(&d.text)).collect();

    let mut missing: Vec<String> = Vec::new();
    for declaration in imports(text)? {
        let normalized = normalize_import(&declaration.text);
        if !content.contains(&normalized)
            && !present.contains(&normalized)
            && !missing.contains(&normalized)
        {
            missing.push(normalized);
        }
    }

    if missing.is_empty() {
        return Ok((content.to_string(), PatchMethod::AlreadyPresent));
    }

    let offset = existing
        .last()
        .map_or(0, |last| line_offset(content, last.end_row + 1));
    Ok((insert_lines(content, offset, &missing.join("\n")), PatchMethod::Append))
}

fn insert_decorator(
    content: &str,
    decorator_text: &str,
    function_name: &str,
    text: &str,
) -> Result<(String, PatchMethod), SyntaxError> {
    let decorator = decorator_text.trim();

    let Some(found) = span::find(content, HeaderKind::Function, function_name) else {
        tracing::debug!(function = function_name, "decorated function absent, appending fragment");
        return Ok((append(content, text), PatchMethod::Append));
    };

    if found.decorators.iter().any(|d| d == decorator) {
        return Ok((content.to_string(), PatchMethod::AlreadyPresent));
    }

    let line = format!("{}{decorator}", found.indent);
    let mut patched = insert_lines(content, found.header, &line);

    if let Some(required) = supporting_import(decorator) {
        if !imports(&patched)?
            .iter()
            .any(|d| satisfies(&normalize_import(&d.text), &required))
        {
            let offset = after_future_imports(&patched)?;
            patched = insert_lines(&patched, offset, &required.statement());
        }
    }

    Ok((patched, PatchMethod::DecoratorInsert))
}

/// Import a decorator relies on
#[derive(Debug, Clone, PartialEq, Eq)]
enum RequiredImport {
    /// `from module import name`
    Name { module: &'static str, name: String },
    /// `import module`, for dotted use like `@functools.wraps(f)`
    Module(&'static str),
}

impl RequiredImport {
    fn statement(&self) -> String {
        match self {
            Self::Name { module, name } => format!("from {module} import {name}"),
            Self::Module(module) => format!("import {module}"),
        }
    }
}

fn supporting_import(decorator: &str) -> Option<RequiredImport> {
    let name = decorator
        .trim_start_matches('@')
        .split(|c: char| c == '(' || c.is_whitespace())
        .next()
        .unwrap_or("");

    if let Some((module, _)) = name.split_once('.') {
        return KNOWN_DECORATOR_IMPORTS
            .iter()
            .find(|(_, m)| *m == module)
            .map(|&(_, m)| RequiredImport::Module(m));
    }

    KNOWN_DECORATOR_IMPORTS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|&(n, module)| RequiredImport::Name {
            module,
            name: n.to_string(),
        })
}

/// Whether a normalized import statement provides `required`
fn satisfies(statement: &str, required: &RequiredImport) -> bool {
    match required {
        RequiredImport::Name { module, name } => statement
            .strip_prefix(&format!("from {module} import "))
            .is_some_and(|names| imported_names(names).any(|n| n == name.as_str())),
        RequiredImport::Module(module) => statement
            .strip_prefix("import ")
            .is_some_and(|names| imported_names(names).any(|n| n == *module)),
    }
}

fn imported_names(list: &str) -> impl Iterator<Item = &str> {
    list.trim_matches(|c: char| c == '(' || c == ')' || c.is_whitespace())
        .split(',')
        .filter_map(|item| item.split_whitespace().next())
}

fn after_future_imports(content: &str) -> Result<usize, SyntaxError> {
    let mut offset = 0;
    for declaration in syntax::top_level_declarations(content)? {
        if declaration.kind == DeclarationKind::Import && declaration.text.starts_with("from __future__") {
            offset = line_offset(content, declaration.end_row + 1);
        } else {
            break;
        }
    }
    Ok(offset)
}

/// Byte offset of the start of `row`, or end of content
fn line_offset(content: &str, row: usize) -> usize {
    content
        .split_inclusive('\n')
        .take(row)
        .map(str::len)
        .sum()
}

/// Insert `lines` as whole lines at a line-start `offset`
fn insert_lines(content: &str, offset: usize, lines: &str) -> String {
    let mut out = String::with_capacity(content.len() + lines.len() + 2);
    out.push_str(&content[..offset]);
    if offset > 0 && !content[..offset].ends_with('\n') {
        out.push('\n');
    }
    out.push_str(lines);
    out.push('\n');
    out.push_str(&content[offset..]);
    out
}

/// Write through a temp file in the same directory, then rename over `path`
///
/// An existing file keeps its permissions.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    if let Ok(meta) = std::fs::metadata(path) {
        if meta.is_file() {
            tmp.as_file().set_permissions(meta.permissions())?;
        }
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
