//! Python syntax checks
//!
//! Uses tree-sitter for parsing. A source text is considered valid when the
//! Python grammar produces a tree without `ERROR` or `MISSING` nodes. This is
//! the only notion of "parses" used across the workspace: fragments, whole
//! candidate files and classification all go through [`validate`].

use std::ops::Range;

use tree_sitter::{Node, Parser, Tree};

/// Syntax errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyntaxError {
    #[error("parser initialization failed: {0}")]
    ParserInit(String),

    #[error("parse failed")]
    ParseFailed,

    /// First offending node, 1-based position
    #[error("syntax error at {line}:{column}: {message}")]
    Invalid {
        line: usize,
        column: usize,
        message: String,
    },
}

/// Kind of a top-level declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclarationKind {
    Function,
    Class,
    Import,
}

/// A top-level declaration of a module, in source order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    /// What was declared
    pub kind: DeclarationKind,
    /// Function or class name; `None` for imports
    pub name: Option<String>,
    /// Decorator lines attached to the declaration, `@` included
    pub decorators: Vec<String>,
    /// Full declaration text, decorators included
    pub text: String,
    /// Byte range in source
    pub span: Range<usize>,
    /// 0-based first row
    pub start_row: usize,
    /// 0-based last row
    pub end_row: usize,
}

impl Declaration {
    /// Whether decorators are attached
    #[inline]
    #[must_use]
    pub fn is_decorated(&self) -> bool {
        !self.decorators.is_empty()
    }
}

/// Parse Python source into a tree-sitter tree
///
/// # Errors
/// Fails only if the grammar cannot be loaded or the parser gives up;
/// syntax errors are reported as nodes inside the tree.
pub fn parse_tree(source: &str) -> Result<Tree, SyntaxError> {
    let language: tree_sitter::Language = tree_sitter_python::LANGUAGE.into();
    let mut parser = Parser::new();
    parser
        .set_language(&language)
        .map_err(|e| SyntaxError::ParserInit(e.to_string()))?;

    parser.parse(source, None).ok_or(SyntaxError::ParseFailed)
}

/// Validate that `source` is a syntactically complete Python module
///
/// # Errors
/// Returns [`SyntaxError::Invalid`] pointing at the first error node.
pub fn validate(source: &str) -> Result<(), SyntaxError> {
    let tree = parse_tree(source)?;
    let root = tree.root_node();
    if !root.has_error() {
        return Ok(());
    }

    let node = first_error(root).unwrap_or(root);
    let position = node.start_position();
    let message = if node.is_missing() {
        format!("missing `{}`", node.kind())
    } else {
        let text = node.utf8_text(source.as_bytes()).unwrap_or("");
        let snippet: String = text.chars().take(40).collect();
        format!("unexpected `{}`", snippet.trim())
    };

    Err(SyntaxError::Invalid {
        line: position.row + 1,
        column: position.column + 1,
        message,
    })
}

/// Shorthand for `validate(source).is_ok()`
#[inline]
#[must_use]
pub fn is_valid(source: &str) -> bool {
    validate(source).is_ok()
}

/// Collect top-level function, class and import declarations in source order
///
/// Error recovery is left to tree-sitter: a source with syntax errors still
/// yields whatever declarations the parser could recover. Callers that need a
/// clean parse check [`validate`] first.
///
/// # Errors
/// Only parser initialization failures.
pub fn top_level_declarations(source: &str) -> Result<Vec<Declaration>, SyntaxError> {
    let tree = parse_tree(source)?;
    let root = tree.root_node();
    let mut declarations = Vec::new();

    for i in 0..root.child_count() {
        let Some(child) = root.child(i) else {
            continue;
        };
        if let Some(declaration) = declaration_from_node(child, source) {
            declarations.push(declaration);
        }
    }

    Ok(declarations)
}

fn declaration_from_node(node: Node<'_>, source: &str) -> Option<Declaration> {
    let bytes = source.as_bytes();

    let (kind, definition, decorators) = match node.kind() {
        "function_definition" => (DeclarationKind::Function, node, Vec::new()),
        "class_definition" => (DeclarationKind::Class, node, Vec::new()),
        "import_statement" | "import_from_statement" | "future_import_statement" => {
            (DeclarationKind::Import, node, Vec::new())
        }
        "decorated_definition" => {
            let definition = node.child_by_field_name("definition")?;
            let kind = match definition.kind() {
                "function_definition" => DeclarationKind::Function,
                "class_definition" => DeclarationKind::Class,
                _ => return None,
            };
            let mut decorators = Vec::new();
            for i in 0..node.named_child_count() {
                if let Some(child) = node.named_child(i) {
                    if child.kind() == "decorator" {
                        let text = child.utf8_text(bytes).unwrap_or("").trim().to_string();
                        decorators.push(text);
                    }
                }
            }
            (kind, definition, decorators)
        }
        _ => return None,
    };

    let name = match kind {
        DeclarationKind::Import => None,
        DeclarationKind::Function | DeclarationKind::Class => definition
            .child_by_field_name("name")
            .and_then(|n| n.utf8_text(bytes).ok())
            .map(str::to_string),
    };

    Some(Declaration {
        kind,
        name,
        decorators,
        text: node.utf8_text(bytes).unwrap_or("").to_string(),
        span: node.byte_range(),
        start_row: node.start_position().row,
        end_row: node.end_position().row,
    })
}

fn first_error(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    for i in 0..node.child_count() {
        if let Some(child) = node.child(i) {
            if child.has_error() || child.is_missing() {
                if let Some(found) = first_error(child) {
                    return Some(found);
                }
            }
        }
    }
    None
}
