//! Proposal and fragment data model
//!
//! A [`ChangeProposal`] is the structured form of freeform proposal text. Its
//! [`CodeFragment`]s are classified into a [`ClassifiedFragment`] whose
//! [`ChangeKind`] selects the patch strategy.

use serde::{Deserialize, Serialize};

use crate::syntax;

/// One candidate block of source code extracted from a proposal
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CodeFragment {
    /// Fragment text as extracted
    pub raw_text: String,
    /// Whether the text parses as a standalone module
    pub parses: bool,
}

impl CodeFragment {
    /// Create fragment, checking standalone syntax
    #[must_use]
    pub fn new(raw_text: impl Into<String>) -> Self {
        let raw_text = raw_text.into();
        let parses = syntax::is_valid(&raw_text);
        Self { raw_text, parses }
    }
}

/// What a fragment changes, with the identifier its patch strategy needs
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "tag", rename_all = "snake_case")]
pub enum ChangeKind {
    /// Replace or add a function
    Function { name: String },
    /// Replace or add a class
    Class { name: String },
    /// Add an import statement
    Import { normalized_text: String },
    /// Attach a decorator to an existing function
    Decorator {
        decorator_text: String,
        function_name: String,
    },
    /// Unparseable, or no recognizable declaration
    Unclassified,
}

impl ChangeKind {
    /// Stable tag name for logs and reports
    #[inline]
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            ChangeKind::Function { .. } => "function_change",
            ChangeKind::Class { .. } => "class_change",
            ChangeKind::Import { .. } => "import_change",
            ChangeKind::Decorator { .. } => "decorator_change",
            ChangeKind::Unclassified => "unclassified",
        }
    }
}

/// A fragment with exactly one change tag
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClassifiedFragment {
    pub fragment: CodeFragment,
    pub kind: ChangeKind,
}

impl ClassifiedFragment {
    #[inline]
    #[must_use]
    pub fn new(fragment: CodeFragment, kind: ChangeKind) -> Self {
        Self { fragment, kind }
    }

    /// Identifier derived from the tag
    ///
    /// Function or class name, normalized import text, or the decorated
    /// function's name. Absent for unclassified fragments.
    #[must_use]
    pub fn identifier(&self) -> Option<&str> {
        match &self.kind {
            ChangeKind::Function { name } | ChangeKind::Class { name } => Some(name),
            ChangeKind::Import { normalized_text } => Some(normalized_text),
            ChangeKind::Decorator { function_name, .. } => Some(function_name),
            ChangeKind::Unclassified => None,
        }
    }

    /// Fragment source text
    #[inline]
    #[must_use]
    pub fn text(&self) -> &str {
        &self.fragment.raw_text
    }
}

/// Coarse area a proposal claims to improve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImprovementCategory {
    Caching,
    Optimization,
    Learning,
    Reasoning,
    Context,
    Architecture,
    Parameters,
    Other,
}

impl ImprovementCategory {
    /// Keyword table, checked in order; first hit wins
    pub const KEYWORDS: &'static [(ImprovementCategory, &'static [&'static str])] = &[
        (Self::Caching, &["cache", "memoize", "lru_cache"]),
        (
            Self::Optimization,
            &["optimize", "faster", "speed", "efficiency", "performance"],
        ),
        (Self::Learning, &["learn", "training", "knowledge", "memory"]),
        (Self::Reasoning, &["reason", "logic", "think", "inference"]),
        (Self::Context, &["context", "retrieval", "search", "embedding"]),
        (
            Self::Architecture,
            &["architecture", "structure", "design", "refactor"],
        ),
        (
            Self::Parameters,
            &["parameter", "hyperparameter", "config", "setting"],
        ),
    ];

    /// Categorize free text by keyword
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        let lower = text.to_lowercase();
        Self::KEYWORDS
            .iter()
            .find(|(_, words)| words.iter().any(|w| lower.contains(w)))
            .map_or(Self::Other, |(category, _)| *category)
    }
}

impl std::fmt::Display for ImprovementCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Caching => "caching",
            Self::Optimization => "optimization",
            Self::Learning => "learning",
            Self::Reasoning => "reasoning",
            Self::Context => "context",
            Self::Architecture => "architecture",
            Self::Parameters => "parameters",
            Self::Other => "other",
        };
        write!(f, "{name}")
    }
}

/// Structured form of a proposal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeProposal {
    /// `MODIFICATION:` span, empty when absent
    pub description: String,
    /// `REASON:` span, empty when absent
    pub rationale: String,
    pub category: ImprovementCategory,
    /// Ordered fragments; empty means nothing actionable
    pub fragments: Vec<CodeFragment>,
}

impl ChangeProposal {
    /// Whether there is anything to apply
    #[inline]
    #[must_use]
    pub fn has_code(&self) -> bool {
        !self.fragments.is_empty()
    }
}
