//! Fragment classification
//!
//! Each fragment gets exactly one [`ChangeKind`]. Unparseable fragments are
//! [`ChangeKind::Unclassified`]. Parsed fragments are tagged from their
//! top-level declarations by priority:
//!
//! 1. decorated function → [`ChangeKind::Decorator`]
//! 2. function → [`ChangeKind::Function`]
//! 3. class (decorated or not) → [`ChangeKind::Class`]
//! 4. import → [`ChangeKind::Import`]
//!
//! Within a priority level the first declaration in source order wins. Later
//! declarations do not influence the tag; the patcher still receives the full
//! fragment text.

use evo_artifact::syntax::{self, Declaration, DeclarationKind};
use evo_artifact::{ChangeKind, ClassifiedFragment, CodeFragment};

/// Fragment classifier
#[derive(Debug, Clone, Copy, Default)]
pub struct ChangeClassifier;

impl ChangeClassifier {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Classify one fragment
    #[must_use]
    pub fn classify(&self, fragment: &CodeFragment) -> ClassifiedFragment {
        let kind = if fragment.parses {
            match syntax::top_level_declarations(&fragment.raw_text) {
                Ok(declarations) => kind_from_declarations(&declarations),
                Err(e) => {
                    tracing::warn!(error = %e, "declaration scan failed");
                    ChangeKind::Unclassified
                }
            }
        } else {
            ChangeKind::Unclassified
        };

        tracing::debug!(tag = kind.tag(), "classified fragment");
        ClassifiedFragment::new(fragment.clone(), kind)
    }

    /// Classify every fragment, preserving order
    #[must_use]
    pub fn classify_all(&self, fragments: &[CodeFragment]) -> Vec<ClassifiedFragment> {
        fragments.iter().map(|f| self.classify(f)).collect()
    }
}

fn kind_from_declarations(declarations: &[Declaration]) -> ChangeKind {
    let named = |d: &Declaration| d.name.clone().unwrap_or_default();

    if let Some(d) = declarations
        .iter()
        .find(|d| d.kind == DeclarationKind::Function && d.is_decorated())
    {
        return ChangeKind::Decorator {
            decorator_text: d.decorators[0].clone(),
            function_name: named(d),
        };
    }

    if let Some(d) = declarations.iter().find(|d| d.kind == DeclarationKind::Function) {
        return ChangeKind::Function { name: named(d) };
    }

    if let Some(d) = declarations.iter().find(|d| d.kind == DeclarationKind::Class) {
        return ChangeKind::Class { name: named(d) };
    }

    if let Some(d) = declarations.iter().find(|d| d.kind == DeclarationKind::Import) {
        return ChangeKind::Import {
            normalized_text: normalize_import(&d.text),
        };
    }

    ChangeKind::Unclassified
}

/// Collapse whitespace runs so equivalent imports compare equal
#[must_use]
pub fn normalize_import(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn classify(text: &str) -> ClassifiedFragment {
        ChangeClassifier::new().classify(&CodeFragment::new(text))
    }

    #[test]
    fn unparseable_fragment_is_unclassified_verbatim() {
        let text = "def broken(:\n  ???";
        let classified = classify(text);
        assert_eq!(classified.kind, ChangeKind::Unclassified);
        assert_eq!(classified.identifier(), None);
        assert_eq!(classified.text(), text);
    }

    #[test]
    fn function_fragment() {
        let classified = classify("def f(x):\n    return x\n");
        assert_eq!(classified.kind, ChangeKind::Function { name: "f".into() });
        assert_eq!(classified.identifier(), Some("f"));
    }

    #[test]
    fn class_fragment() {
        let classified = classify("@dataclass\nclass Point:\n    x: int = 0\n");
        assert_eq!(classified.kind, ChangeKind::Class { name: "Point".into() });
    }

    #[test]
    fn import_fragment_is_normalized() {
        let classified = classify("from   collections import   deque");
        assert_eq!(
            classified.kind,
            ChangeKind::Import {
                normalized_text: "from collections import deque".into()
            }
        );
    }

    #[test]
    fn decorator_wins_over_preceding_import() {
        let classified = classify(
            "from functools import lru_cache\n\n@lru_cache(maxsize=128)\ndef expensive(x):\n    return x * 2\n",
        );
        assert_eq!(
            classified.kind,
            ChangeKind::Decorator {
                decorator_text: "@lru_cache(maxsize=128)".into(),
                function_name: "expensive".into(),
            }
        );
    }

    #[test]
    fn first_function_wins() {
        let classified = classify("def a():\n    pass\n\ndef b():\n    pass\n");
        assert_eq!(classified.identifier(), Some("a"));
    }

    #[test]
    fn function_beats_class() {
        let classified = classify("class K:\n    pass\n\ndef helper():\n    return K()\n");
        assert_eq!(classified.kind, ChangeKind::Function { name: "helper".into() });
    }

    #[test]
    fn statements_without_declarations_are_unclassified() {
        let classified = classify("THRESHOLD = 0.75\n");
        assert!(classified.fragment.parses);
        assert_eq!(classified.kind, ChangeKind::Unclassified);
    }
}
