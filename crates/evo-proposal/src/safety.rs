//! Safety screen
//!
//! Scans fragment text against two fixed, ordered pattern sets and assigns a
//! [`RiskTier`]. A `High` tier is a hard gate: no patch attempt may proceed.
//! `Medium` passes, with the matched patterns recorded for audit.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Risk tier, ordered `Low < Medium < High`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

/// Outcome of screening one fragment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub tier: RiskTier,
    /// Descriptions of every matched pattern, both tiers
    pub matched_patterns: BTreeSet<String>,
}

impl RiskAssessment {
    /// Whether this fragment must not be applied
    #[inline]
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        self.tier == RiskTier::High
    }
}

struct RiskPattern {
    regex: Regex,
    description: &'static str,
}

fn patterns(table: &[(&str, &'static str)]) -> Vec<RiskPattern> {
    table
        .iter()
        .map(|(pattern, description)| RiskPattern {
            regex: Regex::new(pattern).expect("static risk pattern"),
            description,
        })
        .collect()
}

static HIGH_RISK: Lazy<Vec<RiskPattern>> = Lazy::new(|| {
    patterns(&[
        (r"\bos\.system\b", "executes shell commands"),
        (r"\bsubprocess\b", "spawns subprocesses"),
        (r"\bos\.(popen|exec[lv]p?e?|spawn[lv]p?e?)\b", "spawns processes"),
        (r"\beval\b", "evaluates arbitrary code"),
        (r"\bexec\b", "executes arbitrary code"),
        (r"(^|[^.\w])compile\s*\(", "compiles code at runtime"),
        (r"\b__import__\b", "imports modules dynamically"),
        (r"\bimportlib\b", "imports modules dynamically"),
        (r"\bshutil\.rmtree\b", "deletes directory trees"),
        (r"\brm\s+-[a-zA-Z]*[rR]", "deletes recursively"),
        (r"\bos\.remove\b", "deletes files"),
        (r"\b(unlink|rmdir|removedirs)\b", "deletes files"),
        (r#"\bopen\s*\([^)]*['"][wax]b?\+?['"]"#, "writes files"),
    ])
});

static MEDIUM_RISK: Lazy<Vec<RiskPattern>> = Lazy::new(|| {
    patterns(&[
        (r"\brequests\b", "makes HTTP requests"),
        (r"\burllib\b", "performs URL operations"),
        (r"\b(httpx|aiohttp)\b", "makes HTTP requests"),
        (r"\bhttp\.client\b", "makes HTTP requests"),
        (r"\bsocket\b", "opens raw sockets"),
    ])
});

/// Pattern-based risk screen
#[derive(Debug, Clone, Copy, Default)]
pub struct SafetyScreen;

impl SafetyScreen {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Assess fragment text
    #[must_use]
    pub fn assess(&self, fragment_text: &str) -> RiskAssessment {
        let high = matches(&HIGH_RISK, fragment_text);
        let medium = matches(&MEDIUM_RISK, fragment_text);

        let tier = if !high.is_empty() {
            RiskTier::High
        } else if !medium.is_empty() {
            RiskTier::Medium
        } else {
            RiskTier::Low
        };

        let mut matched_patterns = high;
        matched_patterns.extend(medium);

        if tier > RiskTier::Low {
            tracing::debug!(?tier, patterns = ?matched_patterns, "risk patterns matched");
        }

        RiskAssessment {
            tier,
            matched_patterns,
        }
    }
}

fn matches(set: &[RiskPattern], text: &str) -> BTreeSet<String> {
    set.iter()
        .filter(|p| p.regex.is_match(text))
        .map(|p| p.description.to_string())
        .collect()
}
