//! Capability benchmark
//!
//! Scores an [`Oracle`] against a fixed question bank. Each question is sent
//! as `"Answer briefly: <question>"`. An answer is correct when, trimmed and
//! lowercased, it is non-empty and either contains the expected answer or is
//! contained in it. The match is loose on purpose: short free-text answers
//! like "It's 42." must count.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::bank::{standard_bank, BenchmarkItem, QuestionCategory};
use crate::oracle::{ask_with_retry, Oracle, RetryPolicy};

/// Prefix prepended to every question
pub const PROMPT_PREFIX: &str = "Answer briefly: ";

/// Stored answers are cut to this many characters
pub const ANSWER_PREVIEW_CHARS: usize = 100;

/// Bank validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BenchmarkError {
    #[error("benchmark item {index} has invalid weight {points}; expected 1 or 2")]
    InvalidWeight { index: usize, points: u32 },

    #[error("benchmark item {index} has an empty {field}")]
    EmptyField { index: usize, field: &'static str },
}

/// Points for one category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub points: u32,
    pub max: u32,
}

/// Result for one asked question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemResult {
    pub question: String,
    pub expected: String,
    /// Normalized answer, truncated
    pub answer: String,
    pub correct: bool,
    /// Points awarded
    pub points: u32,
    pub category: QuestionCategory,
    /// Oracle call failed after retries
    pub oracle_failed: bool,
}

/// Aggregate benchmark result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkScore {
    pub raw_points: u32,
    pub max_points: u32,
    /// `raw / max * 100`, `0` when `max == 0`
    pub percentage: f64,
    pub per_category: BTreeMap<QuestionCategory, CategoryScore>,
    /// Items that produced a non-empty answer
    pub answered: usize,
    pub correct: usize,
    pub failed_calls: usize,
    pub details: Vec<ItemResult>,
}

impl BenchmarkScore {
    /// Score with totals only
    #[must_use]
    pub fn from_points(raw_points: u32, max_points: u32) -> Self {
        Self {
            raw_points,
            max_points,
            percentage: percentage(raw_points, max_points),
            per_category: BTreeMap::new(),
            answered: 0,
            correct: 0,
            failed_calls: 0,
            details: Vec::new(),
        }
    }
}

/// `raw / max * 100`, or `0` when `max == 0`
#[must_use]
pub fn percentage(raw: u32, max: u32) -> f64 {
    if max == 0 {
        0.0
    } else {
        f64::from(raw) * 100.0 / f64::from(max)
    }
}

/// Loose bidirectional substring match on normalized text
#[must_use]
pub fn is_correct(answer: &str, expected: &str) -> bool {
    let answer = answer.trim().to_lowercase();
    let expected = expected.trim().to_lowercase();
    !answer.is_empty() && (answer.contains(&expected) || expected.contains(&answer))
}

/// Anything that yields a capability score
#[async_trait::async_trait]
pub trait Probe: Send + Sync {
    /// Measure over `sample_size` items
    async fn measure(&self, sample_size: usize) -> BenchmarkScore;
}

/// Oracle-backed benchmark over a fixed bank
pub struct CapabilityBenchmark {
    oracle: Arc<dyn Oracle>,
    bank: Vec<BenchmarkItem>,
    retry: RetryPolicy,
    rng: Mutex<StdRng>,
}

impl std::fmt::Debug for CapabilityBenchmark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityBenchmark")
            .field("bank_size", &self.bank.len())
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl CapabilityBenchmark {
    /// Standard bank, default retry policy, OS-seeded sampling
    #[must_use]
    pub fn new(oracle: Arc<dyn Oracle>) -> Self {
        Self {
            oracle,
            bank: standard_bank(),
            retry: RetryPolicy::default(),
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Replace the bank
    ///
    /// # Errors
    /// Items with weights other than 1 or 2, or empty text.
    pub fn with_bank(mut self, bank: Vec<BenchmarkItem>) -> Result<Self, BenchmarkError> {
        for (index, item) in bank.iter().enumerate() {
            if !matches!(item.points, 1 | 2) {
                return Err(BenchmarkError::InvalidWeight {
                    index,
                    points: item.points,
                });
            }
            if item.question.trim().is_empty() {
                return Err(BenchmarkError::EmptyField {
                    index,
                    field: "question",
                });
            }
            if item.expected.is_empty() {
                return Err(BenchmarkError::EmptyField {
                    index,
                    field: "expected answer",
                });
            }
        }
        self.bank = bank;
        Ok(self)
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Seed sampling for reproducible runs
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    #[inline]
    #[must_use]
    pub fn bank_size(&self) -> usize {
        self.bank.len()
    }

    /// Items for one run
    ///
    /// Without replacement when `sample_size < bank_size`, else the whole
    /// bank in order.
    fn sample(&self, sample_size: usize) -> Vec<&BenchmarkItem> {
        if sample_size >= self.bank.len() {
            return self.bank.iter().collect();
        }
        let mut rng = self.rng.lock();
        rand::seq::index::sample(&mut *rng, self.bank.len(), sample_size)
            .into_iter()
            .map(|i| &self.bank[i])
            .collect()
    }

    /// Score the oracle over `sample_size` items
    pub async fn score(&self, sample_size: usize) -> BenchmarkScore {
        let items = self.sample(sample_size);
        let mut score = BenchmarkScore::from_points(0, 0);

        for item in items {
            let entry = score.per_category.entry(item.category).or_default();
            entry.max += item.points;
            score.max_points += item.points;

            let prompt = format!("{PROMPT_PREFIX}{}", item.question);
            let (answer, oracle_failed) = match ask_with_retry(self.oracle.as_ref(), &prompt, &self.retry).await {
                Ok(answer) => (answer.trim().to_lowercase(), false),
                Err(e) => {
                    tracing::warn!(error = %e, question = %item.question, "oracle call failed, scoring item incorrect");
                    score.failed_calls += 1;
                    (String::new(), true)
                }
            };

            let correct = is_correct(&answer, &item.expected);
            let points = if correct { item.points } else { 0 };
            if !answer.is_empty() {
                score.answered += 1;
            }
            if correct {
                score.correct += 1;
                score.raw_points += points;
                if let Some(entry) = score.per_category.get_mut(&item.category) {
                    entry.points += points;
                }
            }

            tracing::debug!(category = %item.category, correct, points, "benchmark item scored");
            score.details.push(ItemResult {
                question: item.question.clone(),
                expected: item.expected.clone(),
                answer: answer.chars().take(ANSWER_PREVIEW_CHARS).collect(),
                correct,
                points,
                category: item.category,
                oracle_failed,
            });
        }

        score.percentage = percentage(score.raw_points, score.max_points);
        tracing::info!(
            raw = score.raw_points,
            max = score.max_points,
            percentage = score.percentage,
            failed_calls = score.failed_calls,
            "benchmark complete"
        );
        score
    }
}

#[async_trait::async_trait]
impl Probe for CapabilityBenchmark {
    async fn measure(&self, sample_size: usize) -> BenchmarkScore {
        self.score(sample_size).await
    }
}
