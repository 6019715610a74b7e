//! Benchmark behavior against scripted oracles

use std::sync::Arc;

use evo_benchmark::{
    is_correct, standard_bank, CapabilityBenchmark, Oracle, OracleError, Probe, RetryPolicy,
    PROMPT_PREFIX,
};
use parking_lot::Mutex;
use proptest::prelude::*;

/// Answers every question with the bank's expected answer
struct KnowItAll;

#[async_trait::async_trait]
impl Oracle for KnowItAll {
    async fn ask(&self, question: &str) -> Result<String, OracleError> {
        let question = question.strip_prefix(PROMPT_PREFIX).unwrap_or(question);
        standard_bank()
            .into_iter()
            .find(|item| item.question == question)
            .map(|item| format!("The answer is {}.", item.expected))
            .ok_or_else(|| OracleError::Malformed(question.to_string()))
    }
}

/// Rate limits the first `n` calls, then answers "unknown"
struct Throttled {
    remaining: Mutex<u32>,
    prompts: Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl Oracle for Throttled {
    async fn ask(&self, question: &str) -> Result<String, OracleError> {
        self.prompts.lock().push(question.to_string());
        let mut remaining = self.remaining.lock();
        if *remaining > 0 {
            *remaining -= 1;
            return Err(OracleError::RateLimited { retry_after_ms: None });
        }
        Ok("unknown".into())
    }
}

#[tokio::test]
async fn perfect_oracle_scores_full_marks() {
    let benchmark = CapabilityBenchmark::new(Arc::new(KnowItAll));
    let score = benchmark.measure(40).await;

    assert_eq!(score.details.len(), 40);
    assert_eq!(score.raw_points, score.max_points);
    assert!((score.percentage - 100.0).abs() < 1e-9);
    assert_eq!(score.per_category.len(), 4);
    assert_eq!(score.failed_calls, 0);
}

#[tokio::test]
async fn every_prompt_is_prefixed_and_rate_limits_are_retried() {
    let oracle = Arc::new(Throttled {
        remaining: Mutex::new(2),
        prompts: Mutex::new(Vec::new()),
    });
    let benchmark = CapabilityBenchmark::new(oracle.clone())
        .with_retry(RetryPolicy::immediate(3))
        .with_seed(1);

    let score = benchmark.score(5).await;
    assert_eq!(score.failed_calls, 0);
    assert_eq!(score.details.len(), 5);

    let prompts = oracle.prompts.lock();
    assert_eq!(prompts.len(), 7);
    assert!(prompts.iter().all(|p| p.starts_with("Answer briefly: ")));
}

#[tokio::test]
async fn exhausted_retries_mark_item_failed() {
    let oracle = Arc::new(Throttled {
        remaining: Mutex::new(100),
        prompts: Mutex::new(Vec::new()),
    });
    let benchmark = CapabilityBenchmark::new(oracle).with_retry(RetryPolicy::immediate(1));

    let score = benchmark.score(3).await;
    assert_eq!(score.failed_calls, 3);
    assert_eq!(score.raw_points, 0);
    assert!(score.details.iter().all(|d| d.oracle_failed && !d.correct));
}

proptest! {
    #[test]
    fn containment_in_either_direction_counts(
        prefix in "[a-z ]{0,10}",
        expected in "[a-z0-9]{1,10}",
        suffix in "[a-z .]{0,10}",
    ) {
        let answer = format!("{prefix}{expected}{suffix}");
        prop_assert!(is_correct(&answer, &expected));
        prop_assert!(is_correct(&answer.to_uppercase(), &expected));
    }

    #[test]
    fn blank_answers_never_count(blank in "[ \t\n]{0,5}", expected in "[a-z]{1,8}") {
        prop_assert!(!is_correct(&blank, &expected));
    }
}
