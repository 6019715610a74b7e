//! Fixed question bank
//!
//! Forty short-answer items in four categories, weighted 1 or 2 points.
//! Expected answers are lowercase so they can be compared against a
//! lowercased oracle answer directly.

use serde::{Deserialize, Serialize};

/// Question category
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionCategory {
    Arithmetic,
    /// Deductive logic and sequences
    Logic,
    /// Factual recall
    Knowledge,
    /// Causal and scientific reasoning
    Reasoning,
}

impl std::fmt::Display for QuestionCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Arithmetic => "arithmetic",
            Self::Logic => "logic",
            Self::Knowledge => "knowledge",
            Self::Reasoning => "reasoning",
        };
        write!(f, "{name}")
    }
}

/// One scored question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchmarkItem {
    pub question: String,
    /// Normalized (lowercase) expected answer
    pub expected: String,
    pub category: QuestionCategory,
    pub points: u32,
}

impl BenchmarkItem {
    #[must_use]
    pub fn new(
        category: QuestionCategory,
        question: impl Into<String>,
        expected: impl Into<String>,
        points: u32,
    ) -> Self {
        Self {
            question: question.into(),
            expected: expected.into().trim().to_lowercase(),
            category,
            points,
        }
    }
}

use QuestionCategory::{Arithmetic, Knowledge, Logic, Reasoning};

const ITEMS: &[(QuestionCategory, &str, &str, u32)] = &[
    (Arithmetic, "What is 15 + 27?", "42", 1),
    (Arithmetic, "What is 12 × 8?", "96", 1),
    (Arithmetic, "What is 144 ÷ 12?", "12", 1),
    (Arithmetic, "What is 25% of 80?", "20", 1),
    (Arithmetic, "If x + 7 = 15, what is x?", "8", 2),
    (Arithmetic, "What is 2³ (2 to the power of 3)?", "8", 1),
    (Arithmetic, "What is the square root of 64?", "8", 1),
    (Arithmetic, "What is 17 - 9?", "8", 1),
    (Arithmetic, "What is 5 × 5?", "25", 1),
    (Arithmetic, "What is 100 - 37?", "63", 1),
    (Logic, "If all A are B, and all B are C, are all A also C? Answer yes or no.", "yes", 2),
    (
        Logic,
        "If it's raining, the ground is wet. The ground is wet. Is it necessarily raining? Answer yes or no.",
        "no",
        2,
    ),
    (Logic, "True or false: If A implies B, and B is false, then A must be false.", "true", 2),
    (Logic, "What comes next in the sequence: 2, 4, 8, 16, __?", "32", 2),
    (
        Logic,
        "If all dogs are mammals, and all mammals are animals, are all dogs animals? Yes or no.",
        "yes",
        1,
    ),
    (Logic, "What is the next number: 1, 1, 2, 3, 5, 8, __?", "13", 2),
    (Logic, "True or false: A OR B is true if at least one of A or B is true.", "true", 1),
    (
        Logic,
        "If John is taller than Mary, and Mary is taller than Sue, who is the shortest?",
        "sue",
        2,
    ),
    (Logic, "What comes next: A, C, E, G, __?", "i", 1),
    (
        Logic,
        "If NOT(A AND B) is true, what can we conclude? That at least one of A or B is false? Yes or no.",
        "yes",
        2,
    ),
    (Knowledge, "What is the capital of France?", "paris", 1),
    (Knowledge, "What is H2O commonly known as?", "water", 1),
    (Knowledge, "How many planets are in our solar system?", "8", 1),
    (Knowledge, "What is the speed of light in vacuum? (approximately, in km/s)", "300000", 1),
    (Knowledge, "What is the chemical symbol for gold?", "au", 1),
    (Knowledge, "Who wrote 'Romeo and Juliet'?", "shakespeare", 1),
    (Knowledge, "What year did World War II end?", "1945", 1),
    (Knowledge, "What is the largest ocean on Earth?", "pacific", 1),
    (Knowledge, "How many continents are there?", "7", 1),
    (Knowledge, "What is the smallest prime number?", "2", 1),
    (Reasoning, "Explain in one sentence why the sky is blue.", "scattering", 2),
    (Reasoning, "What is the main difference between correlation and causation?", "correlation", 2),
    (Reasoning, "Why does ice float on water? One word answer.", "density", 2),
    (
        Reasoning,
        "What scientific method involves making observations and forming hypotheses?",
        "scientific",
        1,
    ),
    (Reasoning, "If you heat water to 100°C at sea level, what happens?", "boils", 1),
    (Reasoning, "What do we call the process of a solid turning directly into a gas?", "sublimation", 2),
    (Reasoning, "What force keeps planets in orbit around the sun?", "gravity", 1),
    (Reasoning, "What is the term for energy in motion?", "kinetic", 1),
    (Reasoning, "What do we call a testable prediction?", "hypothesis", 1),
    (Reasoning, "What is the opposite of matter?", "antimatter", 2),
];

/// The standard bank, in fixed order
#[must_use]
pub fn standard_bank() -> Vec<BenchmarkItem> {
    ITEMS
        .iter()
        .map(|&(category, question, expected, points)| {
            BenchmarkItem::new(category, question, expected, points)
        })
        .collect()
}
