//! Testing utilities for the Evolve workspace
//!
//! Shared fixtures: a temp project directory, a probe that replays scripted
//! scores, and an oracle that answers from a table.

#![allow(missing_docs)]

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};

use evo_benchmark::{standard_bank, BenchmarkScore, Oracle, OracleError, Probe, PROMPT_PREFIX};
use evo_patch::MutableFiles;
use parking_lot::Mutex;
use tempfile::TempDir;

/// Project directory removed on drop
#[derive(Debug)]
pub struct TempProject {
    dir: TempDir,
}

impl Default for TempProject {
    fn default() -> Self {
        Self::new()
    }
}

impl TempProject {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    /// Write `relative` and return self
    #[must_use]
    pub fn with_file(self, relative: &str, content: &str) -> Self {
        self.write(relative, content);
        self
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    pub fn write(&self, relative: &str, content: &str) {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    pub fn read(&self, relative: &str) -> String {
        std::fs::read_to_string(self.path(relative)).unwrap()
    }

    pub fn read_bytes(&self, relative: &str) -> Vec<u8> {
        std::fs::read(self.path(relative)).unwrap()
    }

    pub fn scope(&self, entries: &[&str]) -> MutableFiles {
        MutableFiles::new(self.root(), entries).unwrap()
    }
}

/// Probe replaying scores in order, repeating the last one
#[derive(Debug)]
pub struct ScriptedProbe {
    scores: Mutex<VecDeque<(u32, u32)>>,
    last: Mutex<(u32, u32)>,
    sample_sizes: Mutex<Vec<usize>>,
}

impl ScriptedProbe {
    /// Scores as whole percentages
    pub fn new(percentages: &[u32]) -> Self {
        let points: Vec<(u32, u32)> = percentages.iter().map(|&p| (p, 100)).collect();
        Self::from_points(&points)
    }

    /// Scores as `(raw, max)` point pairs
    pub fn from_points(points: &[(u32, u32)]) -> Self {
        Self {
            scores: Mutex::new(points.iter().copied().collect()),
            last: Mutex::new(points.last().copied().unwrap_or((0, 100))),
            sample_sizes: Mutex::new(Vec::new()),
        }
    }

    /// Number of measurements taken
    pub fn calls(&self) -> usize {
        self.sample_sizes.lock().len()
    }

    /// Sample size of each measurement, in order
    pub fn sample_sizes(&self) -> Vec<usize> {
        self.sample_sizes.lock().clone()
    }
}

#[async_trait::async_trait]
impl Probe for ScriptedProbe {
    async fn measure(&self, sample_size: usize) -> BenchmarkScore {
        self.sample_sizes.lock().push(sample_size);
        let (raw, max) = match self.scores.lock().pop_front() {
            Some(next) => {
                *self.last.lock() = next;
                next
            }
            None => *self.last.lock(),
        };
        BenchmarkScore::from_points(raw, max)
    }
}

/// Oracle answering from a question table
///
/// Questions are matched after stripping the benchmark prompt prefix.
/// Unknown questions get the fallback answer, or fail as unavailable.
#[derive(Debug, Default)]
pub struct ScriptedOracle {
    answers: HashMap<String, String>,
    fallback: Option<String>,
    throttles: Mutex<u32>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Knows every expected answer of the standard bank
    pub fn answering_bank() -> Self {
        standard_bank()
            .into_iter()
            .fold(Self::new(), |oracle, item| oracle.with_answer(&item.question, &item.expected))
    }

    #[must_use]
    pub fn with_answer(mut self, question: &str, answer: &str) -> Self {
        self.answers.insert(question.to_string(), answer.to_string());
        self
    }

    #[must_use]
    pub fn with_fallback(mut self, answer: &str) -> Self {
        self.fallback = Some(answer.to_string());
        self
    }

    /// Rate-limit the next `count` calls
    #[must_use]
    pub fn with_throttles(self, count: u32) -> Self {
        *self.throttles.lock() = count;
        self
    }

    /// Every prompt received, including throttled ones
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait::async_trait]
impl Oracle for ScriptedOracle {
    async fn ask(&self, prompt: &str) -> Result<String, OracleError> {
        self.prompts.lock().push(prompt.to_string());
        {
            let mut throttles = self.throttles.lock();
            if *throttles > 0 {
                *throttles -= 1;
                return Err(OracleError::RateLimited { retry_after_ms: None });
            }
        }

        let question = prompt.strip_prefix(PROMPT_PREFIX).unwrap_or(prompt);
        self.answers
            .get(question)
            .or(self.fallback.as_ref())
            .cloned()
            .ok_or_else(|| OracleError::Unavailable(format!("no scripted answer for {question:?}")))
    }
}
