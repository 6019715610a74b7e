//! Attempt state machine

use serde::{Deserialize, Serialize};

use crate::error::EvolutionError;
use crate::types::AttemptOutcome;

/// Phase of one mutation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptPhase {
    Idle,
    ParseProposal,
    ScreenSafety,
    Snapshot,
    Patch,
    MeasureAfter,
    Decide,
    /// Putting the snapshot back after a failed patch or a non-improvement
    Restore,
    Accepted,
    RolledBack,
    Skipped,
}

impl AttemptPhase {
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        allowed_transitions(self).is_empty()
    }

    /// Outcome for a terminal phase
    #[must_use]
    pub fn outcome(self) -> Option<AttemptOutcome> {
        match self {
            Self::Accepted => Some(AttemptOutcome::Accepted),
            Self::RolledBack => Some(AttemptOutcome::RolledBack),
            Self::Skipped => Some(AttemptOutcome::Skipped),
            _ => None,
        }
    }
}

/// Validates a phase transition.
///
/// # Errors
/// [`EvolutionError::IllegalTransition`] when `to` is not reachable from `from`.
pub fn validate_transition(from: AttemptPhase, to: AttemptPhase) -> Result<(), EvolutionError> {
    if allowed(from, to) {
        Ok(())
    } else {
        Err(EvolutionError::IllegalTransition { from, to })
    }
}

pub fn allowed_transitions(from: AttemptPhase) -> Vec<AttemptPhase> {
    use AttemptPhase::*;
    match from {
        Idle => vec![ParseProposal],
        ParseProposal => vec![ScreenSafety, Skipped],
        ScreenSafety => vec![Snapshot, Skipped],
        Snapshot => vec![Patch, Skipped],
        Patch => vec![MeasureAfter, Restore],
        MeasureAfter => vec![Decide],
        Decide => vec![Accepted, Restore],
        Restore => vec![RolledBack, Skipped],
        Accepted => vec![],
        RolledBack => vec![],
        Skipped => vec![],
    }
}

fn allowed(from: AttemptPhase, to: AttemptPhase) -> bool {
    allowed_transitions(from).into_iter().any(|s| s == to)
}

/// Tracks the current phase and the path taken
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptState {
    phase: AttemptPhase,
    history: Vec<AttemptPhase>,
}

impl Default for AttemptState {
    fn default() -> Self {
        Self::new()
    }
}

impl AttemptState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            phase: AttemptPhase::Idle,
            history: vec![AttemptPhase::Idle],
        }
    }

    #[inline]
    #[must_use]
    pub fn phase(&self) -> AttemptPhase {
        self.phase
    }

    /// Every phase visited, starting with `Idle`
    #[inline]
    #[must_use]
    pub fn history(&self) -> &[AttemptPhase] {
        &self.history
    }

    /// Move to `to`
    ///
    /// # Errors
    /// [`EvolutionError::IllegalTransition`]; the state is left unchanged.
    pub fn advance(&mut self, to: AttemptPhase) -> Result<(), EvolutionError> {
        validate_transition(self.phase, to)?;
        tracing::debug!(from = ?self.phase, to = ?to, "attempt transition");
        self.phase = to;
        self.history.push(to);
        Ok(())
    }
}
