//! Attempt ledger
//!
//! Append-only list of [`EvolutionRecord`]s for one batch. Each record is
//! sealed with a sha256 over its contents and the previous record's hash, so
//! an edited or reordered entry breaks [`Ledger::verify_integrity`].

use sha2::{Digest, Sha256};

use crate::error::EvolutionError;
use crate::types::EvolutionRecord;

/// Hash preceding the first record
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ledger {
    records: Vec<EvolutionRecord>,
}

impl Ledger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap records loaded from elsewhere; call [`verify_integrity`](Self::verify_integrity) before trusting them
    #[must_use]
    pub fn from_records(records: Vec<EvolutionRecord>) -> Self {
        Self { records }
    }

    /// Seal and append `record`
    pub fn append(&mut self, mut record: EvolutionRecord) -> &EvolutionRecord {
        record.prev_hash = self.last_hash().to_string();
        record.hash = compute_hash(&record);
        tracing::debug!(
            attempt = %record.attempt_id,
            hash = &record.hash[..12],
            "ledger record appended"
        );
        self.records.push(record);
        &self.records[self.records.len() - 1]
    }

    #[inline]
    #[must_use]
    pub fn records(&self) -> &[EvolutionRecord] {
        &self.records
    }

    #[must_use]
    pub fn into_records(self) -> Vec<EvolutionRecord> {
        self.records
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Hash of the last record, or [`GENESIS_HASH`]
    #[must_use]
    pub fn last_hash(&self) -> &str {
        self.records.last().map_or(GENESIS_HASH, |r| r.hash.as_str())
    }

    /// Walk the chain from the genesis hash
    ///
    /// # Errors
    /// [`EvolutionError::LedgerIntegrity`] with the index of the first bad record.
    pub fn verify_integrity(&self) -> Result<(), EvolutionError> {
        let mut prev = GENESIS_HASH;
        for (index, record) in self.records.iter().enumerate() {
            if record.prev_hash != prev || record.hash != compute_hash(record) {
                return Err(EvolutionError::LedgerIntegrity { index });
            }
            prev = &record.hash;
        }
        Ok(())
    }
}

fn compute_hash(record: &EvolutionRecord) -> String {
    let mut hasher = Sha256::new();
    hasher.update(record.attempt_id.0.to_bytes());
    hasher.update(record.timestamp.to_rfc3339().as_bytes());
    hasher.update([0]);
    hasher.update(record.target_file.to_string_lossy().as_bytes());
    hasher.update([0]);

    let proposal = &record.proposal;
    hasher.update(proposal.description.as_bytes());
    hasher.update([0]);
    hasher.update(proposal.rationale.as_bytes());
    hasher.update([0]);
    hasher.update(proposal.category.to_string().as_bytes());
    hasher.update([0]);
    for fragment in &proposal.fragments {
        hasher.update(fragment.raw_text.as_bytes());
        hasher.update([0]);
    }

    hasher.update(format!("{:?}", record.risk_tier).as_bytes());
    for pattern in &record.matched_patterns {
        hasher.update(pattern.as_bytes());
        hasher.update([0]);
    }
    for patch in &record.patches {
        hasher.update(format!("{:?}:{}", patch.method, patch.applied).as_bytes());
        hasher.update(patch.error.as_deref().unwrap_or_default().as_bytes());
        hasher.update([0]);
    }

    hasher.update(record.score_before.to_le_bytes());
    hasher.update(record.score_after.map_or([0xff; 8], f64::to_le_bytes));
    hasher.update(record.delta.map_or([0xff; 8], f64::to_le_bytes));
    hasher.update(record.outcome.to_string().as_bytes());
    hasher.update([0]);
    if let Some(reason) = &record.skip_reason {
        hasher.update(reason.to_string().as_bytes());
    }
    hasher.update([0]);
    hasher.update(record.prev_hash.as_bytes());
    hex::encode(hasher.finalize())
}
