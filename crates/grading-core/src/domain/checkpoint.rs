//! Resumable job checkpoint and its sealed, versioned persisted form.

use serde::{Deserialize, Serialize};

use crate::domain::digest::compute_digest;
use crate::domain::error::CheckpointError;
use crate::domain::score::CorrectorResult;

/// Current persisted checkpoint schema version.
pub const CHECKPOINT_VERSION: u32 = 1;

/// The three stage slots of a committee job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CorrectorSlot {
    First,
    Second,
    Supervisor,
}

impl CorrectorSlot {
    pub fn as_str(self) -> &'static str {
        match self {
            CorrectorSlot::First => "corrector1",
            CorrectorSlot::Second => "corrector2",
            CorrectorSlot::Supervisor => "supervisor",
        }
    }
}

impl std::fmt::Display for CorrectorSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Corrector results already completed for a job.
///
/// A populated slot is never recomputed on a later attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corrector1: Option<CorrectorResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corrector2: Option<CorrectorResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supervisor: Option<CorrectorResult>,
}

impl Checkpoint {
    pub fn get(&self, slot: CorrectorSlot) -> Option<&CorrectorResult> {
        match slot {
            CorrectorSlot::First => self.corrector1.as_ref(),
            CorrectorSlot::Second => self.corrector2.as_ref(),
            CorrectorSlot::Supervisor => self.supervisor.as_ref(),
        }
    }

    pub fn set(&mut self, slot: CorrectorSlot, result: CorrectorResult) {
        let target = match slot {
            CorrectorSlot::First => &mut self.corrector1,
            CorrectorSlot::Second => &mut self.corrector2,
            CorrectorSlot::Supervisor => &mut self.supervisor,
        };
        *target = Some(result);
    }

    pub fn is_filled(&self, slot: CorrectorSlot) -> bool {
        self.get(slot).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.corrector1.is_none() && self.corrector2.is_none() && self.supervisor.is_none()
    }

    /// Fill every empty slot from `other`; populated slots are kept.
    pub fn fill_missing_from(&mut self, other: Checkpoint) {
        self.corrector1 = self.corrector1.take().or(other.corrector1);
        self.corrector2 = self.corrector2.take().or(other.corrector2);
        self.supervisor = self.supervisor.take().or(other.supervisor);
    }

    /// Names of the populated slots, in stage order.
    pub fn filled_slots(&self) -> Vec<&'static str> {
        [
            CorrectorSlot::First,
            CorrectorSlot::Second,
            CorrectorSlot::Supervisor,
        ]
        .into_iter()
        .filter(|slot| self.is_filled(*slot))
        .map(CorrectorSlot::as_str)
        .collect()
    }

    /// Wrap in a versioned envelope carrying a digest of the content.
    pub fn seal(&self) -> Result<SealedCheckpoint, CheckpointError> {
        let value = serde_json::to_value(self)?;
        Ok(SealedCheckpoint {
            version: CHECKPOINT_VERSION,
            digest: compute_digest(&value)?,
            checkpoint: value,
        })
    }

    /// Seal and encode as the JSON value handed to the record store.
    pub fn to_value(&self) -> Result<serde_json::Value, CheckpointError> {
        Ok(serde_json::to_value(self.seal()?)?)
    }

    /// Decode and verify a persisted envelope.
    pub fn from_value(value: serde_json::Value) -> Result<Self, CheckpointError> {
        let sealed: SealedCheckpoint = serde_json::from_value(value)?;
        sealed.open()
    }
}

/// Persisted checkpoint envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SealedCheckpoint {
    pub version: u32,
    pub digest: String,
    pub checkpoint: serde_json::Value,
}

impl SealedCheckpoint {
    /// Verify version and digest, then decode the content.
    pub fn open(self) -> Result<Checkpoint, CheckpointError> {
        if self.version != CHECKPOINT_VERSION {
            return Err(CheckpointError::UnsupportedVersion {
                found: self.version,
                expected: CHECKPOINT_VERSION,
            });
        }
        let actual = compute_digest(&self.checkpoint)?;
        if actual != self.digest {
            return Err(CheckpointError::DigestMismatch {
                expected: self.digest,
                actual,
            });
        }
        Ok(serde_json::from_value(self.checkpoint)?)
    }
}
