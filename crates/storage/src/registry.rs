//! Participant registry
//!
//! Tracks every participant and the versions it has published, verified
//! or tagged, in creation order. Registration is a side effect of other
//! writes and shares their commit version.

use accord_core::{ParticipantName, VersionId};
use dashmap::DashMap;
use rustc_hash::FxHashSet;

/// Registry entry for one participant
#[derive(Debug, Default)]
struct ParticipantEntry {
    /// Commit that first mentioned the participant
    first_commit: u64,
    /// Versions with the commit that created them, oldest-first
    versions: Vec<(VersionId, u64)>,
    /// Fast membership check for `versions`
    known: FxHashSet<VersionId>,
}

/// Known participants and versions
#[derive(Debug, Default)]
pub struct Registry {
    participants: DashMap<ParticipantName, ParticipantEntry>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `participant` (and optionally `version`) exists as of `commit`
    ///
    /// Re-registering is a no-op; the first commit wins.
    pub fn register(&self, participant: &ParticipantName, version: Option<&VersionId>, commit: u64) {
        let mut entry = self
            .participants
            .entry(participant.clone())
            .or_insert_with(|| ParticipantEntry {
                first_commit: commit,
                ..ParticipantEntry::default()
            });
        if let Some(version) = version {
            if entry.known.insert(version.clone()) {
                entry.versions.push((version.clone(), commit));
            }
        }
    }

    /// Check if the participant is visible at `at`
    pub fn contains(&self, participant: &ParticipantName, at: u64) -> bool {
        self.participants
            .get(participant)
            .map(|e| e.first_commit <= at)
            .unwrap_or(false)
    }

    /// Check if the participant version is visible at `at`
    pub fn has_version(&self, participant: &ParticipantName, version: &VersionId, at: u64) -> bool {
        self.participants
            .get(participant)
            .map(|e| e.versions.iter().any(|(v, c)| v == version && *c <= at))
            .unwrap_or(false)
    }

    /// Versions visible at `at`, oldest-first; `None` for an unknown participant
    pub fn versions(&self, participant: &ParticipantName, at: u64) -> Option<Vec<VersionId>> {
        let entry = self.participants.get(participant)?;
        if entry.first_commit > at {
            return None;
        }
        Some(
            entry
                .versions
                .iter()
                .filter(|(_, c)| *c <= at)
                .map(|(v, _)| v.clone())
                .collect(),
        )
    }

    /// All participants visible at `at`, sorted by name
    pub fn participants(&self, at: u64) -> Vec<ParticipantName> {
        let mut names: Vec<ParticipantName> = self
            .participants
            .iter()
            .filter(|e| e.value().first_commit <= at)
            .map(|e| e.key().clone())
            .collect();
        names.sort();
        names
    }
}
