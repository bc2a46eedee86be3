//! Append-only version chains
//!
//! Every store keeps, per key, the ordered list of entries written for
//! that key. Each entry is stamped with the commit version that made it.
//! A reader holding snapshot version `at` sees exactly the entries with
//! `commit <= at`.
//!
//! Entries are appended oldest-first and never removed. Superseded
//! entries stay in the chain for audit.

/// An entry stamped with the commit version that created it
#[derive(Debug, Clone, PartialEq)]
pub struct Committed<T> {
    /// Global commit version
    pub commit: u64,
    /// Stored value
    pub value: T,
}

/// Append-only list of committed entries for one key
#[derive(Debug, Clone)]
pub struct VersionChain<T> {
    /// Entries oldest-first; commits strictly increase
    entries: Vec<Committed<T>>,
}

impl<T> VersionChain<T> {
    /// Create an empty chain
    pub fn new() -> Self {
        Self {
            entries: Vec::with_capacity(2),
        }
    }

    /// Append a new entry
    ///
    /// Callers hold the key's shard lock while allocating `commit`, so
    /// commits arrive in increasing order.
    #[inline]
    pub fn push(&mut self, commit: u64, value: T) {
        debug_assert!(
            self.entries.last().map_or(true, |e| e.commit < commit),
            "commit versions must increase within a chain"
        );
        self.entries.push(Committed { commit, value });
    }

    /// Entries visible at snapshot version `at`, oldest-first
    pub fn visible_at(&self, at: u64) -> &[Committed<T>] {
        // commits are sorted, so the visible prefix ends at the first newer entry
        let end = self.entries.partition_point(|e| e.commit <= at);
        &self.entries[..end]
    }

    /// Newest entry visible at `at`
    #[inline]
    pub fn latest_at(&self, at: u64) -> Option<&Committed<T>> {
        self.visible_at(at).last()
    }

    /// Newest entry regardless of snapshot
    #[inline]
    pub fn latest(&self) -> Option<&Committed<T>> {
        self.entries.last()
    }

    /// Oldest entry visible at `at`
    #[inline]
    pub fn first_at(&self, at: u64) -> Option<&Committed<T>> {
        self.visible_at(at).first()
    }

    /// All entries, oldest-first
    pub fn entries(&self) -> &[Committed<T>] {
        &self.entries
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the chain has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for VersionChain<T> {
    fn default() -> Self {
        Self::new()
    }
}
