//! Global commit clock
//!
//! One monotonic counter for the entire broker. Every write allocates a
//! commit version while holding its key's shard lock, applies its
//! entries stamped with that version, releases the lock, and then
//! publishes the version.
//!
//! Versions become visible strictly in order: publishing version `n`
//! waits until `n - 1` is visible. A snapshot taken at the visible
//! watermark therefore never misses a write with a smaller version, and
//! never sees a half-applied write with a larger one.
//!
//! # Memory Ordering
//!
//! The watermark is guarded by a `parking_lot::Mutex`, which provides the
//! happens-before edge between a writer's entries and readers that
//! observe the published watermark.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};

/// Allocates and publishes commit versions
#[derive(Debug)]
pub struct CommitClock {
    /// Last allocated version
    allocated: AtomicU64,
    /// Highest version visible to readers
    visible: Mutex<u64>,
    /// Signalled every time `visible` advances
    advanced: Condvar,
}

impl CommitClock {
    /// Create a clock starting at version 0 (nothing committed)
    pub fn new() -> Self {
        Self {
            allocated: AtomicU64::new(0),
            visible: Mutex::new(0),
            advanced: Condvar::new(),
        }
    }

    /// Allocate the next version
    ///
    /// The returned ticket publishes the version when dropped, including
    /// on early return, so a failed write can never stall later writers.
    pub fn begin(&self) -> CommitTicket<'_> {
        let version = self.allocated.fetch_add(1, Ordering::AcqRel) + 1;
        CommitTicket {
            clock: self,
            version,
        }
    }

    /// Highest version whose writes are fully applied
    #[inline]
    pub fn visible(&self) -> u64 {
        *self.visible.lock()
    }

    /// Last allocated version (may not be visible yet)
    #[inline]
    pub fn allocated(&self) -> u64 {
        self.allocated.load(Ordering::Acquire)
    }

    fn publish(&self, version: u64) {
        let mut visible = self.visible.lock();
        while *visible + 1 < version {
            self.advanced.wait(&mut visible);
        }
        if *visible < version {
            *visible = version;
        }
        self.advanced.notify_all();
    }
}

impl Default for CommitClock {
    fn default() -> Self {
        Self::new()
    }
}

/// An allocated, not yet visible, commit version
///
/// Drop the shard guard before the ticket: publishing may wait for an
/// earlier writer, and that writer may need a different shard.
#[derive(Debug)]
pub struct CommitTicket<'a> {
    clock: &'a CommitClock,
    version: u64,
}

impl CommitTicket<'_> {
    /// The allocated version
    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }
}

impl Drop for CommitTicket<'_> {
    fn drop(&mut self) {
        self.clock.publish(self.version);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_sequential_commits() {
        let clock = CommitClock::new();
        assert_eq!(clock.visible(), 0);
        {
            let ticket = clock.begin();
            assert_eq!(ticket.version(), 1);
            assert_eq!(clock.visible(), 0);
        }
        assert_eq!(clock.visible(), 1);
        drop(clock.begin());
        assert_eq!(clock.visible(), 2);
        assert_eq!(clock.allocated(), 2);
    }

    #[test]
    fn test_out_of_order_publish_waits() {
        let clock = Arc::new(CommitClock::new());
        let first = clock.begin();
        assert_eq!(first.version(), 1);

        let c2 = Arc::clone(&clock);
        let handle = thread::spawn(move || {
            let second = c2.begin();
            assert_eq!(second.version(), 2);
            drop(second);
            c2.visible()
        });

        // version 2 cannot become visible before version 1
        thread::sleep(std::time::Duration::from_millis(20));
        assert_eq!(clock.visible(), 0);
        drop(first);
        assert_eq!(handle.join().unwrap(), 2);
        assert_eq!(clock.visible(), 2);
    }

    #[test]
    fn test_concurrent_commits_all_visible() {
        let clock = Arc::new(CommitClock::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let clock = Arc::clone(&clock);
                thread::spawn(move || {
                    for _ in 0..100 {
                        drop(clock.begin());
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(clock.visible(), 800);
    }
}
