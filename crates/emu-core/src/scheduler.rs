//! Synchronization points on the shared time line.

use crate::time::EmuTime;

/// Identifies who registered a sync point.
///
/// Tags are chosen by the host; [`SyncTag::CPU`] is reserved for the CPU's
/// own recurring time slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SyncTag(pub u32);

impl SyncTag {
    pub const CPU: Self = Self(0);
}

/// Owner of virtual time and the queue of pending sync points.
///
/// The CPU runs until the earliest sync point and then hands control back
/// to the host, which dispatches the due callbacks.
pub trait Scheduler {
    /// Time of the most recently dispatched sync point.
    fn now(&self) -> EmuTime;

    /// Register a sync point for `tag` at `time`.
    fn schedule_sync_point(&mut self, time: EmuTime, tag: SyncTag);

    /// Remove all pending sync points for `tag`.
    fn cancel_sync_point(&mut self, tag: SyncTag);

    /// Earliest pending sync point, or [`EmuTime::INFINITY`].
    fn next_sync_point(&self) -> EmuTime;
}

/// Sorted in-memory scheduler.
#[derive(Debug, Default)]
pub struct SimpleScheduler {
    points: Vec<(EmuTime, SyncTag)>,
    now: EmuTime,
}

impl SimpleScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return the earliest sync point at or before `time`.
    ///
    /// Advances [`now`](Scheduler::now) to the dispatched point.
    pub fn pop_due(&mut self, time: EmuTime) -> Option<(EmuTime, SyncTag)> {
        let &(at, tag) = self.points.first()?;
        if at > time {
            return None;
        }
        self.points.remove(0);
        self.now = self.now.max(at);
        Some((at, tag))
    }

    /// Number of pending sync points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Whether `tag` has a pending sync point.
    #[must_use]
    pub fn is_pending(&self, tag: SyncTag) -> bool {
        self.points.iter().any(|&(_, t)| t == tag)
    }
}

impl Scheduler for SimpleScheduler {
    fn now(&self) -> EmuTime {
        self.now
    }

    fn schedule_sync_point(&mut self, time: EmuTime, tag: SyncTag) {
        // Equal times dispatch in registration order.
        let pos = self.points.partition_point(|&(at, _)| at <= time);
        self.points.insert(pos, (time, tag));
    }

    fn cancel_sync_point(&mut self, tag: SyncTag) {
        self.points.retain(|&(_, t)| t != tag);
    }

    fn next_sync_point(&self) -> EmuTime {
        self.points.first().map_or(EmuTime::INFINITY, |&(at, _)| at)
    }
}
