//! Effect scheduler.
//!
//! A priority queue of pending deadlines: election closes, effect expiries,
//! and persistence retries all go through here. The queue itself is not
//! durable; the Election and Effect rows carry the deadlines, and the engine
//! rebuilds the queue from them on restart. Cancellation is lazy: a vetoed
//! election's close entry is tombstoned and skipped when it surfaces.

use super::UnixTime;
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashSet};

/// What to do when a deadline is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerAction {
    CloseElection(i64),
    ExpireEffect(i64),
}

#[derive(Debug, PartialEq, Eq)]
struct Entry {
    at: UnixTime,
    seq: u64,
    action: TimerAction,
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        // seq breaks ties so same-deadline timers fire in arm order
        self.at.cmp(&other.at).then(self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Default)]
pub struct Scheduler {
    queue: BinaryHeap<Reverse<Entry>>,
    cancelled: HashSet<TimerAction>,
    seq: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a timer for an absolute deadline.
    pub fn arm(&mut self, at: UnixTime, action: TimerAction) {
        // Re-arming un-cancels: a fresh deadline supersedes a tombstone.
        self.cancelled.remove(&action);
        let seq = self.seq;
        self.seq += 1;
        self.queue.push(Reverse(Entry { at, seq, action }));
    }

    /// Cancel a pending timer. The entry is dropped when it surfaces.
    pub fn cancel(&mut self, action: TimerAction) {
        self.cancelled.insert(action);
    }

    /// Earliest pending deadline, skipping cancelled entries.
    pub fn next_deadline(&mut self) -> Option<UnixTime> {
        self.drop_cancelled_head();
        self.queue.peek().map(|Reverse(e)| e.at)
    }

    /// Pop the next action whose deadline is at or before `now`.
    pub fn pop_due(&mut self, now: UnixTime) -> Option<TimerAction> {
        self.drop_cancelled_head();
        let due = matches!(self.queue.peek(), Some(Reverse(entry)) if entry.at <= now);
        if due {
            self.queue.pop().map(|Reverse(entry)| entry.action)
        } else {
            None
        }
    }

    fn drop_cancelled_head(&mut self) {
        while matches!(
            self.queue.peek(),
            Some(Reverse(entry)) if self.cancelled.contains(&entry.action)
        ) {
            if let Some(Reverse(entry)) = self.queue.pop() {
                self.cancelled.remove(&entry.action);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_in_deadline_order() {
        let mut sched = Scheduler::new();
        sched.arm(300, TimerAction::ExpireEffect(1));
        sched.arm(100, TimerAction::CloseElection(1));
        sched.arm(200, TimerAction::CloseElection(2));

        assert_eq!(sched.next_deadline(), Some(100));
        assert_eq!(sched.pop_due(250), Some(TimerAction::CloseElection(1)));
        assert_eq!(sched.pop_due(250), Some(TimerAction::CloseElection(2)));
        assert_eq!(sched.pop_due(250), None);
        assert_eq!(sched.next_deadline(), Some(300));
    }

    #[test]
    fn nothing_due_before_deadline() {
        let mut sched = Scheduler::new();
        sched.arm(100, TimerAction::CloseElection(1));
        assert_eq!(sched.pop_due(99), None);
        assert_eq!(sched.pop_due(100), Some(TimerAction::CloseElection(1)));
    }

    #[test]
    fn cancelled_entries_never_fire() {
        let mut sched = Scheduler::new();
        sched.arm(100, TimerAction::CloseElection(1));
        sched.arm(200, TimerAction::CloseElection(2));
        sched.cancel(TimerAction::CloseElection(1));

        assert_eq!(sched.next_deadline(), Some(200));
        assert_eq!(sched.pop_due(500), Some(TimerAction::CloseElection(2)));
        assert_eq!(sched.pop_due(500), None);
    }

    #[test]
    fn rearm_supersedes_cancel() {
        let mut sched = Scheduler::new();
        sched.arm(100, TimerAction::CloseElection(1));
        sched.cancel(TimerAction::CloseElection(1));
        sched.arm(150, TimerAction::CloseElection(1));

        // the stale 100s entry fires first but both map to the same action,
        // which is why firing is idempotent at the engine level
        assert_eq!(sched.pop_due(500), Some(TimerAction::CloseElection(1)));
    }

    #[test]
    fn same_deadline_fires_in_arm_order() {
        let mut sched = Scheduler::new();
        sched.arm(100, TimerAction::ExpireEffect(9));
        sched.arm(100, TimerAction::CloseElection(4));
        assert_eq!(sched.pop_due(100), Some(TimerAction::ExpireEffect(9)));
        assert_eq!(sched.pop_due(100), Some(TimerAction::CloseElection(4)));
    }
}
