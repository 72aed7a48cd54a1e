// timer.rs -- single-threaded timer queue
//
// All deferred work in the interceptor goes through one of these queues,
// pumped by the game thread between packets. Timers fire in strict goal-time
// order; ties break by insertion order. Clearing a handle detaches the entry:
// a cleared timer firing is a no-op, and double-clear is a no-op.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

/// Delays above this are clamped. i32 millisecond arithmetic upstream of us
/// wraps past this point.
pub const MAX_DELAY_MS: i64 = i32::MAX as i64;

/// Identifies a scheduled entry. Copyable so callers can stash it in state
/// structs without lifetime plumbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle {
    id: u64,
    /// Absolute time the entry is due, after clamping.
    pub goal: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Slot {
    goal: i64,
    id: u64,
}

/// A goal-time-ordered queue of pending tasks of type `T`.
#[derive(Debug)]
pub struct TimerQueue<T> {
    heap: BinaryHeap<Reverse<Slot>>,
    tasks: HashMap<u64, T>,
    next_id: u64,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            tasks: HashMap::new(),
            next_id: 0,
        }
    }

    /// Schedule `task` to fire `delay_ms` after `now`. Negative delays fire
    /// on the next pump. Overlong delays clamp to [`MAX_DELAY_MS`].
    pub fn schedule(&mut self, now: i64, delay_ms: i64, task: T) -> TimerHandle {
        let delay = if delay_ms > MAX_DELAY_MS {
            log::warn!("timer delay {}ms clamped to {}ms", delay_ms, MAX_DELAY_MS);
            MAX_DELAY_MS
        } else {
            delay_ms.max(0)
        };
        let id = self.next_id;
        self.next_id += 1;
        let goal = now + delay;
        self.heap.push(Reverse(Slot { goal, id }));
        self.tasks.insert(id, task);
        TimerHandle { id, goal }
    }

    /// Detach a scheduled entry. Safe to call more than once and safe to
    /// call on handles that already fired.
    pub fn clear(&mut self, handle: TimerHandle) {
        self.tasks.remove(&handle.id);
    }

    pub fn is_scheduled(&self, handle: TimerHandle) -> bool {
        self.tasks.contains_key(&handle.id)
    }

    /// Pop the next entry due at or before `now`, skipping cleared slots.
    pub fn pop_due(&mut self, now: i64) -> Option<(TimerHandle, T)> {
        while let Some(Reverse(slot)) = self.heap.peek().copied() {
            if slot.goal > now {
                return None;
            }
            self.heap.pop();
            if let Some(task) = self.tasks.remove(&slot.id) {
                return Some((TimerHandle { id: slot.id, goal: slot.goal }, task));
            }
            // cleared slot, keep draining
        }
        None
    }

    /// Goal time of the earliest live entry, if any.
    pub fn next_deadline(&mut self) -> Option<i64> {
        while let Some(Reverse(slot)) = self.heap.peek().copied() {
            if self.tasks.contains_key(&slot.id) {
                return Some(slot.goal);
            }
            self.heap.pop();
        }
        None
    }

    pub fn pending(&self) -> usize {
        self.tasks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_in_goal_order() {
        let mut q = TimerQueue::new();
        q.schedule(0, 50, "b");
        q.schedule(0, 10, "a");
        q.schedule(0, 90, "c");
        assert_eq!(q.pop_due(100).unwrap().1, "a");
        assert_eq!(q.pop_due(100).unwrap().1, "b");
        assert_eq!(q.pop_due(100).unwrap().1, "c");
        assert!(q.pop_due(100).is_none());
    }

    #[test]
    fn test_ties_break_by_insertion() {
        let mut q = TimerQueue::new();
        q.schedule(0, 25, 1);
        q.schedule(0, 25, 2);
        q.schedule(0, 25, 3);
        assert_eq!(q.pop_due(25).unwrap().1, 1);
        assert_eq!(q.pop_due(25).unwrap().1, 2);
        assert_eq!(q.pop_due(25).unwrap().1, 3);
    }

    #[test]
    fn test_not_due_yet() {
        let mut q = TimerQueue::new();
        q.schedule(0, 100, ());
        assert!(q.pop_due(99).is_none());
        assert!(q.pop_due(100).is_some());
    }

    #[test]
    fn test_clear_is_idempotent() {
        let mut q = TimerQueue::new();
        let h = q.schedule(0, 10, ());
        q.clear(h);
        q.clear(h);
        assert!(q.pop_due(100).is_none());
        assert_eq!(q.pending(), 0);
    }

    #[test]
    fn test_cleared_entry_does_not_fire() {
        let mut q = TimerQueue::new();
        let a = q.schedule(0, 10, "a");
        q.schedule(0, 20, "b");
        q.clear(a);
        assert_eq!(q.pop_due(100).unwrap().1, "b");
    }

    #[test]
    fn test_overlong_delay_clamps() {
        let mut q = TimerQueue::new();
        let h = q.schedule(0, i64::MAX, ());
        assert_eq!(h.goal, MAX_DELAY_MS);
    }

    #[test]
    fn test_negative_delay_fires_immediately() {
        let mut q = TimerQueue::new();
        let h = q.schedule(500, -20, ());
        assert_eq!(h.goal, 500);
        assert!(q.pop_due(500).is_some());
    }

    #[test]
    fn test_next_deadline_skips_cleared() {
        let mut q = TimerQueue::new();
        let a = q.schedule(0, 10, ());
        q.schedule(0, 30, ());
        q.clear(a);
        assert_eq!(q.next_deadline(), Some(30));
    }
}
