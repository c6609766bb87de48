use crate::utils::Slab;

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::task::Waker;
use std::time::Instant;

/// Identity of a pending timer entry.
///
/// Returned by [`Handle::add_timer`](crate::Handle::add_timer) and accepted
/// by [`Handle::cancel_timer`](crate::Handle::cancel_timer). A key outlives
/// its entry harmlessly: once the entry has fired or been removed, the key
/// no longer matches anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerKey {
    index: usize,
    seq: u64,
}

/// A heap node.
///
/// Nodes are never removed from the middle of the heap. Removing a timer
/// frees its slab slot instead, and the node left behind is discarded when
/// it reaches the top.
struct TimerEntry {
    deadline: Instant,
    seq: u64,
    index: usize,
}

impl Eq for TimerEntry {}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Ord for TimerEntry {
    /// Reversed so that `BinaryHeap` pops the earliest deadline first, and
    /// the earliest inserted among equal deadlines.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A live entry.
struct Pending {
    seq: u64,
    waker: Waker,
}

/// Expiry-ordered set of sleeping continuations.
pub(crate) struct TimerQueue {
    /// Every node not yet popped, live or removed.
    heap: BinaryHeap<TimerEntry>,
    /// Live entries, keyed by the index carried in their heap node.
    pending: Slab<Pending>,
    /// Nodes left in `heap` by removed entries.
    tombstones: usize,
    /// Sequence of the next inserted entry.
    next_seq: u64,
}

impl TimerQueue {
    pub(crate) fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            pending: Slab::new(16),
            tombstones: 0,
            next_seq: 0,
        }
    }

    /// Schedules `waker` to be woken at `deadline`.
    pub(crate) fn insert(&mut self, deadline: Instant, waker: Waker) -> TimerKey {
        let seq = self.next_seq;
        self.next_seq += 1;

        let index = self.pending.insert(Pending { seq, waker });
        self.heap.push(TimerEntry {
            deadline,
            seq,
            index,
        });

        TimerKey { index, seq }
    }

    /// Removes the entry identified by `key`, wherever it sits in the order.
    ///
    /// Returns `false` if the entry already fired or was already removed.
    pub(crate) fn remove(&mut self, key: TimerKey) -> bool {
        if !self.is_live(key.index, key.seq) {
            return false;
        }

        self.pending.remove(key.index);
        self.tombstones += 1;

        if self.tombstones > self.pending.len() {
            self.compact();
        }

        true
    }

    /// Replaces the waker of a still-pending entry.
    pub(crate) fn update_waker(&mut self, key: TimerKey, waker: &Waker) {
        if let Some(entry) = self.pending.get_mut(key.index)
            && entry.seq == key.seq
            && !entry.waker.will_wake(waker)
        {
            entry.waker = waker.clone();
        }
    }

    /// Earliest deadline among live entries.
    pub(crate) fn peek_deadline(&mut self) -> Option<Instant> {
        self.prune();
        self.heap.peek().map(|entry| entry.deadline)
    }

    /// Removes every entry due at or before `now` and returns their wakers,
    /// earliest deadline first.
    pub(crate) fn pop_expired(&mut self, now: Instant) -> Vec<Waker> {
        let mut wakers = Vec::new();

        loop {
            self.prune();

            match self.heap.peek() {
                Some(entry) if entry.deadline <= now => {}
                _ => break,
            }

            if let Some(entry) = self.heap.pop()
                && let Some(pending) = self.pending.remove(entry.index)
            {
                wakers.push(pending.waker);
            }
        }

        wakers
    }

    /// Number of live entries.
    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn is_live(&self, index: usize, seq: u64) -> bool {
        self.pending.get(index).is_some_and(|p| p.seq == seq)
    }

    /// Drops removed nodes sitting at the top of the heap.
    fn prune(&mut self) {
        while let Some(top) = self.heap.peek() {
            if self.is_live(top.index, top.seq) {
                break;
            }

            self.heap.pop();
            self.tombstones -= 1;
        }
    }

    /// Rebuilds the heap from live entries only.
    ///
    /// Run once removed nodes outnumber live ones, so the heap stays within
    /// twice the live count plus one, whatever deadlines the removed
    /// entries had.
    fn compact(&mut self) {
        let pending = &self.pending;
        self.heap
            .retain(|entry| pending.get(entry.index).is_some_and(|p| p.seq == entry.seq));
        self.tombstones = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::TimerQueue;

    use std::sync::{Arc, Mutex};
    use std::task::{Wake, Waker};
    use std::time::{Duration, Instant};

    struct Tag(usize, Arc<Mutex<Vec<usize>>>);

    impl Wake for Tag {
        fn wake(self: Arc<Self>) {
            self.1.lock().unwrap().push(self.0);
        }
    }

    fn tagged(id: usize, log: &Arc<Mutex<Vec<usize>>>) -> Waker {
        Waker::from(Arc::new(Tag(id, log.clone())))
    }

    fn fire(queue: &mut TimerQueue, now: Instant) {
        for waker in queue.pop_expired(now) {
            waker.wake();
        }
    }

    #[test]
    fn fires_in_deadline_order_with_stable_ties() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut queue = TimerQueue::new();
        let t0 = Instant::now();

        queue.insert(t0 + Duration::from_millis(20), tagged(0, &log));
        queue.insert(t0 + Duration::from_millis(10), tagged(1, &log));
        queue.insert(t0 + Duration::from_millis(10), tagged(2, &log));
        queue.insert(t0 + Duration::from_millis(5), tagged(3, &log));

        fire(&mut queue, t0 + Duration::from_millis(30));

        assert_eq!(*log.lock().unwrap(), vec![3, 1, 2, 0]);
        assert!(queue.is_empty());
    }

    #[test]
    fn only_expired_entries_fire() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut queue = TimerQueue::new();
        let t0 = Instant::now();

        queue.insert(t0 + Duration::from_millis(5), tagged(0, &log));
        queue.insert(t0 + Duration::from_millis(50), tagged(1, &log));

        fire(&mut queue, t0 + Duration::from_millis(10));

        assert_eq!(*log.lock().unwrap(), vec![0]);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.peek_deadline(), Some(t0 + Duration::from_millis(50)));
    }

    #[test]
    fn removing_a_non_minimal_entry_prevents_it_from_firing() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut queue = TimerQueue::new();
        let t0 = Instant::now();

        queue.insert(t0 + Duration::from_millis(1), tagged(0, &log));
        let middle = queue.insert(t0 + Duration::from_millis(2), tagged(1, &log));
        queue.insert(t0 + Duration::from_millis(3), tagged(2, &log));

        assert!(queue.remove(middle));
        assert_eq!(queue.len(), 2);

        fire(&mut queue, t0 + Duration::from_millis(10));
        assert_eq!(*log.lock().unwrap(), vec![0, 2]);
    }

    #[test]
    fn removing_twice_or_after_firing_is_a_no_op() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut queue = TimerQueue::new();
        let t0 = Instant::now();

        let fired = queue.insert(t0, tagged(0, &log));
        let removed = queue.insert(t0 + Duration::from_secs(1), tagged(1, &log));

        fire(&mut queue, t0);
        assert!(!queue.remove(fired));

        assert!(queue.remove(removed));
        assert!(!queue.remove(removed));
        assert_eq!(queue.peek_deadline(), None);
    }

    #[test]
    fn stale_key_does_not_touch_a_reused_slot() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut queue = TimerQueue::new();
        let t0 = Instant::now();

        let old = queue.insert(t0, tagged(0, &log));
        assert!(queue.remove(old));

        queue.insert(t0, tagged(1, &log));
        assert!(!queue.remove(old));

        fire(&mut queue, t0);
        assert_eq!(*log.lock().unwrap(), vec![1]);
    }

    #[test]
    fn removed_entries_do_not_accumulate_under_an_earlier_timer() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut queue = TimerQueue::new();
        let t0 = Instant::now();

        queue.insert(t0 + Duration::from_secs(60), tagged(0, &log));

        for _ in 0..100_000 {
            let key = queue.insert(t0 + Duration::from_secs(3600), tagged(1, &log));
            assert!(queue.remove(key));
        }

        assert_eq!(queue.len(), 1);
        assert!(queue.heap.len() <= 2 * queue.len() + 1);
        assert_eq!(queue.peek_deadline(), Some(t0 + Duration::from_secs(60)));

        fire(&mut queue, t0 + Duration::from_secs(7200));
        assert_eq!(*log.lock().unwrap(), vec![0]);
        assert!(queue.heap.is_empty());
    }
}
