//! Cancellable one-shot and repeating timers.
//!
//! The queue holds deadlines only; nothing runs on its own. The owner asks
//! [`TimerQueue::pop_due`] for expired timers and handles each one, passing
//! the timer's own deadline as "now" so that a large clock jump replays the
//! firings in the order and at the times they were due.

use std::time::Duration;

/// Handle used to cancel an armed timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

#[derive(Debug)]
struct Entry<K> {
    id: TimerId,
    deadline: Duration,
    every: Option<Duration>,
    key: K,
}

/// A due timer returned by [`TimerQueue::pop_due`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fired<K> {
    /// Timer that fired.
    pub id: TimerId,
    /// Deadline the timer was due at.
    pub at: Duration,
    /// Payload supplied when the timer was armed.
    pub key: K,
}

/// Set of armed timers ordered by deadline.
#[derive(Debug)]
pub struct TimerQueue<K> {
    next_id: u64,
    entries: Vec<Entry<K>>,
}

impl<K: Clone> TimerQueue<K> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }

    /// Arms a timer that fires once, `delay` after `now`.
    pub fn arm_once(&mut self, now: Duration, delay: Duration, key: K) -> TimerId {
        self.push(now.saturating_add(delay), None, key)
    }

    /// Arms a timer that fires every `every` starting `every` after `now`.
    ///
    /// Intervals shorter than one millisecond are raised to one millisecond.
    pub fn arm_repeating(&mut self, now: Duration, every: Duration, key: K) -> TimerId {
        let every = every.max(Duration::from_millis(1));
        self.push(now.saturating_add(every), Some(every), key)
    }

    /// Disarms a timer. Returns `false` if it was not armed.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() != before
    }

    /// Removes and returns the earliest timer due at or before `now`.
    ///
    /// Ties fire in arm order. A repeating timer is re-armed one interval
    /// after the deadline it fired for.
    pub fn pop_due(&mut self, now: Duration) -> Option<Fired<K>> {
        let idx = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.deadline <= now)
            .min_by_key(|(_, e)| (e.deadline, e.id.0))
            .map(|(i, _)| i)?;

        let entry = &mut self.entries[idx];
        let fired = Fired {
            id: entry.id,
            at: entry.deadline,
            key: entry.key.clone(),
        };
        match entry.every {
            Some(every) => entry.deadline = entry.deadline.saturating_add(every),
            None => {
                self.entries.remove(idx);
            }
        }
        Some(fired)
    }

    /// Earliest armed deadline.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.entries.iter().map(|e| e.deadline).min()
    }

    /// Whether `id` is still armed.
    pub fn is_armed(&self, id: TimerId) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    /// Number of armed timers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no timer is armed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, deadline: Duration, every: Option<Duration>, key: K) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.entries.push(Entry {
            id,
            deadline,
            every,
            key,
        });
        id
    }
}

impl<K: Clone> Default for TimerQueue<K> {
    fn default() -> Self {
        Self::new()
    }
}
