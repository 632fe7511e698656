//! Cancellable deferred actions scheduled against the logical session clock.
//!
//! The turn controller never blocks waiting for silence or for an interruption
//! to be confirmed. It schedules an action for a future [`Timestamp`] and the
//! host calls [`DeferredActions::pop_due`] as time advances. Deadlines are
//! inclusive: an action scheduled for `t` is due when the clock reads `t`.

use crate::pipeline::messages::Timestamp;
use std::collections::{BTreeMap, HashMap};

/// Handle for cancelling a scheduled action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

/// A queue of actions ordered by deadline, then by scheduling order.
#[derive(Debug)]
pub struct DeferredActions<A> {
    next_id: u64,
    queue: BTreeMap<(Timestamp, u64), A>,
    deadlines: HashMap<u64, Timestamp>,
}

impl<A> Default for DeferredActions<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> DeferredActions<A> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            queue: BTreeMap::new(),
            deadlines: HashMap::new(),
        }
    }

    /// Schedule `action` to become due at `deadline`.
    pub fn schedule(&mut self, deadline: Timestamp, action: A) -> TimerId {
        let id = self.next_id;
        self.next_id += 1;
        self.queue.insert((deadline, id), action);
        self.deadlines.insert(id, deadline);
        TimerId(id)
    }

    /// Cancel a scheduled action. Returns `false` if it already fired or was cancelled.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        match self.deadlines.remove(&id.0) {
            Some(deadline) => self.queue.remove(&(deadline, id.0)).is_some(),
            None => false,
        }
    }

    /// Whether `id` is still waiting to fire.
    pub fn is_pending(&self, id: TimerId) -> bool {
        self.deadlines.contains_key(&id.0)
    }

    /// Remove and return the earliest action whose deadline is at or before `now`.
    pub fn pop_due(&mut self, now: Timestamp) -> Option<(TimerId, Timestamp, A)> {
        let (&(deadline, id), _) = self.queue.first_key_value()?;
        if deadline > now {
            return None;
        }
        let action = self.queue.remove(&(deadline, id))?;
        self.deadlines.remove(&id);
        Some((TimerId(id), deadline, action))
    }

    /// Deadline of the earliest pending action.
    pub fn next_deadline(&self) -> Option<Timestamp> {
        self.queue.keys().next().map(|(deadline, _)| *deadline)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Drop every pending action.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.deadlines.clear();
    }
}
