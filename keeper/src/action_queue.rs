//! Pending-action priority queue.
//!
//! Orders pending actions by their not-before gate so the cycle surfaces
//! the longest-due work first. Condition-triggered actions usually carry a
//! gate of zero and therefore sort ahead of far-future timers.

use priority_queue::PriorityQueue;
use std::cmp::Reverse;

#[derive(Default)]
pub struct PendingQueue {
    inner: PriorityQueue<u64, Reverse<u64>>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from the engine's current pending set.
    pub fn sync(&mut self, pending: impl Iterator<Item = (u64, u64)>) {
        self.inner.clear();
        for (id, due) in pending {
            self.inner.push(id, Reverse(due));
        }
    }

    pub fn remove(&mut self, id: u64) {
        self.inner.remove(&id);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// `(id, due)` of the most overdue pending action.
    pub fn peek(&self) -> Option<(u64, u64)> {
        self.inner.peek().map(|(&id, &Reverse(due))| (id, due))
    }

    /// Sort a set of ready IDs by queue priority (most overdue first).
    pub fn order(&self, ids: &[u64]) -> Vec<u64> {
        let mut ordered: Vec<u64> = ids.to_vec();
        ordered.sort_by_key(|id| self.inner.get_priority(id).copied().unwrap_or(Reverse(0)).0);
        ordered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orders_by_due_time() {
        let mut q = PendingQueue::new();
        q.sync([(1, 500), (2, 0), (3, 100)].into_iter());
        assert_eq!(q.len(), 3);
        assert_eq!(q.peek(), Some((2, 0)));
        assert_eq!(q.order(&[1, 3, 2]), vec![2, 3, 1]);

        q.remove(2);
        assert_eq!(q.peek(), Some((3, 100)));
    }
}
