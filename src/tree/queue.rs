//! Priority queue of pending tree-growth work.
//!
//! A binary min-heap keyed by an `i64` priority. The logical capacity grows
//! by doubling and shrinks by halving, never below
//! [`WORK_QUEUE_MIN_CAPACITY`].

use crate::core::constants::WORK_QUEUE_MIN_CAPACITY;
use crate::core::types::Priority;

/// Min-heap of `(priority, item)` entries. Lower priorities pop first; ties
/// pop in no particular order.
#[derive(Debug, Clone)]
pub struct WorkQueue<T> {
    heap: Vec<(Priority, T)>,
    capacity: usize,
}

impl<T> WorkQueue<T> {
    /// Creates an empty queue with at least the minimum capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(WORK_QUEUE_MIN_CAPACITY);
        WorkQueue {
            heap: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Number of queued items
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Returns true if nothing is queued
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Current logical capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Inserts `item` with `priority`.
    pub fn push(&mut self, item: T, priority: Priority) {
        if self.heap.len() >= self.capacity {
            self.capacity *= 2;
            self.heap.reserve(self.capacity - self.heap.len());
        }
        self.heap.push((priority, item));
        self.sift_up(self.heap.len() - 1);
    }

    /// Removes the item with the lowest priority.
    pub fn pop(&mut self) -> Option<T> {
        self.pop_with_priority().map(|(_, item)| item)
    }

    /// Removes the item with the lowest priority and returns it together with
    /// its priority.
    pub fn pop_with_priority(&mut self) -> Option<(Priority, T)> {
        if self.heap.is_empty() {
            return None;
        }
        let last = self.heap.len() - 1;
        self.heap.swap(0, last);
        let top = self.heap.pop();
        if !self.heap.is_empty() {
            self.sift_down(0);
        }

        let halved = self.capacity / 2;
        if self.heap.len() < halved && halved >= WORK_QUEUE_MIN_CAPACITY {
            self.capacity = halved;
            self.heap.shrink_to(halved);
        }

        top
    }

    /// Lowest-priority entry without removing it
    pub fn peek(&self) -> Option<(Priority, &T)> {
        self.heap.first().map(|(priority, item)| (*priority, item))
    }

    /// Moves every entry of `other` into this queue, leaving `other` empty.
    pub fn merge(&mut self, other: &mut WorkQueue<T>) {
        while let Some((priority, item)) = other.pop_with_priority() {
            self.push(item, priority);
        }
    }

    fn sift_up(&mut self, mut child: usize) {
        while child > 0 {
            let parent = (child - 1) / 2;
            if self.heap[child].0 >= self.heap[parent].0 {
                break;
            }
            self.heap.swap(child, parent);
            child = parent;
        }
    }

    fn sift_down(&mut self, mut parent: usize) {
        let len = self.heap.len();
        loop {
            let left = 2 * parent + 1;
            if left >= len {
                break;
            }
            let right = left + 1;
            let smallest = if right < len && self.heap[right].0 < self.heap[left].0 {
                right
            } else {
                left
            };
            if self.heap[smallest].0 >= self.heap[parent].0 {
                break;
            }
            self.heap.swap(parent, smallest);
            parent = smallest;
        }
    }
}

impl<T> Default for WorkQueue<T> {
    fn default() -> Self {
        Self::with_capacity(WORK_QUEUE_MIN_CAPACITY)
    }
}
