//! Bounded single-producer/single-consumer FIFO with valid/ready semantics.
//!
//! Queues are part of the step snapshot. Within a step the producer checks
//! [`can_push`](BoundedQueue::can_push) and the consumer checks
//! [`front`](BoundedQueue::front) against the previous snapshot; the pops and
//! pushes are then applied together with [`advance`](BoundedQueue::advance),
//! so an entry pushed in one step is visible to the consumer in the next.

use std::collections::VecDeque;

/// A fixed-capacity FIFO.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoundedQueue<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T: Clone> BoundedQueue<T> {
    /// Creates an empty queue holding at most `capacity` items.
    pub fn new(capacity: usize) -> Self {
        debug_assert!(capacity > 0, "queue capacity must be non-zero");
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Maximum number of items.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the queue holds no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns true if the producer side would accept an item (sink ready).
    pub fn can_push(&self) -> bool {
        self.items.len() < self.capacity
    }

    /// Returns the head item, if any (source valid).
    pub fn front(&self) -> Option<&T> {
        self.items.front()
    }

    /// Computes the next-step queue from this snapshot.
    ///
    /// `pop` removes the head and `push` appends an item. Both handshakes
    /// are judged on `self`: a push fires only if
    /// [`can_push`](Self::can_push) held on the snapshot, so a simultaneous
    /// pop never makes room for it and a push into a full snapshot is
    /// dropped.
    pub fn advance(&self, pop: bool, push: Option<T>) -> Self {
        let mut next = self.clone();
        if pop {
            next.items.pop_front();
        }
        if let Some(item) = push.filter(|_| self.can_push()) {
            next.items.push_back(item);
        }
        next
    }
}
