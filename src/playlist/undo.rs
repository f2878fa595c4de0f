use std::collections::VecDeque;

use super::PlaylistEntry;

/// A soft-deleted entry and the position it occupied.
#[derive(Debug, Clone, PartialEq)]
pub struct Removed {
    pub entry: PlaylistEntry,
    pub index: usize,
}

/// Fixed-capacity history of removals. Pushing onto a full stack evicts the
/// oldest record.
#[derive(Debug, Clone)]
pub struct UndoStack {
    items: VecDeque<Removed>,
    capacity: usize,
}

impl UndoStack {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Record a removal, returning whatever had to be evicted to make room.
    /// With zero capacity the record itself is returned.
    pub fn push(&mut self, removed: Removed) -> Option<Removed> {
        if self.capacity == 0 {
            return Some(removed);
        }
        let evicted = if self.items.len() == self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(removed);
        evicted
    }

    pub fn pop(&mut self) -> Option<Removed> {
        self.items.pop_back()
    }

    pub fn peek(&self) -> Option<&Removed> {
        self.items.back()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}
