//! Sliding sequence window
//!
//! Fixed-capacity FIFO of the most recent feature vectors. This is the unit
//! the autoencoder consumes once it holds a full sequence.

use std::collections::VecDeque;

use super::features::{FeatureVector, Sequence};

/// Bounded window of the last `capacity` feature vectors
#[derive(Debug, Clone)]
pub struct SequenceWindow {
    entries: VecDeque<FeatureVector>,
    capacity: usize,
    total_pushed: u64,
}

impl SequenceWindow {
    /// Create an empty window holding at most `capacity` vectors
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            total_pushed: 0,
        }
    }

    /// Append at the tail, evicting the oldest entry when full
    pub fn push(&mut self, vector: FeatureVector) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(vector);
        self.total_pushed += 1;
    }

    /// True once at least `capacity` vectors have been pushed
    pub fn is_ready(&self) -> bool {
        self.entries.len() == self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total vectors pushed over the window's lifetime
    pub fn total_pushed(&self) -> u64 {
        self.total_pushed
    }

    /// Current contents, oldest first
    pub fn snapshot(&self) -> Sequence {
        self.entries.iter().copied().collect()
    }

    /// Full sequence, or `None` while still warming up
    pub fn ready_sequence(&self) -> Option<Sequence> {
        self.is_ready().then(|| self.snapshot())
    }
}
