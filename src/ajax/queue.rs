//! Bounded FIFO of pending requests with one request in flight

use std::collections::VecDeque;

/// Result of [`RequestQueue::enqueue`]
#[derive(Debug, PartialEq, Eq)]
pub enum Admission<T> {
    /// The queue was idle; send this entry now
    SendNow(T),
    /// The entry waits; `evicted` lists entries dropped by the bound
    Queued { evicted: Vec<T> },
}

/// Request queue
#[derive(Debug)]
pub struct RequestQueue<T> {
    waiting: VecDeque<T>,
    in_flight: bool,
    bound: Option<usize>,
}

impl<T> RequestQueue<T> {
    pub fn new() -> Self {
        Self {
            waiting: VecDeque::new(),
            in_flight: false,
            bound: None,
        }
    }

    /// Admit an entry. A given `queue_size` becomes the active bound.
    pub fn enqueue(&mut self, entry: T, queue_size: Option<usize>) -> Admission<T> {
        if !self.in_flight {
            self.in_flight = true;
            return Admission::SendNow(entry);
        }
        self.waiting.push_back(entry);
        let evicted = match queue_size {
            Some(size) => self.set_queue_size(Some(size)),
            None => self.evict_excess(),
        };
        Admission::Queued { evicted }
    }

    /// Change the bound, dropping the oldest waiting entries above it.
    /// `None` removes the bound.
    pub fn set_queue_size(&mut self, size: Option<usize>) -> Vec<T> {
        self.bound = size;
        self.evict_excess()
    }

    fn evict_excess(&mut self) -> Vec<T> {
        let Some(bound) = self.bound else {
            return Vec::new();
        };
        let excess = self.waiting.len().saturating_sub(bound);
        self.waiting.drain(..excess).collect()
    }

    /// Finish the in-flight entry and hand out the next one
    pub fn process_next(&mut self) -> Option<T> {
        let next = self.waiting.pop_front();
        self.in_flight = next.is_some();
        next
    }

    /// Forget the in-flight entry and drop everything waiting
    pub fn cleanup(&mut self) -> Vec<T> {
        self.in_flight = false;
        self.waiting.drain(..).collect()
    }

    /// Number of waiting entries (the in-flight one excluded)
    pub fn len(&self) -> usize {
        self.waiting.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiting.is_empty()
    }

    pub fn is_idle(&self) -> bool {
        !self.in_flight && self.waiting.is_empty()
    }

    pub fn bound(&self) -> Option<usize> {
        self.bound
    }
}

impl<T> Default for RequestQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
