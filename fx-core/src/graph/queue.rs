//! Priority Queue
//!
//! A binary min-heap keyed by rank. The propagation engine uses one fresh
//! queue per pass to evaluate nodes in topological order.
//!
//! Entries with equal keys pop in insertion order. Callers only rely on
//! non-decreasing keys, but a deterministic tie-break keeps merge results
//! reproducible.

#[derive(Debug)]
struct Entry<T> {
    key: u64,
    seq: u64,
    value: T,
}

impl<T> Entry<T> {
    fn precedes(&self, other: &Entry<T>) -> bool {
        (self.key, self.seq) < (other.key, other.seq)
    }
}

/// Array-backed binary heap ordered by an integer key.
#[derive(Debug)]
pub struct PriorityQueue<T> {
    heap: Vec<Entry<T>>,
    next_seq: u64,
}

impl<T> PriorityQueue<T> {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            heap: Vec::new(),
            next_seq: 0,
        }
    }

    /// Insert `value` under `key`. Duplicate keys are allowed.
    pub fn insert(&mut self, key: u64, value: T) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Entry { key, seq, value });
        self.sift_up(self.heap.len() - 1);
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Smallest key currently queued.
    pub fn peek_key(&self) -> Option<u64> {
        self.heap.first().map(|entry| entry.key)
    }

    /// Remove and return the value with the smallest key.
    pub fn pop(&mut self) -> Option<T> {
        if self.heap.is_empty() {
            return None;
        }
        let last = self.heap.len() - 1;
        self.heap.swap(0, last);
        let entry = self.heap.pop()?;
        if !self.heap.is_empty() {
            self.sift_down(0);
        }
        Some(entry.value)
    }

    fn sift_up(&mut self, mut pos: usize) {
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if !self.heap[pos].precedes(&self.heap[parent]) {
                break;
            }
            self.heap.swap(pos, parent);
            pos = parent;
        }
    }

    fn sift_down(&mut self, mut pos: usize) {
        let len = self.heap.len();
        loop {
            let left = 2 * pos + 1;
            let right = left + 1;
            let mut smallest = pos;

            if left < len && self.heap[left].precedes(&self.heap[smallest]) {
                smallest = left;
            }
            if right < len && self.heap[right].precedes(&self.heap[smallest]) {
                smallest = right;
            }
            if smallest == pos {
                break;
            }
            self.heap.swap(pos, smallest);
            pos = smallest;
        }
    }
}

impl<T> Default for PriorityQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
