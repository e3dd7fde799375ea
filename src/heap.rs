//! Fixed-capacity top-N heap over `(id, score)` pairs.
//!
//! Two admission directions are supported: keep the `k` largest scores
//! (`MostSimilar`) or the `k` smallest (`LeastSimilar`). Ties at the
//! current root are not admitted, so the first-seen id for a given score
//! wins a spot. Ordering uses `f32::total_cmp` for a total order, the
//! same approach the teacher's HNSW search uses to keep a `BinaryHeap`
//! of floats from corrupting on `NaN`.

use std::collections::BinaryHeap;

/// Which end of the score range a [`BoundedHeap`] retains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Keep the `k` highest scores.
    MostSimilar,
    /// Keep the `k` lowest scores.
    LeastSimilar,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    id: usize,
    score: f32,
    reverse: bool,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.score.to_bits() == other.score.to_bits()
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        let ord = self.score.total_cmp(&other.score);
        if self.reverse {
            ord.reverse()
        } else {
            ord
        }
    }
}

/// A fixed-capacity heap tracking the top `k` `(id, score)` pairs seen so
/// far during a scan.
pub struct BoundedHeap {
    capacity: usize,
    direction: Direction,
    heap: BinaryHeap<Entry>,
}

impl BoundedHeap {
    /// Creates an empty heap with the given `capacity` and `direction`.
    ///
    /// `capacity == 0` produces a heap that never admits anything.
    #[must_use]
    pub fn new(capacity: usize, direction: Direction) -> Self {
        Self {
            capacity,
            direction,
            heap: BinaryHeap::with_capacity(capacity),
        }
    }

    /// `reverse` flag so the heap's internal `BinaryHeap` root always
    /// matches the element this heap would evict next.
    fn reverse_flag(&self) -> bool {
        matches!(self.direction, Direction::MostSimilar)
    }

    /// Offers `(id, score)` for admission.
    ///
    /// While the heap has not reached capacity, the pair is always
    /// admitted. Once full, it replaces the current root only if it
    /// strictly improves on it per the heap's direction; exact ties are
    /// rejected, leaving the first-seen id in place.
    pub fn push(&mut self, id: usize, score: f32) {
        if self.capacity == 0 {
            return;
        }

        let reverse = self.reverse_flag();
        if self.heap.len() < self.capacity {
            self.heap.push(Entry { id, score, reverse });
            return;
        }

        let Some(root) = self.heap.peek() else {
            return;
        };

        let improves = match self.direction {
            Direction::MostSimilar => score > root.score,
            Direction::LeastSimilar => score < root.score,
        };

        if improves {
            self.heap.pop();
            self.heap.push(Entry { id, score, reverse });
        }
    }

    /// Number of elements currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether the heap holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Consumes the heap, returning its contents sorted into final rank
    /// order: descending by score for `MostSimilar`, ascending for
    /// `LeastSimilar`.
    #[must_use]
    pub fn into_sorted(self) -> Vec<(usize, f32)> {
        let mut items: Vec<(usize, f32)> =
            self.heap.into_iter().map(|e| (e.id, e.score)).collect();
        match self.direction {
            Direction::MostSimilar => {
                items.sort_by(|a, b| b.1.total_cmp(&a.1));
            }
            Direction::LeastSimilar => {
                items.sort_by(|a, b| a.1.total_cmp(&b.1));
            }
        }
        items
    }
}
