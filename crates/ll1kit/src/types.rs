//! Utility types.

use std::{collections::VecDeque, hash::Hash};

type BuildHasher = std::hash::BuildHasherDefault<rustc_hash::FxHasher>;

/// Insertion-ordered map, so that every table derived from a grammar is
/// printed in a stable order.
pub type Map<K, V> = indexmap::IndexMap<K, V, BuildHasher>;
pub type Set<T> = indexmap::IndexSet<T, BuildHasher>;

/// A FIFO of pending items. An item already waiting is not enqueued twice,
/// but may be enqueued again once it has been popped.
#[derive(Debug)]
pub struct Worklist<T> {
    pending: VecDeque<T>,
    waiting: Set<T>,
}

impl<T> Default for Worklist<T> {
    fn default() -> Self {
        Self {
            pending: VecDeque::new(),
            waiting: Set::default(),
        }
    }
}

impl<T> Worklist<T>
where
    T: Copy + Eq + Hash,
{
    /// Returns `false` if `item` was already waiting.
    pub fn push(&mut self, item: T) -> bool {
        let inserted = self.waiting.insert(item);
        if inserted {
            self.pending.push_back(item);
        }
        inserted
    }

    pub fn pop(&mut self) -> Option<T> {
        let item = self.pending.pop_front()?;
        self.waiting.swap_remove(&item);
        Some(item)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl<T> FromIterator<T> for Worklist<T>
where
    T: Copy + Eq + Hash,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut worklist = Self::default();
        worklist.extend(iter);
        worklist
    }
}

impl<T> Extend<T> for Worklist<T>
where
    T: Copy + Eq + Hash,
{
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.push(item);
        }
    }
}
