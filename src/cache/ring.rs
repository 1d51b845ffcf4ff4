//! Fixed-capacity slot buffer with round-robin replacement.

use std::num::NonZeroUsize;

/// Slots fill front to back; once full, `cursor` walks the slots cyclically and
/// each insert overwrites the slot under it. The backing slice is allocated once
/// and never grows.
pub(crate) struct SlotRing<T> {
    slots: Box<[Option<T>]>,
    count: usize,
    cursor: usize,
}

impl<T> SlotRing<T> {
    /// Allocate `capacity` empty slots, clamping a zero capacity to one.
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        let slots = (0..capacity.get()).map(|_| None).collect();
        Self {
            slots,
            count: 0,
            cursor: 0,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.count
    }

    /// Linear scan over the populated slots.
    pub(crate) fn find<P>(&self, mut predicate: P) -> Option<&T>
    where
        P: FnMut(&T) -> bool,
    {
        self.slots[..self.count]
            .iter()
            .flatten()
            .find(|&value| predicate(value))
    }

    /// Store `value`, returning whatever it displaced.
    pub(crate) fn insert(&mut self, value: T) -> Option<T> {
        if self.count < self.slots.len() {
            self.slots[self.count] = Some(value);
            self.count += 1;
            return None;
        }

        let evicted = self.slots[self.cursor].replace(value);
        self.cursor = (self.cursor + 1) % self.slots.len();
        evicted
    }

    #[cfg(test)]
    pub(crate) fn cursor(&self) -> usize {
        self.cursor
    }
}
