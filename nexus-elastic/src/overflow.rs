//! Worker-owned growable FIFO between the two handoffs.
//!
//! A `VecDeque` never gives capacity back on its own, so one large burst would
//! pin its peak allocation for the life of the queue. [`Overflow::recycle`]
//! swaps an emptied buffer that grew past the retain limit for a fresh one at
//! the nominal capacity. The next burst pays for a reallocation instead.

use std::collections::VecDeque;
use std::collections::vec_deque::Drain;

pub(crate) struct Overflow<T> {
    buf: VecDeque<T>,
    nominal: usize,
    retain_limit: usize,
}

impl<T> Overflow<T> {
    /// `retain_limit` is raised to the initial allocation if smaller.
    pub(crate) fn with_capacity(nominal: usize, retain_limit: usize) -> Self {
        let buf = VecDeque::with_capacity(nominal);
        let retain_limit = retain_limit.max(buf.capacity());
        Self {
            buf,
            nominal,
            retain_limit,
        }
    }

    #[inline]
    pub(crate) fn push_back(&mut self, value: T) {
        self.buf.push_back(value);
    }

    /// Puts back a head that was taken but not delivered.
    #[inline]
    pub(crate) fn push_front(&mut self, value: T) {
        self.buf.push_front(value);
    }

    #[inline]
    pub(crate) fn pop_front(&mut self) -> Option<T> {
        self.buf.pop_front()
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    /// Reallocates at the nominal capacity if the buffer is empty and has
    /// grown past the retain limit. Returns `true` if it did.
    pub(crate) fn recycle(&mut self) -> bool {
        if !self.buf.is_empty() || self.buf.capacity() <= self.retain_limit {
            return false;
        }
        self.buf = VecDeque::with_capacity(self.nominal);
        true
    }

    pub(crate) fn drain(&mut self) -> Drain<'_, T> {
        self.buf.drain(..)
    }
}
