//! Close coordination shared by every [`Sender`](crate::Sender) clone.
//!
//! The input handoff carries a close marker that must land behind every item
//! a producer was told it successfully sent. Producers blocked on a full input
//! handoff can still be mid-send when `close` is called, so the marker cannot
//! simply be pushed by the closer. The gate tracks in-progress sends in one
//! atomic word and elects exactly one party to push the marker:
//!
//! ```text
//! state = (in_progress_sends << 1) | closed
//!
//! close():  fetch_or(CLOSED)   prev == 0      -> closer pushes marker
//!                              prev has sends -> last sender pushes marker
//! leave():  fetch_sub(SEND)    prev == CLOSED | SEND -> this sender pushes
//! enter():  CAS loop, refuses once CLOSED is set
//! ```
//!
//! `enter` never increments a closed gate, so the `(closed, 0)` state is
//! reached exactly once and no send can start after it.

use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_utils::CachePadded;

const CLOSED: usize = 1;
const SEND: usize = 2;

/// Outcome of [`Gate::close`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Close {
    /// Another handle closed the gate first.
    AlreadyClosed,
    /// No send in progress; the caller pushes the close marker.
    Signal,
    /// Sends are in progress; the last one to leave pushes the marker.
    Deferred,
}

pub(crate) struct Gate {
    state: CachePadded<AtomicUsize>,
}

impl Gate {
    pub(crate) fn new() -> Self {
        Self {
            state: CachePadded::new(AtomicUsize::new(0)),
        }
    }

    /// Registers an in-progress send. Returns `false` once the gate is closed.
    pub(crate) fn enter(&self) -> bool {
        let mut state = self.state.load(Ordering::Acquire);
        loop {
            if state & CLOSED != 0 {
                return false;
            }
            match self.state.compare_exchange_weak(
                state,
                state + SEND,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => state = actual,
            }
        }
    }

    /// Unregisters a send started with [`enter`](Self::enter).
    ///
    /// Returns `true` if the gate was closed while this was the last send in
    /// progress; the caller must then push the close marker.
    pub(crate) fn leave(&self) -> bool {
        let prev = self.state.fetch_sub(SEND, Ordering::AcqRel);
        debug_assert!(prev >= SEND, "leave without matching enter");
        prev == CLOSED | SEND
    }

    pub(crate) fn close(&self) -> Close {
        let prev = self.state.fetch_or(CLOSED, Ordering::AcqRel);
        if prev & CLOSED != 0 {
            Close::AlreadyClosed
        } else if prev == 0 {
            Close::Signal
        } else {
            Close::Deferred
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state.load(Ordering::Acquire) & CLOSED != 0
    }
}
